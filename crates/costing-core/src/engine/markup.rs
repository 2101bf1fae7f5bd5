//! # Markup Coefficient
//!
//! Turns a markup profile's percentage stack into the multiplier applied to
//! total cost:
//!
//! ```text
//! coefficient = 100 ÷ (100 − load_factor)
//!
//! load 30%  →  1.428571...     (price such that 30% of it covers the load)
//! load 100% →  rejected        (no finite price exists)
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::{MarkupProfile, Percentage};

/// Sum of the profile's nine components.
pub fn load_factor(profile: &MarkupProfile) -> Percentage {
    profile.load_factor()
}

/// Coefficient for a load factor.
///
/// ## Errors
/// `CoreError::InvalidMarkupProfile` when the load is 100 or more, or not
/// a finite number.
pub fn coefficient_for_load(load: Percentage) -> CoreResult<f64> {
    let points = load.points();
    if !points.is_finite() || points >= 100.0 {
        return Err(CoreError::InvalidMarkupProfile { load_factor: points });
    }
    Ok(100.0 / (100.0 - points))
}

/// Coefficient of a markup profile.
///
/// ## Example
/// ```rust
/// use costing_core::engine::markup::coefficient_for_load;
/// use costing_core::Percentage;
///
/// let coef = coefficient_for_load(Percentage::from_points(30.0)).unwrap();
/// assert!((coef - 1.428571).abs() < 1e-6);
/// assert!(coefficient_for_load(Percentage::from_points(100.0)).is_err());
/// ```
pub fn markup_coefficient(profile: &MarkupProfile) -> CoreResult<f64> {
    coefficient_for_load(load_factor(profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assert_close;

    fn profile_with_profit(profit: f64) -> MarkupProfile {
        MarkupProfile {
            id: "mk".to_string(),
            name: "Atacado".to_string(),
            taxes: Percentage::from_points(18.0),
            admin: Percentage::from_points(2.0),
            commission: Percentage::from_points(3.0),
            freight: Percentage::from_points(1.0),
            financial: Percentage::from_points(1.0),
            marketing: Percentage::from_points(1.0),
            promoters: Percentage::from_points(0.0),
            bonus: Percentage::from_points(0.0),
            profit: Percentage::from_points(profit),
        }
    }

    #[test]
    fn test_coefficient_load_30() {
        let profile = profile_with_profit(4.0);
        assert_close(load_factor(&profile).points(), 30.0);
        assert_close(markup_coefficient(&profile).unwrap(), 100.0 / 70.0);
    }

    #[test]
    fn test_zero_load_is_identity() {
        assert_close(coefficient_for_load(Percentage::zero()).unwrap(), 1.0);
    }

    #[test]
    fn test_load_100_rejected() {
        let profile = profile_with_profit(74.0);
        match markup_coefficient(&profile) {
            Err(CoreError::InvalidMarkupProfile { load_factor }) => {
                assert_close(load_factor, 100.0)
            }
            other => panic!("expected InvalidMarkupProfile, got {:?}", other),
        }
    }

    #[test]
    fn test_load_above_100_and_nan_rejected() {
        assert!(coefficient_for_load(Percentage::from_points(120.0)).is_err());
        assert!(coefficient_for_load(Percentage::from_points(f64::NAN)).is_err());
    }
}
