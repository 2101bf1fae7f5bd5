//! # Amount Module
//!
//! Provides the `Amount` type for monetary values on a cost sheet.
//!
//! ## Why Not Integer Cents?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  COST BUILD-UP IS FRACTIONAL BY NATURE                                  │
//! │                                                                         │
//! │  hourly rate R$ 120.00 ÷ 7 parts/hour   = R$ 17.142857... per part      │
//! │  R$ 180.00 × 1000 ÷ 720 parts/hour      = R$ 250.00 per batch           │
//! │  total × 100 ÷ (100 − 30)               = coefficient 1.428571...       │
//! │                                                                         │
//! │  Rounding each step to cents would compound error across a sheet,      │
//! │  so amounts stay f64 and are rounded only for display.                  │
//! │                                                                         │
//! │  THE CONTRACT INSTEAD: an Amount is ALWAYS finite.                      │
//! │    Amount::new(f64::NAN)      → 0                                       │
//! │    amount.per(0.0)            → 0                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use costing_core::amount::Amount;
//!
//! let unit_price = Amount::new(10.5);
//! let line_total = unit_price.times(3.0);
//! assert_eq!(line_total.value(), 31.5);
//!
//! // Degenerate denominators never leak Infinity
//! assert_eq!(Amount::new(120.0).per(0.0), Amount::zero());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

use crate::types::Percentage;

// =============================================================================
// Amount Type
// =============================================================================

/// A monetary value in the sheet's single currency.
///
/// ## Design Decisions
/// - **f64 newtype**: costing formulas divide by rates and throughputs
/// - **Always finite**: every constructor and operator maps NaN/Infinity to 0
/// - **Transparent serde**: serializes as a plain JSON number
///
/// ## Where Amount is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Material.price ──► MaterialLine.unit_price ──► MaterialLine total      │
/// │  Operation.hourly_rate ──► operation line totals                        │
/// │                                                                         │
/// │  Category totals ──► total cost ──► unit cost / suggested price         │
/// │  ProductPriceInfo prices ──► revenues                                   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Amount(f64);

impl Amount {
    /// Creates an amount, mapping NaN and infinities to zero.
    #[inline]
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Amount(value)
        } else {
            Amount(0.0)
        }
    }

    /// Returns the raw value.
    #[inline]
    pub const fn value(&self) -> f64 {
        self.0
    }

    /// Returns zero.
    #[inline]
    pub const fn zero() -> Self {
        Amount(0.0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }

    /// Checks if the value is strictly positive.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > 0.0
    }

    /// Checks if the value is strictly negative.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < 0.0
    }

    /// Multiplies by a dimensionless factor (quantity, coefficient).
    ///
    /// ## Example
    /// ```rust
    /// use costing_core::amount::Amount;
    ///
    /// let unit_price = Amount::new(2.5);
    /// assert_eq!(unit_price.times(4.0).value(), 10.0);
    /// ```
    #[inline]
    pub fn times(&self, factor: f64) -> Self {
        Amount::new(self.0 * factor)
    }

    /// Divides by a strictly positive divisor; yields zero otherwise.
    ///
    /// This is the single guarded division used for every "per unit" figure
    /// in the engine.
    ///
    /// ## Example
    /// ```rust
    /// use costing_core::amount::Amount;
    ///
    /// assert_eq!(Amount::new(228.0).per(100.0).value(), 2.28);
    /// assert_eq!(Amount::new(228.0).per(0.0).value(), 0.0);
    /// assert_eq!(Amount::new(228.0).per(-5.0).value(), 0.0);
    /// ```
    #[inline]
    pub fn per(&self, divisor: f64) -> Self {
        if divisor > 0.0 && divisor.is_finite() {
            Amount::new(self.0 / divisor)
        } else {
            Amount::zero()
        }
    }

    /// Adds a percentage surcharge: `self × (100 + pct) ÷ 100`.
    ///
    /// ## Example
    /// ```rust
    /// use costing_core::amount::Amount;
    /// use costing_core::types::Percentage;
    ///
    /// let raw = Amount::new(200.0);
    /// assert_eq!(raw.with_surcharge(Percentage::from_points(14.0)).value(), 228.0);
    /// ```
    #[inline]
    pub fn with_surcharge(&self, surcharge: Percentage) -> Self {
        Amount::new(self.0 * (100.0 + surcharge.points()) / 100.0)
    }

    /// Returns `self` as a percentage of `base`, or 0 when `base` is not
    /// strictly positive.
    #[inline]
    pub fn percent_of(&self, base: Amount) -> f64 {
        if base.is_positive() {
            let pct = self.0 / base.0 * 100.0;
            if pct.is_finite() {
                pct
            } else {
                0.0
            }
        } else {
            0.0
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display with two decimals, without currency symbol.
///
/// ## Note
/// Currency symbol and precision come from the session configuration;
/// see `costing_session::config::SessionConfig::format_currency`.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Default for Amount {
    fn default() -> Self {
        Amount::zero()
    }
}

impl Add for Amount {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Amount::new(self.0 + other.0)
    }
}

impl AddAssign for Amount {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Amount {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Amount::new(self.0 - other.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl From<f64> for Amount {
    fn from(value: f64) -> Self {
        Amount::new(value)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sanitizes_non_finite() {
        assert_eq!(Amount::new(f64::NAN), Amount::zero());
        assert_eq!(Amount::new(f64::INFINITY), Amount::zero());
        assert_eq!(Amount::new(f64::NEG_INFINITY), Amount::zero());
        assert_eq!(Amount::new(12.5).value(), 12.5);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Amount::new(10.5)), "10.50");
        assert_eq!(format!("{}", Amount::new(0.0)), "0.00");
        assert_eq!(format!("{}", Amount::new(-5.5)), "-5.50");
    }

    #[test]
    fn test_arithmetic() {
        let a = Amount::new(100.0);
        let b = Amount::new(50.0);

        assert_eq!((a + b).value(), 150.0);
        assert_eq!((a - b).value(), 50.0);
        assert_eq!(a.times(3.0).value(), 300.0);

        let mut c = a;
        c += b;
        assert_eq!(c.value(), 150.0);
    }

    #[test]
    fn test_per_guards_denominator() {
        let total = Amount::new(228.0);
        assert_eq!(total.per(100.0).value(), 2.28);
        assert_eq!(total.per(0.0), Amount::zero());
        assert_eq!(total.per(-1.0), Amount::zero());
        assert_eq!(total.per(f64::NAN), Amount::zero());
    }

    #[test]
    fn test_surcharge() {
        let raw = Amount::new(200.0);
        assert_eq!(raw.with_surcharge(Percentage::from_points(14.0)).value(), 228.0);
        assert_eq!(raw.with_surcharge(Percentage::zero()).value(), 200.0);
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(Amount::new(25.0).percent_of(Amount::new(100.0)), 25.0);
        assert_eq!(Amount::new(25.0).percent_of(Amount::zero()), 0.0);
        assert_eq!(Amount::new(25.0).percent_of(Amount::new(-10.0)), 0.0);
    }

    #[test]
    fn test_sum() {
        let values = [Amount::new(10.0), Amount::new(20.0), Amount::new(30.0)];
        let total: Amount = values.iter().sum();
        assert_eq!(total.value(), 60.0);

        let empty: Vec<Amount> = Vec::new();
        assert_eq!(empty.into_iter().sum::<Amount>(), Amount::zero());
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Amount::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        assert!(Amount::new(1.0).is_positive());
        assert!(Amount::new(-1.0).is_negative());
    }
}
