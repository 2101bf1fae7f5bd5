//! # Validation Module
//!
//! Input validation for sheet lines, headers and catalog records.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Where Values Get Checked                           │
//! │                                                                         │
//! │  Layer 1: UI form (excluded)                                            │
//! │  └── Format checks, immediate feedback                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE, at acceptance time                               │
//! │  ├── quantity > 0, prices >= 0, cycle seconds > 0, cavities >= 1        │
//! │  └── markup load factor < 100                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: engine                                                        │
//! │  └── Never rejects; guards every division and clamps to 0               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use costing_core::validation::{validate_cycle_seconds, validate_quantity};
//!
//! assert!(validate_quantity(3.0).is_ok());
//! assert!(validate_cycle_seconds(0.0).is_err());
//! ```

use crate::amount::Amount;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{Material, MarkupProfile, Operation, ProductPriceInfo, SheetHeader};
use crate::{MAX_NAME_LEN, MAX_NOTE_LEN, MAX_PRODUCT_CODE_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens, underscores and dots only
///
/// ## Example
/// ```rust
/// use costing_core::validation::validate_product_code;
///
/// assert!(validate_product_code("CX-1020").is_ok());
/// assert!(validate_product_code("").is_err());
/// assert!(validate_product_code("has space").is_err());
/// ```
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "product code".to_string(),
        });
    }

    check_product_code_format(code)
}

fn check_product_code_format(code: &str) -> ValidationResult<()> {
    if code.chars().count() > MAX_PRODUCT_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "product code".to_string(),
            max: MAX_PRODUCT_CODE_LEN,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "product code".to_string(),
            reason: "must contain only letters, numbers, hyphens, underscores, and dots"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates a required display name (product, material, operation, profile).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a free-text line note. Empty is fine.
pub fn validate_note(note: &str) -> ValidationResult<()> {
    if note.chars().count() > MAX_NOTE_LEN {
        return Err(ValidationError::TooLong {
            field: "note".to_string(),
            max: MAX_NOTE_LEN,
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

fn require_finite(field: &str, value: f64) -> ValidationResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NotFinite {
            field: field.to_string(),
        })
    }
}

fn require_positive(field: &str, value: f64) -> ValidationResult<()> {
    require_finite(field, value)?;
    if value <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn require_non_negative(field: &str, value: f64) -> ValidationResult<()> {
    require_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::MustBeNonNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a line quantity (material units, or units per hour for a
/// normal operation).
///
/// ## Rules
/// - Finite and strictly positive
pub fn validate_quantity(qty: f64) -> ValidationResult<()> {
    require_positive("quantity", qty)
}

/// Validates a material unit price. Zero is allowed (free samples, scrap).
pub fn validate_unit_price(price: Amount) -> ValidationResult<()> {
    require_non_negative("unit price", price.value())
}

/// Validates an operation hourly rate. Zero is allowed.
pub fn validate_hourly_rate(rate: Amount) -> ValidationResult<()> {
    require_non_negative("hourly rate", rate.value())
}

/// Validates an injection cycle time.
///
/// A zero cycle time would make throughput undefined, so it is rejected
/// here rather than silently costed at 0.
pub fn validate_cycle_seconds(seconds: f64) -> ValidationResult<()> {
    require_positive("cycle seconds", seconds)
}

/// Validates a mold cavity count.
pub fn validate_cavity_count(cavities: u32) -> ValidationResult<()> {
    if cavities == 0 {
        return Err(ValidationError::MustBePositive {
            field: "cavity count".to_string(),
        });
    }
    Ok(())
}

/// Validates the produced quantity of a header. Zero is allowed while the
/// sheet is being built; unit cost and revenues clamp to 0.
pub fn validate_produced_qty(qty: f64) -> ValidationResult<()> {
    require_non_negative("produced quantity", qty)
}

// =============================================================================
// Aggregate Validators
// =============================================================================

/// Validates a header while it is being edited.
///
/// Blank code and name are accepted (a new sheet starts blank); a non-blank
/// code must be well formed.
pub fn validate_header(header: &SheetHeader) -> ValidationResult<()> {
    let code = header.product_code.trim();
    if !code.is_empty() {
        check_product_code_format(code)?;
    }
    if header.name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "product name".to_string(),
            max: MAX_NAME_LEN,
        });
    }
    validate_produced_qty(header.produced_qty)
}

/// Validates a header for submission: code and name are required.
pub fn validate_header_complete(header: &SheetHeader) -> ValidationResult<()> {
    validate_product_code(&header.product_code)?;
    validate_name("product name", &header.name)?;
    validate_produced_qty(header.produced_qty)
}

/// Validates a markup profile at authoring or selection time.
///
/// ## Rules
/// - Name is required
/// - Each component is finite and within [0, 100]
/// - The load factor (sum of components) is strictly below 100
///
/// ## Example
/// ```rust
/// use costing_core::types::{MarkupProfile, Percentage};
/// use costing_core::validation::validate_markup_profile;
///
/// let mut profile = MarkupProfile {
///     id: "mk-1".into(),
///     name: "Retail".into(),
///     taxes: Percentage::from_points(18.0),
///     admin: Percentage::from_points(5.0),
///     commission: Percentage::from_points(3.0),
///     freight: Percentage::from_points(2.0),
///     financial: Percentage::from_points(1.0),
///     marketing: Percentage::from_points(1.0),
///     promoters: Percentage::zero(),
///     bonus: Percentage::zero(),
///     profit: Percentage::from_points(10.0),
/// };
/// assert!(validate_markup_profile(&profile).is_ok());
///
/// profile.profit = Percentage::from_points(70.0);
/// assert!(validate_markup_profile(&profile).is_err());
/// ```
pub fn validate_markup_profile(profile: &MarkupProfile) -> CoreResult<()> {
    validate_name("markup profile name", &profile.name)?;

    for (field, pct) in profile.components() {
        let points = pct.points();
        require_finite(field, points)?;
        if !(0.0..=100.0).contains(&points) {
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                min: 0.0,
                max: 100.0,
            }
            .into());
        }
    }

    let load_factor = profile.load_factor().points();
    if load_factor >= 100.0 {
        return Err(CoreError::InvalidMarkupProfile { load_factor });
    }

    Ok(())
}

/// Validates a material catalog record.
pub fn validate_material(material: &Material) -> ValidationResult<()> {
    validate_name("material name", &material.name)?;
    validate_unit_price(material.price)
}

/// Validates an operation catalog record.
pub fn validate_operation(operation: &Operation) -> ValidationResult<()> {
    validate_name("operation name", &operation.name)?;
    validate_hourly_rate(operation.hourly_rate)
}

/// Validates a product price info record.
pub fn validate_price_info(info: &ProductPriceInfo) -> ValidationResult<()> {
    validate_product_code(&info.product_code)?;
    require_non_negative("list price", info.list_price.value())?;
    require_non_negative("average sold price", info.average_sold_price.value())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OperationKind, Percentage};

    fn markup(points: [f64; 9]) -> MarkupProfile {
        MarkupProfile {
            id: "mk".to_string(),
            name: "Profile".to_string(),
            taxes: Percentage::from_points(points[0]),
            admin: Percentage::from_points(points[1]),
            commission: Percentage::from_points(points[2]),
            freight: Percentage::from_points(points[3]),
            financial: Percentage::from_points(points[4]),
            marketing: Percentage::from_points(points[5]),
            promoters: Percentage::from_points(points[6]),
            bonus: Percentage::from_points(points[7]),
            profit: Percentage::from_points(points[8]),
        }
    }

    #[test]
    fn test_validate_product_code() {
        assert!(validate_product_code("CX-1020").is_ok());
        assert!(validate_product_code("tampa_28mm").is_ok());
        assert!(validate_product_code("1.020.3").is_ok());

        assert!(validate_product_code("").is_err());
        assert!(validate_product_code("   ").is_err());
        assert!(validate_product_code("has space").is_err());
        assert!(validate_product_code(&"A".repeat(60)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1.0).is_ok());
        assert!(validate_quantity(0.25).is_ok());

        assert!(validate_quantity(0.0).is_err());
        assert!(validate_quantity(-2.0).is_err());
        assert!(validate_quantity(f64::NAN).is_err());
        assert!(validate_quantity(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_prices() {
        assert!(validate_unit_price(Amount::new(0.0)).is_ok());
        assert!(validate_unit_price(Amount::new(10.5)).is_ok());
        assert!(validate_unit_price(Amount::new(-1.0)).is_err());
        assert!(validate_hourly_rate(Amount::new(-0.01)).is_err());
    }

    #[test]
    fn test_validate_injection_inputs() {
        assert!(validate_cycle_seconds(20.0).is_ok());
        assert!(validate_cycle_seconds(0.0).is_err());
        assert!(validate_cycle_seconds(-3.0).is_err());

        assert!(validate_cavity_count(4).is_ok());
        assert!(validate_cavity_count(0).is_err());
    }

    #[test]
    fn test_validate_header() {
        assert!(validate_header(&SheetHeader::blank()).is_ok());

        let mut header = SheetHeader::blank();
        header.produced_qty = -1.0;
        assert!(validate_header(&header).is_err());

        header.produced_qty = 10.0;
        header.product_code = "bad code".to_string();
        assert!(validate_header(&header).is_err());
    }

    #[test]
    fn test_validate_header_complete() {
        assert!(validate_header_complete(&SheetHeader::blank()).is_err());

        let header = SheetHeader {
            product_code: "CX-1".to_string(),
            name: "Caixa".to_string(),
            produced_qty: 100.0,
            ..SheetHeader::default()
        };
        assert!(validate_header_complete(&header).is_ok());
    }

    #[test]
    fn test_validate_markup_profile() {
        assert!(validate_markup_profile(&markup([10.0, 5.0, 3.0, 2.0, 1.0, 2.0, 1.0, 1.0, 5.0])).is_ok());

        // Load factor exactly 100
        let err = validate_markup_profile(&markup([50.0, 50.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidMarkupProfile { .. }));

        // Negative component
        let err = validate_markup_profile(&markup([-5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_validate_catalog_records() {
        let material = Material {
            id: "m1".to_string(),
            name: "PP resin".to_string(),
            price: Amount::new(9.8),
            unit: "kg".to_string(),
        };
        assert!(validate_material(&material).is_ok());

        let operation = Operation {
            id: "op1".to_string(),
            name: String::new(),
            hourly_rate: Amount::new(120.0),
            unit: "h".to_string(),
            kind: OperationKind::Normal,
        };
        assert!(validate_operation(&operation).is_err());
    }
}
