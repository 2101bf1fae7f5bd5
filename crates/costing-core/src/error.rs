//! # Error Types
//!
//! Domain-specific error types for costing-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  costing-core errors (this file)                                       │
//! │  ├── CoreError        - Structural / domain errors                     │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  costing-session errors (separate crate)                               │
//! │  └── SessionError     - Lookup, store and config failures              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SessionError → UI layer           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## What Is NOT an Error
//! Numeric edge cases never surface here. A zero quantity, a zero cycle time
//! or a zero revenue clamps the affected metric to 0. An unresolved catalog
//! selection is a `Pending` line status, not an error.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent structurally invalid input: something the caller must fix
/// before the sheet can be edited or submitted.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No line with this row id exists in any category.
    #[error("Line not found: {row_id}")]
    RowNotFound { row_id: String },

    /// Markup profile percentages add up to 100 or more.
    ///
    /// ## When This Occurs
    /// - Authoring a profile whose nine components sum to >= 100
    /// - Selecting such a profile for a sheet
    /// - Asking for the coefficient of such a profile
    ///
    /// The coefficient `100 / (100 - load)` would be infinite or negative,
    /// so none is produced.
    #[error("Invalid markup profile: load factor {load_factor}% must be below 100%")]
    InvalidMarkupProfile { load_factor: f64 },

    /// A reference required for submission is absent (markup profile,
    /// price info).
    #[error("Missing required reference: {0}")]
    MissingReference(String),

    /// Payload could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before a value is accepted into a sheet or catalog record.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or more.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: String },

    /// Value is NaN or infinite.
    #[error("{field} must be a finite number")]
    NotFinite { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },

    /// Invalid format (e.g., product code with spaces).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
