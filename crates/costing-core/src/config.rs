//! # Engine Configuration
//!
//! The two domain constants of the costing rules, as auditable values.
//!
//! | Setting                     | Default | Used by                  |
//! |-----------------------------|---------|--------------------------|
//! | `substitution_surcharge_pct`| 14.0    | total cost surcharge     |
//! | `seconds_per_hour`          | 3600.0  | injection throughput     |
//!
//! Loading from files or the environment happens in `costing-session`;
//! this crate only defines and validates the values.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::Percentage;
use crate::{DEFAULT_SECONDS_PER_HOUR, DEFAULT_SUBSTITUTION_SURCHARGE_PCT};

/// Tunable constants of the cost engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub struct CostingConfig {
    /// Surcharge applied to total cost when the substitution-tax flag is set.
    #[serde(default = "default_surcharge")]
    pub substitution_surcharge_pct: Percentage,

    /// Seconds in one production hour, for injection throughput.
    #[serde(default = "default_seconds_per_hour")]
    pub seconds_per_hour: f64,
}

fn default_surcharge() -> Percentage {
    Percentage::from_points(DEFAULT_SUBSTITUTION_SURCHARGE_PCT)
}

fn default_seconds_per_hour() -> f64 {
    DEFAULT_SECONDS_PER_HOUR
}

impl Default for CostingConfig {
    fn default() -> Self {
        CostingConfig {
            substitution_surcharge_pct: default_surcharge(),
            seconds_per_hour: default_seconds_per_hour(),
        }
    }
}

impl CostingConfig {
    /// Validates the configuration.
    ///
    /// ## Rules
    /// - Surcharge must be finite and not negative
    /// - Seconds per hour must be finite and positive
    pub fn validate(&self) -> Result<(), ValidationError> {
        let surcharge = self.substitution_surcharge_pct.points();
        if !surcharge.is_finite() {
            return Err(ValidationError::NotFinite {
                field: "substitution_surcharge_pct".to_string(),
            });
        }
        if surcharge < 0.0 {
            return Err(ValidationError::MustBeNonNegative {
                field: "substitution_surcharge_pct".to_string(),
            });
        }

        if !self.seconds_per_hour.is_finite() {
            return Err(ValidationError::NotFinite {
                field: "seconds_per_hour".to_string(),
            });
        }
        if self.seconds_per_hour <= 0.0 {
            return Err(ValidationError::MustBePositive {
                field: "seconds_per_hour".to_string(),
            });
        }

        Ok(())
    }
}
