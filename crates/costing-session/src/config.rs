//! # Session Configuration
//!
//! Configuration for the cost engine constants, currency display and catalog
//! lookups.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     COSTING_SURCHARGE_PCT=14                                           │
//! │     COSTING_LOOKUP_TIMEOUT_MS=2000                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/cost-sheet/costing.toml (Linux)                          │
//! │     ~/Library/Application Support/com.costing.cost-sheet/costing.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     14% surcharge, 3600 s/h, "R$" with 2 decimals, 5 s lookups         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # costing.toml
//! [engine]
//! substitution_surcharge_pct = 14.0
//! seconds_per_hour = 3600.0
//!
//! [currency]
//! symbol = "R$"
//! decimals = 2
//!
//! [lookup]
//! timeout_ms = 5000
//! ```

use costing_core::{Amount, CostingConfig, Percentage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};

/// Environment variable overriding the substitution-tax surcharge.
pub const ENV_SURCHARGE_PCT: &str = "COSTING_SURCHARGE_PCT";
/// Environment variable overriding seconds per production hour.
pub const ENV_SECONDS_PER_HOUR: &str = "COSTING_SECONDS_PER_HOUR";
/// Environment variable overriding the currency symbol.
pub const ENV_CURRENCY_SYMBOL: &str = "COSTING_CURRENCY_SYMBOL";
/// Environment variable overriding the catalog lookup timeout.
pub const ENV_LOOKUP_TIMEOUT_MS: &str = "COSTING_LOOKUP_TIMEOUT_MS";

const MAX_CURRENCY_DECIMALS: u8 = 6;

// =============================================================================
// Currency Settings
// =============================================================================

/// How amounts are displayed. The engine works in one currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencySettings {
    #[serde(default = "default_currency_symbol")]
    pub symbol: String,

    #[serde(default = "default_currency_decimals")]
    pub decimals: u8,
}

fn default_currency_symbol() -> String {
    "R$".to_string()
}

fn default_currency_decimals() -> u8 {
    2
}

impl Default for CurrencySettings {
    fn default() -> Self {
        CurrencySettings {
            symbol: default_currency_symbol(),
            decimals: default_currency_decimals(),
        }
    }
}

// =============================================================================
// Lookup Settings
// =============================================================================

/// Catalog lookup behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupSettings {
    /// Upper bound for one catalog lookup (milliseconds). A line whose lookup
    /// times out stays pending.
    #[serde(default = "default_lookup_timeout")]
    pub timeout_ms: u64,
}

fn default_lookup_timeout() -> u64 {
    5000
}

impl Default for LookupSettings {
    fn default() -> Self {
        LookupSettings {
            timeout_ms: default_lookup_timeout(),
        }
    }
}

// =============================================================================
// Main Session Configuration
// =============================================================================

/// Complete session configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Cost engine constants.
    #[serde(default)]
    pub engine: CostingConfig,

    /// Currency display.
    #[serde(default)]
    pub currency: CurrencySettings,

    /// Catalog lookups.
    #[serde(default)]
    pub lookup: LookupSettings,
}

impl SessionConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (costing.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SessionResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading costing config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load costing config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SessionResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SessionError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Costing config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SessionResult<()> {
        self.engine
            .validate()
            .map_err(|e| SessionError::InvalidConfig(e.to_string()))?;

        if self.lookup.timeout_ms == 0 {
            return Err(SessionError::InvalidConfig(
                "lookup timeout_ms must be greater than 0".into(),
            ));
        }

        if self.currency.decimals > MAX_CURRENCY_DECIMALS {
            return Err(SessionError::InvalidConfig(format!(
                "currency decimals must be at most {}",
                MAX_CURRENCY_DECIMALS
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key/value source. Unparsable values are
    /// logged and ignored.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_SURCHARGE_PCT) {
            match raw.trim().parse::<f64>() {
                Ok(pct) => {
                    debug!(surcharge_pct = pct, "Overriding surcharge from environment");
                    self.engine.substitution_surcharge_pct = Percentage::from_points(pct);
                }
                Err(_) => warn!(value = %raw, "Ignoring invalid {}", ENV_SURCHARGE_PCT),
            }
        }

        if let Some(raw) = lookup(ENV_SECONDS_PER_HOUR) {
            match raw.trim().parse::<f64>() {
                Ok(seconds) => self.engine.seconds_per_hour = seconds,
                Err(_) => warn!(value = %raw, "Ignoring invalid {}", ENV_SECONDS_PER_HOUR),
            }
        }

        if let Some(symbol) = lookup(ENV_CURRENCY_SYMBOL) {
            self.currency.symbol = symbol;
        }

        if let Some(raw) = lookup(ENV_LOOKUP_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => {
                    debug!(timeout_ms = ms, "Overriding lookup timeout from environment");
                    self.lookup.timeout_ms = ms;
                }
                Err(_) => warn!(value = %raw, "Ignoring invalid {}", ENV_LOOKUP_TIMEOUT_MS),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "costing", "cost-sheet")
            .map(|dirs| dirs.config_dir().join("costing.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Lookup timeout as a `Duration`.
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup.timeout_ms)
    }

    /// Formats an amount for display.
    ///
    /// ## Example
    /// ```rust
    /// use costing_core::Amount;
    /// use costing_session::SessionConfig;
    ///
    /// let config = SessionConfig::default();
    /// assert_eq!(config.format_currency(Amount::new(1234.5)), "R$ 1234.50");
    /// ```
    pub fn format_currency(&self, amount: Amount) -> String {
        format!(
            "{} {:.*}",
            self.currency.symbol,
            usize::from(self.currency.decimals),
            amount.value()
        )
    }
}
