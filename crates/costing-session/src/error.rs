//! # Session Error Types
//!
//! Error types for the editing session.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Session Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Lookup       │  │     Sheet               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  NotFound       │  │  Core (validation,      │ │
//! │  │  ConfigLoad...  │  │  LookupTimeout  │  │   row, markup, refs)    │ │
//! │  │  ConfigSave...  │  │  CatalogFailed  │  │  AlreadySubmitted       │ │
//! │  │  Io             │  │                 │  │  StoreFailed            │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use costing_core::CoreError;
use thiserror::Error;

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session error type.
#[derive(Debug, Error)]
pub enum SessionError {
    // =========================================================================
    // Sheet Errors
    // =========================================================================
    /// Rejected by the cost engine.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The sheet was submitted; it can no longer change.
    #[error("Cost sheet already submitted")]
    AlreadySubmitted,

    /// The cost store refused the payload.
    #[error("Failed to store cost sheet: {0}")]
    StoreFailed(String),

    // =========================================================================
    // Lookup Errors
    // =========================================================================
    /// The catalog has no such record.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The catalog did not answer in time. The affected line stays pending.
    #[error("Lookup of {entity} {id} timed out after {timeout_ms} ms")]
    LookupTimeout {
        entity: String,
        id: String,
        timeout_ms: u64,
    },

    /// The catalog backend failed.
    #[error("Catalog lookup failed: {0}")]
    CatalogFailed(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<toml::de::Error> for SessionError {
    fn from(err: toml::de::Error) -> Self {
        SessionError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SessionError {
    fn from(err: toml::ser::Error) -> Self {
        SessionError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SessionError {
    /// Returns true if repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::LookupTimeout { .. }
                | SessionError::CatalogFailed(_)
                | SessionError::StoreFailed(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidConfig(_)
                | SessionError::ConfigLoadFailed(_)
                | SessionError::ConfigSaveFailed(_)
        )
    }
}
