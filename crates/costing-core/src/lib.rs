//! # costing-core: Pure Cost Calculation Logic
//!
//! This crate turns a product's cost sheet (materials, operations, a markup
//! profile and price history) into a consistent set of derived totals:
//! total cost, unit cost, pricing coefficient, suggested price and margins.
//! Everything here is a pure function with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Cost Sheet Engine Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI layer (external)                          │   │
//! │  │   Catalog screens ──► Sheet editor ──► Totals panel ──► Save    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 costing-session                                 │   │
//! │  │   catalog lookups, caches, stale-result discarding, submit      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ costing-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  amount   │  │   sheet   │  │  engine   │  │   │
//! │  │   │ Material  │  │  Amount   │  │ CostSheet │  │ Totalizer │  │   │
//! │  │   │ Operation │  │Percentage │  │   Lines   │  │  Markup   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO ASYNC • NO LOGGING • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Catalog records, header and `Percentage`
//! - [`amount`] - `Amount` monetary value type (always finite)
//! - [`sheet`] - `CostSheet` aggregate and its lines
//! - [`engine`] - The calculation chain and the `Recalculator`
//! - [`payload`] - The create-cost payload handed to the store
//! - [`config`] - Engine constants (surcharge, seconds per hour)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation rules
//!
//! ## Example Usage
//!
//! ```rust
//! use costing_core::engine::{Recalculator, SheetMutation};
//! use costing_core::sheet::MaterialLineInput;
//! use costing_core::{Amount, CostingConfig, Material};
//!
//! let mut recalc = Recalculator::new(CostingConfig::default());
//!
//! let row = recalc
//!     .apply(SheetMutation::AddMaterial(MaterialLineInput {
//!         catalog_item_id: "resin".to_string(),
//!         quantity: 3.0,
//!         note: String::new(),
//!     }))
//!     .unwrap()
//!     .row_id()
//!     .cloned()
//!     .unwrap();
//!
//! let resin = Material {
//!     id: "resin".to_string(),
//!     name: "PP resin".to_string(),
//!     price: Amount::new(10.5),
//!     unit: "kg".to_string(),
//! };
//! recalc
//!     .apply(SheetMutation::ResolveMaterial { row_id: row, material: resin })
//!     .unwrap();
//!
//! assert_eq!(recalc.totals().total_materials.value(), 31.5);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod amount;
pub mod config;
pub mod engine;
pub mod error;
pub mod payload;
pub mod sheet;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use amount::Amount;
pub use config::CostingConfig;
pub use engine::{compute_derived_totals, DerivedTotals, Recalculator, SheetMutation};
pub use error::{CoreError, CoreResult, ValidationError};
pub use payload::CreateCostPayload;
pub use sheet::{CostSheet, LineStatus, RowId};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Surcharge on total cost when the substitution-tax flag is set, in
/// percentage points.
pub const DEFAULT_SUBSTITUTION_SURCHARGE_PCT: f64 = 14.0;

/// Seconds in one production hour, used for injection throughput.
pub const DEFAULT_SECONDS_PER_HOUR: f64 = 3600.0;

/// Maximum length of a product code.
pub const MAX_PRODUCT_CODE_LEN: usize = 50;

/// Maximum length of product, material, operation and profile names.
pub const MAX_NAME_LEN: usize = 200;

/// Maximum length of a line note.
pub const MAX_NOTE_LEN: usize = 500;
