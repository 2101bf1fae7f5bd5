//! # Costing Session
//!
//! Editing sessions over manufacturing cost sheets.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         costing-session                                 │
//! │                                                                         │
//! │  ┌───────────────────────────────────────────────────────────────────┐ │
//! │  │                    CostSheetSession                               │ │
//! │  │                                                                   │ │
//! │  │   edits ──► Recalculator (costing-core) ──► SnapshotObserver      │ │
//! │  │                                                                   │ │
//! │  │   selections ──► CatalogCache ──► CatalogSource (async, timeout)  │ │
//! │  │                       ▲                │                          │ │
//! │  │                       │                ▼                          │ │
//! │  │                  SelectionTracker (last-selected-wins)            │ │
//! │  │                                                                   │ │
//! │  │   submit ──► CreateCostPayload ──► CostStore                      │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! │                                                                         │
//! │  SessionConfig (TOML + env) · tracing setup · SessionError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`session`]: the session itself
//! - [`catalog`]: async catalog reads and an in-memory catalog
//! - [`cache`]: per-session catalog record cache
//! - [`selection`]: stale lookup detection
//! - [`store`]: cost persistence
//! - [`observer`]: snapshot notifications
//! - [`config`]: configuration loading
//! - [`logging`]: subscriber setup

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod observer;
pub mod selection;
pub mod session;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::CatalogCache;
pub use catalog::{CatalogSource, InMemoryCatalog};
pub use config::{CurrencySettings, LookupSettings, SessionConfig};
pub use error::{SessionError, SessionResult};
pub use logging::{init_test_tracing, init_tracing};
pub use observer::{NoOpObserver, SnapshotObserver};
pub use selection::{SelectionSlot, SelectionTicket, SelectionTracker};
pub use session::{CostSheetSession, Selection, SessionPhase};
pub use store::{CostStore, InMemoryCostStore, StoredCost};
