//! # Snapshot Observers
//!
//! UI layers observe settled totals; they never recompute them.

use costing_core::DerivedTotals;

/// Receives every settled snapshot of a session.
///
/// Called after the session lock is released, so implementations may read
/// the session again.
pub trait SnapshotObserver: Send + Sync {
    /// A mutation settled with these totals.
    fn on_settled(&self, totals: &DerivedTotals);

    /// The sheet was stored under `cost_id`.
    fn on_submitted(&self, _cost_id: &str) {}
}

/// Observer that ignores everything.
pub struct NoOpObserver;

impl SnapshotObserver for NoOpObserver {
    fn on_settled(&self, _totals: &DerivedTotals) {}
}
