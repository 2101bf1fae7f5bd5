//! # Selection Tracking
//!
//! Decides whether an async lookup result may still be applied.
//!
//! ## Last-Selected-Wins
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  time ──►                                                               │
//! │                                                                         │
//! │  select A on row 1 ── ticket(gen 1, "A") ── lookup A ─────────┐ (slow)   │
//! │  select B on row 1 ── ticket(gen 2, "B") ── lookup B ──┐      │         │
//! │                                                        ▼      ▼         │
//! │                                              apply B (gen 2 current)    │
//! │                                              discard A (gen 1 stale)    │
//! │                                                                         │
//! │  A result is applied only if its ticket is still the latest for its    │
//! │  slot AND the record id matches the ticket's catalog id.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use costing_core::RowId;
use std::collections::HashMap;

/// What a selection is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectionSlot {
    /// The catalog item of one sheet line.
    Row(RowId),
    /// The sheet's markup profile.
    MarkupProfile,
    /// The sheet's price info, keyed by product code.
    PriceInfo,
}

/// Identity of one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionTicket {
    pub slot: SelectionSlot,
    pub generation: u64,
    /// Catalog id (product code for price info) the result must carry.
    pub catalog_id: String,
}

impl SelectionTicket {
    /// Whether a looked-up record answers this ticket.
    pub fn matches(&self, record_id: &str) -> bool {
        self.catalog_id == record_id
    }
}

/// Issues tickets and remembers the latest one per slot.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    next_generation: u64,
    latest: HashMap<SelectionSlot, u64>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a ticket that supersedes every earlier ticket for `slot`.
    pub fn issue(&mut self, slot: SelectionSlot, catalog_id: &str) -> SelectionTicket {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.latest.insert(slot.clone(), generation);
        SelectionTicket {
            slot,
            generation,
            catalog_id: catalog_id.to_string(),
        }
    }

    /// Whether `ticket` is still the latest for its slot.
    pub fn is_current(&self, ticket: &SelectionTicket) -> bool {
        self.latest.get(&ticket.slot) == Some(&ticket.generation)
    }

    /// Whether `ticket` is current and `record_id` answers it.
    pub fn accepts(&self, ticket: &SelectionTicket, record_id: &str) -> bool {
        self.is_current(ticket) && ticket.matches(record_id)
    }

    /// Closes a ticket after its result was applied.
    pub fn complete(&mut self, ticket: &SelectionTicket) {
        if self.is_current(ticket) {
            self.latest.remove(&ticket.slot);
        }
    }

    /// Drops any outstanding ticket for `slot` (e.g. the row was removed).
    pub fn forget(&mut self, slot: &SelectionSlot) {
        self.latest.remove(slot);
    }

    /// Number of slots with an outstanding selection.
    pub fn in_flight(&self) -> usize {
        self.latest.len()
    }
}
