//! # Category Aggregation
//!
//! Sums line totals per category. Always a full re-sum over the current
//! collection, never an incremental update.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::sheet::CostSheet;

/// Per-category subtotals of one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotals {
    pub materials: Amount,
    pub normal_operations: Amount,
    pub injection_operations: Amount,
}

impl CategoryTotals {
    /// Sum of the three categories, before any surcharge.
    pub fn raw_total(&self) -> Amount {
        self.materials + self.normal_operations + self.injection_operations
    }
}

/// Sums line totals. Empty input is 0.
pub fn category_total<I>(line_totals: I) -> Amount
where
    I: IntoIterator<Item = Amount>,
{
    line_totals.into_iter().sum()
}

/// Aggregates the stored `computed_total` of every line on the sheet.
pub fn aggregate_categories(sheet: &CostSheet) -> CategoryTotals {
    CategoryTotals {
        materials: category_total(sheet.materials().iter().map(|l| l.computed_total)),
        normal_operations: category_total(
            sheet.normal_operations().iter().map(|l| l.computed_total),
        ),
        injection_operations: category_total(
            sheet.injection_operations().iter().map(|l| l.computed_total),
        ),
    }
}
