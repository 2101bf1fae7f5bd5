//! # Cost Totalizer
//!
//! Combines the category subtotals into the sheet's total and unit cost.
//!
//! ```text
//! raw_total  = materials + normal operations + injection operations
//! total_cost = raw_total × (100 + surcharge) ÷ 100     if substitution tax
//!            = raw_total                               otherwise
//! unit_cost  = total_cost ÷ produced_qty               0 if produced_qty ≤ 0
//! ```

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::config::CostingConfig;
use crate::engine::aggregate::CategoryTotals;
use crate::types::SheetHeader;

/// Grand totals of one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostTotals {
    pub raw_total: Amount,
    pub total_cost: Amount,
    pub unit_cost: Amount,
}

/// Applies the substitution-tax surcharge when the flag is set.
pub fn total_cost(raw_total: Amount, substitution_tax: bool, config: &CostingConfig) -> Amount {
    if substitution_tax {
        raw_total.with_surcharge(config.substitution_surcharge_pct)
    } else {
        raw_total
    }
}

/// Cost per produced unit; 0 when nothing is produced or the total is not
/// positive.
pub fn unit_cost(total_cost: Amount, produced_qty: f64) -> Amount {
    if !total_cost.is_positive() {
        return Amount::zero();
    }
    total_cost.per(produced_qty)
}

/// Runs the whole totalizer step for a header.
pub fn totalize(categories: &CategoryTotals, header: &SheetHeader, config: &CostingConfig) -> CostTotals {
    let raw_total = categories.raw_total();
    let total_cost = total_cost(raw_total, header.substitution_tax, config);
    CostTotals {
        raw_total,
        total_cost,
        unit_cost: unit_cost(total_cost, header.produced_qty),
    }
}
