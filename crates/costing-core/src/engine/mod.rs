//! # Cost Engine
//!
//! The calculation chain from line items to margins, and the orchestrator
//! that re-runs it after every mutation.
//!
//! ## Calculation Chain
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  line_item ──► aggregate ──► totalizer ──┬──► projection ──► Derived    │
//! │  (per line)    (per          (total and  │    (price and      Totals    │
//! │                 category)     unit cost) │     margins)                 │
//! │                                          │                              │
//! │                        markup ───────────┘                              │
//! │                        (coefficient)                                    │
//! │                                                                         │
//! │  orchestrator: runs the whole chain once per SheetMutation              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`compute_derived_totals`] is the one pure entry point. The
//! [`Recalculator`] produces exactly the same snapshot, stage by stage, while
//! also writing each line's `computed_total` back onto the sheet.

pub mod aggregate;
pub mod line_item;
pub mod markup;
pub mod orchestrator;
pub mod projection;
pub mod totalizer;

pub use orchestrator::{MutationOutcome, RecalcStage, Recalculator, SheetMutation};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::amount::Amount;
use crate::config::CostingConfig;
use crate::sheet::CostSheet;
use crate::types::{MarkupProfile, Percentage, ProductPriceInfo};

use aggregate::{category_total, CategoryTotals};
use line_item::{injection_operation_line_total, material_line_total, normal_operation_line_total};
use projection::PriceProjection;
use totalizer::{totalize, CostTotals};

/// A fully consistent snapshot of everything derived from a sheet.
///
/// UI layers read this; they never recompute any of its fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DerivedTotals {
    pub total_materials: Amount,
    pub total_normal_operations: Amount,
    pub total_injection_operations: Amount,
    pub total_cost: Amount,
    pub unit_cost: Amount,
    /// `None` when no profile is selected or the profile has no valid
    /// coefficient.
    pub markup_coefficient: Option<f64>,
    pub suggested_price: Amount,
    pub list_price_revenue: Amount,
    pub average_price_revenue: Amount,
    pub average_discount_pct: f64,
    pub profit_at_list_pct: f64,
    pub profit_at_average_pct: f64,
}

impl DerivedTotals {
    fn assemble(
        categories: &CategoryTotals,
        cost: &CostTotals,
        coefficient: Option<f64>,
        projection: &PriceProjection,
    ) -> Self {
        DerivedTotals {
            total_materials: categories.materials,
            total_normal_operations: categories.normal_operations,
            total_injection_operations: categories.injection_operations,
            total_cost: cost.total_cost,
            unit_cost: cost.unit_cost,
            markup_coefficient: coefficient,
            suggested_price: projection.suggested_price,
            list_price_revenue: projection.list_price_revenue,
            average_price_revenue: projection.average_price_revenue,
            average_discount_pct: projection.average_discount_pct,
            profit_at_list_pct: projection.profit_at_list_pct,
            profit_at_average_pct: projection.profit_at_average_pct,
        }
    }
}

/// Coefficient and load for the pricing step. No profile means no
/// coefficient and a load of 0; an invalid profile keeps its load but has no
/// coefficient.
fn pricing_inputs(markup: Option<&MarkupProfile>) -> (Option<f64>, Percentage) {
    match markup {
        Some(profile) => {
            let load = markup::load_factor(profile);
            let load = if load.points().is_finite() {
                load
            } else {
                Percentage::zero()
            };
            (markup::markup_coefficient(profile).ok(), load)
        }
        None => (None, Percentage::zero()),
    }
}

/// Final stage: coefficient, price and margins on top of the cost totals.
pub(crate) fn settle(
    categories: &CategoryTotals,
    cost: &CostTotals,
    produced_qty: f64,
    markup: Option<&MarkupProfile>,
    price_info: Option<&ProductPriceInfo>,
) -> DerivedTotals {
    let (coefficient, load) = pricing_inputs(markup);
    let projection = projection::project(cost.total_cost, produced_qty, coefficient, load, price_info);
    DerivedTotals::assemble(categories, cost, coefficient, &projection)
}

/// Computes every derived figure of a sheet from scratch.
///
/// Line totals are recomputed from line fields; the sheet's stored
/// `computed_total` values and `totals` snapshot are not read.
///
/// ## Example
/// ```rust
/// use costing_core::{compute_derived_totals, CostSheet, CostingConfig};
///
/// let sheet = CostSheet::new();
/// let totals = compute_derived_totals(&sheet, None, None, &CostingConfig::default());
/// assert!(totals.total_cost.is_zero());
/// assert_eq!(totals.markup_coefficient, None);
/// ```
pub fn compute_derived_totals(
    sheet: &CostSheet,
    markup: Option<&MarkupProfile>,
    price_info: Option<&ProductPriceInfo>,
    config: &CostingConfig,
) -> DerivedTotals {
    let produced_qty = sheet.header().produced_qty;
    let categories = CategoryTotals {
        materials: category_total(sheet.materials().iter().map(material_line_total)),
        normal_operations: category_total(
            sheet.normal_operations().iter().map(normal_operation_line_total),
        ),
        injection_operations: category_total(
            sheet
                .injection_operations()
                .iter()
                .map(|line| injection_operation_line_total(line, produced_qty, config)),
        ),
    };
    let cost = totalize(&categories, sheet.header(), config);
    settle(&categories, &cost, produced_qty, markup, price_info)
}

#[cfg(test)]
pub(crate) fn assert_close(actual: f64, expected: f64) {
    const EPSILON: f64 = 1e-9;
    assert!(
        (actual - expected).abs() < EPSILON,
        "expected {} to be within {} of {}",
        actual,
        EPSILON,
        expected
    );
}
