//! # Price and Margin Projection
//!
//! Projects the suggested price and the margins the product would earn at
//! its list price and at its realized average price.
//!
//! ```text
//! suggested_price      = total_cost × coefficient
//! list_revenue         = list_price × produced_qty
//! average_revenue      = average_sold_price × produced_qty
//! average_discount_pct = (list − average) ÷ list × 100
//! profit_at_X_pct      = (revenue − total_cost − load% × revenue) ÷ revenue × 100
//! ```
//!
//! Every percentage with a non-positive denominator is 0.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::types::{Percentage, ProductPriceInfo};

/// Price-derived metrics of one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceProjection {
    pub suggested_price: Amount,
    pub list_price_revenue: Amount,
    pub average_price_revenue: Amount,
    pub average_discount_pct: f64,
    pub profit_at_list_pct: f64,
    pub profit_at_average_pct: f64,
}

/// `total_cost × coefficient`, or 0 without a valid coefficient.
pub fn suggested_price(total_cost: Amount, coefficient: Option<f64>) -> Amount {
    match coefficient {
        Some(coef) => total_cost.times(coef),
        None => Amount::zero(),
    }
}

/// How far the average realized price sits below list, in percent.
pub fn average_discount_pct(list_price: Amount, average_sold_price: Amount) -> f64 {
    (list_price - average_sold_price).percent_of(list_price)
}

/// Profit left from `revenue` after cost and the markup load, in percent of
/// revenue.
pub fn profit_pct(revenue: Amount, total_cost: Amount, load: Percentage) -> f64 {
    let load_share = revenue.times(load.fraction());
    (revenue - total_cost - load_share).percent_of(revenue)
}

/// Runs the whole projection step.
///
/// Without price info every revenue and margin figure is 0; the suggested
/// price still follows the coefficient.
pub fn project(
    total_cost: Amount,
    produced_qty: f64,
    coefficient: Option<f64>,
    load: Percentage,
    price_info: Option<&ProductPriceInfo>,
) -> PriceProjection {
    let suggested_price = suggested_price(total_cost, coefficient);

    let Some(info) = price_info else {
        return PriceProjection {
            suggested_price,
            ..PriceProjection::default()
        };
    };

    let list_price_revenue = info.list_price.times(produced_qty);
    let average_price_revenue = info.average_sold_price.times(produced_qty);

    PriceProjection {
        suggested_price,
        list_price_revenue,
        average_price_revenue,
        average_discount_pct: average_discount_pct(info.list_price, info.average_sold_price),
        profit_at_list_pct: profit_pct(list_price_revenue, total_cost, load),
        profit_at_average_pct: profit_pct(average_price_revenue, total_cost, load),
    }
}
