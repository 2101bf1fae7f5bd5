//! # Line Item Costs
//!
//! The cost contribution of a single line, from its own fields only (plus the
//! header's produced quantity for injection lines).
//!
//! ```text
//! Material            total = quantity × unit_price
//! Normal operation    total = hourly_rate ÷ quantity
//! Injection           throughput = (seconds_per_hour ÷ cycle_seconds) × cavities
//!                     total = hourly_rate × produced_qty ÷ throughput
//! ```
//!
//! A pending line (no catalog data yet) costs 0. Degenerate denominators cost
//! 0. Nothing here returns NaN or Infinity.

use crate::amount::Amount;
use crate::config::CostingConfig;
use crate::sheet::{InjectionOperationLine, MaterialLine, NormalOperationLine};

/// `quantity × unit_price`, or 0 while the price is unknown.
pub fn material_cost(quantity: f64, unit_price: Option<Amount>) -> Amount {
    match unit_price {
        Some(price) => price.times(quantity),
        None => Amount::zero(),
    }
}

/// `hourly_rate ÷ units_per_hour`, or 0 on a zero quantity.
pub fn normal_operation_cost(hourly_rate: Option<Amount>, units_per_hour: f64) -> Amount {
    match hourly_rate {
        Some(rate) => rate.per(units_per_hour),
        None => Amount::zero(),
    }
}

/// Parts produced per hour by an injection mold.
///
/// Returns 0 when the cycle time is not a positive finite number.
pub fn injection_throughput(cycle_seconds: f64, cavity_count: u32, seconds_per_hour: f64) -> f64 {
    if !(cycle_seconds > 0.0 && cycle_seconds.is_finite()) {
        return 0.0;
    }
    let throughput = (seconds_per_hour / cycle_seconds) * f64::from(cavity_count);
    if throughput.is_finite() {
        throughput
    } else {
        0.0
    }
}

/// Machine cost of producing `produced_qty` parts on an injection mold.
///
/// ## Example
/// ```rust
/// use costing_core::engine::line_item::injection_operation_cost;
/// use costing_core::{Amount, CostingConfig};
///
/// // 3600 / 20 s × 4 cavities = 720 parts/hour
/// let total = injection_operation_cost(
///     Some(Amount::new(180.0)),
///     20.0,
///     4,
///     1000.0,
///     &CostingConfig::default(),
/// );
/// assert_eq!(total.value(), 250.0);
/// ```
pub fn injection_operation_cost(
    hourly_rate: Option<Amount>,
    cycle_seconds: f64,
    cavity_count: u32,
    produced_qty: f64,
    config: &CostingConfig,
) -> Amount {
    let Some(rate) = hourly_rate else {
        return Amount::zero();
    };
    let throughput = injection_throughput(cycle_seconds, cavity_count, config.seconds_per_hour);
    rate.times(produced_qty).per(throughput)
}

// =============================================================================
// Line Adapters
// =============================================================================

pub fn material_line_total(line: &MaterialLine) -> Amount {
    material_cost(line.quantity, line.unit_price)
}

pub fn normal_operation_line_total(line: &NormalOperationLine) -> Amount {
    normal_operation_cost(line.hourly_rate, line.quantity)
}

pub fn injection_operation_line_total(
    line: &InjectionOperationLine,
    produced_qty: f64,
    config: &CostingConfig,
) -> Amount {
    injection_operation_cost(
        line.hourly_rate,
        line.cycle_seconds,
        line.cavity_count,
        produced_qty,
        config,
    )
}
