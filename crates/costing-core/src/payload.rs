//! # Create-Cost Payload
//!
//! The immutable record handed to the cost store when a sheet is submitted.
//!
//! ## Shape
//! ```text
//! CreateCostPayload
//! ├── header                 product code, name, unit, qty, flags
//! ├── materials[]            {catalogItemId, quantity, note, computedTotal}
//! ├── normalOperations[]     {catalogItemId, note, quantity, computedTotal}
//! ├── injectionOperations[]  {catalogItemId, note, cavityCount, cycleSeconds, computedTotal}
//! ├── markupProfileId
//! ├── listPrice, averageSoldPrice
//! ├── totals                 the settled DerivedTotals snapshot
//! └── createdAt
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::amount::Amount;
use crate::engine::DerivedTotals;
use crate::error::{CoreError, CoreResult};
use crate::sheet::{CostSheet, LineStatus};
use crate::types::SheetHeader;
use crate::validation::validate_header_complete;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MaterialPayloadLine {
    pub catalog_item_id: String,
    pub quantity: f64,
    pub note: String,
    pub computed_total: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NormalOperationPayloadLine {
    pub catalog_item_id: String,
    pub note: String,
    pub quantity: f64,
    pub computed_total: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InjectionOperationPayloadLine {
    pub catalog_item_id: String,
    pub note: String,
    pub cavity_count: u32,
    pub cycle_seconds: f64,
    pub computed_total: Amount,
}

/// A submitted cost sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCostPayload {
    pub header: SheetHeader,
    pub materials: Vec<MaterialPayloadLine>,
    pub normal_operations: Vec<NormalOperationPayloadLine>,
    pub injection_operations: Vec<InjectionOperationPayloadLine>,
    pub markup_profile_id: String,
    pub list_price: Amount,
    pub average_sold_price: Amount,
    pub totals: DerivedTotals,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CreateCostPayload {
    /// Builds the payload from a settled sheet.
    ///
    /// ## Errors
    /// - `CoreError::Validation` if the header lacks a code or name
    /// - `CoreError::MissingReference` if no markup profile or price info is
    ///   attached, or a line is still pending
    pub fn from_sheet(sheet: &CostSheet) -> CoreResult<Self> {
        validate_header_complete(sheet.header())?;

        let profile = sheet
            .markup_profile()
            .ok_or_else(|| CoreError::MissingReference("markup profile".to_string()))?;
        let price_info = sheet
            .price_info()
            .ok_or_else(|| CoreError::MissingReference("product price info".to_string()))?;

        if let Some(row_id) = first_pending_row(sheet) {
            return Err(CoreError::MissingReference(format!(
                "catalog data for line {}",
                row_id
            )));
        }

        Ok(CreateCostPayload {
            header: sheet.header().clone(),
            materials: sheet
                .materials()
                .iter()
                .map(|line| MaterialPayloadLine {
                    catalog_item_id: line.catalog_item_id.clone(),
                    quantity: line.quantity,
                    note: line.note.clone(),
                    computed_total: line.computed_total,
                })
                .collect(),
            normal_operations: sheet
                .normal_operations()
                .iter()
                .map(|line| NormalOperationPayloadLine {
                    catalog_item_id: line.catalog_item_id.clone(),
                    note: line.note.clone(),
                    quantity: line.quantity,
                    computed_total: line.computed_total,
                })
                .collect(),
            injection_operations: sheet
                .injection_operations()
                .iter()
                .map(|line| InjectionOperationPayloadLine {
                    catalog_item_id: line.catalog_item_id.clone(),
                    note: line.note.clone(),
                    cavity_count: line.cavity_count,
                    cycle_seconds: line.cycle_seconds,
                    computed_total: line.computed_total,
                })
                .collect(),
            markup_profile_id: profile.id.clone(),
            list_price: price_info.list_price,
            average_sold_price: price_info.average_sold_price,
            totals: sheet.totals().clone(),
            created_at: Utc::now(),
        })
    }

    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn first_pending_row(sheet: &CostSheet) -> Option<String> {
    let material = sheet
        .materials()
        .iter()
        .find(|l| l.status() == LineStatus::Pending)
        .map(|l| l.row_id.to_string());
    let normal = || {
        sheet
            .normal_operations()
            .iter()
            .find(|l| l.status() == LineStatus::Pending)
            .map(|l| l.row_id.to_string())
    };
    let injection = || {
        sheet
            .injection_operations()
            .iter()
            .find(|l| l.status() == LineStatus::Pending)
            .map(|l| l.row_id.to_string())
    };
    material.or_else(normal).or_else(injection)
}
