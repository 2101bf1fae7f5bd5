//! # Cost Sheet
//!
//! The aggregate record being edited: header, three line collections, the
//! selected markup profile, the product's price info and the last settled
//! totals snapshot.
//!
//! ## Sheet Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cost Sheet Mutations                                 │
//! │                                                                         │
//! │  UI Action                 SheetMutation              Sheet Change      │
//! │  ─────────                 ─────────────              ────────────      │
//! │                                                                         │
//! │  Add material ───────────► AddMaterial ─────────────► materials.push    │
//! │  Edit operation row ─────► UpdateNormalOperation ───► row fields        │
//! │  Catalog reply arrives ──► ResolveMaterial ─────────► unit_price set    │
//! │  Remove row ─────────────► RemoveLine ──────────────► row removed       │
//! │  Edit header ────────────► SetHeader ───────────────► header replaced   │
//! │                                                                         │
//! │  NOTE: Mutators are crate-private. Every change goes through the        │
//! │        Recalculator, which re-derives ALL totals afterwards.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Row Identity
//! Each line gets a `RowId` (UUID v4) when added. Edits and removals address
//! rows by `RowId`, never by catalog id, since the same material can appear
//! on several rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::amount::Amount;
use crate::engine::DerivedTotals;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{Material, MarkupProfile, Operation, OperationKind, ProductPriceInfo, SheetHeader};
use crate::validation::{
    validate_cavity_count, validate_cycle_seconds, validate_material, validate_note,
    validate_operation, validate_quantity,
};

// =============================================================================
// Row Identity
// =============================================================================

/// Stable identifier of one line on one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct RowId(String);

impl RowId {
    /// Generates a fresh row id.
    pub fn generate() -> Self {
        RowId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(value: &str) -> Self {
        RowId(value.to_string())
    }
}

/// Which collection a line lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum LineCategory {
    Material,
    NormalOperation,
    InjectionOperation,
}

/// Whether a line's catalog entry has resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum LineStatus {
    /// Catalog data present; the line is costed.
    Resolved,
    /// Catalog entry unknown or still loading; the line contributes 0.
    Pending,
}

// =============================================================================
// Line Inputs
// =============================================================================

/// User-entered fields of a material line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MaterialLineInput {
    pub catalog_item_id: String,
    pub quantity: f64,
    #[serde(default)]
    pub note: String,
}

impl MaterialLineInput {
    fn validate(&self) -> CoreResult<()> {
        require_catalog_id(&self.catalog_item_id)?;
        validate_quantity(self.quantity)?;
        validate_note(&self.note)?;
        Ok(())
    }
}

/// User-entered fields of a normal operation line.
///
/// `quantity` is the number of units produced per hour of the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NormalOperationInput {
    pub catalog_item_id: String,
    pub quantity: f64,
    #[serde(default)]
    pub note: String,
}

impl NormalOperationInput {
    fn validate(&self) -> CoreResult<()> {
        require_catalog_id(&self.catalog_item_id)?;
        validate_quantity(self.quantity)?;
        validate_note(&self.note)?;
        Ok(())
    }
}

/// User-entered fields of an injection operation line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InjectionOperationInput {
    pub catalog_item_id: String,
    pub cavity_count: u32,
    pub cycle_seconds: f64,
    #[serde(default)]
    pub note: String,
}

impl InjectionOperationInput {
    fn validate(&self) -> CoreResult<()> {
        require_catalog_id(&self.catalog_item_id)?;
        validate_cavity_count(self.cavity_count)?;
        validate_cycle_seconds(self.cycle_seconds)?;
        validate_note(&self.note)?;
        Ok(())
    }
}

fn require_catalog_id(id: &str) -> CoreResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "catalog item".to_string(),
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Lines
// =============================================================================

/// A material consumed by the product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MaterialLine {
    pub row_id: RowId,
    pub catalog_item_id: String,
    /// Price per unit from the catalog; `None` while pending.
    pub unit_price: Option<Amount>,
    pub unit: Option<String>,
    pub quantity: f64,
    pub note: String,
    /// `quantity × unit_price`, refreshed on every recalculation.
    pub computed_total: Amount,
}

impl MaterialLine {
    pub fn status(&self) -> LineStatus {
        match self.unit_price {
            Some(_) => LineStatus::Resolved,
            None => LineStatus::Pending,
        }
    }
}

/// A flat-rate labor or machine operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NormalOperationLine {
    pub row_id: RowId,
    pub catalog_item_id: String,
    /// Cost per hour from the catalog; `None` while pending.
    pub hourly_rate: Option<Amount>,
    /// Units produced per hour.
    pub quantity: f64,
    pub note: String,
    /// `hourly_rate ÷ quantity`, refreshed on every recalculation.
    pub computed_total: Amount,
}

impl NormalOperationLine {
    pub fn status(&self) -> LineStatus {
        match self.hourly_rate {
            Some(_) => LineStatus::Resolved,
            None => LineStatus::Pending,
        }
    }
}

/// An injection molding operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InjectionOperationLine {
    pub row_id: RowId,
    pub catalog_item_id: String,
    /// Machine cost per hour from the catalog; `None` while pending.
    pub hourly_rate: Option<Amount>,
    pub cavity_count: u32,
    pub cycle_seconds: f64,
    pub note: String,
    /// `hourly_rate × produced_qty ÷ throughput`, refreshed on every
    /// recalculation.
    pub computed_total: Amount,
}

impl InjectionOperationLine {
    pub fn status(&self) -> LineStatus {
        match self.hourly_rate {
            Some(_) => LineStatus::Resolved,
            None => LineStatus::Pending,
        }
    }
}

/// Borrowed view of any line, returned by [`CostSheet::line`].
#[derive(Debug, Clone, Copy)]
pub enum LineRef<'a> {
    Material(&'a MaterialLine),
    NormalOperation(&'a NormalOperationLine),
    InjectionOperation(&'a InjectionOperationLine),
}

impl<'a> LineRef<'a> {
    pub fn category(&self) -> LineCategory {
        match self {
            LineRef::Material(_) => LineCategory::Material,
            LineRef::NormalOperation(_) => LineCategory::NormalOperation,
            LineRef::InjectionOperation(_) => LineCategory::InjectionOperation,
        }
    }

    pub fn catalog_item_id(&self) -> &'a str {
        match self {
            LineRef::Material(line) => &line.catalog_item_id,
            LineRef::NormalOperation(line) => &line.catalog_item_id,
            LineRef::InjectionOperation(line) => &line.catalog_item_id,
        }
    }

    pub fn status(&self) -> LineStatus {
        match self {
            LineRef::Material(line) => line.status(),
            LineRef::NormalOperation(line) => line.status(),
            LineRef::InjectionOperation(line) => line.status(),
        }
    }

    pub fn computed_total(&self) -> Amount {
        match self {
            LineRef::Material(line) => line.computed_total,
            LineRef::NormalOperation(line) => line.computed_total,
            LineRef::InjectionOperation(line) => line.computed_total,
        }
    }
}

// =============================================================================
// Cost Sheet
// =============================================================================

/// The cost build-up of one product.
///
/// ## Invariants
/// - Row ids are unique across all three collections
/// - Line order is insertion order (display order)
/// - `totals` is the snapshot of the last settled recalculation; it is never
///   written by anything but the Recalculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CostSheet {
    header: SheetHeader,
    materials: Vec<MaterialLine>,
    normal_operations: Vec<NormalOperationLine>,
    injection_operations: Vec<InjectionOperationLine>,
    markup_profile: Option<MarkupProfile>,
    price_info: Option<ProductPriceInfo>,
    totals: DerivedTotals,
    #[ts(as = "String")]
    created_at: DateTime<Utc>,
    #[ts(as = "String")]
    updated_at: DateTime<Utc>,
}

impl Default for CostSheet {
    fn default() -> Self {
        Self::new()
    }
}

impl CostSheet {
    /// Creates an empty sheet with a blank header.
    pub fn new() -> Self {
        let now = Utc::now();
        CostSheet {
            header: SheetHeader::blank(),
            materials: Vec::new(),
            normal_operations: Vec::new(),
            injection_operations: Vec::new(),
            markup_profile: None,
            price_info: None,
            totals: DerivedTotals::default(),
            created_at: now,
            updated_at: now,
        }
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    pub fn header(&self) -> &SheetHeader {
        &self.header
    }

    pub fn materials(&self) -> &[MaterialLine] {
        &self.materials
    }

    pub fn normal_operations(&self) -> &[NormalOperationLine] {
        &self.normal_operations
    }

    pub fn injection_operations(&self) -> &[InjectionOperationLine] {
        &self.injection_operations
    }

    pub fn markup_profile(&self) -> Option<&MarkupProfile> {
        self.markup_profile.as_ref()
    }

    pub fn price_info(&self) -> Option<&ProductPriceInfo> {
        self.price_info.as_ref()
    }

    /// The last settled totals snapshot.
    pub fn totals(&self) -> &DerivedTotals {
        &self.totals
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Finds a line in any category.
    pub fn line(&self, row_id: &RowId) -> Option<LineRef<'_>> {
        if let Some(line) = self.materials.iter().find(|l| &l.row_id == row_id) {
            return Some(LineRef::Material(line));
        }
        if let Some(line) = self.normal_operations.iter().find(|l| &l.row_id == row_id) {
            return Some(LineRef::NormalOperation(line));
        }
        self.injection_operations
            .iter()
            .find(|l| &l.row_id == row_id)
            .map(LineRef::InjectionOperation)
    }

    /// Total number of lines across all categories.
    pub fn line_count(&self) -> usize {
        self.materials.len() + self.normal_operations.len() + self.injection_operations.len()
    }

    /// Number of lines still waiting for catalog data.
    pub fn pending_count(&self) -> usize {
        let materials = self
            .materials
            .iter()
            .filter(|l| l.status() == LineStatus::Pending)
            .count();
        let normal = self
            .normal_operations
            .iter()
            .filter(|l| l.status() == LineStatus::Pending)
            .count();
        let injection = self
            .injection_operations
            .iter()
            .filter(|l| l.status() == LineStatus::Pending)
            .count();
        materials + normal + injection
    }

    pub fn is_empty(&self) -> bool {
        self.line_count() == 0
    }

    // -------------------------------------------------------------------------
    // Crate-private mutators (driven by the Recalculator)
    // -------------------------------------------------------------------------

    pub(crate) fn push_material(&mut self, input: MaterialLineInput) -> CoreResult<RowId> {
        input.validate()?;
        let row_id = RowId::generate();
        self.materials.push(MaterialLine {
            row_id: row_id.clone(),
            catalog_item_id: input.catalog_item_id,
            unit_price: None,
            unit: None,
            quantity: input.quantity,
            note: input.note,
            computed_total: Amount::zero(),
        });
        Ok(row_id)
    }

    pub(crate) fn push_normal_operation(&mut self, input: NormalOperationInput) -> CoreResult<RowId> {
        input.validate()?;
        let row_id = RowId::generate();
        self.normal_operations.push(NormalOperationLine {
            row_id: row_id.clone(),
            catalog_item_id: input.catalog_item_id,
            hourly_rate: None,
            quantity: input.quantity,
            note: input.note,
            computed_total: Amount::zero(),
        });
        Ok(row_id)
    }

    pub(crate) fn push_injection_operation(
        &mut self,
        input: InjectionOperationInput,
    ) -> CoreResult<RowId> {
        input.validate()?;
        let row_id = RowId::generate();
        self.injection_operations.push(InjectionOperationLine {
            row_id: row_id.clone(),
            catalog_item_id: input.catalog_item_id,
            hourly_rate: None,
            cavity_count: input.cavity_count,
            cycle_seconds: input.cycle_seconds,
            note: input.note,
            computed_total: Amount::zero(),
        });
        Ok(row_id)
    }

    /// Replaces the user fields of a material line. Changing the catalog item
    /// drops the resolved price until the new item resolves.
    pub(crate) fn update_material(&mut self, row_id: &RowId, input: MaterialLineInput) -> CoreResult<()> {
        input.validate()?;
        let line = self
            .materials
            .iter_mut()
            .find(|l| &l.row_id == row_id)
            .ok_or_else(|| row_not_found(row_id))?;

        if line.catalog_item_id != input.catalog_item_id {
            line.unit_price = None;
            line.unit = None;
        }
        line.catalog_item_id = input.catalog_item_id;
        line.quantity = input.quantity;
        line.note = input.note;
        Ok(())
    }

    pub(crate) fn update_normal_operation(
        &mut self,
        row_id: &RowId,
        input: NormalOperationInput,
    ) -> CoreResult<()> {
        input.validate()?;
        let line = self
            .normal_operations
            .iter_mut()
            .find(|l| &l.row_id == row_id)
            .ok_or_else(|| row_not_found(row_id))?;

        if line.catalog_item_id != input.catalog_item_id {
            line.hourly_rate = None;
        }
        line.catalog_item_id = input.catalog_item_id;
        line.quantity = input.quantity;
        line.note = input.note;
        Ok(())
    }

    pub(crate) fn update_injection_operation(
        &mut self,
        row_id: &RowId,
        input: InjectionOperationInput,
    ) -> CoreResult<()> {
        input.validate()?;
        let line = self
            .injection_operations
            .iter_mut()
            .find(|l| &l.row_id == row_id)
            .ok_or_else(|| row_not_found(row_id))?;

        if line.catalog_item_id != input.catalog_item_id {
            line.hourly_rate = None;
        }
        line.catalog_item_id = input.catalog_item_id;
        line.cavity_count = input.cavity_count;
        line.cycle_seconds = input.cycle_seconds;
        line.note = input.note;
        Ok(())
    }

    /// Applies catalog data to a material row.
    ///
    /// Returns `Ok(false)` when the row now references a different catalog
    /// item (the data is stale and ignored). Only data for the current item
    /// is validated.
    pub(crate) fn resolve_material(&mut self, row_id: &RowId, material: &Material) -> CoreResult<bool> {
        let line = self
            .materials
            .iter_mut()
            .find(|l| &l.row_id == row_id)
            .ok_or_else(|| row_not_found(row_id))?;

        if line.catalog_item_id != material.id {
            return Ok(false);
        }
        validate_material(material)?;
        line.unit_price = Some(material.price);
        line.unit = Some(material.unit.clone());
        Ok(true)
    }

    /// Applies catalog data to an operation row of either kind.
    ///
    /// Stale data is ignored as for materials. For the current item, the
    /// operation's kind must match the row's category.
    pub(crate) fn resolve_operation(&mut self, row_id: &RowId, operation: &Operation) -> CoreResult<bool> {
        let (expected, catalog_item_id, hourly_rate) = if let Some(line) =
            self.normal_operations.iter_mut().find(|l| &l.row_id == row_id)
        {
            (OperationKind::Normal, &line.catalog_item_id, &mut line.hourly_rate)
        } else if let Some(line) = self
            .injection_operations
            .iter_mut()
            .find(|l| &l.row_id == row_id)
        {
            (OperationKind::Injection, &line.catalog_item_id, &mut line.hourly_rate)
        } else {
            return Err(row_not_found(row_id));
        };

        if *catalog_item_id != operation.id {
            return Ok(false);
        }
        if operation.kind != expected {
            return Err(kind_mismatch(expected));
        }
        validate_operation(operation)?;
        *hourly_rate = Some(operation.hourly_rate);
        Ok(true)
    }

    /// Points a row at a different catalog item and marks it pending.
    pub(crate) fn mark_pending(&mut self, row_id: &RowId, catalog_item_id: &str) -> CoreResult<()> {
        require_catalog_id(catalog_item_id)?;

        if let Some(line) = self.materials.iter_mut().find(|l| &l.row_id == row_id) {
            line.catalog_item_id = catalog_item_id.to_string();
            line.unit_price = None;
            line.unit = None;
            return Ok(());
        }
        if let Some(line) = self.normal_operations.iter_mut().find(|l| &l.row_id == row_id) {
            line.catalog_item_id = catalog_item_id.to_string();
            line.hourly_rate = None;
            return Ok(());
        }
        if let Some(line) = self.injection_operations.iter_mut().find(|l| &l.row_id == row_id) {
            line.catalog_item_id = catalog_item_id.to_string();
            line.hourly_rate = None;
            return Ok(());
        }
        Err(row_not_found(row_id))
    }

    /// Removes a line from whichever category holds it.
    pub(crate) fn remove_line(&mut self, row_id: &RowId) -> CoreResult<LineCategory> {
        if let Some(idx) = self.materials.iter().position(|l| &l.row_id == row_id) {
            self.materials.remove(idx);
            return Ok(LineCategory::Material);
        }
        if let Some(idx) = self.normal_operations.iter().position(|l| &l.row_id == row_id) {
            self.normal_operations.remove(idx);
            return Ok(LineCategory::NormalOperation);
        }
        if let Some(idx) = self.injection_operations.iter().position(|l| &l.row_id == row_id) {
            self.injection_operations.remove(idx);
            return Ok(LineCategory::InjectionOperation);
        }
        Err(row_not_found(row_id))
    }

    pub(crate) fn set_header(&mut self, header: SheetHeader) {
        self.header = header;
    }

    pub(crate) fn set_markup_profile(&mut self, profile: Option<MarkupProfile>) {
        self.markup_profile = profile;
    }

    pub(crate) fn set_price_info(&mut self, info: Option<ProductPriceInfo>) {
        self.price_info = info;
    }

    pub(crate) fn materials_mut(&mut self) -> &mut [MaterialLine] {
        &mut self.materials
    }

    pub(crate) fn normal_operations_mut(&mut self) -> &mut [NormalOperationLine] {
        &mut self.normal_operations
    }

    pub(crate) fn injection_operations_mut(&mut self) -> &mut [InjectionOperationLine] {
        &mut self.injection_operations
    }

    pub(crate) fn set_totals(&mut self, totals: DerivedTotals) {
        self.totals = totals;
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn row_not_found(row_id: &RowId) -> CoreError {
    CoreError::RowNotFound {
        row_id: row_id.to_string(),
    }
}

fn kind_mismatch(expected: OperationKind) -> CoreError {
    ValidationError::InvalidFormat {
        field: "operation kind".to_string(),
        reason: format!("row expects a {:?} operation", expected),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(id: &str, price: f64) -> Material {
        Material {
            id: id.to_string(),
            name: format!("Material {}", id),
            price: Amount::new(price),
            unit: "kg".to_string(),
        }
    }

    fn material_input(id: &str, qty: f64) -> MaterialLineInput {
        MaterialLineInput {
            catalog_item_id: id.to_string(),
            quantity: qty,
            note: String::new(),
        }
    }

    #[test]
    fn test_new_sheet_is_blank() {
        let sheet = CostSheet::new();
        assert!(sheet.is_empty());
        assert_eq!(sheet.header(), &SheetHeader::blank());
        assert!(sheet.markup_profile().is_none());
        assert_eq!(sheet.totals(), &DerivedTotals::default());
    }

    #[test]
    fn test_same_catalog_item_gets_distinct_rows() {
        let mut sheet = CostSheet::new();
        let a = sheet.push_material(material_input("m1", 1.0)).unwrap();
        let b = sheet.push_material(material_input("m1", 2.0)).unwrap();

        assert_ne!(a, b);
        assert_eq!(sheet.materials().len(), 2);
    }

    #[test]
    fn test_new_lines_start_pending() {
        let mut sheet = CostSheet::new();
        let row = sheet.push_material(material_input("m1", 1.0)).unwrap();

        assert_eq!(sheet.line(&row).unwrap().status(), LineStatus::Pending);
        assert_eq!(sheet.pending_count(), 1);

        assert!(sheet.resolve_material(&row, &material("m1", 10.0)).unwrap());
        assert_eq!(sheet.line(&row).unwrap().status(), LineStatus::Resolved);
        assert_eq!(sheet.pending_count(), 0);
    }

    #[test]
    fn test_resolution_for_other_catalog_item_is_ignored() {
        let mut sheet = CostSheet::new();
        let row = sheet.push_material(material_input("m1", 1.0)).unwrap();

        assert!(!sheet.resolve_material(&row, &material("m2", 10.0)).unwrap());
        assert_eq!(sheet.materials()[0].unit_price, None);
    }

    #[test]
    fn test_update_with_new_catalog_item_drops_resolution() {
        let mut sheet = CostSheet::new();
        let row = sheet.push_material(material_input("m1", 1.0)).unwrap();
        sheet.resolve_material(&row, &material("m1", 10.0)).unwrap();

        sheet.update_material(&row, material_input("m1", 5.0)).unwrap();
        assert_eq!(sheet.materials()[0].unit_price, Some(Amount::new(10.0)));

        sheet.update_material(&row, material_input("m2", 5.0)).unwrap();
        assert_eq!(sheet.materials()[0].unit_price, None);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let mut sheet = CostSheet::new();
        assert!(sheet.push_material(material_input("m1", 0.0)).is_err());
        assert!(sheet.push_material(material_input("", 1.0)).is_err());

        let zero_cycle = InjectionOperationInput {
            catalog_item_id: "inj".to_string(),
            cavity_count: 4,
            cycle_seconds: 0.0,
            note: String::new(),
        };
        assert!(sheet.push_injection_operation(zero_cycle).is_err());
        assert!(sheet.is_empty());
    }

    #[test]
    fn test_remove_line_from_any_category() {
        let mut sheet = CostSheet::new();
        let row = sheet
            .push_normal_operation(NormalOperationInput {
                catalog_item_id: "op".to_string(),
                quantity: 4.0,
                note: String::new(),
            })
            .unwrap();

        assert_eq!(sheet.remove_line(&row).unwrap(), LineCategory::NormalOperation);
        assert!(sheet.is_empty());
        assert!(matches!(
            sheet.remove_line(&row),
            Err(CoreError::RowNotFound { .. })
        ));
    }

    #[test]
    fn test_operation_kind_must_match_row() {
        let mut sheet = CostSheet::new();
        let row = sheet
            .push_normal_operation(NormalOperationInput {
                catalog_item_id: "op".to_string(),
                quantity: 4.0,
                note: String::new(),
            })
            .unwrap();

        let injection = Operation {
            id: "op".to_string(),
            name: "Injetora 150t".to_string(),
            hourly_rate: Amount::new(180.0),
            unit: "h".to_string(),
            kind: OperationKind::Injection,
        };
        assert!(sheet.resolve_operation(&row, &injection).is_err());
    }

    #[test]
    fn test_stale_resolution_is_ignored_before_validation() {
        let mut sheet = CostSheet::new();
        let row = sheet.push_material(material_input("m1", 1.0)).unwrap();
        sheet.update_material(&row, material_input("m2", 1.0)).unwrap();

        assert!(!sheet.resolve_material(&row, &material("m1", -5.0)).unwrap());
        assert!(sheet.resolve_material(&row, &material("m2", -5.0)).is_err());

        let op_row = sheet
            .push_normal_operation(NormalOperationInput {
                catalog_item_id: "op-new".to_string(),
                quantity: 4.0,
                note: String::new(),
            })
            .unwrap();
        let old_injection = Operation {
            id: "op-old".to_string(),
            name: "Injetora 150t".to_string(),
            hourly_rate: Amount::new(180.0),
            unit: "h".to_string(),
            kind: OperationKind::Injection,
        };
        assert!(!sheet.resolve_operation(&op_row, &old_injection).unwrap());
        assert_eq!(sheet.normal_operations()[0].hourly_rate, None);
    }
}
