//! # Recalculation Orchestrator
//!
//! Owns one `CostSheet` and re-runs the full calculation chain after every
//! mutation, so the sheet's `totals` snapshot is always consistent with its
//! inputs before anyone reads it.
//!
//! ## Pass State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   SheetMutation                                                         │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   LineItemsOrHeaderChanged ── refresh every line's computed_total       │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   CategoryTotalsStale ─────── re-sum the three categories               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   GrandTotalStale ─────────── total cost (+ surcharge), unit cost       │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   CoefficientAndMarginsStale  coefficient, suggested price, margins     │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   Settled ─────────────────── snapshot stored on the sheet              │
//! │                                                                         │
//! │   Every mutation runs the chain exactly once, top to bottom.            │
//! │   There is no partial recompute.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::config::CostingConfig;
use crate::engine::aggregate::{aggregate_categories, CategoryTotals};
use crate::engine::line_item::{
    injection_operation_line_total, material_line_total, normal_operation_line_total,
};
use crate::engine::totalizer::totalize;
use crate::engine::{settle, DerivedTotals};
use crate::error::CoreResult;
use crate::sheet::{
    CostSheet, InjectionOperationInput, MaterialLineInput, NormalOperationInput, RowId,
};
use crate::types::{Material, MarkupProfile, Operation, ProductPriceInfo, SheetHeader};
use crate::validation::{validate_header, validate_markup_profile, validate_price_info};

// =============================================================================
// Stages and Mutations
// =============================================================================

/// Where a recalculation pass currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecalcStage {
    LineItemsOrHeaderChanged,
    CategoryTotalsStale,
    GrandTotalStale,
    CoefficientAndMarginsStale,
    Settled,
}

/// Every way a sheet can change.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetMutation {
    AddMaterial(MaterialLineInput),
    AddNormalOperation(NormalOperationInput),
    AddInjectionOperation(InjectionOperationInput),
    UpdateMaterial {
        row_id: RowId,
        input: MaterialLineInput,
    },
    UpdateNormalOperation {
        row_id: RowId,
        input: NormalOperationInput,
    },
    UpdateInjectionOperation {
        row_id: RowId,
        input: InjectionOperationInput,
    },
    /// Catalog data for a material row has arrived.
    ResolveMaterial {
        row_id: RowId,
        material: Material,
    },
    /// Catalog data for an operation row (either kind) has arrived.
    ResolveOperation {
        row_id: RowId,
        operation: Operation,
    },
    /// The row now points at another catalog item whose data is not known yet.
    MarkPending {
        row_id: RowId,
        catalog_item_id: String,
    },
    RemoveLine {
        row_id: RowId,
    },
    SetHeader(SheetHeader),
    SelectMarkupProfile(MarkupProfile),
    ClearMarkupProfile,
    SetPriceInfo(ProductPriceInfo),
    ClearPriceInfo,
}

/// Result of applying a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// A line was added under this row id.
    Added(RowId),
    /// The sheet changed and totals were recalculated.
    Applied,
    /// Catalog data no longer matches the row; nothing changed.
    Ignored,
}

impl MutationOutcome {
    pub fn row_id(&self) -> Option<&RowId> {
        match self {
            MutationOutcome::Added(row_id) => Some(row_id),
            _ => None,
        }
    }

    pub fn changed(&self) -> bool {
        !matches!(self, MutationOutcome::Ignored)
    }
}

// =============================================================================
// Recalculator
// =============================================================================

/// The single writer of a `CostSheet`.
///
/// ## Example
/// ```rust
/// use costing_core::engine::{Recalculator, RecalcStage, SheetMutation};
/// use costing_core::{CostingConfig, SheetHeader};
///
/// let mut recalc = Recalculator::new(CostingConfig::default());
/// let header = SheetHeader {
///     product_code: "P-100".to_string(),
///     produced_qty: 1000.0,
///     ..SheetHeader::default()
/// };
/// recalc.apply(SheetMutation::SetHeader(header)).unwrap();
/// assert_eq!(recalc.stage(), RecalcStage::Settled);
/// ```
#[derive(Debug, Clone)]
pub struct Recalculator {
    sheet: CostSheet,
    config: CostingConfig,
    stage: RecalcStage,
    passes: u64,
}

impl Recalculator {
    /// Starts from an empty sheet.
    pub fn new(config: CostingConfig) -> Self {
        Self::with_sheet(CostSheet::new(), config)
    }

    /// Takes over an existing sheet and settles it.
    pub fn with_sheet(sheet: CostSheet, config: CostingConfig) -> Self {
        let mut recalc = Recalculator {
            sheet,
            config,
            stage: RecalcStage::LineItemsOrHeaderChanged,
            passes: 0,
        };
        recalc.recalculate();
        recalc
    }

    pub fn sheet(&self) -> &CostSheet {
        &self.sheet
    }

    pub fn into_sheet(self) -> CostSheet {
        self.sheet
    }

    pub fn config(&self) -> &CostingConfig {
        &self.config
    }

    /// The settled snapshot.
    pub fn totals(&self) -> &DerivedTotals {
        self.sheet.totals()
    }

    pub fn stage(&self) -> RecalcStage {
        self.stage
    }

    /// Number of recalculation passes run so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Applies one mutation and, if anything changed, runs one full pass.
    ///
    /// ## Errors
    /// - `CoreError::Validation` for rejected input
    /// - `CoreError::RowNotFound` for an unknown row id
    /// - `CoreError::InvalidMarkupProfile` for a profile with load ≥ 100
    ///
    /// On error the sheet is unchanged.
    pub fn apply(&mut self, mutation: SheetMutation) -> CoreResult<MutationOutcome> {
        let outcome = self.mutate(mutation)?;
        if outcome.changed() {
            self.settle_change();
        }
        Ok(outcome)
    }

    /// Adds a material line and settles. Returns the new row id.
    pub fn add_material(&mut self, input: MaterialLineInput) -> CoreResult<RowId> {
        let row_id = self.sheet.push_material(input)?;
        self.settle_change();
        Ok(row_id)
    }

    /// Adds a normal operation line and settles. Returns the new row id.
    pub fn add_normal_operation(&mut self, input: NormalOperationInput) -> CoreResult<RowId> {
        let row_id = self.sheet.push_normal_operation(input)?;
        self.settle_change();
        Ok(row_id)
    }

    /// Adds an injection operation line and settles. Returns the new row id.
    pub fn add_injection_operation(&mut self, input: InjectionOperationInput) -> CoreResult<RowId> {
        let row_id = self.sheet.push_injection_operation(input)?;
        self.settle_change();
        Ok(row_id)
    }

    fn settle_change(&mut self) {
        self.sheet.touch();
        self.recalculate();
    }

    fn mutate(&mut self, mutation: SheetMutation) -> CoreResult<MutationOutcome> {
        let sheet = &mut self.sheet;
        let outcome = match mutation {
            SheetMutation::AddMaterial(input) => MutationOutcome::Added(sheet.push_material(input)?),
            SheetMutation::AddNormalOperation(input) => {
                MutationOutcome::Added(sheet.push_normal_operation(input)?)
            }
            SheetMutation::AddInjectionOperation(input) => {
                MutationOutcome::Added(sheet.push_injection_operation(input)?)
            }
            SheetMutation::UpdateMaterial { row_id, input } => {
                sheet.update_material(&row_id, input)?;
                MutationOutcome::Applied
            }
            SheetMutation::UpdateNormalOperation { row_id, input } => {
                sheet.update_normal_operation(&row_id, input)?;
                MutationOutcome::Applied
            }
            SheetMutation::UpdateInjectionOperation { row_id, input } => {
                sheet.update_injection_operation(&row_id, input)?;
                MutationOutcome::Applied
            }
            SheetMutation::ResolveMaterial { row_id, material } => {
                resolved(sheet.resolve_material(&row_id, &material)?)
            }
            SheetMutation::ResolveOperation { row_id, operation } => {
                resolved(sheet.resolve_operation(&row_id, &operation)?)
            }
            SheetMutation::MarkPending {
                row_id,
                catalog_item_id,
            } => {
                sheet.mark_pending(&row_id, &catalog_item_id)?;
                MutationOutcome::Applied
            }
            SheetMutation::RemoveLine { row_id } => {
                sheet.remove_line(&row_id)?;
                MutationOutcome::Applied
            }
            SheetMutation::SetHeader(header) => {
                validate_header(&header)?;
                sheet.set_header(header);
                MutationOutcome::Applied
            }
            SheetMutation::SelectMarkupProfile(profile) => {
                validate_markup_profile(&profile)?;
                sheet.set_markup_profile(Some(profile));
                MutationOutcome::Applied
            }
            SheetMutation::ClearMarkupProfile => {
                sheet.set_markup_profile(None);
                MutationOutcome::Applied
            }
            SheetMutation::SetPriceInfo(info) => {
                validate_price_info(&info)?;
                sheet.set_price_info(Some(info));
                MutationOutcome::Applied
            }
            SheetMutation::ClearPriceInfo => {
                sheet.set_price_info(None);
                MutationOutcome::Applied
            }
        };
        Ok(outcome)
    }

    /// Runs one full pass over the current inputs and stores the snapshot.
    pub fn recalculate(&mut self) -> &DerivedTotals {
        self.stage = RecalcStage::LineItemsOrHeaderChanged;
        self.refresh_line_totals();

        self.stage = RecalcStage::CategoryTotalsStale;
        let categories: CategoryTotals = aggregate_categories(&self.sheet);

        self.stage = RecalcStage::GrandTotalStale;
        let cost = totalize(&categories, self.sheet.header(), &self.config);

        self.stage = RecalcStage::CoefficientAndMarginsStale;
        let totals = settle(
            &categories,
            &cost,
            self.sheet.header().produced_qty,
            self.sheet.markup_profile(),
            self.sheet.price_info(),
        );

        self.sheet.set_totals(totals);
        self.stage = RecalcStage::Settled;
        self.passes += 1;
        self.sheet.totals()
    }

    fn refresh_line_totals(&mut self) {
        let produced_qty = self.sheet.header().produced_qty;
        let config = self.config;

        for line in self.sheet.materials_mut() {
            line.computed_total = material_line_total(line);
        }
        for line in self.sheet.normal_operations_mut() {
            line.computed_total = normal_operation_line_total(line);
        }
        for line in self.sheet.injection_operations_mut() {
            line.computed_total = injection_operation_line_total(line, produced_qty, &config);
        }
    }
}

fn resolved(applied: bool) -> MutationOutcome {
    if applied {
        MutationOutcome::Applied
    } else {
        MutationOutcome::Ignored
    }
}
