//! # Cost Sheet Session
//!
//! One editing session over one cost sheet.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  UI edit ──► apply / add_* / set_header ──► Recalculator ──► observer  │
//! │                                                                         │
//! │  UI select ──► begin_*_selection ──► cache hit? ──► resolved           │
//! │                        │                                                │
//! │                        └── ticket ──► CatalogSource (timeout)           │
//! │                                           │                             │
//! │                                           ▼                             │
//! │                              complete_*_selection                       │
//! │                              (stale ticket or wrong id: discarded)      │
//! │                                                                         │
//! │  submit ──► CreateCostPayload ──► CostStore ──► read-only               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session lock is never held across an `.await`. Lookups run
//! unlocked, and their results are checked against the selection tracker
//! when they come back.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use costing_core::engine::MutationOutcome;
use costing_core::sheet::{
    InjectionOperationInput, LineRef, MaterialLineInput, NormalOperationInput,
};
use costing_core::{
    CoreError, CostSheet, CreateCostPayload, DerivedTotals, Material, MarkupProfile, Operation,
    OperationKind, ProductPriceInfo, RowId, SheetHeader, SheetMutation, ValidationError,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CatalogCache;
use crate::catalog::CatalogSource;
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::observer::{NoOpObserver, SnapshotObserver};
use crate::selection::{SelectionSlot, SelectionTicket, SelectionTracker};
use crate::store::CostStore;

// =============================================================================
// Phase and Selection
// =============================================================================

/// Lifecycle of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Editing,
    /// The payload is with the store.
    Submitting,
    /// Stored; the sheet is read-only.
    Submitted { cost_id: String },
}

/// Result of starting a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Answered from the session cache.
    Resolved,
    /// A lookup is needed; pass the ticket to the matching `complete_*`.
    Pending(SelectionTicket),
}

impl Selection {
    pub fn ticket(&self) -> Option<&SelectionTicket> {
        match self {
            Selection::Resolved => None,
            Selection::Pending(ticket) => Some(ticket),
        }
    }
}

// =============================================================================
// Session State
// =============================================================================

struct SessionState {
    recalc: costing_core::Recalculator,
    tracker: SelectionTracker,
    cache: CatalogCache,
    phase: SessionPhase,
}

impl SessionState {
    fn ensure_editable(&self) -> SessionResult<()> {
        match self.phase {
            SessionPhase::Editing => Ok(()),
            _ => Err(SessionError::AlreadySubmitted),
        }
    }

    fn sheet(&self) -> &CostSheet {
        self.recalc.sheet()
    }

    /// Applies a mutation and drops selections it makes obsolete.
    fn apply(&mut self, mutation: SheetMutation) -> SessionResult<MutationOutcome> {
        self.ensure_editable()?;
        let obsolete = match &mutation {
            SheetMutation::RemoveLine { row_id } => Some(SelectionSlot::Row(row_id.clone())),
            SheetMutation::ClearMarkupProfile => Some(SelectionSlot::MarkupProfile),
            SheetMutation::ClearPriceInfo => Some(SelectionSlot::PriceInfo),
            _ => None,
        };
        let outcome = self.recalc.apply(mutation)?;
        if let Some(slot) = obsolete {
            self.tracker.forget(&slot);
        }
        Ok(outcome)
    }

    /// Resolves a pending line from the cache, if the record is there.
    fn resolve_from_cache(&mut self, row_id: &RowId) -> SessionResult<bool> {
        let mutation = match self.sheet().line(row_id) {
            Some(LineRef::Material(line)) if line.unit_price.is_none() => self
                .cache
                .material(&line.catalog_item_id)
                .cloned()
                .map(|material| SheetMutation::ResolveMaterial {
                    row_id: row_id.clone(),
                    material,
                }),
            Some(LineRef::NormalOperation(line)) if line.hourly_rate.is_none() => {
                self.cached_operation(row_id, &line.catalog_item_id, OperationKind::Normal)
            }
            Some(LineRef::InjectionOperation(line)) if line.hourly_rate.is_none() => {
                self.cached_operation(row_id, &line.catalog_item_id, OperationKind::Injection)
            }
            _ => None,
        };

        match mutation {
            Some(mutation) => Ok(self.apply(mutation)?.changed()),
            None => Ok(false),
        }
    }

    fn cached_operation(
        &self,
        row_id: &RowId,
        catalog_id: &str,
        kind: OperationKind,
    ) -> Option<SheetMutation> {
        self.cache
            .operation(catalog_id)
            .filter(|operation| operation.kind == kind)
            .cloned()
            .map(|operation| SheetMutation::ResolveOperation {
                row_id: row_id.clone(),
                operation,
            })
    }

    /// Marks `row_id` pending on `catalog_id` and issues a ticket for it.
    fn begin_row_selection(&mut self, row_id: &RowId, catalog_id: &str) -> SessionResult<Selection> {
        self.apply(SheetMutation::MarkPending {
            row_id: row_id.clone(),
            catalog_item_id: catalog_id.to_string(),
        })?;
        let ticket = self
            .tracker
            .issue(SelectionSlot::Row(row_id.clone()), catalog_id);

        if self.resolve_from_cache(row_id)? {
            self.tracker.complete(&ticket);
            return Ok(Selection::Resolved);
        }
        Ok(Selection::Pending(ticket))
    }
}

// =============================================================================
// Session
// =============================================================================

/// Editing session over one cost sheet.
///
/// Cheap to clone; clones share the same sheet.
///
/// ## Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use costing_core::sheet::MaterialLineInput;
/// use costing_session::{CostSheetSession, InMemoryCatalog, InMemoryCostStore, SessionConfig};
///
/// # async fn run() -> costing_session::SessionResult<()> {
/// let session = CostSheetSession::new(
///     SessionConfig::default(),
///     Arc::new(InMemoryCatalog::new()),
///     Arc::new(InMemoryCostStore::new()),
/// );
/// let row = session.add_material(MaterialLineInput {
///     catalog_item_id: "m-1".to_string(),
///     quantity: 2.0,
///     note: String::new(),
/// })?;
/// session.select_material(row, "m-1".to_string()).await?;
/// println!("{}", session.totals().total_cost);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CostSheetSession {
    state: Arc<Mutex<SessionState>>,
    catalog: Arc<dyn CatalogSource>,
    store: Arc<dyn CostStore>,
    observer: Arc<dyn SnapshotObserver>,
    config: Arc<SessionConfig>,
}

impl CostSheetSession {
    /// Opens a session on a blank sheet.
    pub fn new(
        config: SessionConfig,
        catalog: Arc<dyn CatalogSource>,
        store: Arc<dyn CostStore>,
    ) -> Self {
        Self::with_observer(config, catalog, store, Arc::new(NoOpObserver))
    }

    /// Opens a session whose settled snapshots go to `observer`.
    pub fn with_observer(
        config: SessionConfig,
        catalog: Arc<dyn CatalogSource>,
        store: Arc<dyn CostStore>,
        observer: Arc<dyn SnapshotObserver>,
    ) -> Self {
        let state = SessionState {
            recalc: costing_core::Recalculator::new(config.engine.clone()),
            tracker: SelectionTracker::new(),
            cache: CatalogCache::new(),
            phase: SessionPhase::Editing,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            catalog,
            store,
            observer,
            config: Arc::new(config),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session mutex poisoned")
    }

    /// Runs `f` under the lock and publishes the snapshot if it settled
    /// at least one pass, even when `f` fails part way.
    fn mutate_state<R, F>(&self, f: F) -> SessionResult<R>
    where
        F: FnOnce(&mut SessionState) -> SessionResult<R>,
    {
        let (result, settled) = {
            let mut state = self.lock();
            let passes_before = state.recalc.passes();
            let result = f(&mut *state);
            let settled =
                (state.recalc.passes() != passes_before).then(|| state.recalc.totals().clone());
            (result, settled)
        };

        if let Some(totals) = settled {
            self.publish(&totals);
        }
        result
    }

    fn publish(&self, totals: &DerivedTotals) {
        debug!(
            total_cost = %totals.total_cost,
            unit_cost = %totals.unit_cost,
            suggested_price = %totals.suggested_price,
            coefficient = ?totals.markup_coefficient,
            "Cost sheet recalculated"
        );
        self.observer.on_settled(totals);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Latest settled totals.
    pub fn totals(&self) -> DerivedTotals {
        self.lock().recalc.totals().clone()
    }

    /// Copy of the sheet.
    pub fn sheet(&self) -> CostSheet {
        self.lock().recalc.sheet().clone()
    }

    /// Reads the sheet without copying it.
    pub fn with_sheet<R>(&self, f: impl FnOnce(&CostSheet) -> R) -> R {
        f(self.lock().recalc.sheet())
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase.clone()
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.phase(), SessionPhase::Submitted { .. })
    }

    /// Selections whose lookup has not come back yet.
    pub fn selections_in_flight(&self) -> usize {
        self.lock().tracker.in_flight()
    }

    pub fn cached_records(&self) -> usize {
        self.lock().cache.len()
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Applies one mutation as-is.
    pub fn apply(&self, mutation: SheetMutation) -> SessionResult<MutationOutcome> {
        self.mutate_state(|state| state.apply(mutation))
    }

    /// Adds a material line, resolving it from the cache when possible.
    pub fn add_material(&self, input: MaterialLineInput) -> SessionResult<RowId> {
        self.mutate_state(|state| {
            state.ensure_editable()?;
            let row_id = state.recalc.add_material(input)?;
            state.resolve_from_cache(&row_id)?;
            Ok(row_id)
        })
    }

    pub fn add_normal_operation(&self, input: NormalOperationInput) -> SessionResult<RowId> {
        self.mutate_state(|state| {
            state.ensure_editable()?;
            let row_id = state.recalc.add_normal_operation(input)?;
            state.resolve_from_cache(&row_id)?;
            Ok(row_id)
        })
    }

    pub fn add_injection_operation(&self, input: InjectionOperationInput) -> SessionResult<RowId> {
        self.mutate_state(|state| {
            state.ensure_editable()?;
            let row_id = state.recalc.add_injection_operation(input)?;
            state.resolve_from_cache(&row_id)?;
            Ok(row_id)
        })
    }

    pub fn update_material(&self, row_id: &RowId, input: MaterialLineInput) -> SessionResult<()> {
        self.update_line(
            row_id,
            SheetMutation::UpdateMaterial {
                row_id: row_id.clone(),
                input,
            },
        )
    }

    pub fn update_normal_operation(
        &self,
        row_id: &RowId,
        input: NormalOperationInput,
    ) -> SessionResult<()> {
        self.update_line(
            row_id,
            SheetMutation::UpdateNormalOperation {
                row_id: row_id.clone(),
                input,
            },
        )
    }

    pub fn update_injection_operation(
        &self,
        row_id: &RowId,
        input: InjectionOperationInput,
    ) -> SessionResult<()> {
        self.update_line(
            row_id,
            SheetMutation::UpdateInjectionOperation {
                row_id: row_id.clone(),
                input,
            },
        )
    }

    fn update_line(&self, row_id: &RowId, mutation: SheetMutation) -> SessionResult<()> {
        self.mutate_state(|state| {
            state.apply(mutation)?;
            state.resolve_from_cache(row_id)?;
            Ok(())
        })
    }

    /// Removes a line; a lookup still running for it is discarded.
    pub fn remove_line(&self, row_id: &RowId) -> SessionResult<()> {
        self.apply(SheetMutation::RemoveLine {
            row_id: row_id.clone(),
        })
        .map(|_| ())
    }

    /// Replaces the header. A new product code drops the loaded price info.
    pub fn set_header(&self, header: SheetHeader) -> SessionResult<()> {
        self.mutate_state(|state| {
            let code_changed = state.sheet().header().product_code.trim() != header.product_code.trim();
            state.apply(SheetMutation::SetHeader(header))?;
            if code_changed {
                state.tracker.forget(&SelectionSlot::PriceInfo);
                if state.sheet().price_info().is_some() {
                    state.apply(SheetMutation::ClearPriceInfo)?;
                }
            }
            Ok(())
        })
    }

    pub fn clear_markup_profile(&self) -> SessionResult<()> {
        self.apply(SheetMutation::ClearMarkupProfile).map(|_| ())
    }

    // =========================================================================
    // Material Selection
    // =========================================================================

    /// Points a material line at `catalog_id`.
    ///
    /// The line is pending until [`Self::complete_material_selection`]
    /// accepts a result, unless the cache answers right away.
    pub fn begin_material_selection(
        &self,
        row_id: &RowId,
        catalog_id: &str,
    ) -> SessionResult<Selection> {
        self.mutate_state(|state| {
            state.ensure_editable()?;
            match state.sheet().line(row_id) {
                Some(LineRef::Material(_)) => {}
                _ => return Err(row_not_found(row_id)),
            }
            state.begin_row_selection(row_id, catalog_id)
        })
    }

    /// Applies a looked-up material. Returns `false` when the result was
    /// discarded as stale.
    pub fn complete_material_selection(
        &self,
        ticket: &SelectionTicket,
        material: Material,
    ) -> SessionResult<bool> {
        self.mutate_state(|state| {
            state.ensure_editable()?;
            state.cache.insert_material(material.clone());
            if !state.tracker.accepts(ticket, &material.id) {
                debug!(
                    generation = ticket.generation,
                    expected = %ticket.catalog_id,
                    received = %material.id,
                    "Discarding stale material lookup"
                );
                return Ok(false);
            }
            let SelectionSlot::Row(row_id) = &ticket.slot else {
                return Ok(false);
            };

            let outcome = state.apply(SheetMutation::ResolveMaterial {
                row_id: row_id.clone(),
                material,
            });
            state.tracker.complete(ticket);
            Ok(outcome?.changed())
        })
    }

    /// Selects a material and waits for its lookup.
    pub async fn select_material(&self, row_id: RowId, catalog_id: String) -> SessionResult<bool> {
        match self.begin_material_selection(&row_id, &catalog_id)? {
            Selection::Resolved => Ok(true),
            Selection::Pending(ticket) => self.finish_material_selection(ticket).await,
        }
    }

    /// Selects a material without waiting. The line is pending on return.
    pub fn spawn_select_material(&self, row_id: RowId, catalog_id: String) -> JoinHandle<bool> {
        let begun = self.begin_material_selection(&row_id, &catalog_id);
        let session = self.clone();
        tokio::spawn(async move {
            let result = match begun {
                Ok(Selection::Resolved) => Ok(true),
                Ok(Selection::Pending(ticket)) => session.finish_material_selection(ticket).await,
                Err(e) => Err(e),
            };
            log_selection("material", &catalog_id, result)
        })
    }

    async fn finish_material_selection(&self, ticket: SelectionTicket) -> SessionResult<bool> {
        let material = self
            .lookup(
                "material",
                &ticket.catalog_id,
                self.catalog.material_by_id(&ticket.catalog_id),
            )
            .await;
        let material = self.close_if_failed(&ticket, material)?;
        self.complete_material_selection(&ticket, material)
    }

    // =========================================================================
    // Operation Selection
    // =========================================================================

    /// Points a normal or injection operation line at `catalog_id`.
    pub fn begin_operation_selection(
        &self,
        row_id: &RowId,
        catalog_id: &str,
    ) -> SessionResult<Selection> {
        self.mutate_state(|state| {
            state.ensure_editable()?;
            match state.sheet().line(row_id) {
                Some(LineRef::NormalOperation(_)) | Some(LineRef::InjectionOperation(_)) => {}
                _ => return Err(row_not_found(row_id)),
            }
            state.begin_row_selection(row_id, catalog_id)
        })
    }

    /// Applies a looked-up operation. An operation of the wrong kind for the
    /// line is an error; a stale one is discarded.
    pub fn complete_operation_selection(
        &self,
        ticket: &SelectionTicket,
        operation: Operation,
    ) -> SessionResult<bool> {
        self.mutate_state(|state| {
            state.ensure_editable()?;
            state.cache.insert_operation(operation.clone());
            if !state.tracker.accepts(ticket, &operation.id) {
                debug!(
                    generation = ticket.generation,
                    expected = %ticket.catalog_id,
                    received = %operation.id,
                    "Discarding stale operation lookup"
                );
                return Ok(false);
            }
            let SelectionSlot::Row(row_id) = &ticket.slot else {
                return Ok(false);
            };

            let outcome = state.apply(SheetMutation::ResolveOperation {
                row_id: row_id.clone(),
                operation,
            });
            state.tracker.complete(ticket);
            Ok(outcome?.changed())
        })
    }

    pub async fn select_operation(&self, row_id: RowId, catalog_id: String) -> SessionResult<bool> {
        match self.begin_operation_selection(&row_id, &catalog_id)? {
            Selection::Resolved => Ok(true),
            Selection::Pending(ticket) => self.finish_operation_selection(ticket).await,
        }
    }

    pub fn spawn_select_operation(&self, row_id: RowId, catalog_id: String) -> JoinHandle<bool> {
        let begun = self.begin_operation_selection(&row_id, &catalog_id);
        let session = self.clone();
        tokio::spawn(async move {
            let result = match begun {
                Ok(Selection::Resolved) => Ok(true),
                Ok(Selection::Pending(ticket)) => session.finish_operation_selection(ticket).await,
                Err(e) => Err(e),
            };
            log_selection("operation", &catalog_id, result)
        })
    }

    async fn finish_operation_selection(&self, ticket: SelectionTicket) -> SessionResult<bool> {
        let operation = self
            .lookup(
                "operation",
                &ticket.catalog_id,
                self.catalog.operation_by_id(&ticket.catalog_id),
            )
            .await;
        let operation = self.close_if_failed(&ticket, operation)?;
        self.complete_operation_selection(&ticket, operation)
    }

    // =========================================================================
    // Markup Profile Selection
    // =========================================================================

    /// Selects a markup profile. The previous one is cleared first, so a
    /// rejected or missing profile leaves the sheet with none.
    pub fn begin_markup_selection(&self, profile_id: &str) -> SessionResult<Selection> {
        self.mutate_state(|state| {
            state.ensure_editable()?;
            if profile_id.trim().is_empty() {
                return Err(CoreError::from(ValidationError::Required {
                    field: "markup profile".to_string(),
                })
                .into());
            }

            if state.sheet().markup_profile().is_some() {
                state.apply(SheetMutation::ClearMarkupProfile)?;
            }
            state.tracker.forget(&SelectionSlot::MarkupProfile);

            if let Some(profile) = state.cache.markup_profile(profile_id).cloned() {
                state.apply(SheetMutation::SelectMarkupProfile(profile))?;
                return Ok(Selection::Resolved);
            }

            let ticket = state.tracker.issue(SelectionSlot::MarkupProfile, profile_id);
            Ok(Selection::Pending(ticket))
        })
    }

    /// Applies a looked-up markup profile. A profile whose load factor
    /// reaches 100% is rejected and the sheet keeps no profile.
    pub fn complete_markup_selection(
        &self,
        ticket: &SelectionTicket,
        profile: MarkupProfile,
    ) -> SessionResult<bool> {
        self.mutate_state(|state| {
            state.ensure_editable()?;
            state.cache.insert_markup_profile(profile.clone());
            if !state.tracker.accepts(ticket, &profile.id) {
                debug!(
                    generation = ticket.generation,
                    expected = %ticket.catalog_id,
                    received = %profile.id,
                    "Discarding stale markup profile lookup"
                );
                return Ok(false);
            }

            let outcome = state.apply(SheetMutation::SelectMarkupProfile(profile));
            state.tracker.complete(ticket);
            Ok(outcome?.changed())
        })
    }

    pub async fn select_markup_profile(&self, profile_id: String) -> SessionResult<bool> {
        match self.begin_markup_selection(&profile_id)? {
            Selection::Resolved => Ok(true),
            Selection::Pending(ticket) => self.finish_markup_selection(ticket).await,
        }
    }

    pub fn spawn_select_markup_profile(&self, profile_id: String) -> JoinHandle<bool> {
        let begun = self.begin_markup_selection(&profile_id);
        let session = self.clone();
        tokio::spawn(async move {
            let result = match begun {
                Ok(Selection::Resolved) => Ok(true),
                Ok(Selection::Pending(ticket)) => session.finish_markup_selection(ticket).await,
                Err(e) => Err(e),
            };
            log_selection("markup profile", &profile_id, result)
        })
    }

    async fn finish_markup_selection(&self, ticket: SelectionTicket) -> SessionResult<bool> {
        let profile = self
            .lookup(
                "markup profile",
                &ticket.catalog_id,
                self.catalog.markup_profile_by_id(&ticket.catalog_id),
            )
            .await;
        let profile = self.close_if_failed(&ticket, profile)?;
        self.complete_markup_selection(&ticket, profile)
    }

    // =========================================================================
    // Price Info Selection
    // =========================================================================

    /// Loads price info for the header's current product code.
    pub fn begin_price_info_selection(&self) -> SessionResult<Selection> {
        self.mutate_state(|state| {
            state.ensure_editable()?;
            let product_code = state.sheet().header().product_code.trim().to_string();
            if product_code.is_empty() {
                return Err(CoreError::from(ValidationError::Required {
                    field: "product code".to_string(),
                })
                .into());
            }

            if state.sheet().price_info().is_some() {
                state.apply(SheetMutation::ClearPriceInfo)?;
            }
            state.tracker.forget(&SelectionSlot::PriceInfo);

            if let Some(info) = state.cache.price_info(&product_code).cloned() {
                state.apply(SheetMutation::SetPriceInfo(info))?;
                return Ok(Selection::Resolved);
            }

            let ticket = state.tracker.issue(SelectionSlot::PriceInfo, &product_code);
            Ok(Selection::Pending(ticket))
        })
    }

    /// Applies looked-up price info if it still belongs to the header's
    /// product.
    pub fn complete_price_info_selection(
        &self,
        ticket: &SelectionTicket,
        info: ProductPriceInfo,
    ) -> SessionResult<bool> {
        self.mutate_state(|state| {
            state.ensure_editable()?;
            state.cache.insert_price_info(info.clone());
            let same_product = state.sheet().header().product_code.trim() == info.product_code;
            if !same_product || !state.tracker.accepts(ticket, &info.product_code) {
                debug!(
                    generation = ticket.generation,
                    expected = %ticket.catalog_id,
                    received = %info.product_code,
                    "Discarding stale price info lookup"
                );
                return Ok(false);
            }

            let outcome = state.apply(SheetMutation::SetPriceInfo(info));
            state.tracker.complete(ticket);
            Ok(outcome?.changed())
        })
    }

    pub async fn select_price_info(&self) -> SessionResult<bool> {
        match self.begin_price_info_selection()? {
            Selection::Resolved => Ok(true),
            Selection::Pending(ticket) => self.finish_price_info_selection(ticket).await,
        }
    }

    pub fn spawn_select_price_info(&self) -> JoinHandle<bool> {
        let begun = self.begin_price_info_selection();
        let session = self.clone();
        tokio::spawn(async move {
            let (code, result) = match begun {
                Ok(Selection::Resolved) => (String::new(), Ok(true)),
                Ok(Selection::Pending(ticket)) => {
                    let code = ticket.catalog_id.clone();
                    (code, session.finish_price_info_selection(ticket).await)
                }
                Err(e) => (String::new(), Err(e)),
            };
            log_selection("price info", &code, result)
        })
    }

    async fn finish_price_info_selection(&self, ticket: SelectionTicket) -> SessionResult<bool> {
        let info = self
            .lookup(
                "price info",
                &ticket.catalog_id,
                self.catalog.price_info_by_product_code(&ticket.catalog_id),
            )
            .await;
        let info = self.close_if_failed(&ticket, info)?;
        self.complete_price_info_selection(&ticket, info)
    }

    // =========================================================================
    // Name Lookups
    // =========================================================================

    /// Finds a material by name and caches it. The sheet is not touched.
    pub async fn find_material_by_name(&self, name: &str) -> SessionResult<Material> {
        let material = self
            .lookup("material", name, self.catalog.material_by_name(name))
            .await?;
        self.lock().cache.insert_material(material.clone());
        Ok(material)
    }

    /// Finds an operation by name and caches it. The sheet is not touched.
    pub async fn find_operation_by_name(&self, name: &str) -> SessionResult<Operation> {
        let operation = self
            .lookup("operation", name, self.catalog.operation_by_name(name))
            .await?;
        self.lock().cache.insert_operation(operation.clone());
        Ok(operation)
    }

    /// Closes `ticket` when its lookup failed. A line it was resolving stays
    /// pending.
    fn close_if_failed<T>(&self, ticket: &SelectionTicket, result: SessionResult<T>) -> SessionResult<T> {
        if result.is_err() {
            self.lock().tracker.complete(ticket);
        }
        result
    }

    /// Runs one catalog call under the configured timeout.
    async fn lookup<T, F>(&self, entity: &str, id: &str, call: F) -> SessionResult<T>
    where
        F: Future<Output = SessionResult<Option<T>>>,
    {
        let timeout = self.config.lookup_timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Some(record))) => Ok(record),
            Ok(Ok(None)) => Err(SessionError::NotFound {
                entity: entity.to_string(),
                id: id.to_string(),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SessionError::LookupTimeout {
                entity: entity.to_string(),
                id: id.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Builds the payload and hands it to the store.
    ///
    /// On success the session becomes read-only and the store id is
    /// returned. On failure the session is editable again.
    pub async fn submit(&self) -> SessionResult<String> {
        let payload = {
            let mut state = self.lock();
            state.ensure_editable()?;
            let payload = CreateCostPayload::from_sheet(state.sheet())?;
            state.phase = SessionPhase::Submitting;
            payload
        };

        match self.store.create_cost(&payload).await {
            Ok(cost_id) => {
                self.lock().phase = SessionPhase::Submitted {
                    cost_id: cost_id.clone(),
                };
                info!(
                    cost_id = %cost_id,
                    product_code = %payload.header.product_code,
                    total_cost = %payload.totals.total_cost,
                    "Cost sheet submitted"
                );
                self.observer.on_submitted(&cost_id);
                Ok(cost_id)
            }
            Err(e) => {
                self.lock().phase = SessionPhase::Editing;
                warn!(error = %e, "Cost sheet submission failed");
                Err(match e {
                    SessionError::StoreFailed(_) => e,
                    other => SessionError::StoreFailed(other.to_string()),
                })
            }
        }
    }
}

fn row_not_found(row_id: &RowId) -> SessionError {
    CoreError::RowNotFound {
        row_id: row_id.to_string(),
    }
    .into()
}

fn log_selection(entity: &str, id: &str, result: SessionResult<bool>) -> bool {
    match result {
        Ok(applied) => applied,
        Err(e) => {
            warn!(entity, id, error = %e, "Selection failed");
            false
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::store::InMemoryCostStore;
    use async_trait::async_trait;
    use costing_core::{Amount, Percentage};
    use std::collections::HashMap;
    use std::time::Duration;

    // =========================================================================
    // Fixtures
    // =========================================================================

    fn material(id: &str, price: f64) -> Material {
        Material {
            id: id.to_string(),
            name: format!("Material {}", id),
            price: Amount::new(price),
            unit: "kg".to_string(),
        }
    }

    fn operation(id: &str, rate: f64, kind: OperationKind) -> Operation {
        Operation {
            id: id.to_string(),
            name: format!("Operation {}", id),
            hourly_rate: Amount::new(rate),
            unit: "h".to_string(),
            kind,
        }
    }

    fn profile(id: &str, taxes: f64, profit: f64) -> MarkupProfile {
        MarkupProfile {
            id: id.to_string(),
            name: format!("Profile {}", id),
            taxes: Percentage::from_points(taxes),
            admin: Percentage::zero(),
            commission: Percentage::zero(),
            freight: Percentage::zero(),
            financial: Percentage::zero(),
            marketing: Percentage::zero(),
            promoters: Percentage::zero(),
            bonus: Percentage::zero(),
            profit: Percentage::from_points(profit),
        }
    }

    fn price_info(code: &str) -> ProductPriceInfo {
        ProductPriceInfo {
            id: format!("pi-{}", code),
            product_code: code.to_string(),
            name: "Tampa 28mm".to_string(),
            list_price: Amount::new(3.5),
            average_sold_price: Amount::new(3.0),
        }
    }

    fn header(code: &str, produced_qty: f64, substitution_tax: bool) -> SheetHeader {
        SheetHeader {
            product_code: code.to_string(),
            name: "Tampa 28mm".to_string(),
            unit: "un".to_string(),
            produced_qty,
            substitution_tax,
            ..SheetHeader::default()
        }
    }

    fn material_input(id: &str, quantity: f64) -> MaterialLineInput {
        MaterialLineInput {
            catalog_item_id: id.to_string(),
            quantity,
            note: String::new(),
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    async fn seeded_catalog() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        catalog.insert_material(material("resin", 10.0)).await;
        catalog.insert_material(material("A", 5.0)).await;
        catalog.insert_material(material("B", 7.0)).await;
        catalog
            .insert_operation(operation("pack", 100.0, OperationKind::Normal))
            .await;
        catalog
            .insert_operation(operation("inj", 100.0, OperationKind::Injection))
            .await;
        catalog.insert_markup_profile(profile("mk-1", 20.0, 10.0)).await;
        catalog.insert_markup_profile(profile("mk-2", 10.0, 10.0)).await;
        catalog.insert_markup_profile(profile("mk-bad", 60.0, 40.0)).await;
        catalog.insert_price_info(price_info("P-100")).await;
        catalog
    }

    /// Wraps a catalog and delays chosen ids.
    struct DelayedCatalog {
        inner: InMemoryCatalog,
        delays: HashMap<String, Duration>,
    }

    impl DelayedCatalog {
        fn new(inner: InMemoryCatalog, delays: &[(&str, u64)]) -> Self {
            Self {
                inner,
                delays: delays
                    .iter()
                    .map(|(id, ms)| (id.to_string(), Duration::from_millis(*ms)))
                    .collect(),
            }
        }

        async fn wait(&self, id: &str) {
            if let Some(delay) = self.delays.get(id) {
                tokio::time::sleep(*delay).await;
            }
        }
    }

    #[async_trait]
    impl CatalogSource for DelayedCatalog {
        async fn material_by_id(&self, id: &str) -> SessionResult<Option<Material>> {
            self.wait(id).await;
            self.inner.material_by_id(id).await
        }

        async fn material_by_name(&self, name: &str) -> SessionResult<Option<Material>> {
            self.inner.material_by_name(name).await
        }

        async fn operation_by_id(&self, id: &str) -> SessionResult<Option<Operation>> {
            self.wait(id).await;
            self.inner.operation_by_id(id).await
        }

        async fn operation_by_name(&self, name: &str) -> SessionResult<Option<Operation>> {
            self.inner.operation_by_name(name).await
        }

        async fn markup_profile_by_id(&self, id: &str) -> SessionResult<Option<MarkupProfile>> {
            self.wait(id).await;
            self.inner.markup_profile_by_id(id).await
        }

        async fn price_info_by_product_code(&self, code: &str) -> SessionResult<Option<ProductPriceInfo>> {
            self.wait(code).await;
            self.inner.price_info_by_product_code(code).await
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        settled: std::sync::Mutex<Vec<DerivedTotals>>,
        submitted: std::sync::Mutex<Vec<String>>,
    }

    impl SnapshotObserver for RecordingObserver {
        fn on_settled(&self, totals: &DerivedTotals) {
            self.settled.lock().unwrap().push(totals.clone());
        }

        fn on_submitted(&self, cost_id: &str) {
            self.submitted.lock().unwrap().push(cost_id.to_string());
        }
    }

    struct FailingStore;

    #[async_trait]
    impl CostStore for FailingStore {
        async fn create_cost(&self, _payload: &CreateCostPayload) -> SessionResult<String> {
            Err(SessionError::StoreFailed("connection refused".to_string()))
        }
    }

    fn session_with(catalog: impl CatalogSource + 'static) -> CostSheetSession {
        CostSheetSession::new(
            SessionConfig::default(),
            Arc::new(catalog),
            Arc::new(InMemoryCostStore::new()),
        )
    }

    /// Materials 100, normal ops 50, injection 50, qty 100, with surcharge.
    async fn populated(session: &CostSheetSession) {
        session.set_header(header("P-100", 100.0, true)).unwrap();

        let m = session.add_material(material_input("resin", 10.0)).unwrap();
        assert!(session.select_material(m, "resin".to_string()).await.unwrap());

        let n = session
            .add_normal_operation(NormalOperationInput {
                catalog_item_id: "pack".to_string(),
                quantity: 2.0,
                note: String::new(),
            })
            .unwrap();
        assert!(session.select_operation(n, "pack".to_string()).await.unwrap());

        let i = session
            .add_injection_operation(InjectionOperationInput {
                catalog_item_id: "inj".to_string(),
                cavity_count: 2,
                cycle_seconds: 36.0,
                note: String::new(),
            })
            .unwrap();
        assert!(session.select_operation(i, "inj".to_string()).await.unwrap());
    }

    // =========================================================================
    // Editing and Lookups
    // =========================================================================

    #[tokio::test]
    async fn test_end_to_end_totals() {
        let session = session_with(seeded_catalog().await);
        populated(&session).await;

        let totals = session.totals();
        assert_close(totals.total_cost.value(), 228.0);
        assert_close(totals.unit_cost.value(), 2.28);
        assert_eq!(session.with_sheet(|s| s.pending_count()), 0);

        assert!(session.select_markup_profile("mk-1".to_string()).await.unwrap());
        assert!(session.select_price_info().await.unwrap());
        let totals = session.totals();
        assert!(totals.markup_coefficient.is_some());
        assert!(totals.suggested_price.value() > totals.unit_cost.value());
    }

    #[tokio::test]
    async fn test_new_line_is_pending_until_resolved() {
        let session = session_with(seeded_catalog().await);
        let row = session.add_material(material_input("resin", 3.0)).unwrap();

        assert_eq!(session.with_sheet(|s| s.pending_count()), 1);
        assert_eq!(session.totals().total_materials, Amount::zero());

        session.select_material(row, "resin".to_string()).await.unwrap();
        assert_close(session.totals().total_materials.value(), 30.0);
    }

    #[tokio::test]
    async fn test_cache_hit_resolves_without_lookup() {
        let session = session_with(seeded_catalog().await);
        let first = session.add_material(material_input("resin", 1.0)).unwrap();
        session.select_material(first, "resin".to_string()).await.unwrap();
        assert_eq!(session.cached_records(), 1);

        let second = session.add_material(material_input("resin", 2.0)).unwrap();
        let line_resolved = session.with_sheet(|s| {
            s.line(&second)
                .map(|line| line.status() == costing_core::LineStatus::Resolved)
        });
        assert_eq!(line_resolved, Some(true));

        let selection = session.begin_material_selection(&second, "resin").unwrap();
        assert_eq!(selection, Selection::Resolved);
        assert_close(session.totals().total_materials.value(), 30.0);
    }

    #[tokio::test]
    async fn test_unknown_material_leaves_line_pending() {
        let session = session_with(seeded_catalog().await);
        let row = session.add_material(material_input("ghost", 1.0)).unwrap();

        let err = session
            .select_material(row, "ghost".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }));
        assert_eq!(session.with_sheet(|s| s.pending_count()), 1);
        assert_eq!(session.selections_in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_timeout_leaves_line_pending() {
        let catalog = DelayedCatalog::new(seeded_catalog().await, &[("resin", 60_000)]);
        let session = session_with(catalog);
        let row = session.add_material(material_input("resin", 1.0)).unwrap();

        let err = session
            .select_material(row, "resin".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::LookupTimeout { timeout_ms: 5000, .. }));
        assert!(err.is_retryable());
        assert_eq!(session.with_sheet(|s| s.pending_count()), 1);
        assert_eq!(session.selections_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_operation_kind_must_match_line() {
        let session = session_with(seeded_catalog().await);
        let row = session
            .add_normal_operation(NormalOperationInput {
                catalog_item_id: "inj".to_string(),
                quantity: 2.0,
                note: String::new(),
            })
            .unwrap();

        let err = session
            .select_operation(row, "inj".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Core(_)));
        assert_eq!(session.with_sheet(|s| s.pending_count()), 1);
    }

    #[tokio::test]
    async fn test_find_by_name_fills_cache() {
        let session = session_with(seeded_catalog().await);
        let found = session.find_material_by_name("material resin").await.unwrap();
        assert_eq!(found.id, "resin");

        let row = session.add_material(material_input("resin", 4.0)).unwrap();
        let total = session.with_sheet(|s| s.line(&row).map(|line| line.computed_total()));
        assert_eq!(total, Some(Amount::new(40.0)));

        let missing = session.find_operation_by_name("nothing").await.unwrap_err();
        assert!(matches!(missing, SessionError::NotFound { .. }));
    }

    // =========================================================================
    // Last-Selected-Wins
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_slow_earlier_selection_is_discarded() {
        let catalog = DelayedCatalog::new(seeded_catalog().await, &[("A", 50), ("B", 10)]);
        let session = session_with(catalog);
        let row = session.add_material(material_input("A", 1.0)).unwrap();

        let first = session.spawn_select_material(row.clone(), "A".to_string());
        let second = session.spawn_select_material(row.clone(), "B".to_string());

        assert!(!first.await.unwrap());
        assert!(second.await.unwrap());

        let sheet = session.sheet();
        assert_eq!(sheet.materials()[0].catalog_item_id, "B");
        assert_eq!(sheet.materials()[0].unit_price, Some(Amount::new(7.0)));
        assert_eq!(session.selections_in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_earlier_selection_is_replaced() {
        let catalog = DelayedCatalog::new(seeded_catalog().await, &[("A", 10), ("B", 50)]);
        let session = session_with(catalog);
        let row = session.add_material(material_input("A", 1.0)).unwrap();

        let first = session.spawn_select_material(row.clone(), "A".to_string());
        let second = session.spawn_select_material(row.clone(), "B".to_string());

        assert!(!first.await.unwrap());
        assert!(second.await.unwrap());
        assert_close(session.totals().total_materials.value(), 7.0);
    }

    #[tokio::test]
    async fn test_mismatched_record_is_discarded() {
        let session = session_with(seeded_catalog().await);
        let row = session.add_material(material_input("A", 1.0)).unwrap();

        let selection = session.begin_material_selection(&row, "A").unwrap();
        let ticket = selection.ticket().cloned().unwrap();

        assert!(!session
            .complete_material_selection(&ticket, material("B", 7.0))
            .unwrap());
        assert_eq!(session.with_sheet(|s| s.pending_count()), 1);

        assert!(session
            .complete_material_selection(&ticket, material("A", 5.0))
            .unwrap());
        assert_eq!(session.with_sheet(|s| s.pending_count()), 0);
    }

    #[tokio::test]
    async fn test_removed_row_discards_late_result() {
        let session = session_with(seeded_catalog().await);
        let row = session.add_material(material_input("A", 1.0)).unwrap();
        let ticket = session
            .begin_material_selection(&row, "A")
            .unwrap()
            .ticket()
            .cloned()
            .unwrap();

        session.remove_line(&row).unwrap();
        assert!(!session
            .complete_material_selection(&ticket, material("A", 5.0))
            .unwrap());
        assert!(session.with_sheet(|s| s.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_markup_profile_last_selected_wins() {
        let catalog = DelayedCatalog::new(seeded_catalog().await, &[("mk-1", 50), ("mk-2", 10)]);
        let session = session_with(catalog);

        let first = session.spawn_select_markup_profile("mk-1".to_string());
        let second = session.spawn_select_markup_profile("mk-2".to_string());

        assert!(!first.await.unwrap());
        assert!(second.await.unwrap());
        let selected = session.with_sheet(|s| s.markup_profile().map(|p| p.id.clone()));
        assert_eq!(selected, Some("mk-2".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_markup_profile_rejected() {
        let session = session_with(seeded_catalog().await);
        assert!(session.select_markup_profile("mk-1".to_string()).await.unwrap());

        let err = session
            .select_markup_profile("mk-bad".to_string())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Core(CoreError::InvalidMarkupProfile { .. })
        ));
        assert!(session.with_sheet(|s| s.markup_profile().is_none()));
        assert_eq!(session.totals().markup_coefficient, None);
    }

    #[tokio::test]
    async fn test_cached_invalid_profile_still_clears_selection() {
        let session = session_with(seeded_catalog().await);

        for _ in 0..2 {
            assert!(session.select_markup_profile("mk-1".to_string()).await.unwrap());
            assert!(session.totals().markup_coefficient.is_some());

            let err = session
                .select_markup_profile("mk-bad".to_string())
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                SessionError::Core(CoreError::InvalidMarkupProfile { .. })
            ));
            assert!(session.with_sheet(|s| s.markup_profile().is_none()));
            assert_eq!(session.totals().markup_coefficient, None);
        }
        assert_eq!(session.selections_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cached_price_info_reselected() {
        let session = session_with(seeded_catalog().await);
        session.set_header(header("P-100", 100.0, false)).unwrap();
        assert!(session.select_price_info().await.unwrap());

        assert_eq!(session.begin_price_info_selection().unwrap(), Selection::Resolved);
        assert!(session.with_sheet(|s| s.price_info().is_some()));
        assert_eq!(session.selections_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_product_code_change_drops_price_info() {
        let session = session_with(seeded_catalog().await);
        session.set_header(header("P-100", 100.0, false)).unwrap();
        assert!(session.select_price_info().await.unwrap());

        session.set_header(header("P-100", 200.0, false)).unwrap();
        assert!(session.with_sheet(|s| s.price_info().is_some()));

        session.set_header(header("P-200", 200.0, false)).unwrap();
        assert!(session.with_sheet(|s| s.price_info().is_none()));
        assert!(matches!(
            session.select_price_info().await,
            Err(SessionError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_price_info_for_old_product_is_discarded() {
        let session = session_with(seeded_catalog().await);
        session.set_header(header("P-100", 100.0, false)).unwrap();
        let ticket = session
            .begin_price_info_selection()
            .unwrap()
            .ticket()
            .cloned()
            .unwrap();

        session.set_header(header("P-200", 100.0, false)).unwrap();
        assert!(!session
            .complete_price_info_selection(&ticket, price_info("P-100"))
            .unwrap());
        assert!(session.with_sheet(|s| s.price_info().is_none()));
    }

    // =========================================================================
    // Observer and Submission
    // =========================================================================

    #[tokio::test]
    async fn test_observer_sees_each_settled_snapshot() {
        let observer = Arc::new(RecordingObserver::default());
        let session = CostSheetSession::with_observer(
            SessionConfig::default(),
            Arc::new(seeded_catalog().await),
            Arc::new(InMemoryCostStore::new()),
            observer.clone(),
        );

        let row = session.add_material(material_input("resin", 2.0)).unwrap();
        session.select_material(row, "resin".to_string()).await.unwrap();

        let settled = observer.settled.lock().unwrap();
        assert!(settled.len() >= 2);
        assert_eq!(settled.last(), Some(&session.totals()));
    }

    #[tokio::test]
    async fn test_submit_requires_references() {
        let session = session_with(seeded_catalog().await);
        populated(&session).await;

        let err = session.submit().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Core(CoreError::MissingReference(_))
        ));
        assert_eq!(session.phase(), SessionPhase::Editing);
    }

    #[tokio::test]
    async fn test_submit_stores_and_locks_session() {
        let store = Arc::new(InMemoryCostStore::new());
        let observer = Arc::new(RecordingObserver::default());
        let session = CostSheetSession::with_observer(
            SessionConfig::default(),
            Arc::new(seeded_catalog().await),
            store.clone(),
            observer.clone(),
        );
        populated(&session).await;
        session.select_markup_profile("mk-1".to_string()).await.unwrap();
        session.select_price_info().await.unwrap();

        let cost_id = session.submit().await.unwrap();
        let stored = store.get(&cost_id).await.unwrap();
        assert_eq!(stored.payload.header.product_code, "P-100");
        assert_eq!(stored.payload.materials.len(), 1);
        assert_eq!(stored.payload.totals, session.totals());
        assert_eq!(observer.submitted.lock().unwrap().as_slice(), &[cost_id.clone()]);

        assert!(session.is_submitted());
        assert!(matches!(
            session.add_material(material_input("resin", 1.0)),
            Err(SessionError::AlreadySubmitted)
        ));
        assert!(matches!(
            session.submit().await,
            Err(SessionError::AlreadySubmitted)
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_store_reopens_session() {
        let session = CostSheetSession::new(
            SessionConfig::default(),
            Arc::new(seeded_catalog().await),
            Arc::new(FailingStore),
        );
        populated(&session).await;
        session.select_markup_profile("mk-1".to_string()).await.unwrap();
        session.select_price_info().await.unwrap();

        let err = session.submit().await.unwrap_err();
        assert!(matches!(err, SessionError::StoreFailed(_)));
        assert_eq!(session.phase(), SessionPhase::Editing);
        assert!(session.add_material(material_input("resin", 1.0)).is_ok());
    }
}
