//! The schedule editor: one engine instance per open month.
//!
//! All mutations are synchronous and happen through `&mut self`; there is
//! exactly one writer. The only operation that spans time is a save, split
//! into [`begin_save`](ScheduleEditor::begin_save) and
//! [`complete_save`](ScheduleEditor::complete_save) so the submission can run
//! elsewhere. Between the two, every mutating call fails with
//! [`EngineError::EditsLocked`] instead of being queued.

use std::collections::HashMap;

use shiftgrid_protocol::{MonthData, NotificationRequest, SaveResponse};
use uuid::Uuid;

use crate::backend::{BackendError, Notifier, ScheduleBackend};
use crate::batch::{self, BatchOperationSpec, ExpandContext};
use crate::calendar::MonthKey;
use crate::cell_key::CellKey;
use crate::change::{CellChange, ChangeId, ChangeOrigin, Clock, EditGroup, GroupId};
use crate::change_log::{ChangeLog, PendingChangeSet};
use crate::error::{EngineError, KeyRejection};
use crate::events::{CellsChangedEvent, EditorEvent, EventCollector};
use crate::grid::BaseGrid;
use crate::history::{History, HistoryEntry};
use crate::overlay::Overlay;
use crate::pipeline::{self, Reconciliation, SavePipeline, SaveState, SaveTicket};
use crate::shift_code;

/// Tunables, usually filled from user settings.
#[derive(Debug, Clone)]
pub struct EditorOptions {
    /// Undo groups kept before the oldest is dropped.
    pub max_groups: usize,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self { max_groups: 500 }
    }
}

/// Summary of an undo or redo step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSummary {
    pub group: GroupId,
    pub description: String,
    pub cells: Vec<CellKey>,
}

/// Result of a fully or partially applied save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub request_id: Uuid,
    pub accepted: usize,
    pub notified: bool,
}

pub struct ScheduleEditor {
    base: Option<BaseGrid>,
    log: ChangeLog,
    history: History,
    clock: Clock,
    pipeline: SavePipeline,
    annotations: HashMap<CellKey, KeyRejection>,
    events: EventCollector,
    options: EditorOptions,
}

impl Default for ScheduleEditor {
    fn default() -> Self {
        Self::new(EditorOptions::default())
    }
}

impl ScheduleEditor {
    pub fn new(options: EditorOptions) -> Self {
        Self {
            base: None,
            log: ChangeLog::new(),
            history: History::with_limit(options.max_groups),
            clock: Clock::new(),
            pipeline: SavePipeline::new(),
            annotations: HashMap::new(),
            events: EventCollector::new(),
            options,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Load a month, tearing down any uncommitted state of the previous one.
    ///
    /// Returns how many pending keys were discarded. Warning the user before
    /// discarding is the caller's job.
    pub fn init(&mut self, data: &MonthData) -> Result<usize, EngineError> {
        let base = BaseGrid::from_month_data(data)?;
        let discarded = self.log.len();
        self.teardown();
        log::info!(
            "Loaded {} ({} employees, {} shifts, {} pending discarded)",
            base.month(),
            base.roster().len(),
            base.len(),
            discarded
        );
        self.base = Some(base);
        self.events.push(EditorEvent::MonthLoaded { discarded });
        Ok(discarded)
    }

    /// Fetch `month` from the backend and [`init`](Self::init) with it.
    pub fn load(&mut self, backend: &dyn ScheduleBackend, month: MonthKey) -> Result<usize, EngineError> {
        let data = backend.fetch_month(month).map_err(backend_failure)?;
        self.init(&data)
    }

    /// Drop the month and all uncommitted state.
    pub fn reset(&mut self) {
        self.teardown();
        self.base = None;
    }

    fn teardown(&mut self) {
        self.pipeline.abandon();
        self.log.clear();
        self.history.clear();
        self.annotations.clear();
    }

    pub fn month(&self) -> Option<MonthKey> {
        self.base.as_ref().map(BaseGrid::month)
    }

    pub fn base(&self) -> Option<&BaseGrid> {
        self.base.as_ref()
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn overlay(&self) -> Option<Overlay<'_>> {
        self.base.as_ref().map(|base| Overlay::new(base, &self.log))
    }

    /// Displayed value of a cell. Empty means cleared (or no month loaded).
    pub fn project(&self, employee_id: &str, day: u32) -> &str {
        match self.overlay() {
            Some(overlay) => overlay.project(&CellKey::new(employee_id, day)),
            None => "",
        }
    }

    /// Active pending change for a cell.
    pub fn lookup(&self, employee_id: &str, day: u32) -> Option<&CellChange> {
        self.log.lookup(&CellKey::new(employee_id, day))
    }

    pub fn change_log(&self) -> &ChangeLog {
        &self.log
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Value of `key` before its first still-active edit.
    pub fn effective_old_value(&self, key: &CellKey) -> Option<&str> {
        self.log.effective_old_value(key)
    }

    /// Pending edits grouped per employee, days ascending.
    pub fn pending(&self) -> PendingChangeSet {
        self.log.snapshot()
    }

    /// Number of keys with a pending edit.
    pub fn pending_count(&self) -> usize {
        self.log.len()
    }

    /// Every active change, newest first, for the pending-changes list.
    pub fn pending_changes(&self) -> Vec<&CellChange> {
        self.log.active_changes()
    }

    /// Error attached to a key by the last save, if it is still pending.
    pub fn annotation(&self, key: &CellKey) -> Option<&KeyRejection> {
        self.annotations.get(key)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &KeyRejection> {
        self.annotations.values()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn save_state(&self) -> SaveState {
        self.pipeline.state()
    }

    pub fn is_editable(&self) -> bool {
        self.base.is_some() && !self.pipeline.is_saving()
    }

    pub fn events(&self) -> &EventCollector {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        self.events.drain()
    }

    // ========================================================================
    // Edits
    // ========================================================================

    fn editable_base(&self) -> Result<&BaseGrid, EngineError> {
        editable(&self.base, &self.pipeline)
    }

    /// Record a single-cell edit as its own group.
    ///
    /// The value is normalized to a shift code first. Returns `None` when
    /// the normalized value equals what is already displayed.
    pub fn edit_cell(&mut self, employee_id: &str, day: u32, raw: &str) -> Result<Option<CellChange>, EngineError> {
        let base = self.editable_base()?;
        let month = base.month();
        let employee = base
            .roster()
            .get(employee_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownEmployee(employee_id.to_string()))?;
        if !month.contains_day(day) {
            return Err(EngineError::DayOutOfRange { day, days_in_month: month.days() });
        }

        let key = CellKey::new(employee_id, day);
        let new_value = shift_code::normalize(raw);
        let old_value = Overlay::new(base, &self.log).project(&key).to_string();
        if old_value == new_value {
            log::debug!("Ignoring no-op edit of {}", key);
            return Ok(None);
        }

        let group = self.clock.next_group_id();
        let change = CellChange {
            id: self.clock.next_change_id(),
            key: key.clone(),
            employee_name: employee.name,
            employee_rut: employee.rut,
            old_value,
            new_value,
            timestamp: self.clock.tick(),
            origin: ChangeOrigin::DirectEdit { group },
        };
        log::debug!("Edit {} {:?} -> {:?}", key, change.old_value, change.new_value);

        let description = format!("Edit {} on day {}", change.employee_name, day);
        self.apply_group(EditGroup { id: group, description, changes: vec![change.clone()] });
        Ok(Some(change))
    }

    /// Expand a batch spec and record it as one group.
    pub fn apply_batch(&mut self, spec: &BatchOperationSpec) -> Result<EditGroup, EngineError> {
        let base = editable(&self.base, &self.pipeline)?;
        let ctx = ExpandContext { month: base.month(), roster: base.roster() };
        let overlay = Overlay::new(base, &self.log);
        let group = batch::expand(spec, ctx, &overlay, &mut self.clock)?;
        log::debug!("{} expanded into {} change(s)", spec.kind, group.len());

        self.apply_group(group.clone());
        Ok(group)
    }

    fn apply_group(&mut self, group: EditGroup) {
        let mut cells = Vec::with_capacity(group.len());
        let mut ids = Vec::with_capacity(group.len());
        for change in group.changes {
            self.annotations.remove(&change.key);
            cells.push(change.key.clone());
            ids.push(change.id);
            self.log.record(change);
        }

        let effect = self.history.push(HistoryEntry {
            group: group.id,
            description: group.description,
            changes: ids,
        });
        for id in effect.invalidated {
            self.log.forget(id);
        }
        if let Some(evicted) = effect.evicted {
            log::debug!("History full, dropping undo for {} ({})", evicted.group, evicted.description);
        }

        self.emit_changed(cells);
    }

    // ========================================================================
    // Undo / Redo
    // ========================================================================

    /// Undo the most recent group.
    pub fn undo(&mut self) -> Result<Option<StepSummary>, EngineError> {
        self.editable_base()?;
        let Some(entry) = self.history.undo() else {
            return Ok(None);
        };

        let mut cells = Vec::with_capacity(entry.changes.len());
        for id in entry.changes.iter().rev() {
            match self.log.pop(*id) {
                Ok(change) => cells.push(change.key.clone()),
                Err(e) => log::error!("Undo of {} skipped {}: {}", entry.group, id, e),
            }
        }
        self.drop_stale_annotations(&cells);
        self.emit_changed(cells.clone());

        Ok(Some(StepSummary { group: entry.group, description: entry.description, cells }))
    }

    /// Redo the most recently undone group.
    pub fn redo(&mut self) -> Result<Option<StepSummary>, EngineError> {
        self.editable_base()?;
        let Some(entry) = self.history.redo() else {
            return Ok(None);
        };

        let mut cells = Vec::with_capacity(entry.changes.len());
        for id in &entry.changes {
            let Some(key) = self.log.get(*id).map(|c| c.key.clone()) else {
                log::error!("Redo of {} skipped missing {}", entry.group, id);
                continue;
            };
            let current = self.project(&key.employee_id, key.day).to_string();
            match self.log.reinstate(*id, &current) {
                Ok(_) => cells.push(key),
                Err(e) => log::error!("Redo of {} skipped {}: {}", entry.group, id, e),
            }
        }
        self.emit_changed(cells.clone());

        Ok(Some(StepSummary { group: entry.group, description: entry.description, cells }))
    }

    /// Discard exactly one pending change.
    ///
    /// If it is the key's active entry, the previous entry (or the base
    /// value) becomes visible. If it is buried under later edits, it is cut
    /// out of the key's stack and the entry above it is re-linked. Either
    /// way the change leaves its group; a group left empty disappears from
    /// the history. The discard itself is not undoable.
    pub fn undo_change(&mut self, id: ChangeId) -> Result<CellChange, EngineError> {
        self.editable_base()?;
        if !self.log.is_active(id) {
            return Err(EngineError::UnknownChange(id));
        }

        let discarded = self.log.discard(id)?;
        self.history.remove_change(id);
        let key = discarded.change.key.clone();
        log::debug!(
            "Discarded {} on {} ({})",
            id,
            key,
            if discarded.was_top { "active" } else { "buried" }
        );

        self.drop_stale_annotations(std::slice::from_ref(&key));
        self.emit_changed(vec![key]);
        Ok(discarded.change)
    }

    fn drop_stale_annotations(&mut self, keys: &[CellKey]) {
        for key in keys {
            if self.log.lookup(key).is_none() {
                self.annotations.remove(key);
            }
        }
    }

    fn emit_changed(&mut self, cells: Vec<CellKey>) {
        if !cells.is_empty() {
            self.events.push(EditorEvent::CellsChanged(CellsChangedEvent::new(cells)));
        }
        self.events.push(EditorEvent::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        });
    }

    // ========================================================================
    // Save
    // ========================================================================

    /// Idle → Saving. Snapshots the pending set into a request; edits are
    /// refused until [`complete_save`](Self::complete_save).
    pub fn begin_save(&mut self, comment: &str, notify: &[String]) -> Result<SaveTicket, EngineError> {
        let month = self.month().ok_or(EngineError::NotInitialized)?;
        let ticket = self.pipeline.begin(month, self.log.snapshot(), comment, notify)?;
        log::info!(
            "Submitting {} change(s) for {} (request {})",
            ticket.request.change_count(),
            month,
            ticket.id()
        );
        self.events.push(EditorEvent::SaveStateChanged { from: SaveState::Idle, to: SaveState::Saving });
        Ok(ticket)
    }

    /// Apply the backend's verdict for `ticket` and return to Idle.
    pub fn complete_save(
        &mut self,
        ticket: &SaveTicket,
        result: Result<SaveResponse, BackendError>,
        notifier: &dyn Notifier,
    ) -> Result<SaveReport, EngineError> {
        let submitted = self.pipeline.take(ticket)?;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Save {} failed: {}", ticket.id(), e);
                self.finish_save(SaveState::Failed);
                return Err(backend_failure(e));
            }
        };

        let reconciliation = pipeline::reconcile(&submitted, response);
        let accepted = reconciliation.accepted_keys(&submitted);

        // Accepted values are now the backend's values.
        if let Some(base) = self.base.as_mut() {
            for cell in submitted.cells().filter(|c| accepted.contains(&c.key)) {
                base.set(cell.key.clone(), &cell.new_value);
            }
        }

        match &reconciliation {
            Reconciliation::AllAccepted => {
                self.log.clear();
                self.history.clear();
                self.annotations.clear();
            }
            Reconciliation::Rejected { kind, message } => {
                log::warn!("Save {} rejected ({}): {}", ticket.id(), kind, message);
                for cell in submitted.cells() {
                    self.annotations.insert(
                        cell.key.clone(),
                        KeyRejection { key: cell.key.clone(), kind: *kind, reason: message.clone() },
                    );
                }
            }
            Reconciliation::Mixed { accepted, rejected } => {
                for key in accepted {
                    self.log.clear_key(key);
                    for id in self.log.inactive_for(key) {
                        self.log.forget(id);
                    }
                    self.annotations.remove(key);
                }
                let log = &self.log;
                self.history.retain_changes(|id| log.get(id).is_some());
                for rejection in rejected {
                    log::warn!("Save {} rejected {}", ticket.id(), rejection);
                    self.annotations.insert(rejection.key.clone(), rejection.clone());
                }
            }
        }

        let notified = self.notify_accepted(ticket, &submitted, &accepted, notifier);
        let error = pipeline::failure_error(&reconciliation);
        self.finish_save(if error.is_none() { SaveState::Applied } else { SaveState::Failed });
        self.emit_changed(submitted.cells().map(|c| c.key.clone()).collect());

        match error {
            None => {
                log::info!("Save {} applied ({} change(s))", ticket.id(), accepted.len());
                Ok(SaveReport { request_id: ticket.id(), accepted: accepted.len(), notified })
            }
            Some(e) => Err(e),
        }
    }

    /// Submit the pending set to `backend` and wait for its verdict.
    pub fn save(
        &mut self,
        backend: &dyn ScheduleBackend,
        notifier: &dyn Notifier,
        comment: &str,
        notify: &[String],
    ) -> Result<SaveReport, EngineError> {
        let ticket = self.begin_save(comment, notify)?;
        let result = backend.submit(&ticket.request);
        self.complete_save(&ticket, result, notifier)
    }

    fn finish_save(&mut self, outcome: SaveState) {
        for (from, to) in self.pipeline.finish(outcome) {
            self.events.push(EditorEvent::SaveStateChanged { from, to });
        }
    }

    /// Best-effort fan-out. Failures are logged and never affect the save.
    fn notify_accepted(
        &self,
        ticket: &SaveTicket,
        submitted: &PendingChangeSet,
        accepted: &[CellKey],
        notifier: &dyn Notifier,
    ) -> bool {
        if ticket.request.notify.is_empty() || accepted.is_empty() {
            return false;
        }
        let request = NotificationRequest {
            year: ticket.request.year,
            month: ticket.request.month,
            recipients: ticket.request.notify.clone(),
            comment: ticket.request.comment.clone(),
            changes: submitted
                .cells()
                .filter(|c| accepted.contains(&c.key))
                .map(|c| c.to_record())
                .collect(),
        };
        match notifier.notify(&request) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Notification for save {} failed: {}", ticket.id(), e);
                false
            }
        }
    }
}

/// Borrows only `base` and `pipeline`, so callers can still take other
/// fields mutably.
fn editable<'a>(base: &'a Option<BaseGrid>, pipeline: &SavePipeline) -> Result<&'a BaseGrid, EngineError> {
    let base = base.as_ref().ok_or(EngineError::NotInitialized)?;
    if pipeline.is_saving() {
        return Err(EngineError::EditsLocked);
    }
    Ok(base)
}

/// Only availability failures are worth retrying as-is.
fn backend_failure(e: BackendError) -> EngineError {
    match e {
        BackendError::Unavailable(_) => EngineError::Transient(e.to_string()),
        other => EngineError::Backend(other),
    }
}
