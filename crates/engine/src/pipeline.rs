//! Save pipeline state machine and response reconciliation.
//!
//! ```text
//! Idle ──begin──▶ Saving ──accepted──▶ Applied ──▶ Idle
//!                    │
//!                    └──rejected / partial / transient──▶ Failed ──▶ Idle
//! ```
//!
//! `Applied` and `Failed` are pass-through states: they are reported as
//! events so the UI can flash a result, and the pipeline is back in an
//! editable `Idle` by the time `complete` returns.

use std::collections::HashSet;

use shiftgrid_protocol::{RecordVerdict, RejectionKind, SaveRequest, SaveResponse};
use uuid::Uuid;

use crate::calendar::MonthKey;
use crate::cell_key::CellKey;
use crate::change_log::PendingChangeSet;
use crate::error::{EngineError, KeyRejection};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SaveState {
    Idle,
    Saving,
    Applied,
    Failed,
}

impl std::fmt::Display for SaveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Saving => write!(f, "saving"),
            Self::Applied => write!(f, "applied"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Handle for an in-flight save. Carries the request to submit.
#[derive(Debug, Clone)]
pub struct SaveTicket {
    pub request: SaveRequest,
}

impl SaveTicket {
    pub fn id(&self) -> Uuid {
        self.request.request_id
    }
}

/// What the backend's answer means for the local pending set.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Every submitted key was applied.
    AllAccepted,
    /// Nothing was applied; the backend gave one reason for the whole save.
    Rejected { kind: RejectionKind, message: String },
    /// Per-key verdicts.
    Mixed {
        accepted: Vec<CellKey>,
        rejected: Vec<KeyRejection>,
    },
}

impl Reconciliation {
    /// Keys whose submitted value is now the backend's value.
    pub fn accepted_keys(&self, submitted: &PendingChangeSet) -> Vec<CellKey> {
        match self {
            Self::AllAccepted => submitted.cells().map(|c| c.key.clone()).collect(),
            Self::Rejected { .. } => Vec::new(),
            Self::Mixed { accepted, .. } => accepted.clone(),
        }
    }
}

/// Interpret a save response against what was submitted.
///
/// Outcomes for keys that were never submitted are ignored. Submitted keys
/// the backend did not report on are treated as not applied.
pub fn reconcile(submitted: &PendingChangeSet, response: SaveResponse) -> Reconciliation {
    let outcomes = match response {
        SaveResponse::Accepted => return Reconciliation::AllAccepted,
        SaveResponse::Rejected { kind, message } => return Reconciliation::Rejected { kind, message },
        SaveResponse::Partial { outcomes } => outcomes,
    };

    let submitted_keys: HashSet<CellKey> = submitted.cells().map(|c| c.key.clone()).collect();
    let mut seen: HashSet<CellKey> = HashSet::new();
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for outcome in outcomes {
        let key = CellKey::new(outcome.employee_id, outcome.day);
        if !submitted_keys.contains(&key) {
            log::warn!("Ignoring outcome for unsubmitted key {}", key);
            continue;
        }
        if !seen.insert(key.clone()) {
            continue;
        }
        match outcome.verdict {
            RecordVerdict::Accepted => accepted.push(key),
            RecordVerdict::Rejected { kind, reason } => rejected.push(KeyRejection { key, kind, reason }),
        }
    }

    for cell in submitted.cells() {
        if !seen.contains(&cell.key) {
            rejected.push(KeyRejection {
                key: cell.key.clone(),
                kind: RejectionKind::Validation,
                reason: "backend reported no outcome".into(),
            });
        }
    }

    if rejected.is_empty() {
        return Reconciliation::AllAccepted;
    }
    accepted.sort();
    rejected.sort_by(|a, b| a.key.cmp(&b.key));
    Reconciliation::Mixed { accepted, rejected }
}

/// Error reported to the caller for a reconciliation that was not a full
/// success.
pub fn failure_error(reconciliation: &Reconciliation) -> Option<EngineError> {
    match reconciliation {
        Reconciliation::AllAccepted => None,
        Reconciliation::Rejected { kind, message } => Some(EngineError::Rejected {
            kind: *kind,
            message: message.clone(),
        }),
        Reconciliation::Mixed { accepted, rejected } => {
            if accepted.is_empty() && rejected.iter().all(|r| r.kind == RejectionKind::Conflict) {
                Some(EngineError::Conflict { keys: rejected.clone() })
            } else {
                Some(EngineError::PartialFailure {
                    accepted: accepted.len(),
                    rejected: rejected.clone(),
                })
            }
        }
    }
}

/// Single-flight save guard.
#[derive(Debug)]
pub struct SavePipeline {
    state: SaveState,
    in_flight: Option<InFlight>,
}

#[derive(Debug)]
struct InFlight {
    id: Uuid,
    submitted: PendingChangeSet,
}

impl Default for SavePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl SavePipeline {
    pub fn new() -> Self {
        Self { state: SaveState::Idle, in_flight: None }
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn is_saving(&self) -> bool {
        self.state == SaveState::Saving
    }

    /// Idle → Saving. Builds the request from the pending set.
    pub fn begin(
        &mut self,
        month: MonthKey,
        pending: PendingChangeSet,
        comment: &str,
        notify: &[String],
    ) -> Result<SaveTicket, EngineError> {
        if self.is_saving() {
            return Err(EngineError::SaveInProgress);
        }
        if pending.is_empty() {
            return Err(EngineError::NothingToSave);
        }

        let request = SaveRequest {
            request_id: Uuid::new_v4(),
            year: month.year,
            month: month.month,
            comment: comment.to_string(),
            notify: notify.to_vec(),
            employees: pending.to_wire(),
        };
        self.in_flight = Some(InFlight { id: request.request_id, submitted: pending });
        self.state = SaveState::Saving;
        Ok(SaveTicket { request })
    }

    /// End the in-flight save identified by `ticket`. Returns what was
    /// submitted; the state stays `Saving` until [`finish`](Self::finish).
    pub fn take(&mut self, ticket: &SaveTicket) -> Result<PendingChangeSet, EngineError> {
        match &self.in_flight {
            Some(flight) if flight.id == ticket.id() => {}
            _ => return Err(EngineError::StaleTicket),
        }
        self.in_flight
            .take()
            .map(|f| f.submitted)
            .ok_or(EngineError::StaleTicket)
    }

    /// Saving → `outcome` → Idle. Returns the transitions taken.
    pub fn finish(&mut self, outcome: SaveState) -> Vec<(SaveState, SaveState)> {
        let from = self.state;
        self.state = SaveState::Idle;
        vec![(from, outcome), (outcome, SaveState::Idle)]
    }

    /// Drop any in-flight save without a verdict (month teardown).
    pub fn abandon(&mut self) {
        if self.in_flight.take().is_some() {
            log::warn!("Abandoning in-flight save");
        }
        self.state = SaveState::Idle;
    }
}
