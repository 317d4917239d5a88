//! Backend collaborators: base data provider, save endpoint, notification
//! side-channel and audit feed.
//!
//! The editor only talks to these traits. `shiftgrid-backend-client`
//! implements them over HTTP; [`MemoryBackend`] implements them in-process
//! for tests and offline runs.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shiftgrid_protocol::{
    AuditRecord, MonthData, NotificationRequest, RecordOutcome, RejectionKind, SaveRequest,
    SaveResponse, ShiftRecord,
};

use crate::calendar::MonthKey;

/// Error type for backend calls.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Network error, timeout, or 5xx. Safe to retry.
    Unavailable(String),
    /// HTTP error that is not a save verdict (auth, 404, ...).
    Http(u16, String),
    /// Response body did not match the wire format.
    Parse(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unavailable(msg) => write!(f, "Backend unavailable: {}", msg),
            BackendError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            BackendError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// Base data provider and save endpoint.
pub trait ScheduleBackend {
    fn fetch_month(&self, month: MonthKey) -> Result<MonthData, BackendError>;

    fn submit(&self, request: &SaveRequest) -> Result<SaveResponse, BackendError>;
}

/// Best-effort notification delivery after a successful save.
pub trait Notifier {
    fn notify(&self, request: &NotificationRequest) -> Result<(), BackendError>;
}

/// Read-only audit/history feed. Polled from a background thread.
pub trait AuditFeed: Send + Sync {
    /// Records for `month` strictly newer than `since` (all when `None`),
    /// oldest first.
    fn fetch(&self, month: MonthKey, since: Option<DateTime<Utc>>) -> Result<Vec<AuditRecord>, BackendError>;
}

/// A notifier that drops everything.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _request: &NotificationRequest) -> Result<(), BackendError> {
        Ok(())
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// A canned reply for the next `submit` call.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Respond(SaveResponse),
    Fail(BackendError),
}

#[derive(Default)]
struct MemoryState {
    months: HashMap<MonthKey, MonthData>,
    script: VecDeque<ScriptedReply>,
    submissions: Vec<SaveRequest>,
    notifications: Vec<NotificationRequest>,
    audit: Vec<(MonthKey, AuditRecord)>,
    fail_notifications: bool,
}

/// In-process backend of record.
///
/// Without a script, `submit` validates each record like a real backend:
/// unknown employees and out-of-range days are validation rejections, and
/// an `old_value` that differs from the stored value is a conflict.
/// Accepted records are applied and appended to the audit feed.
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    author: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self { state: Mutex::new(MemoryState::default()), author: "memory".into() }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Seed (or replace) one month of data.
    pub fn insert_month(&self, data: MonthData) {
        if let Some(month) = month_key(&data) {
            self.state.lock().months.insert(month, data);
        }
    }

    /// Queue a reply for the next submission.
    pub fn push_reply(&self, reply: ScriptedReply) {
        self.state.lock().script.push_back(reply);
    }

    pub fn fail_notifications(&self, fail: bool) {
        self.state.lock().fail_notifications = fail;
    }

    /// Overwrite one stored cell, as another session saving would.
    pub fn set_value(&self, month: MonthKey, employee_id: &str, day: u32, shift: &str) {
        let mut state = self.state.lock();
        if let Some(data) = state.months.get_mut(&month) {
            write_record(data, employee_id, day, shift);
        }
    }

    /// Stored value of one cell.
    pub fn value(&self, month: MonthKey, employee_id: &str, day: u32) -> String {
        let state = self.state.lock();
        state
            .months
            .get(&month)
            .and_then(|d| d.records.iter().find(|r| r.employee_id == employee_id && r.day == day))
            .map(|r| r.shift.clone())
            .unwrap_or_default()
    }

    pub fn submissions(&self) -> Vec<SaveRequest> {
        self.state.lock().submissions.clone()
    }

    pub fn notifications(&self) -> Vec<NotificationRequest> {
        self.state.lock().notifications.clone()
    }

    /// Validate and apply a request against the stored data.
    fn evaluate(&self, state: &mut MemoryState, request: &SaveRequest) -> SaveResponse {
        let Some(month) = MonthKey::new(request.year, request.month).ok() else {
            return SaveResponse::Rejected {
                kind: RejectionKind::Validation,
                message: format!("invalid month {}-{}", request.year, request.month),
            };
        };
        let Some(data) = state.months.get(&month) else {
            return SaveResponse::Rejected {
                kind: RejectionKind::Validation,
                message: format!("no schedule for {month}"),
            };
        };

        let outcomes: Vec<RecordOutcome> = request
            .changes()
            .map(|change| {
                if !data.employees.iter().any(|e| e.id == change.employee_id) {
                    return RecordOutcome::rejected(
                        &change.employee_id,
                        change.day,
                        RejectionKind::Validation,
                        "unknown employee",
                    );
                }
                if !month.contains_day(change.day) {
                    return RecordOutcome::rejected(
                        &change.employee_id,
                        change.day,
                        RejectionKind::Validation,
                        format!("day {} out of range", change.day),
                    );
                }
                let stored = data
                    .records
                    .iter()
                    .find(|r| r.employee_id == change.employee_id && r.day == change.day)
                    .map(|r| r.shift.as_str())
                    .unwrap_or("");
                if stored != change.old_value {
                    return RecordOutcome::rejected(
                        &change.employee_id,
                        change.day,
                        RejectionKind::Conflict,
                        format!("current value is {:?}", stored),
                    );
                }
                RecordOutcome::accepted(&change.employee_id, change.day)
            })
            .collect();

        if outcomes.iter().all(RecordOutcome::is_accepted) {
            SaveResponse::Accepted
        } else {
            SaveResponse::Partial { outcomes }
        }
    }

    /// Apply the records the response accepted and log them to the feed.
    fn apply(&self, state: &mut MemoryState, request: &SaveRequest, response: &SaveResponse) {
        let Ok(month) = MonthKey::new(request.year, request.month) else {
            return;
        };
        let accepted: Vec<_> = match response {
            SaveResponse::Accepted => request.changes().collect(),
            SaveResponse::Rejected { .. } => Vec::new(),
            SaveResponse::Partial { outcomes } => request
                .changes()
                .filter(|c| {
                    outcomes
                        .iter()
                        .any(|o| o.is_accepted() && o.employee_id == c.employee_id && o.day == c.day)
                })
                .collect(),
        };

        let now = Utc::now();
        for change in accepted {
            if let Some(data) = state.months.get_mut(&month) {
                write_record(data, &change.employee_id, change.day, &change.new_value);
            }
            state.audit.push((
                month,
                AuditRecord {
                    employee: change.employee_id.clone(),
                    day: change.day,
                    old_shift: change.old_value.clone(),
                    new_shift: change.new_value.clone(),
                    changed_by: self.author.clone(),
                    changed_at: now,
                    comment: request.comment.clone(),
                },
            ));
        }
    }
}

impl ScheduleBackend for MemoryBackend {
    fn fetch_month(&self, month: MonthKey) -> Result<MonthData, BackendError> {
        self.state
            .lock()
            .months
            .get(&month)
            .cloned()
            .ok_or_else(|| BackendError::Http(404, format!("no schedule for {month}")))
    }

    fn submit(&self, request: &SaveRequest) -> Result<SaveResponse, BackendError> {
        let mut state = self.state.lock();
        state.submissions.push(request.clone());

        let response = match state.script.pop_front() {
            Some(ScriptedReply::Fail(err)) => return Err(err),
            Some(ScriptedReply::Respond(response)) => response,
            None => self.evaluate(&mut state, request),
        };
        self.apply(&mut state, request, &response);
        Ok(response)
    }
}

impl Notifier for MemoryBackend {
    fn notify(&self, request: &NotificationRequest) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if state.fail_notifications {
            return Err(BackendError::Unavailable("notification service down".into()));
        }
        state.notifications.push(request.clone());
        Ok(())
    }
}

impl AuditFeed for MemoryBackend {
    fn fetch(&self, month: MonthKey, since: Option<DateTime<Utc>>) -> Result<Vec<AuditRecord>, BackendError> {
        let state = self.state.lock();
        Ok(state
            .audit
            .iter()
            .filter(|(m, r)| *m == month && since.map_or(true, |s| r.changed_at > s))
            .map(|(_, r)| r.clone())
            .collect())
    }
}

fn month_key(data: &MonthData) -> Option<MonthKey> {
    MonthKey::new(data.year, data.month).ok()
}

fn write_record(data: &mut MonthData, employee_id: &str, day: u32, shift: &str) {
    data.records.retain(|r| !(r.employee_id == employee_id && r.day == day));
    if !shift.is_empty() {
        data.records.push(ShiftRecord {
            employee_id: employee_id.to_string(),
            day,
            shift: shift.to_string(),
        });
    }
}
