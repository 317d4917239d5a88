use std::fmt;

use shiftgrid_protocol::RejectionKind;

use crate::backend::BackendError;
use crate::cell_key::CellKey;
use crate::change::ChangeId;

/// A single key the backend refused, with enough structure to render a
/// per-cell error indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRejection {
    pub key: CellKey,
    pub kind: RejectionKind,
    pub reason: String,
}

impl fmt::Display for KeyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.key, self.kind, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Malformed batch spec or edit input. Raised before any state mutation.
    Validation(String),
    /// Day outside `1..=days_in_month` for the active month.
    DayOutOfRange { day: u32, days_in_month: u32 },
    /// Employee not in the loaded roster.
    UnknownEmployee(String),
    /// Change id is not an active pending edit.
    UnknownChange(ChangeId),
    /// No month has been loaded with `init`.
    NotInitialized,
    /// A save is already in flight.
    SaveInProgress,
    /// Edits are refused while a save is in flight.
    EditsLocked,
    /// Save requested with an empty pending set.
    NothingToSave,
    /// The save ticket does not belong to the in-flight save.
    StaleTicket,
    /// Network or availability failure. Pending state is untouched.
    Transient(String),
    /// The backend answered with an error that retrying will not fix (auth,
    /// not found, malformed body). Pending state is untouched.
    Backend(BackendError),
    /// The backend refused the whole save. Pending state is untouched.
    Rejected { kind: RejectionKind, message: String },
    /// Every submitted key conflicted with the server's current value.
    Conflict { keys: Vec<KeyRejection> },
    /// Some keys were applied, the rest stay pending.
    PartialFailure { accepted: usize, rejected: Vec<KeyRejection> },
}

impl EngineError {
    /// True when retrying the same save may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Per-key rejections carried by this error, if any.
    pub fn rejections(&self) -> &[KeyRejection] {
        match self {
            Self::Conflict { keys } => keys,
            Self::PartialFailure { rejected, .. } => rejected,
            _ => &[],
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
            Self::DayOutOfRange { day, days_in_month } => {
                write!(f, "day {day} is outside 1..={days_in_month}")
            }
            Self::UnknownEmployee(id) => write!(f, "unknown employee: {id}"),
            Self::UnknownChange(id) => write!(f, "change {id} is not pending"),
            Self::NotInitialized => write!(f, "no month loaded"),
            Self::SaveInProgress => write!(f, "a save is already in progress"),
            Self::EditsLocked => write!(f, "editing is disabled while saving"),
            Self::NothingToSave => write!(f, "no pending changes to save"),
            Self::StaleTicket => write!(f, "save ticket does not match the in-flight save"),
            Self::Transient(msg) => write!(f, "backend unavailable: {msg}"),
            Self::Backend(e) => write!(f, "backend error: {e}"),
            Self::Rejected { kind, message } => write!(f, "save rejected ({kind}): {message}"),
            Self::Conflict { keys } => write!(f, "{} change(s) conflict with the server", keys.len()),
            Self::PartialFailure { accepted, rejected } => write!(
                f,
                "saved {accepted} change(s), {} rejected",
                rejected.len()
            ),
        }
    }
}

impl std::error::Error for EngineError {}
