//! Client-side editing engine for a monthly shift schedule.
//!
//! Edits never touch the loaded month directly. They are recorded as
//! [`CellChange`]s in a per-cell [`ChangeLog`], grouped into undo steps by
//! [`History`], and rendered through an [`Overlay`]. A save submits the net
//! pending set and reconciles the backend's per-record verdicts.

pub mod audit;
pub mod backend;
pub mod batch;
pub mod calendar;
pub mod cell_key;
pub mod change;
pub mod change_log;
pub mod editor;
pub mod error;
pub mod events;
pub mod grid;
pub mod history;
pub mod overlay;
pub mod pipeline;
pub mod shift_code;

#[cfg(test)]
pub mod harness;

pub use backend::{AuditFeed, BackendError, MemoryBackend, Notifier, ScheduleBackend};
pub use batch::{BatchKind, BatchOperationSpec};
pub use calendar::MonthKey;
pub use cell_key::CellKey;
pub use change::{CellChange, ChangeId, EditGroup, GroupId};
pub use change_log::{ChangeLog, PendingChangeSet};
pub use editor::{EditorOptions, SaveReport, ScheduleEditor};
pub use error::{EngineError, KeyRejection};
pub use history::History;
pub use overlay::Overlay;
pub use pipeline::{SaveState, SaveTicket};
