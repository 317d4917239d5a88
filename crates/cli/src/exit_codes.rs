//! CLI Exit Code Registry
//!
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error                                             |
//! | 2    | Usage error (bad args, unreadable file, invalid script)   |
//! | 3    | Save rejected in whole or in part (conflict/validation)   |
//! | 4    | Backend unavailable; pending edits were not lost          |

use shiftgrid_engine::{BackendError, EngineError};

pub const EXIT_SUCCESS: u8 = 0;

pub const EXIT_ERROR: u8 = 1;

pub const EXIT_USAGE: u8 = 2;

/// The backend rejected some or all of the submitted changes.
pub const EXIT_SAVE_REJECTED: u8 = 3;

/// Network failure, timeout, or 5xx. Retrying may succeed.
pub const EXIT_TRANSIENT: u8 = 4;

pub fn engine_exit_code(err: &EngineError) -> u8 {
    match err {
        EngineError::Conflict { .. }
        | EngineError::PartialFailure { .. }
        | EngineError::Rejected { .. } => EXIT_SAVE_REJECTED,
        EngineError::Transient(_) => EXIT_TRANSIENT,
        EngineError::Backend(_) => EXIT_ERROR,
        EngineError::Validation(_)
        | EngineError::DayOutOfRange { .. }
        | EngineError::UnknownEmployee(_)
        | EngineError::UnknownChange(_) => EXIT_USAGE,
        _ => EXIT_ERROR,
    }
}

pub fn backend_exit_code(err: &BackendError) -> u8 {
    match err {
        BackendError::Unavailable(_) => EXIT_TRANSIENT,
        BackendError::Http(..) | BackendError::Parse(_) => EXIT_ERROR,
    }
}
