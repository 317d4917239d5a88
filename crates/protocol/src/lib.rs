//! shiftgrid Backend Protocol - v1 Wire Format
//!
//! This crate defines the canonical wire types exchanged between the editor
//! and the schedule backend of record. Everything here is JSON over HTTP.
//!
//! # Protocol Version
//!
//! This is **protocol v1**. Changes to field names or enum tags require:
//! 1. Version bump in PROTOCOL_VERSION
//! 2. Updated golden tests at the bottom of this file
//! 3. Backward compatibility handling in `shiftgrid-backend-client`
//!
//! # Usage
//!
//! ```ignore
//! use shiftgrid_protocol::{SaveRequest, SaveResponse};
//!
//! let body = serde_json::to_string(&request)?;
//! let response: SaveResponse = serde_json::from_str(&text)?;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current protocol version. Increment for breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

// =============================================================================
// Base Data (backend → editor)
// =============================================================================

/// One month of server-confirmed schedule data.
///
/// Records are sparse: a missing (employee, day) pair means "no shift".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthData {
    pub year: i32,
    pub month: u32,
    pub employees: Vec<EmployeeInfo>,
    #[serde(default)]
    pub records: Vec<ShiftRecord>,
}

/// Display metadata for an employee row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rut: String,
}

/// A single confirmed cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub employee_id: String,
    pub day: u32,
    pub shift: String,
}

// =============================================================================
// Save (editor → backend → editor)
// =============================================================================

/// Batch of pending edits submitted in one save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    /// Idempotency key. A retried submission carries a fresh id.
    pub request_id: Uuid,
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub notify: Vec<String>,
    pub employees: Vec<EmployeeChanges>,
}

impl SaveRequest {
    /// Total number of change records across all employees.
    pub fn change_count(&self) -> usize {
        self.employees.iter().map(|e| e.changes.len()).sum()
    }

    /// Iterate every change record in submission order.
    pub fn changes(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.employees.iter().flat_map(|e| e.changes.iter())
    }
}

/// Pending edits for one employee, days ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeChanges {
    pub employee_id: String,
    pub changes: Vec<ChangeRecord>,
}

/// One cell transition. An empty `new_value` deletes the shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub employee_id: String,
    pub day: u32,
    pub old_value: String,
    pub new_value: String,
}

/// Backend verdict on a save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveResponse {
    /// Every record was applied.
    Accepted,
    /// Nothing was applied.
    Rejected {
        kind: RejectionKind,
        message: String,
    },
    /// Per-record verdicts. Accepted records are applied, the rest are not.
    Partial { outcomes: Vec<RecordOutcome> },
}

/// Why a save (or a single record) was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// Malformed payload (unknown employee, bad day, bad code).
    Validation,
    /// Server-side current value no longer matches `old_value`.
    Conflict,
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Conflict => write!(f, "conflict"),
        }
    }
}

/// Verdict for a single record in a partial save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub employee_id: String,
    pub day: u32,
    #[serde(flatten)]
    pub verdict: RecordVerdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordVerdict {
    Accepted,
    Rejected {
        kind: RejectionKind,
        reason: String,
    },
}

impl RecordOutcome {
    pub fn accepted(employee_id: impl Into<String>, day: u32) -> Self {
        Self {
            employee_id: employee_id.into(),
            day,
            verdict: RecordVerdict::Accepted,
        }
    }

    pub fn rejected(
        employee_id: impl Into<String>,
        day: u32,
        kind: RejectionKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            employee_id: employee_id.into(),
            day,
            verdict: RecordVerdict::Rejected {
                kind,
                reason: reason.into(),
            },
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.verdict, RecordVerdict::Accepted)
    }
}

// =============================================================================
// Notification side-channel
// =============================================================================

/// Sent after a successful save to the selected recipients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub year: i32,
    pub month: u32,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub comment: String,
    pub changes: Vec<ChangeRecord>,
}

// =============================================================================
// Audit feed (read-only)
// =============================================================================

/// A change persisted by the backend's own handling of a save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub employee: String,
    pub day: u32,
    #[serde(default)]
    pub old_shift: String,
    #[serde(default)]
    pub new_shift: String,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    #[serde(default)]
    pub comment: String,
}

// =============================================================================
// Golden wire tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_response_accepted_tag() {
        let json = serde_json::to_string(&SaveResponse::Accepted).unwrap();
        assert_eq!(json, r#"{"status":"accepted"}"#);
    }

    #[test]
    fn save_response_partial_parses_flattened_verdicts() {
        let json = r#"{
            "status": "partial",
            "outcomes": [
                {"employee_id": "A", "day": 3, "outcome": "accepted"},
                {"employee_id": "B", "day": 4, "outcome": "rejected",
                 "kind": "conflict", "reason": "value changed to N"}
            ]
        }"#;
        let parsed: SaveResponse = serde_json::from_str(json).unwrap();
        let SaveResponse::Partial { outcomes } = parsed else {
            panic!("expected partial");
        };
        assert_eq!(outcomes[0], RecordOutcome::accepted("A", 3));
        assert_eq!(
            outcomes[1],
            RecordOutcome::rejected("B", 4, RejectionKind::Conflict, "value changed to N")
        );
        assert!(!outcomes[1].is_accepted());
    }

    #[test]
    fn save_response_rejected_carries_kind() {
        let json = r#"{"status":"rejected","kind":"validation","message":"unknown employee"}"#;
        let parsed: SaveResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed,
            SaveResponse::Rejected {
                kind: RejectionKind::Validation,
                message: "unknown employee".into(),
            }
        );
    }

    #[test]
    fn month_data_records_default_empty() {
        let json = r#"{"year":2024,"month":2,"employees":[{"id":"A","name":"Ana"}]}"#;
        let parsed: MonthData = serde_json::from_str(json).unwrap();
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.employees[0].rut, "");
    }

    #[test]
    fn save_request_counts_changes_across_employees() {
        let request = SaveRequest {
            request_id: Uuid::nil(),
            year: 2024,
            month: 5,
            comment: "ajuste".into(),
            notify: vec![],
            employees: vec![
                EmployeeChanges {
                    employee_id: "A".into(),
                    changes: vec![
                        ChangeRecord { employee_id: "A".into(), day: 1, old_value: "M".into(), new_value: "T".into() },
                        ChangeRecord { employee_id: "A".into(), day: 2, old_value: "".into(), new_value: "N".into() },
                    ],
                },
                EmployeeChanges {
                    employee_id: "B".into(),
                    changes: vec![ChangeRecord { employee_id: "B".into(), day: 9, old_value: "L".into(), new_value: "".into() }],
                },
            ],
        };
        assert_eq!(request.change_count(), 3);
        let days: Vec<u32> = request.changes().map(|c| c.day).collect();
        assert_eq!(days, vec![1, 2, 9]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["request_id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["employees"][1]["changes"][0]["new_value"], "");
    }

    #[test]
    fn audit_record_parses_rfc3339() {
        let json = r#"{"employee":"A","day":5,"old_shift":"M","new_shift":"T",
            "changed_by":"jefa","changed_at":"2024-05-02T10:00:00Z","comment":"ajuste"}"#;
        let parsed: AuditRecord = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.changed_at.to_rfc3339(), "2024-05-02T10:00:00+00:00");
    }
}
