#![allow(dead_code)]

use shiftgrid_engine::{EditorOptions, MemoryBackend, MonthKey, ScheduleEditor};
use shiftgrid_protocol::{EmployeeInfo, MonthData, ShiftRecord};

/// April 2025. A works mornings days 1-7 and a night on day 10, B an
/// afternoon on day 2, C has nothing.
pub fn april() -> MonthData {
    let record = |id: &str, day: u32, shift: &str| ShiftRecord {
        employee_id: id.to_string(),
        day,
        shift: shift.to_string(),
    };
    let mut records: Vec<ShiftRecord> = (1..=7).map(|d| record("A", d, "M")).collect();
    records.push(record("A", 10, "N"));
    records.push(record("B", 2, "T"));

    MonthData {
        year: 2025,
        month: 4,
        employees: ["A", "B", "C"]
            .iter()
            .map(|id| EmployeeInfo { id: id.to_string(), name: format!("Employee {id}"), rut: String::new() })
            .collect(),
        records,
    }
}

pub fn april_key() -> MonthKey {
    MonthKey::new(2025, 4).unwrap()
}

pub fn setup() -> (ScheduleEditor, MemoryBackend) {
    setup_with(EditorOptions::default())
}

pub fn setup_with(options: EditorOptions) -> (ScheduleEditor, MemoryBackend) {
    let backend = MemoryBackend::new().with_author("jefe");
    backend.insert_month(april());
    let mut editor = ScheduleEditor::new(options);
    editor.load(&backend, april_key()).unwrap();
    editor.drain_events();
    (editor, backend)
}
