//! Test harness: an editor wired to an in-memory backend holding the same
//! month it was initialized with.
//!
//! April 2025 (30 days), three employees:
//! - `A` Ana: M on days 1..=7
//! - `B` Beto: T on day 2
//! - `C` Carla: nothing assigned

use shiftgrid_protocol::{EmployeeInfo, MonthData, ShiftRecord};

use crate::backend::MemoryBackend;
use crate::calendar::MonthKey;
use crate::editor::{EditorOptions, ScheduleEditor};

pub const YEAR: i32 = 2025;
pub const MONTH: u32 = 4;

pub fn fixture_key() -> MonthKey {
    MonthKey { year: YEAR, month: MONTH }
}

pub fn fixture_month() -> MonthData {
    let employee = |id: &str, name: &str| EmployeeInfo {
        id: id.to_string(),
        name: name.to_string(),
        rut: format!("{id}-rut"),
    };
    let record = |id: &str, day: u32, shift: &str| ShiftRecord {
        employee_id: id.to_string(),
        day,
        shift: shift.to_string(),
    };

    let mut records: Vec<ShiftRecord> = (1..=7).map(|d| record("A", d, "M")).collect();
    records.push(record("B", 2, "T"));

    MonthData {
        year: YEAR,
        month: MONTH,
        employees: vec![employee("A", "Ana"), employee("B", "Beto"), employee("C", "Carla")],
        records,
    }
}

pub struct Fixture {
    pub editor: ScheduleEditor,
    pub backend: MemoryBackend,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_options(EditorOptions::default())
    }

    pub fn with_options(options: EditorOptions) -> Self {
        let backend = MemoryBackend::new().with_author("tester");
        backend.insert_month(fixture_month());

        let mut editor = ScheduleEditor::new(options);
        editor
            .load(&backend, fixture_key())
            .expect("fixture month loads");
        editor.drain_events();
        Self { editor, backend }
    }

    /// Projected row for an employee as owned strings, day 1 first.
    pub fn row(&self, employee_id: &str) -> Vec<String> {
        self.editor
            .overlay()
            .map(|o| o.row(employee_id).into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_loads_month() {
        let fx = Fixture::new();
        assert_eq!(fx.editor.month(), Some(fixture_key()));
        assert_eq!(fx.editor.project("A", 7), "M");
        assert_eq!(fx.editor.project("A", 8), "");
        assert_eq!(fx.row("B").len(), 30);
        assert!(fx.editor.events().is_empty());
    }
}
