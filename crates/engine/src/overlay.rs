//! Overlay projection: base data merged with pending edits.
//!
//! Projection is a pure read. Calling it any number of times without an
//! intervening mutation returns the same values.

use std::collections::HashMap;

use crate::cell_key::CellKey;
use crate::change_log::ChangeLog;
use crate::grid::BaseGrid;

/// Read access to the value currently shown for a cell.
///
/// The batch expander reads through this so it can run against a live
/// overlay or a plain map in tests.
pub trait CellValues {
    fn value_at(&self, key: &CellKey) -> String;
}

impl CellValues for HashMap<CellKey, String> {
    fn value_at(&self, key: &CellKey) -> String {
        self.get(key).cloned().unwrap_or_default()
    }
}

/// Borrowed view combining confirmed base values with the Change Index.
#[derive(Clone, Copy)]
pub struct Overlay<'a> {
    base: &'a BaseGrid,
    log: &'a ChangeLog,
}

impl<'a> Overlay<'a> {
    pub fn new(base: &'a BaseGrid, log: &'a ChangeLog) -> Self {
        Self { base, log }
    }

    /// Active pending value for `key`, falling back to the base value.
    /// Empty means cleared.
    pub fn project(&self, key: &CellKey) -> &'a str {
        match self.log.lookup(key) {
            Some(change) => change.new_value.as_str(),
            None => self.base.get(key),
        }
    }

    /// True when the displayed value comes from a pending edit.
    pub fn is_pending(&self, key: &CellKey) -> bool {
        self.log.lookup(key).is_some()
    }

    /// Projected values for every day of the month for one employee,
    /// index 0 = day 1.
    pub fn row(&self, employee_id: &str) -> Vec<&'a str> {
        self.base
            .month()
            .day_range()
            .map(|day| self.project(&CellKey::new(employee_id, day)))
            .collect()
    }
}

impl CellValues for Overlay<'_> {
    fn value_at(&self, key: &CellKey) -> String {
        self.project(key).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::MonthKey;
    use crate::change::{CellChange, ChangeOrigin, Clock};
    use crate::grid::{Employee, Roster};

    fn base() -> BaseGrid {
        let roster = Roster::new(vec![Employee { id: "A".into(), name: "Ana".into(), rut: String::new() }]);
        let mut grid = BaseGrid::new(MonthKey::new(2023, 2).unwrap(), roster);
        grid.set(CellKey::new("A", 1), "M");
        grid.set(CellKey::new("A", 2), "T");
        grid
    }

    fn record(log: &mut ChangeLog, clock: &mut Clock, day: u32, old: &str, new: &str) {
        let group = clock.next_group_id();
        log.record(CellChange {
            id: clock.next_change_id(),
            key: CellKey::new("A", day),
            employee_name: "Ana".into(),
            employee_rut: String::new(),
            old_value: old.into(),
            new_value: new.into(),
            timestamp: clock.tick(),
            origin: ChangeOrigin::DirectEdit { group },
        });
    }

    #[test]
    fn test_project_falls_back_to_base() {
        let grid = base();
        let log = ChangeLog::new();
        let overlay = Overlay::new(&grid, &log);
        assert_eq!(overlay.project(&CellKey::new("A", 1)), "M");
        assert_eq!(overlay.project(&CellKey::new("A", 3)), "");
        assert!(!overlay.is_pending(&CellKey::new("A", 1)));
    }

    #[test]
    fn test_project_prefers_pending_including_clear() {
        let grid = base();
        let mut log = ChangeLog::new();
        let mut clock = Clock::new();
        record(&mut log, &mut clock, 1, "M", "N");
        record(&mut log, &mut clock, 2, "T", "");

        let overlay = Overlay::new(&grid, &log);
        assert_eq!(overlay.project(&CellKey::new("A", 1)), "N");
        assert_eq!(overlay.project(&CellKey::new("A", 2)), "");
        assert!(overlay.is_pending(&CellKey::new("A", 2)));
    }

    #[test]
    fn test_project_is_idempotent() {
        let grid = base();
        let mut log = ChangeLog::new();
        let mut clock = Clock::new();
        record(&mut log, &mut clock, 1, "M", "N");
        let overlay = Overlay::new(&grid, &log);
        let first = overlay.row("A");
        let second = overlay.row("A");
        assert_eq!(first, second);
    }

    #[test]
    fn test_row_spans_calendar_month() {
        let grid = base();
        let log = ChangeLog::new();
        let row = Overlay::new(&grid, &log).row("A");
        assert_eq!(row.len(), 28);
        assert_eq!(&row[..3], &["M", "T", ""]);
    }
}
