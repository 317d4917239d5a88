//! Batch operations: declarative multi-cell edits expanded into one group.
//!
//! Every expansion reads the current values once, before any write, so a
//! batch never observes its own output (copying day 10 onto days 10..12
//! copies the original day-10 value everywhere).

use serde::Deserialize;

use crate::calendar::MonthKey;
use crate::cell_key::CellKey;
use crate::change::{CellChange, ChangeOrigin, Clock, EditGroup};
use crate::error::EngineError;
use crate::grid::Roster;
use crate::overlay::CellValues;
use crate::shift_code;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Assign,
    Clear,
    Copy,
    Pattern,
}

impl std::fmt::Display for BatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assign => write!(f, "assign"),
            Self::Clear => write!(f, "clear"),
            Self::Copy => write!(f, "copy"),
            Self::Pattern => write!(f, "pattern"),
        }
    }
}

/// Transient description of a batch edit. Never stored; expanded
/// immediately into an [`EditGroup`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct BatchOperationSpec {
    pub kind: BatchKind,
    pub employee_ids: Vec<String>,
    /// Required for assign, clear and copy. For pattern, empty means every
    /// day of the month.
    #[serde(default)]
    pub target_days: Vec<u32>,
    /// Required for copy.
    #[serde(default)]
    pub source_day: Option<u32>,
    /// Required (non-empty) for pattern.
    #[serde(default)]
    pub pattern_values: Vec<String>,
    /// Value written by assign.
    #[serde(default)]
    pub value: String,
}

impl BatchOperationSpec {
    pub fn assign(employee_ids: Vec<String>, target_days: Vec<u32>, value: impl Into<String>) -> Self {
        Self {
            kind: BatchKind::Assign,
            employee_ids,
            target_days,
            source_day: None,
            pattern_values: Vec::new(),
            value: value.into(),
        }
    }

    pub fn clear(employee_ids: Vec<String>, target_days: Vec<u32>) -> Self {
        Self {
            kind: BatchKind::Clear,
            employee_ids,
            target_days,
            source_day: None,
            pattern_values: Vec::new(),
            value: String::new(),
        }
    }

    pub fn copy(employee_ids: Vec<String>, source_day: u32, target_days: Vec<u32>) -> Self {
        Self {
            kind: BatchKind::Copy,
            employee_ids,
            target_days,
            source_day: Some(source_day),
            pattern_values: Vec::new(),
            value: String::new(),
        }
    }

    pub fn pattern(employee_ids: Vec<String>, target_days: Vec<u32>, pattern_values: Vec<String>) -> Self {
        Self {
            kind: BatchKind::Pattern,
            employee_ids,
            target_days,
            source_day: None,
            pattern_values,
            value: String::new(),
        }
    }
}

/// Month and roster the spec is validated against.
#[derive(Clone, Copy)]
pub struct ExpandContext<'a> {
    pub month: MonthKey,
    pub roster: &'a Roster,
}

/// Validate `spec` and expand it into one edit group.
///
/// Nothing is mutated here except the clock; on error no ids are handed
/// out to any recorded change.
pub fn expand(
    spec: &BatchOperationSpec,
    ctx: ExpandContext<'_>,
    current: &dyn CellValues,
    clock: &mut Clock,
) -> Result<EditGroup, EngineError> {
    let employees = validate_employees(spec, ctx.roster)?;
    let days = target_days(spec, ctx.month)?;

    // Planned (key, new value) pairs, employee order as given, days ascending.
    let planned: Vec<(CellKey, String)> = match spec.kind {
        BatchKind::Assign => {
            let value = shift_code::normalize(&spec.value);
            cross(&employees, &days, |_, _| value.clone())
        }
        BatchKind::Clear => cross(&employees, &days, |_, _| String::new()),
        BatchKind::Copy => {
            let source = spec
                .source_day
                .ok_or_else(|| EngineError::Validation("copy requires a source day".into()))?;
            check_day(ctx.month, source)?;
            let targets: Vec<u32> = days.iter().copied().filter(|d| *d != source).collect();
            if targets.is_empty() {
                return Err(EngineError::Validation(
                    "copy has no target days besides the source day".into(),
                ));
            }
            // Snapshot every source value before producing any write.
            let sources: Vec<String> = employees
                .iter()
                .map(|e| current.value_at(&CellKey::new(*e, source)))
                .collect();
            employees
                .iter()
                .zip(sources)
                .flat_map(|(e, value)| {
                    targets.iter().map(move |d| (CellKey::new(*e, *d), value.clone()))
                })
                .collect()
        }
        BatchKind::Pattern => {
            let values: Vec<String> = spec.pattern_values.iter().map(|v| shift_code::normalize(v)).collect();
            cross(&employees, &days, |_, i| values[i % values.len()].clone())
        }
    };

    let group = clock.next_group_id();
    let changes = planned
        .into_iter()
        .map(|(key, new_value)| {
            let employee = ctx.roster.get(&key.employee_id);
            CellChange {
                id: clock.next_change_id(),
                old_value: current.value_at(&key),
                employee_name: employee.map(|e| e.name.clone()).unwrap_or_default(),
                employee_rut: employee.map(|e| e.rut.clone()).unwrap_or_default(),
                key,
                new_value,
                timestamp: clock.tick(),
                origin: ChangeOrigin::BatchExpansion { group, kind: spec.kind },
            }
        })
        .collect::<Vec<_>>();

    let description = match spec.kind {
        BatchKind::Assign => format!("Assign {} to {} cell(s)", shift_code::display(&shift_code::normalize(&spec.value)), changes.len()),
        BatchKind::Clear => format!("Clear {} cell(s)", changes.len()),
        BatchKind::Copy => format!("Copy day {} to {} cell(s)", spec.source_day.unwrap_or_default(), changes.len()),
        BatchKind::Pattern => format!("Pattern over {} cell(s)", changes.len()),
    };

    Ok(EditGroup { id: group, description, changes })
}

/// Employee ids, de-duplicated in first-seen order, all in the roster.
fn validate_employees<'s>(spec: &'s BatchOperationSpec, roster: &Roster) -> Result<Vec<&'s str>, EngineError> {
    if spec.employee_ids.is_empty() {
        return Err(EngineError::Validation(format!("{} requires at least one employee", spec.kind)));
    }
    let mut out: Vec<&str> = Vec::with_capacity(spec.employee_ids.len());
    for id in &spec.employee_ids {
        if !roster.contains(id) {
            return Err(EngineError::UnknownEmployee(id.clone()));
        }
        if !out.contains(&id.as_str()) {
            out.push(id);
        }
    }
    Ok(out)
}

/// Target days, sorted ascending and de-duplicated.
fn target_days(spec: &BatchOperationSpec, month: MonthKey) -> Result<Vec<u32>, EngineError> {
    if spec.kind == BatchKind::Pattern && spec.pattern_values.is_empty() {
        return Err(EngineError::Validation("pattern requires at least one value".into()));
    }
    if spec.target_days.is_empty() {
        return match spec.kind {
            BatchKind::Pattern => Ok(month.day_range().collect()),
            kind => Err(EngineError::Validation(format!("{kind} requires at least one target day"))),
        };
    }
    let mut days = spec.target_days.clone();
    days.sort_unstable();
    days.dedup();
    for day in &days {
        check_day(month, *day)?;
    }
    Ok(days)
}

fn check_day(month: MonthKey, day: u32) -> Result<(), EngineError> {
    if month.contains_day(day) {
        Ok(())
    } else {
        Err(EngineError::DayOutOfRange { day, days_in_month: month.days() })
    }
}

/// Every employee × day. `value` receives the day and its index among the
/// sorted target days.
fn cross(employees: &[&str], days: &[u32], mut value: impl FnMut(u32, usize) -> String) -> Vec<(CellKey, String)> {
    let mut out = Vec::with_capacity(employees.len() * days.len());
    for employee in employees {
        for (i, day) in days.iter().enumerate() {
            out.push((CellKey::new(*employee, *day), value(*day, i)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::grid::Employee;

    fn roster() -> Roster {
        Roster::new(
            ["A", "B"]
                .iter()
                .map(|id| Employee { id: id.to_string(), name: format!("Emp {id}"), rut: format!("{id}-9") })
                .collect(),
        )
    }

    fn month() -> MonthKey {
        MonthKey::new(2024, 6).unwrap()
    }

    fn current() -> HashMap<CellKey, String> {
        let mut map = HashMap::new();
        map.insert(CellKey::new("A", 10), "N".to_string());
        map.insert(CellKey::new("A", 11), "M".to_string());
        map.insert(CellKey::new("B", 10), "L".to_string());
        map
    }

    fn run(spec: &BatchOperationSpec) -> Result<EditGroup, EngineError> {
        let roster = roster();
        let mut clock = Clock::new();
        expand(spec, ExpandContext { month: month(), roster: &roster }, &current(), &mut clock)
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_assign_cross_product_single_group() {
        let group = run(&BatchOperationSpec::assign(ids(&["A", "B"]), vec![3, 1, 2], "v")).unwrap();
        assert_eq!(group.len(), 6);
        let keys: Vec<String> = group.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["A/1", "A/2", "A/3", "B/1", "B/2", "B/3"]);
        assert!(group.changes.iter().all(|c| c.new_value == "V"));
        assert!(group.changes.iter().all(|c| c.origin.group() == group.id));
        assert_eq!(group.changes[0].employee_name, "Emp A");
        assert_eq!(group.changes[3].employee_rut, "B-9");
    }

    #[test]
    fn test_clear_records_old_values() {
        let group = run(&BatchOperationSpec::clear(ids(&["A"]), vec![10, 11])).unwrap();
        let olds: Vec<&str> = group.changes.iter().map(|c| c.old_value.as_str()).collect();
        assert_eq!(olds, vec!["N", "M"]);
        assert!(group.changes.iter().all(CellChange::is_clear));
    }

    #[test]
    fn test_copy_reads_source_once_and_skips_source_day() {
        let group = run(&BatchOperationSpec::copy(ids(&["A", "B"]), 10, vec![10, 11, 12])).unwrap();
        let got: Vec<(String, &str, &str)> = group
            .changes
            .iter()
            .map(|c| (c.key.to_string(), c.old_value.as_str(), c.new_value.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("A/11".to_string(), "M", "N"),
                ("A/12".to_string(), "", "N"),
                ("B/11".to_string(), "", "L"),
                ("B/12".to_string(), "", "L"),
            ]
        );
    }

    #[test]
    fn test_copy_only_source_day_is_invalid() {
        assert!(matches!(
            run(&BatchOperationSpec::copy(ids(&["A"]), 10, vec![10])),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_pattern_cycles_over_sorted_days() {
        let spec = BatchOperationSpec::pattern(ids(&["A"]), vec![5, 1, 3, 2, 4], ids(&["m", "t", "n"]));
        let group = run(&spec).unwrap();
        let values: Vec<&str> = group.changes.iter().map(|c| c.new_value.as_str()).collect();
        assert_eq!(values, vec!["M", "T", "N", "M", "T"]);
        assert_eq!(group.changes[0].key.day, 1);
    }

    #[test]
    fn test_pattern_without_days_covers_month() {
        let group = run(&BatchOperationSpec::pattern(ids(&["B"]), vec![], ids(&["X"]))).unwrap();
        assert_eq!(group.len(), 30);
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            run(&BatchOperationSpec::assign(vec![], vec![1], "V")),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            run(&BatchOperationSpec::clear(ids(&["A"]), vec![])),
            Err(EngineError::Validation(_))
        ));
        let mut copy = BatchOperationSpec::copy(ids(&["A"]), 1, vec![2]);
        copy.source_day = None;
        assert!(matches!(run(&copy), Err(EngineError::Validation(_))));
        assert!(matches!(
            run(&BatchOperationSpec::pattern(ids(&["A"]), vec![1], vec![])),
            Err(EngineError::Validation(_))
        ));
        assert_eq!(
            run(&BatchOperationSpec::assign(ids(&["Z"]), vec![1], "V")),
            Err(EngineError::UnknownEmployee("Z".into()))
        );
        assert_eq!(
            run(&BatchOperationSpec::assign(ids(&["A"]), vec![31], "V")),
            Err(EngineError::DayOutOfRange { day: 31, days_in_month: 30 })
        );
    }

    #[test]
    fn test_duplicate_employees_and_days_collapse() {
        let group = run(&BatchOperationSpec::assign(ids(&["A", "A"]), vec![1, 1, 2], "V")).unwrap();
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn test_batch_deserializes_with_defaults() {
        let json = r#"{"kind":"copy","employee_ids":["A"],"source_day":10,"target_days":[11,12]}"#;
        let spec: BatchOperationSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec, BatchOperationSpec::copy(ids(&["A"]), 10, vec![11, 12]));
    }
}
