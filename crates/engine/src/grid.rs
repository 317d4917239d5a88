//! Server-confirmed base data for the active month.

use std::collections::HashMap;

use shiftgrid_protocol::MonthData;

use crate::calendar::MonthKey;
use crate::cell_key::CellKey;
use crate::error::EngineError;
use crate::shift_code;

/// Display metadata for an employee row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub rut: String,
}

/// Ordered employee list with id lookup.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    employees: Vec<Employee>,
    index: HashMap<String, usize>,
}

impl Roster {
    pub fn new(employees: Vec<Employee>) -> Self {
        let index = employees
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        Self { employees, index }
    }

    pub fn get(&self, id: &str) -> Option<&Employee> {
        self.index.get(id).map(|&i| &self.employees[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Employee> {
        self.employees.iter()
    }

    pub fn len(&self) -> usize {
        self.employees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
    }
}

/// Sparse (employee, day) → shift code map for one month.
#[derive(Clone, Debug)]
pub struct BaseGrid {
    month: MonthKey,
    roster: Roster,
    values: HashMap<CellKey, String>,
}

impl BaseGrid {
    pub fn new(month: MonthKey, roster: Roster) -> Self {
        Self { month, roster, values: HashMap::new() }
    }

    /// Build from backend month data.
    ///
    /// Records for unknown employees or days outside the month are dropped
    /// with a warning rather than failing the whole load.
    pub fn from_month_data(data: &MonthData) -> Result<Self, EngineError> {
        let month = MonthKey::new(data.year, data.month)?;
        let roster = Roster::new(
            data.employees
                .iter()
                .map(|e| Employee { id: e.id.clone(), name: e.name.clone(), rut: e.rut.clone() })
                .collect(),
        );
        let mut grid = Self::new(month, roster);
        for record in &data.records {
            if !grid.roster.contains(&record.employee_id) {
                log::warn!("Dropping {} record for unknown employee {}", month, record.employee_id);
                continue;
            }
            if !month.contains_day(record.day) {
                log::warn!("Dropping {} record with day {} out of range", month, record.day);
                continue;
            }
            grid.set(CellKey::new(record.employee_id.clone(), record.day), &record.shift);
        }
        Ok(grid)
    }

    pub fn month(&self) -> MonthKey {
        self.month
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Confirmed value at `key`, or "" when the cell has no shift.
    pub fn get(&self, key: &CellKey) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    /// Store a confirmed value. Empty values are removed to keep the map sparse.
    pub fn set(&mut self, key: CellKey, value: &str) {
        let value = shift_code::normalize(value);
        if value.is_empty() {
            self.values.remove(&key);
        } else {
            self.values.insert(key, value);
        }
    }

    /// Number of non-empty cells.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
