//! Cell identity for the schedule grid.
//!
//! A `CellKey` identifies one (employee, day) cell of the active month.

/// Unique identifier for a grid cell.
///
/// Ordering is employee first, then day, which is the order pending changes
/// are serialized in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    /// Stable backend id of the employee (never the display name)
    pub employee_id: String,
    /// Day of month (1-based)
    pub day: u32,
}

impl CellKey {
    #[inline]
    pub fn new(employee_id: impl Into<String>, day: u32) -> Self {
        Self { employee_id: employee_id.into(), day }
    }
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.employee_id, self.day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_key_equality() {
        let a = CellKey::new("A", 1);
        let b = CellKey::new("A", 1);
        let c = CellKey::new("B", 1);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cell_key_ordering_is_employee_then_day() {
        let mut keys = vec![CellKey::new("B", 1), CellKey::new("A", 10), CellKey::new("A", 2)];
        keys.sort();
        assert_eq!(keys, vec![CellKey::new("A", 2), CellKey::new("A", 10), CellKey::new("B", 1)]);
    }

    #[test]
    fn test_cell_key_display() {
        assert_eq!(CellKey::new("emp-7", 31).to_string(), "emp-7/31");
    }
}
