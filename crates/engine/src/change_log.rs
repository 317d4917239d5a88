//! Change Index and per-key change log.
//!
//! Every recorded change lives in one store; each key owns a stack of the
//! change ids that are currently active for it, bottom (oldest) to top
//! (newest). The top of a key's stack is the key's Change Index entry.
//!
//! Undone changes leave their key's stack but stay in the store so redo can
//! reinstate them. Changes are only dropped from the store when they can no
//! longer be reached (redo invalidated, discarded, or saved).
//!
//! ## Re-linking
//!
//! Discarding an entry from the middle of a stack re-links the entry above
//! it: its `old_value` becomes the discarded entry's `old_value`, so the
//! stack never has a gap between one entry's `new_value` and the next
//! entry's `old_value`.

use std::collections::{BTreeMap, HashMap};

use shiftgrid_protocol::{ChangeRecord, EmployeeChanges};

use crate::cell_key::CellKey;
use crate::change::{CellChange, ChangeId};
use crate::error::EngineError;

/// Result of discarding one specific change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discarded {
    pub change: CellChange,
    /// Entry whose `old_value` was rewritten to close the gap, if any.
    pub relinked: Option<ChangeId>,
    /// True when the discarded change was the key's active entry.
    pub was_top: bool,
}

#[derive(Debug, Default)]
pub struct ChangeLog {
    changes: HashMap<ChangeId, CellChange>,
    stacks: HashMap<CellKey, Vec<ChangeId>>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `change` onto its key's stack and make it the active entry.
    pub fn record(&mut self, change: CellChange) -> CellChange {
        self.stacks.entry(change.key.clone()).or_default().push(change.id);
        self.changes.insert(change.id, change.clone());
        change
    }

    /// Active change for `key`, if the key has a pending edit.
    pub fn lookup(&self, key: &CellKey) -> Option<&CellChange> {
        self.stacks
            .get(key)
            .and_then(|stack| stack.last())
            .and_then(|id| self.changes.get(id))
    }

    /// Any stored change, active or undone-but-redoable.
    pub fn get(&self, id: ChangeId) -> Option<&CellChange> {
        self.changes.get(&id)
    }

    /// True when `id` is on its key's stack.
    pub fn is_active(&self, id: ChangeId) -> bool {
        self.changes
            .get(&id)
            .and_then(|c| self.stacks.get(&c.key))
            .is_some_and(|stack| stack.contains(&id))
    }

    /// Active entries for `key`, bottom to top.
    pub fn stack(&self, key: &CellKey) -> Vec<&CellChange> {
        self.stacks
            .get(key)
            .map(|ids| ids.iter().filter_map(|id| self.changes.get(id)).collect())
            .unwrap_or_default()
    }

    /// Value of `key` before its first still-active edit.
    pub fn effective_old_value(&self, key: &CellKey) -> Option<&str> {
        self.stacks
            .get(key)
            .and_then(|stack| stack.first())
            .and_then(|id| self.changes.get(id))
            .map(|c| c.old_value.as_str())
    }

    /// Deactivate `id`, which must be the top of its key's stack. The change
    /// stays in the store for a later `reinstate`.
    pub fn pop(&mut self, id: ChangeId) -> Result<&CellChange, EngineError> {
        let key = self.changes.get(&id).map(|c| c.key.clone()).ok_or(EngineError::UnknownChange(id))?;
        let stack = self.stacks.get_mut(&key).ok_or(EngineError::UnknownChange(id))?;
        if stack.last() != Some(&id) {
            return Err(EngineError::UnknownChange(id));
        }
        stack.pop();
        if stack.is_empty() {
            self.stacks.remove(&key);
        }
        self.changes.get(&id).ok_or(EngineError::UnknownChange(id))
    }

    /// Push a stored, inactive change back on top of its key's stack.
    ///
    /// `old_value` is rewritten to `current` (the projected value right now)
    /// so the no-gap invariant holds even if the stack below changed while
    /// this change was undone.
    pub fn reinstate(&mut self, id: ChangeId, current: &str) -> Result<&CellChange, EngineError> {
        if self.is_active(id) {
            return Err(EngineError::UnknownChange(id));
        }
        let change = self.changes.get_mut(&id).ok_or(EngineError::UnknownChange(id))?;
        if change.old_value != current {
            log::debug!("Re-linking {} old value {:?} -> {:?}", id, change.old_value, current);
            change.old_value = current.to_string();
        }
        self.stacks.entry(change.key.clone()).or_default().push(id);
        Ok(change)
    }

    /// Remove exactly `id` from its key's stack and from the store,
    /// re-linking the entry above it when it was not the top.
    pub fn discard(&mut self, id: ChangeId) -> Result<Discarded, EngineError> {
        let key = self.changes.get(&id).map(|c| c.key.clone()).ok_or(EngineError::UnknownChange(id))?;
        let stack = self.stacks.get_mut(&key).ok_or(EngineError::UnknownChange(id))?;
        let pos = stack.iter().position(|c| *c == id).ok_or(EngineError::UnknownChange(id))?;

        stack.remove(pos);
        let was_top = pos == stack.len();
        let above = stack.get(pos).copied();
        if stack.is_empty() {
            self.stacks.remove(&key);
        }

        let change = self.changes.remove(&id).ok_or(EngineError::UnknownChange(id))?;
        if let Some(above_id) = above {
            if let Some(next) = self.changes.get_mut(&above_id) {
                next.old_value = change.old_value.clone();
            }
        }

        Ok(Discarded { change, relinked: above, was_top })
    }

    /// Drop an inactive change from the store (redo invalidated).
    pub fn forget(&mut self, id: ChangeId) {
        if !self.is_active(id) {
            self.changes.remove(&id);
        }
    }

    /// Remove every active entry of `key` from the stack and the store.
    /// Returns the removed ids, bottom to top.
    pub fn clear_key(&mut self, key: &CellKey) -> Vec<ChangeId> {
        let ids = self.stacks.remove(key).unwrap_or_default();
        for id in &ids {
            self.changes.remove(id);
        }
        ids
    }

    /// Ids of stored but inactive changes for `key`.
    pub fn inactive_for(&self, key: &CellKey) -> Vec<ChangeId> {
        self.changes
            .values()
            .filter(|c| &c.key == key && !self.is_active(c.id))
            .map(|c| c.id)
            .collect()
    }

    /// Keys with a pending edit, ascending.
    pub fn active_keys(&self) -> Vec<CellKey> {
        let mut keys: Vec<CellKey> = self.stacks.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Every active change (all stack levels), newest first.
    pub fn active_changes(&self) -> Vec<&CellChange> {
        let mut out: Vec<&CellChange> = self
            .stacks
            .values()
            .flatten()
            .filter_map(|id| self.changes.get(id))
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out
    }

    /// Number of keys with a pending edit.
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Number of stored changes, including undone ones.
    pub fn stored(&self) -> usize {
        self.changes.len()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
        self.stacks.clear();
    }

    /// Materialize the active entries grouped by employee, days ascending.
    pub fn snapshot(&self) -> PendingChangeSet {
        let mut by_employee: BTreeMap<&str, Vec<PendingCell>> = BTreeMap::new();
        for key in self.active_keys() {
            let (Some(top), Some(old)) = (self.lookup(&key), self.effective_old_value(&key)) else {
                continue;
            };
            let cell = PendingCell {
                change_id: top.id,
                old_value: old.to_string(),
                new_value: top.new_value.clone(),
                key: key.clone(),
            };
            by_employee.entry(top.key.employee_id.as_str()).or_default().push(cell);
        }

        let employees = by_employee
            .into_iter()
            .map(|(employee_id, mut cells)| {
                cells.sort_by_key(|c| c.key.day);
                PendingEmployee { employee_id: employee_id.to_string(), cells }
            })
            .collect();
        PendingChangeSet { employees }
    }
}

// ============================================================================
// Pending change set
// ============================================================================

/// One key's net pending transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCell {
    pub key: CellKey,
    /// Active (top) change for the key.
    pub change_id: ChangeId,
    /// Effective old value (before the first still-active edit).
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEmployee {
    pub employee_id: String,
    pub cells: Vec<PendingCell>,
}

/// Every active edit, grouped per employee. The unit sent on save.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingChangeSet {
    pub employees: Vec<PendingEmployee>,
}

impl PendingChangeSet {
    pub fn len(&self) -> usize {
        self.employees.iter().map(|e| e.cells.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = &PendingCell> {
        self.employees.iter().flat_map(|e| e.cells.iter())
    }

    pub fn contains(&self, key: &CellKey) -> bool {
        self.cells().any(|c| &c.key == key)
    }

    /// Wire form, grouped by employee.
    pub fn to_wire(&self) -> Vec<EmployeeChanges> {
        self.employees
            .iter()
            .map(|e| EmployeeChanges {
                employee_id: e.employee_id.clone(),
                changes: e.cells.iter().map(PendingCell::to_record).collect(),
            })
            .collect()
    }
}

impl PendingCell {
    pub fn to_record(&self) -> ChangeRecord {
        ChangeRecord {
            employee_id: self.key.employee_id.clone(),
            day: self.key.day,
            old_value: self.old_value.clone(),
            new_value: self.new_value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeOrigin, Clock};

    fn change(clock: &mut Clock, emp: &str, day: u32, old: &str, new: &str) -> CellChange {
        let group = clock.next_group_id();
        CellChange {
            id: clock.next_change_id(),
            key: CellKey::new(emp, day),
            employee_name: emp.to_string(),
            employee_rut: String::new(),
            old_value: old.to_string(),
            new_value: new.to_string(),
            timestamp: clock.tick(),
            origin: ChangeOrigin::DirectEdit { group },
        }
    }

    #[test]
    fn test_record_and_lookup_top() {
        let mut clock = Clock::new();
        let mut log = ChangeLog::new();
        log.record(change(&mut clock, "A", 5, "M", "T"));
        let second = log.record(change(&mut clock, "A", 5, "T", "N"));

        let key = CellKey::new("A", 5);
        assert_eq!(log.lookup(&key).unwrap().id, second.id);
        assert_eq!(log.effective_old_value(&key), Some("M"));
        assert_eq!(log.len(), 1);
        assert_eq!(log.stack(&key).len(), 2);
    }

    #[test]
    fn test_pop_requires_top() {
        let mut clock = Clock::new();
        let mut log = ChangeLog::new();
        let first = log.record(change(&mut clock, "A", 5, "M", "T"));
        let second = log.record(change(&mut clock, "A", 5, "T", "N"));

        assert_eq!(log.pop(first.id), Err(EngineError::UnknownChange(first.id)));
        log.pop(second.id).unwrap();
        assert_eq!(log.lookup(&CellKey::new("A", 5)).unwrap().id, first.id);
        assert!(!log.is_active(second.id));
        assert!(log.get(second.id).is_some());

        log.pop(first.id).unwrap();
        assert!(log.is_empty());
        assert_eq!(log.stored(), 2);
    }

    #[test]
    fn test_reinstate_relinks_old_value() {
        let mut clock = Clock::new();
        let mut log = ChangeLog::new();
        let c = log.record(change(&mut clock, "A", 1, "M", "T"));
        log.pop(c.id).unwrap();
        let back = log.reinstate(c.id, "X").unwrap();
        assert_eq!(back.old_value, "X");
        assert!(log.is_active(c.id));
        assert!(log.reinstate(c.id, "X").is_err());
    }

    #[test]
    fn test_discard_middle_relinks_entry_above() {
        let mut clock = Clock::new();
        let mut log = ChangeLog::new();
        let a = log.record(change(&mut clock, "A", 5, "M", "T"));
        let b = log.record(change(&mut clock, "A", 5, "T", "N"));
        let c = log.record(change(&mut clock, "A", 5, "N", "L"));

        let discarded = log.discard(b.id).unwrap();
        assert_eq!(discarded.relinked, Some(c.id));
        assert!(!discarded.was_top);
        assert_eq!(log.get(c.id).unwrap().old_value, "T");
        assert_eq!(log.stack(&CellKey::new("A", 5)).iter().map(|x| x.id).collect::<Vec<_>>(), vec![a.id, c.id]);

        let bottom = log.discard(a.id).unwrap();
        assert_eq!(bottom.relinked, Some(c.id));
        assert_eq!(log.get(c.id).unwrap().old_value, "M");
        assert_eq!(log.effective_old_value(&CellKey::new("A", 5)), Some("M"));
    }

    #[test]
    fn test_discard_top_exposes_previous() {
        let mut clock = Clock::new();
        let mut log = ChangeLog::new();
        let a = log.record(change(&mut clock, "A", 5, "M", "T"));
        let b = log.record(change(&mut clock, "A", 5, "T", "N"));
        let discarded = log.discard(b.id).unwrap();
        assert!(discarded.was_top);
        assert_eq!(discarded.relinked, None);
        assert_eq!(log.lookup(&CellKey::new("A", 5)).unwrap().id, a.id);
        assert!(log.get(b.id).is_none());
    }

    #[test]
    fn test_snapshot_groups_by_employee_days_numeric() {
        let mut clock = Clock::new();
        let mut log = ChangeLog::new();
        log.record(change(&mut clock, "B", 3, "", "T"));
        log.record(change(&mut clock, "A", 10, "M", "T"));
        log.record(change(&mut clock, "A", 2, "", "N"));
        log.record(change(&mut clock, "A", 2, "N", "L"));

        let set = log.snapshot();
        assert_eq!(set.len(), 3);
        assert_eq!(set.employees[0].employee_id, "A");
        let days: Vec<u32> = set.employees[0].cells.iter().map(|c| c.key.day).collect();
        assert_eq!(days, vec![2, 10]);
        let a2 = &set.employees[0].cells[0];
        assert_eq!((a2.old_value.as_str(), a2.new_value.as_str()), ("", "L"));

        let wire = set.to_wire();
        assert_eq!(wire[1].employee_id, "B");
        assert_eq!(wire[1].changes[0].new_value, "T");
    }

    #[test]
    fn test_clear_key_and_inactive_for() {
        let mut clock = Clock::new();
        let mut log = ChangeLog::new();
        let a = log.record(change(&mut clock, "A", 1, "", "T"));
        let b = log.record(change(&mut clock, "A", 1, "T", "N"));
        log.pop(b.id).unwrap();
        assert_eq!(log.inactive_for(&CellKey::new("A", 1)), vec![b.id]);

        assert_eq!(log.clear_key(&CellKey::new("A", 1)), vec![a.id]);
        assert!(log.is_empty());
        log.forget(b.id);
        assert_eq!(log.stored(), 0);
    }

    #[test]
    fn test_active_changes_newest_first() {
        let mut clock = Clock::new();
        let mut log = ChangeLog::new();
        let a = log.record(change(&mut clock, "A", 1, "", "T"));
        let b = log.record(change(&mut clock, "B", 1, "", "T"));
        let ids: Vec<ChangeId> = log.active_changes().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }
}
