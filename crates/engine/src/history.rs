//! Undo/Redo history of edit groups.
//!
//! One entry = one user gesture. Entries reference changes by id; the change
//! bodies live in the [`ChangeLog`](crate::change_log::ChangeLog).

use crate::change::{ChangeId, GroupId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub group: GroupId,
    pub description: String,
    /// Member changes in application order.
    pub changes: Vec<ChangeId>,
}

/// What a push displaced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PushEffect {
    /// Changes of redo entries invalidated by the new action.
    pub invalidated: Vec<ChangeId>,
    /// Oldest entry dropped because the history is full. Its changes stay
    /// pending but can no longer be undone as a group.
    pub evicted: Option<HistoryEntry>,
}

pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_entries: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_limit(500)
    }

    pub fn with_limit(max_entries: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Record a gesture. Empty entries are ignored.
    pub fn push(&mut self, entry: HistoryEntry) -> PushEffect {
        let mut effect = PushEffect::default();
        if entry.changes.is_empty() {
            return effect;
        }

        self.undo_stack.push(entry);
        effect.invalidated = self.redo_stack.drain(..).flat_map(|e| e.changes).collect();

        // Limit history size
        if self.undo_stack.len() > self.max_entries {
            effect.evicted = Some(self.undo_stack.remove(0));
        }
        effect
    }

    /// Pop the last entry for undo and move it to the redo stack.
    pub fn undo(&mut self) -> Option<HistoryEntry> {
        let entry = self.undo_stack.pop()?;
        self.redo_stack.push(entry.clone());
        Some(entry)
    }

    /// Pop from the redo stack and move it back to the undo stack.
    pub fn redo(&mut self) -> Option<HistoryEntry> {
        let entry = self.redo_stack.pop()?;
        self.undo_stack.push(entry.clone());
        Some(entry)
    }

    /// Remove one change from whichever entry holds it. Entries left empty
    /// are dropped. Returns the group the change belonged to.
    pub fn remove_change(&mut self, id: ChangeId) -> Option<GroupId> {
        for stack in [&mut self.undo_stack, &mut self.redo_stack] {
            if let Some(pos) = stack.iter().position(|e| e.changes.contains(&id)) {
                let group = stack[pos].group;
                stack[pos].changes.retain(|c| *c != id);
                if stack[pos].changes.is_empty() {
                    stack.remove(pos);
                }
                return Some(group);
            }
        }
        None
    }

    /// Keep only changes for which `keep` returns true, in both stacks.
    pub fn retain_changes(&mut self, mut keep: impl FnMut(ChangeId) -> bool) {
        for stack in [&mut self.undo_stack, &mut self.redo_stack] {
            for entry in stack.iter_mut() {
                entry.changes.retain(|c| keep(*c));
            }
            stack.retain(|e| !e.changes.is_empty());
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Entries that can be undone, newest first.
    pub fn undo_entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.undo_stack.iter().rev()
    }

    pub fn redo_entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.redo_stack.iter().rev()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
