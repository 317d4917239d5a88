//! Atomic edits and the groups they are undone in.

use crate::batch::BatchKind;
use crate::cell_key::CellKey;

/// Opaque id of a recorded change. Allocated monotonically per editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeId(u64);

impl ChangeId {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for ChangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Id of the gesture (edit group) a change belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u64);

impl GroupId {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// How a change came to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOrigin {
    DirectEdit { group: GroupId },
    BatchExpansion { group: GroupId, kind: BatchKind },
}

impl ChangeOrigin {
    pub fn group(&self) -> GroupId {
        match self {
            Self::DirectEdit { group } | Self::BatchExpansion { group, .. } => *group,
        }
    }
}

/// One cell transition.
///
/// INVARIANT: `old_value` equals the projected value of `key` immediately
/// before this change became active.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellChange {
    pub id: ChangeId,
    pub key: CellKey,
    /// Display only.
    pub employee_name: String,
    /// Display only.
    pub employee_rut: String,
    pub old_value: String,
    /// Empty means cleared.
    pub new_value: String,
    /// Logical clock tick, not wall time.
    pub timestamp: u64,
    pub origin: ChangeOrigin,
}

impl CellChange {
    pub fn is_clear(&self) -> bool {
        self.new_value.is_empty()
    }
}

/// The changes produced by one user gesture, in application order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditGroup {
    pub id: GroupId,
    pub description: String,
    pub changes: Vec<CellChange>,
}

impl EditGroup {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CellKey> {
        self.changes.iter().map(|c| &c.key)
    }
}

/// Allocates change ids, group ids and logical timestamps.
///
/// Survives `reset()` so ids are never reused within an editor's lifetime.
#[derive(Debug, Default)]
pub struct Clock {
    next_change: u64,
    next_group: u64,
    tick: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_change_id(&mut self) -> ChangeId {
        self.next_change += 1;
        ChangeId(self.next_change)
    }

    pub fn next_group_id(&mut self) -> GroupId {
        self.next_group += 1;
        GroupId(self.next_group)
    }

    pub fn tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}
