//! Event types for editor change notifications.
//!
//! The UI layer drains these after each call to re-render only the affected
//! cells. The tests use them to verify ordering of save state transitions.

use crate::cell_key::CellKey;
use crate::pipeline::SaveState;

/// Events emitted by the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// Projected values of these cells may have changed.
    CellsChanged(CellsChangedEvent),

    /// Undo/redo availability after a mutation.
    HistoryChanged { can_undo: bool, can_redo: bool },

    /// The save pipeline moved between states.
    SaveStateChanged { from: SaveState, to: SaveState },

    /// A month was loaded (or reloaded). Everything must be re-rendered.
    MonthLoaded { discarded: usize },
}

/// Emitted when cells need re-projection.
#[derive(Debug, Clone, PartialEq)]
pub struct CellsChangedEvent {
    /// Sorted, de-duplicated.
    pub cells: Vec<CellKey>,
}

impl CellsChangedEvent {
    pub fn new(mut cells: Vec<CellKey>) -> Self {
        cells.sort();
        cells.dedup();
        Self { cells }
    }
}

/// Simple event collector.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<EditorEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: EditorEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[EditorEvent] {
        &self.events
    }

    /// Take every collected event, leaving the collector empty.
    pub fn drain(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Filter to only CellsChanged events.
    pub fn cells_changed(&self) -> Vec<&CellsChangedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EditorEvent::CellsChanged(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Save state transitions, in order.
    pub fn save_transitions(&self) -> Vec<(SaveState, SaveState)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EditorEvent::SaveStateChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }
}
