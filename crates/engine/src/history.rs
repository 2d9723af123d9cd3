/// Undo/Redo history of full-sheet snapshots

use std::collections::BTreeMap;

use crate::cell::Grid;
use crate::coord::Coord;
use crate::sheet::SheetId;
use crate::style::StyleTags;

/// Default number of snapshots kept on each stack.
pub const DEFAULT_CAPACITY: usize = 20;

/// Grid and styles of one sheet at a point in time. Restoring a snapshot
/// also makes its sheet the active one.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub sheet: SheetId,
    pub grid: Grid,
    pub styles: BTreeMap<Coord, StyleTags>,
}

#[derive(Clone, Debug)]
pub struct History {
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A capacity of 0 is treated as 1.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record the state before an edit. Forks history: redo is cleared.
    pub fn record(&mut self, snapshot: Snapshot) {
        push_bounded(&mut self.undo_stack, snapshot, self.capacity);
        self.redo_stack.clear();
    }

    /// Pop the last recorded snapshot and park the current state of the same
    /// sheet (built by `current`) on the redo stack.
    /// Returns None without calling `current` if there is nothing to undo.
    pub fn undo(&mut self, current: impl FnOnce(&SheetId) -> Snapshot) -> Option<Snapshot> {
        let entry = self.undo_stack.pop()?;
        push_bounded(&mut self.redo_stack, current(&entry.sheet), self.capacity);
        Some(entry)
    }

    /// Pop the last undone snapshot, parking the current state on the undo
    /// stack without clearing redo.
    pub fn redo(&mut self, current: impl FnOnce(&SheetId) -> Snapshot) -> Option<Snapshot> {
        let entry = self.redo_stack.pop()?;
        push_bounded(&mut self.undo_stack, current(&entry.sheet), self.capacity);
        Some(entry)
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

    /// Snapshots on the undo stack, oldest first.
    pub fn undo_entries(&self) -> &[Snapshot] {
        &self.undo_stack
    }

    /// Follow a sheet rename so restored snapshots land on the new id.
    pub fn rename_sheet(&mut self, old: &str, new: &SheetId) {
        for snap in self.undo_stack.iter_mut().chain(self.redo_stack.iter_mut()) {
            if snap.sheet.as_str() == old {
                snap.sheet = new.clone();
            }
        }
    }

    /// Drop every snapshot of a deleted sheet.
    pub fn forget_sheet(&mut self, sheet: &str) {
        self.undo_stack.retain(|s| s.sheet.as_str() != sheet);
        self.redo_stack.retain(|s| s.sheet.as_str() != sheet);
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

fn push_bounded(stack: &mut Vec<Snapshot>, snapshot: Snapshot, capacity: usize) {
    stack.push(snapshot);
    if stack.len() > capacity {
        let overflow = stack.len() - capacity;
        stack.drain(..overflow);
    }
}
