//! Sheet lifecycle notifications.
//!
//! The formula engine scopes references by sheet id, so it has to hear about
//! every sheet that appears, changes id, or disappears. The store emits one
//! event per change, in the order the changes happened within a command.

use crate::sheet::SheetId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetEvent {
    Added(SheetId),
    Renamed { from: SheetId, to: SheetId },
    Removed(SheetId),
    /// The whole document was replaced; the listener should drop everything
    /// it knows and re-read `sheets`.
    Reset,
}

/// Callback type for receiving sheet events.
pub type EventCallback = Box<dyn FnMut(&SheetEvent) + Send>;

/// Simple event collector for testing.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<SheetEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: SheetEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[SheetEvent] {
        &self.events
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

    /// Ids of sheets added, in order.
    pub fn added(&self) -> Vec<&SheetId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SheetEvent::Added(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// (from, to) pairs of renames, in order.
    pub fn renamed(&self) -> Vec<(&SheetId, &SheetId)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SheetEvent::Renamed { from, to } => Some((from, to)),
                _ => None,
            })
            .collect()
    }
}
