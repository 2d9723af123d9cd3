//! The document store: one explicit instance per open document.
//!
//! The store owns the [`StoreState`] and runs every command through
//! [`reduce`]. It adds the bookkeeping that is not part of the pure
//! transition: a revision counter (bumped once per applied command) and the
//! sheet event listeners.

use crate::command::{reduce, Command, Outcome, StoreState};
use crate::document::{Document, DEFAULT_FILENAME};
use crate::events::EventCallback;
use crate::history::{History, DEFAULT_CAPACITY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Snapshots kept on each of the undo and redo stacks.
    pub history_capacity: usize,
    /// Filename of new and reset documents.
    pub default_filename: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_CAPACITY,
            default_filename: DEFAULT_FILENAME.to_string(),
        }
    }
}

pub struct Store {
    state: StoreState,
    revision: u64,
    listeners: Vec<EventCallback>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Store {
    /// A store holding the default three-sheet document.
    pub fn new(options: StoreOptions) -> Self {
        let document = Document::new(options.default_filename.clone());
        Self::from_document(document, options)
    }

    /// A store around an existing (for example, freshly loaded) document.
    pub fn from_document(document: Document, options: StoreOptions) -> Self {
        Self {
            state: StoreState {
                document,
                history: History::with_capacity(options.history_capacity),
                default_filename: options.default_filename,
            },
            revision: 0,
            listeners: Vec::new(),
        }
    }

    /// Apply a command and notify listeners of any sheet events.
    pub fn dispatch(&mut self, command: Command) -> Outcome {
        let name = command.name();
        let state = std::mem::take(&mut self.state);
        let (next, transition) = reduce(state, command);
        self.state = next;

        match &transition.outcome {
            Outcome::Applied => {
                self.revision += 1;
                log::debug!("{} applied (revision {})", name, self.revision);
            }
            Outcome::Unchanged(notice) => {
                log::debug!("{} ignored: {}", name, notice);
            }
        }

        for event in &transition.events {
            for listener in self.listeners.iter_mut() {
                listener(event);
            }
        }

        transition.outcome
    }

    /// Apply commands in order, collecting each outcome.
    pub fn dispatch_all(&mut self, commands: impl IntoIterator<Item = Command>) -> Vec<Outcome> {
        commands.into_iter().map(|cmd| self.dispatch(cmd)).collect()
    }

    pub fn document(&self) -> &Document {
        &self.state.document
    }

    pub fn history(&self) -> &History {
        &self.state.history
    }

    pub fn can_undo(&self) -> bool {
        self.state.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state.history.can_redo()
    }

    /// Number of applied commands since the store was created.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Register a listener for sheet events.
    pub fn subscribe(&mut self, callback: EventCallback) {
        self.listeners.push(callback);
    }
}
