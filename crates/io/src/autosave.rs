//! Periodic working-copy writes.
//!
//! The caller drives the clock: call [`AutoSaver::tick`] from whatever timer
//! the host has. A tick writes only when the document is modified and has
//! changed since the last write.

use chrono::{DateTime, Utc};

use gridbook_engine::store::Store;

use crate::error::Result;
use crate::kv::KeyValueStore;
use crate::library::Library;

#[derive(Debug, Clone)]
pub struct AutoSaver {
    enabled: bool,
    last_revision: Option<u64>,
}

impl Default for AutoSaver {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AutoSaver {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, last_revision: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns whether a working copy was written.
    pub fn tick<S: KeyValueStore>(&mut self, library: &mut Library<S>, store: &Store, at: DateTime<Utc>) -> Result<bool> {
        if !self.enabled || !store.document().is_modified() {
            return Ok(false);
        }
        if self.last_revision == Some(store.revision()) {
            return Ok(false);
        }
        library.autosave(store.document(), at)?;
        self.last_revision = Some(store.revision());
        Ok(true)
    }
}
