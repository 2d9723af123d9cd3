//! Saved-file library: one blob per save plus an index for the open dialog.
//!
//! Keys follow the browser layout: blobs live under
//! `spreadsheet_{filename}_{millis}`, the index under [`INDEX_KEY`], and the
//! working copy under [`AUTOSAVE_KEY`]. Saving a filename that is already in
//! the index replaces its entry and deletes the superseded blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gridbook_engine::document::Document;

use crate::blob::SavedDocument;
use crate::error::{Result, StorageError};
use crate::kv::KeyValueStore;

pub const INDEX_KEY: &str = "gridbook_files_list";
pub const AUTOSAVE_KEY: &str = "gridbook_autosave";

/// One row of the open dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub key: String,
    pub filename: String,
    pub saved_at: DateTime<Utc>,
}

pub fn blob_key(filename: &str, at: DateTime<Utc>) -> String {
    format!("spreadsheet_{}_{}", filename, at.timestamp_millis())
}

#[derive(Debug)]
pub struct Library<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> Library<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Write `doc` as a new save point. On error the index and the previous
    /// save of the same filename are left as they were.
    pub fn save(&mut self, doc: &Document, at: DateTime<Utc>) -> Result<FileEntry> {
        let filename = doc.filename();
        let key = blob_key(filename, at);
        let json = SavedDocument::capture(doc, at).to_json()?;

        let mut index = self.list()?;
        let superseded: Vec<String> = index
            .iter()
            .filter(|e| e.filename == filename && e.key != key)
            .map(|e| e.key.clone())
            .collect();

        // When the quota is tight the superseded blobs make room, and come
        // back if the save still fails
        let mut stashed = Vec::new();
        let mut written = self.store.set(&key, &json);
        if matches!(written, Err(StorageError::QuotaExceeded { .. })) && !superseded.is_empty() {
            stashed = self.stash(&superseded)?;
            written = self.store.set(&key, &json);
        }
        if let Err(e) = written {
            self.unstash(stashed);
            return Err(e);
        }

        index.retain(|e| e.filename != filename);
        let entry = FileEntry { key: key.clone(), filename: filename.to_string(), saved_at: at };
        index.push(entry.clone());

        if let Err(e) = self.write_index(index) {
            if let Err(rollback) = self.store.remove(&key) {
                log::warn!("could not remove orphaned blob {}: {}", key, rollback);
            }
            self.unstash(stashed);
            return Err(e);
        }

        // The save point is committed; a leftover blob only costs space
        for old in &superseded {
            if let Err(e) = self.store.remove(old) {
                log::warn!("could not remove superseded blob {}: {}", old, e);
            }
        }

        log::info!("saved '{}' as {}", filename, key);
        Ok(entry)
    }

    /// Index entries, newest first. A malformed index reads as empty.
    pub fn list(&self) -> Result<Vec<FileEntry>> {
        let Some(json) = self.store.get(INDEX_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<FileEntry>>(&json) {
            Ok(mut entries) => {
                sort_newest_first(&mut entries);
                Ok(entries)
            }
            Err(e) => {
                log::warn!("ignoring malformed file index: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Most recent save of `filename`, if any.
    pub fn find(&self, filename: &str) -> Result<Option<FileEntry>> {
        Ok(self.list()?.into_iter().find(|e| e.filename == filename))
    }

    pub fn open(&self, key: &str) -> Result<Document> {
        let json = self
            .store
            .get(key)?
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        SavedDocument::from_json(key, &json)?.into_document(key)
    }

    /// Delete a saved blob and its index entry.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        let mut index = self.list()?;
        let before = index.len();
        index.retain(|e| e.key != key);
        let listed = index.len() != before;

        let existed = self.store.remove(key)?;
        if !existed && !listed {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if listed {
            self.write_index(index)?;
        }
        Ok(())
    }

    /// Write the working copy to the autosave slot.
    pub fn autosave(&mut self, doc: &Document, at: DateTime<Utc>) -> Result<()> {
        let json = SavedDocument::capture_working(doc, at).to_json()?;
        self.store.set(AUTOSAVE_KEY, &json)?;
        log::debug!("autosaved '{}'", doc.filename());
        Ok(())
    }

    /// The autosaved working copy. A malformed slot is logged and skipped.
    pub fn restore(&self) -> Result<Option<Document>> {
        let Some(json) = self.store.get(AUTOSAVE_KEY)? else {
            return Ok(None);
        };
        match SavedDocument::from_json(AUTOSAVE_KEY, &json).and_then(|blob| blob.into_document(AUTOSAVE_KEY)) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                log::warn!("ignoring autosave: {}", e);
                Ok(None)
            }
        }
    }

    pub fn clear_autosave(&mut self) -> Result<()> {
        self.store.remove(AUTOSAVE_KEY)?;
        Ok(())
    }

    /// Remove `keys` from the store, keeping their values for [`Self::unstash`].
    fn stash(&mut self, keys: &[String]) -> Result<Vec<(String, String)>> {
        let mut stashed = Vec::new();
        for key in keys {
            match self.take(key) {
                Ok(Some(value)) => stashed.push((key.clone(), value)),
                Ok(None) => {}
                Err(e) => {
                    self.unstash(stashed);
                    return Err(e);
                }
            }
        }
        Ok(stashed)
    }

    fn take(&mut self, key: &str) -> Result<Option<String>> {
        let value = self.store.get(key)?;
        if value.is_some() {
            self.store.remove(key)?;
        }
        Ok(value)
    }

    fn unstash(&mut self, stashed: Vec<(String, String)>) {
        for (key, value) in stashed {
            if let Err(e) = self.store.set(&key, &value) {
                log::warn!("could not restore blob {}: {}", key, e);
            }
        }
    }

    fn write_index(&mut self, mut index: Vec<FileEntry>) -> Result<()> {
        sort_newest_first(&mut index);
        let json = serde_json::to_string(&index)?;
        self.store.set(INDEX_KEY, &json)
    }
}

fn sort_newest_first(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
}
