//! Glue between a [`Store`] and a [`Library`].

use chrono::{DateTime, Utc};

use gridbook_engine::command::Command;
use gridbook_engine::store::Store;

use crate::error::Result;
use crate::kv::KeyValueStore;
use crate::library::{FileEntry, Library};

/// Save the store's document. The document is only marked saved once the
/// blob and index are both written.
pub fn save_store<S: KeyValueStore>(library: &mut Library<S>, store: &mut Store, at: DateTime<Utc>) -> Result<FileEntry> {
    let entry = library.save(store.document(), at)?;
    store.dispatch(Command::MarkSaved { at });
    Ok(entry)
}

/// Replace the store's document with the saved file under `key`.
/// History is cleared; a failed load leaves the store untouched.
pub fn open_into<S: KeyValueStore>(library: &Library<S>, store: &mut Store, key: &str) -> Result<()> {
    let document = library.open(key)?;
    store.dispatch(Command::LoadDocument { document: Box::new(document) });
    Ok(())
}

/// Load the autosaved working copy, if one exists. Returns whether it did.
pub fn restore_into<S: KeyValueStore>(library: &Library<S>, store: &mut Store) -> Result<bool> {
    match library.restore()? {
        Some(document) => {
            store.dispatch(Command::LoadDocument { document: Box::new(document) });
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::kv::MemoryStore;
    use gridbook_engine::cell::{CellValue, Grid};

    fn edit(store: &mut Store, value: f64) {
        store.dispatch(Command::PushUndo);
        store.dispatch(Command::UpdateSheetData {
            sheet: "sheet1".into(),
            data: Grid::from_rows(vec![vec![CellValue::Number(value)]]),
        });
    }

    #[test]
    fn test_save_marks_clean() {
        let mut library = Library::new(MemoryStore::default());
        let mut store = Store::default();
        edit(&mut store, 1.0);
        assert!(store.document().is_modified());

        let at = Utc::now();
        save_store(&mut library, &mut store, at).unwrap();
        assert!(!store.document().is_modified());
        assert_eq!(store.document().last_saved_at(), Some(at));
    }

    #[test]
    fn test_failed_save_stays_modified() {
        let mut library = Library::new(MemoryStore::with_quota(16));
        let mut store = Store::default();
        edit(&mut store, 1.0);

        let err = save_store(&mut library, &mut store, Utc::now()).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert!(store.document().is_modified());
        assert_eq!(store.document().last_saved_at(), None);
    }

    #[test]
    fn test_open_clears_history() {
        let mut library = Library::new(MemoryStore::default());
        let mut store = Store::default();
        edit(&mut store, 1.0);
        let entry = save_store(&mut library, &mut store, Utc::now()).unwrap();
        edit(&mut store, 2.0);
        assert!(store.can_undo());

        open_into(&library, &mut store, &entry.key).unwrap();
        assert!(!store.can_undo());
        let grid = store.document().active_grid().unwrap();
        assert_eq!(grid.get(gridbook_engine::coord::Coord::new(0, 0)), &CellValue::Number(1.0));

        let before = store.document().clone();
        assert!(open_into(&library, &mut store, "missing").is_err());
        assert_eq!(store.document(), &before);
    }

    #[test]
    fn test_restore_into() {
        let mut library = Library::new(MemoryStore::default());
        let mut store = Store::default();
        assert!(!restore_into(&library, &mut store).unwrap());

        edit(&mut store, 7.0);
        library.autosave(store.document(), Utc::now()).unwrap();
        let mut fresh = Store::default();
        assert!(restore_into(&library, &mut fresh).unwrap());
        assert_eq!(fresh.document(), store.document());
    }
}
