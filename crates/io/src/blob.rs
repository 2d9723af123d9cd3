//! JSON layout of one saved document.
//!
//! ```json
//! {
//!   "sheets": ["sheet1", "Totals"],
//!   "activeSheet": "Totals",
//!   "sheetData": {"sheet1": [[1, "a", null]], "Totals": []},
//!   "cellStyles": {"sheet1": {"0,0": {"bold": true, ...}}},
//!   "conditionalFormats": {}, "charts": [], "comments": {},
//!   "protectedCells": {}, "dataValidations": {},
//!   "filename": "Budget", "savedAt": "2026-01-05T09:30:00Z"
//! }
//! ```
//!
//! Every map except `sheetData` may be missing in older blobs and reads as
//! empty. Autosave blobs also carry `workingState` so a restored working copy
//! keeps its modified flag and last real save time.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gridbook_engine::annotations::{Comment, ConditionalFormat, Protection, ValidationRule};
use gridbook_engine::cell::Grid;
use gridbook_engine::chart::Chart;
use gridbook_engine::document::{Document, DocumentParts, SheetMap};
use gridbook_engine::sheet::SheetId;
use gridbook_engine::style::StyleTags;

use crate::error::{Result, StorageError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDocument {
    pub sheets: Vec<SheetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_sheet: Option<SheetId>,
    pub sheet_data: BTreeMap<SheetId, Grid>,
    #[serde(default)]
    pub cell_styles: SheetMap<StyleTags>,
    #[serde(default)]
    pub conditional_formats: BTreeMap<SheetId, Vec<ConditionalFormat>>,
    #[serde(default)]
    pub charts: Vec<Chart>,
    #[serde(default)]
    pub comments: SheetMap<Comment>,
    #[serde(default)]
    pub protected_cells: SheetMap<Protection>,
    #[serde(default)]
    pub data_validations: SheetMap<ValidationRule>,
    pub filename: String,
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_state: Option<WorkingState>,
}

/// Save state of an autosaved working copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingState {
    pub is_modified: bool,
    #[serde(default)]
    pub last_saved_at: Option<DateTime<Utc>>,
}

impl SavedDocument {
    /// Capture a document as a save point at `at`.
    pub fn capture(doc: &Document, at: DateTime<Utc>) -> Self {
        let parts = doc.to_parts();
        Self {
            sheets: parts.sheets,
            active_sheet: parts.active_sheet,
            sheet_data: parts.grids,
            cell_styles: parts.styles,
            conditional_formats: parts.conditional_formats,
            charts: parts.charts,
            comments: parts.comments,
            protected_cells: parts.protections,
            data_validations: parts.validations,
            filename: parts.filename,
            saved_at: at,
            working_state: None,
        }
    }

    /// Capture a working copy without making it a save point.
    pub fn capture_working(doc: &Document, at: DateTime<Utc>) -> Self {
        Self {
            working_state: Some(WorkingState {
                is_modified: doc.is_modified(),
                last_saved_at: doc.last_saved_at(),
            }),
            ..Self::capture(doc, at)
        }
    }

    /// Rebuild the document. A plain save point loads clean with
    /// `last_saved_at = saved_at`.
    pub fn into_document(self, key: &str) -> Result<Document> {
        let (is_modified, last_saved_at) = match self.working_state {
            Some(state) => (state.is_modified, state.last_saved_at),
            None => (false, Some(self.saved_at)),
        };
        Document::from_parts(DocumentParts {
            sheets: self.sheets,
            active_sheet: self.active_sheet,
            grids: self.sheet_data,
            styles: self.cell_styles,
            comments: self.comments,
            protections: self.protected_cells,
            validations: self.data_validations,
            conditional_formats: self.conditional_formats,
            charts: self.charts,
            filename: self.filename,
            last_saved_at,
            is_modified,
        })
        .map_err(|reason| StorageError::Corrupt { key: key.to_string(), reason })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a blob. Malformed JSON is reported as corruption of `key`.
    pub fn from_json(key: &str, json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StorageError::Corrupt { key: key.to_string(), reason: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridbook_engine::cell::CellValue;
    use gridbook_engine::command::Command;
    use gridbook_engine::coord::{CellRange, Coord};
    use gridbook_engine::store::Store;

    fn populated() -> Document {
        let at = Utc::now();
        let mut store = Store::default();
        store.dispatch_all([
            Command::UpdateSheetData {
                sheet: "sheet1".into(),
                data: Grid::from_rows(vec![vec![CellValue::Number(1.5), CellValue::from("x"), CellValue::Null]]),
            },
            Command::UpdateCellStyles {
                sheet: "sheet1".into(),
                styles: BTreeMap::from([(Coord::new(0, 1), StyleTags::bold())]),
            },
            Command::SetComment { sheet: "sheet2".into(), cell: Coord::new(2, 2), text: "why".into(), at },
            Command::AddChart {
                chart: Chart::new("sheet1".into(), CellRange::new(Coord::new(0, 0), Coord::new(0, 1)), at),
            },
            Command::SwitchSheet { sheet: "sheet2".into() },
        ]);
        store.document().clone()
    }

    #[test]
    fn test_wire_names() {
        let json = SavedDocument::capture(&populated(), Utc::now()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        for field in [
            "sheets", "sheetData", "cellStyles", "conditionalFormats", "charts", "comments",
            "protectedCells", "dataValidations", "filename", "savedAt", "activeSheet",
        ] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert!(value.get("workingState").is_none());
        assert_eq!(value["sheetData"]["sheet1"][0][0], 1.5);
        assert_eq!(value["cellStyles"]["sheet1"]["0,1"]["bold"], true);
    }

    #[test]
    fn test_round_trip_is_a_clean_save_point() {
        let doc = populated();
        let at = Utc::now();
        let json = SavedDocument::capture(&doc, at).to_json().unwrap();
        let loaded = SavedDocument::from_json("k", &json).unwrap().into_document("k").unwrap();

        let mut expected = doc;
        expected.mark_saved(at);
        assert_eq!(loaded, expected);
        assert_eq!(loaded.active_sheet().as_str(), "sheet2");
    }

    #[test]
    fn test_working_copy_keeps_modified_flag() {
        let doc = populated();
        assert!(doc.is_modified());
        let json = SavedDocument::capture_working(&doc, Utc::now()).to_json().unwrap();
        let loaded = SavedDocument::from_json("auto", &json).unwrap().into_document("auto").unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_minimal_blob_defaults() {
        let json = r#"{"sheets":["a"],"sheetData":{"a":[[1]]},"filename":"f","savedAt":"2026-01-05T09:30:00Z"}"#;
        let doc = SavedDocument::from_json("k", json).unwrap().into_document("k").unwrap();
        assert_eq!(doc.active_sheet().as_str(), "a");
        assert!(doc.styles("a").is_some_and(|m| m.is_empty()));
        assert!(!doc.is_modified());
    }

    #[test]
    fn test_corrupt_blobs() {
        let empty = r#"{"sheets":[],"sheetData":{},"filename":"f","savedAt":"2026-01-05T09:30:00Z"}"#;
        let err = SavedDocument::from_json("k", empty).unwrap().into_document("k").unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));

        let stray = r#"{"sheets":["a"],"sheetData":{"b":[]},"filename":"f","savedAt":"2026-01-05T09:30:00Z"}"#;
        assert!(SavedDocument::from_json("k", stray).unwrap().into_document("k").is_err());

        assert!(matches!(SavedDocument::from_json("k", "{not json"), Err(StorageError::Corrupt { .. })));
    }
}
