//! Document commands and the transition function.
//!
//! Every change to a document is a [`Command`]. [`reduce`] is the only place
//! commands are interpreted: it takes the current [`StoreState`] by value and
//! returns the next one together with a [`Transition`] describing what
//! happened. It performs no I/O.
//!
//! Misuse (deleting the last sheet, undoing with empty history, naming a
//! sheet that does not exist) never fails. The state comes back unchanged and
//! the outcome carries a [`Notice`] the caller may show as a status message.
//!
//! Commands serialize with a `command` tag so scripts can drive a store:
//!
//! ```json
//! [{"command": "addSheet", "name": "Totals"},
//!  {"command": "renameSheet", "from": "sheet1", "to": "Inputs"}]
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotations::{ConditionalFormat, ValidationRule};
use crate::cell::Grid;
use crate::chart::{Chart, ChartPatch};
use crate::coord::{CellRange, Coord};
use crate::document::{Document, ImportedSheet};
use crate::events::SheetEvent;
use crate::history::{History, Snapshot};
use crate::search::SearchQuery;
use crate::sheet::SheetId;
use crate::style::{StylePatch, StyleTags};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    // Sheets
    SwitchSheet {
        sheet: SheetId,
    },
    AddSheet {
        #[serde(default)]
        name: Option<String>,
    },
    RenameSheet {
        from: SheetId,
        to: String,
    },
    DeleteSheet {
        sheet: SheetId,
    },

    // Content
    UpdateSheetData {
        sheet: SheetId,
        data: Grid,
    },
    UpdateCellStyles {
        sheet: SheetId,
        styles: BTreeMap<Coord, StyleTags>,
    },
    ApplyStyle {
        sheet: SheetId,
        range: CellRange,
        style: StylePatch,
    },
    ReplaceAll {
        sheet: SheetId,
        query: SearchQuery,
    },
    ImportSheets {
        sheets: Vec<ImportedSheet>,
    },

    // History
    /// Snapshot the active sheet onto the undo stack.
    PushUndo,
    Undo,
    Redo,
    /// Back to the default document; history is cleared.
    ResetDocument,
    /// Replace the document wholesale (opening a saved file). History is cleared.
    #[serde(skip)]
    LoadDocument {
        document: Box<Document>,
    },

    // Annotations
    SetComment {
        sheet: SheetId,
        cell: Coord,
        text: String,
        #[serde(default = "Utc::now")]
        at: DateTime<Utc>,
    },
    RemoveComment {
        sheet: SheetId,
        cell: Coord,
    },
    ProtectRange {
        sheet: SheetId,
        range: CellRange,
        #[serde(default)]
        allow_formatting: bool,
        #[serde(default = "Utc::now")]
        at: DateTime<Utc>,
    },
    UnprotectRange {
        sheet: SheetId,
        range: CellRange,
    },
    SetValidation {
        sheet: SheetId,
        cell: Coord,
        rule: ValidationRule,
    },
    RemoveValidation {
        sheet: SheetId,
        cell: Coord,
    },
    AddConditionalFormat {
        sheet: SheetId,
        format: ConditionalFormat,
    },
    RemoveConditionalFormat {
        sheet: SheetId,
        id: Uuid,
    },

    // Charts
    AddChart {
        chart: Chart,
    },
    UpdateChart {
        id: Uuid,
        patch: ChartPatch,
        #[serde(default = "Utc::now")]
        at: DateTime<Utc>,
    },
    RemoveChart {
        id: Uuid,
    },

    // Metadata
    SetModified {
        value: bool,
    },
    SetFilename {
        filename: String,
    },
    SetLastSaved {
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    /// Clear the modified flag and stamp the save time.
    MarkSaved {
        #[serde(default = "Utc::now")]
        at: DateTime<Utc>,
    },
}

impl Command {
    /// camelCase command name, as used in scripts and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SwitchSheet { .. } => "switchSheet",
            Command::AddSheet { .. } => "addSheet",
            Command::RenameSheet { .. } => "renameSheet",
            Command::DeleteSheet { .. } => "deleteSheet",
            Command::UpdateSheetData { .. } => "updateSheetData",
            Command::UpdateCellStyles { .. } => "updateCellStyles",
            Command::ApplyStyle { .. } => "applyStyle",
            Command::ReplaceAll { .. } => "replaceAll",
            Command::ImportSheets { .. } => "importSheets",
            Command::PushUndo => "pushUndo",
            Command::Undo => "undo",
            Command::Redo => "redo",
            Command::ResetDocument => "resetDocument",
            Command::LoadDocument { .. } => "loadDocument",
            Command::SetComment { .. } => "setComment",
            Command::RemoveComment { .. } => "removeComment",
            Command::ProtectRange { .. } => "protectRange",
            Command::UnprotectRange { .. } => "unprotectRange",
            Command::SetValidation { .. } => "setValidation",
            Command::RemoveValidation { .. } => "removeValidation",
            Command::AddConditionalFormat { .. } => "addConditionalFormat",
            Command::RemoveConditionalFormat { .. } => "removeConditionalFormat",
            Command::AddChart { .. } => "addChart",
            Command::UpdateChart { .. } => "updateChart",
            Command::RemoveChart { .. } => "removeChart",
            Command::SetModified { .. } => "setModified",
            Command::SetFilename { .. } => "setFilename",
            Command::SetLastSaved { .. } => "setLastSaved",
            Command::MarkSaved { .. } => "markSaved",
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why a command left the document unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    LastSheet,
    UnknownSheet(String),
    AlreadyActive(SheetId),
    SameName,
    EmptyName,
    NothingToUndo,
    NothingToRedo,
    UnknownChart(Uuid),
    NoComment(Coord),
    NoValidation(Coord),
    NoConditionalFormat(Uuid),
    NotProtected,
    /// The range lies entirely past the sheet bounds.
    OutOfBounds(CellRange),
    /// Every targeted cell is protected against formatting.
    Protected,
    NoMatches,
    NothingImported,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::LastSheet => write!(f, "Can't delete the only sheet"),
            Notice::UnknownSheet(id) => write!(f, "No sheet named '{}'", id),
            Notice::AlreadyActive(id) => write!(f, "'{}' is already the active sheet", id),
            Notice::SameName => write!(f, "Sheet name unchanged"),
            Notice::EmptyName => write!(f, "Sheet name can't be empty"),
            Notice::NothingToUndo => write!(f, "Nothing to undo"),
            Notice::NothingToRedo => write!(f, "Nothing to redo"),
            Notice::UnknownChart(id) => write!(f, "No chart with id {}", id),
            Notice::NoComment(at) => write!(f, "No comment at {}", at.to_a1()),
            Notice::NoValidation(at) => write!(f, "No validation rule at {}", at.to_a1()),
            Notice::NoConditionalFormat(id) => write!(f, "No conditional format with id {}", id),
            Notice::NotProtected => write!(f, "No protected cells in selection"),
            Notice::OutOfBounds(range) => write!(f, "{} is outside the sheet", range.to_a1()),
            Notice::Protected => write!(f, "Selection is protected"),
            Notice::NoMatches => write!(f, "No matches found"),
            Notice::NothingImported => write!(f, "File contains no sheets"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Unchanged(Notice),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    pub fn notice(&self) -> Option<&Notice> {
        match self {
            Outcome::Applied => None,
            Outcome::Unchanged(notice) => Some(notice),
        }
    }
}

impl<T> From<Result<T, Notice>> for Outcome {
    fn from(result: Result<T, Notice>) -> Self {
        match result {
            Ok(_) => Outcome::Applied,
            Err(notice) => Outcome::Unchanged(notice),
        }
    }
}

/// Result of one call to [`reduce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub outcome: Outcome,
    /// Sheet lifecycle changes, in order.
    pub events: Vec<SheetEvent>,
}

impl Transition {
    fn applied(events: Vec<SheetEvent>) -> Self {
        Self { outcome: Outcome::Applied, events }
    }

    fn from_result<T>(result: Result<T, Notice>) -> Self {
        Self { outcome: result.into(), events: Vec::new() }
    }
}

// ============================================================================
// Transition function
// ============================================================================

/// Everything a command can change: the document and its undo history.
#[derive(Debug, Clone)]
pub struct StoreState {
    pub document: Document,
    pub history: History,
    /// Filename given to documents created by `resetDocument`.
    pub default_filename: String,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            document: Document::default(),
            history: History::new(),
            default_filename: crate::document::DEFAULT_FILENAME.to_string(),
        }
    }
}

/// Apply one command. Never fails; an unchanged state is reported through
/// [`Outcome::Unchanged`].
pub fn reduce(mut state: StoreState, command: Command) -> (StoreState, Transition) {
    let doc = &mut state.document;

    let transition = match command {
        Command::SwitchSheet { sheet } => Transition::from_result(doc.switch_sheet(sheet.as_str())),

        Command::AddSheet { name } => {
            let id = doc.add_sheet(name.as_deref());
            Transition::applied(vec![SheetEvent::Added(id)])
        }

        Command::RenameSheet { from, to } => match doc.rename_sheet(from.as_str(), &to) {
            Ok(new_id) => {
                state.history.rename_sheet(from.as_str(), &new_id);
                Transition::applied(vec![SheetEvent::Renamed { from, to: new_id }])
            }
            Err(notice) => Transition::from_result::<()>(Err(notice)),
        },

        Command::DeleteSheet { sheet } => match doc.delete_sheet(sheet.as_str()) {
            Ok(removed) => {
                state.history.forget_sheet(removed.as_str());
                Transition::applied(vec![SheetEvent::Removed(removed)])
            }
            Err(notice) => Transition::from_result::<()>(Err(notice)),
        },

        Command::UpdateSheetData { sheet, data } => Transition::from_result(doc.set_grid(sheet.as_str(), data)),

        Command::UpdateCellStyles { sheet, styles } => {
            Transition::from_result(doc.merge_styles(sheet.as_str(), styles))
        }

        Command::ApplyStyle { sheet, range, style } => {
            Transition::from_result(doc.apply_style(sheet.as_str(), range, &style))
        }

        Command::ReplaceAll { sheet, query } => Transition::from_result(doc.replace_all(sheet.as_str(), &query)),

        Command::ImportSheets { sheets } => match doc.import_sheets(sheets) {
            Ok(ids) => Transition::applied(ids.into_iter().map(SheetEvent::Added).collect()),
            Err(notice) => Transition::from_result::<()>(Err(notice)),
        },

        Command::PushUndo => {
            state.history.record(doc.snapshot());
            Transition::applied(Vec::new())
        }

        Command::Undo => match state.history.undo(|sheet| doc.snapshot_of(sheet)) {
            Some(snapshot) => {
                restore_snapshot(doc, snapshot);
                Transition::applied(Vec::new())
            }
            None => Transition::from_result::<()>(Err(Notice::NothingToUndo)),
        },

        Command::Redo => match state.history.redo(|sheet| doc.snapshot_of(sheet)) {
            Some(snapshot) => {
                restore_snapshot(doc, snapshot);
                Transition::applied(Vec::new())
            }
            None => Transition::from_result::<()>(Err(Notice::NothingToRedo)),
        },

        Command::ResetDocument => {
            *doc = Document::new(state.default_filename.clone());
            state.history.clear();
            Transition::applied(vec![SheetEvent::Reset])
        }

        Command::LoadDocument { document } => {
            *doc = *document;
            state.history.clear();
            Transition::applied(vec![SheetEvent::Reset])
        }

        Command::SetComment { sheet, cell, text, at } => {
            Transition::from_result(doc.set_comment(sheet.as_str(), cell, text, at))
        }
        Command::RemoveComment { sheet, cell } => Transition::from_result(doc.remove_comment(sheet.as_str(), cell)),
        Command::ProtectRange { sheet, range, allow_formatting, at } => {
            Transition::from_result(doc.protect_range(sheet.as_str(), range, allow_formatting, at))
        }
        Command::UnprotectRange { sheet, range } => {
            Transition::from_result(doc.unprotect_range(sheet.as_str(), range))
        }
        Command::SetValidation { sheet, cell, rule } => {
            Transition::from_result(doc.set_validation(sheet.as_str(), cell, rule))
        }
        Command::RemoveValidation { sheet, cell } => {
            Transition::from_result(doc.remove_validation(sheet.as_str(), cell))
        }
        Command::AddConditionalFormat { sheet, format } => {
            Transition::from_result(doc.add_conditional_format(sheet.as_str(), format))
        }
        Command::RemoveConditionalFormat { sheet, id } => {
            Transition::from_result(doc.remove_conditional_format(sheet.as_str(), id))
        }

        Command::AddChart { chart } => Transition::from_result(doc.add_chart(chart)),
        Command::UpdateChart { id, patch, at } => Transition::from_result(doc.update_chart(id, &patch, at)),
        Command::RemoveChart { id } => Transition::from_result(doc.remove_chart(id)),

        Command::SetModified { value } => {
            doc.set_modified(value);
            Transition::applied(Vec::new())
        }
        Command::SetFilename { filename } => {
            doc.set_filename(filename);
            Transition::applied(Vec::new())
        }
        Command::SetLastSaved { at } => {
            doc.set_last_saved(at);
            Transition::applied(Vec::new())
        }
        Command::MarkSaved { at } => {
            doc.mark_saved(at);
            Transition::applied(Vec::new())
        }
    };

    (state, transition)
}

/// History drops the snapshots of deleted sheets, so a restore always finds its sheet.
fn restore_snapshot(doc: &mut Document, snapshot: Snapshot) {
    let sheet = snapshot.sheet.clone();
    if !doc.restore(snapshot) {
        log::warn!("dropped history snapshot of missing sheet '{}'", sheet);
    }
}
