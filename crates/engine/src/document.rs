//! The multi-sheet document aggregate.
//!
//! ## Invariants
//!
//! - `sheets` is never empty and holds unique ids.
//! - `active_sheet` is always a member of `sheets`.
//! - Every per-sheet map is keyed only by ids in `sheets`. Grids and styles
//!   have an entry for every sheet; annotation maps may omit sheets that
//!   have none.
//! - Rename and delete touch every per-sheet map and every chart in one
//!   call, so no map ever refers to a stale id.
//!
//! Mutators are crate-private: the store is the only writer, and it goes
//! through [`crate::command::reduce`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotations::{Comment, ConditionalFormat, Protection, ValidationRule, Verdict};
use crate::cell::{CellValue, Grid};
use crate::chart::{Chart, ChartPatch};
use crate::command::Notice;
use crate::coord::{CellRange, Coord};
use crate::history::Snapshot;
use crate::search::{self, SearchQuery};
use crate::sheet::{auto_sheet_id, normalize_sheet_name, unique_sheet_id, SheetId};
use crate::style::{StylePatch, StyleTags};

pub const DEFAULT_FILENAME: &str = "Untitled spreadsheet";

/// Per-cell records of one sheet.
pub type CellMap<T> = BTreeMap<Coord, T>;

/// Per-sheet maps of per-cell records.
pub type SheetMap<T> = BTreeMap<SheetId, CellMap<T>>;

/// One sheet handed over by a file codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedSheet {
    pub name: String,
    pub grid: Grid,
}

/// Unvalidated document contents, used to rebuild a document from storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentParts {
    pub sheets: Vec<SheetId>,
    /// Defaults to the first sheet.
    pub active_sheet: Option<SheetId>,
    pub grids: BTreeMap<SheetId, Grid>,
    pub styles: SheetMap<StyleTags>,
    pub comments: SheetMap<Comment>,
    pub protections: SheetMap<Protection>,
    pub validations: SheetMap<ValidationRule>,
    pub conditional_formats: BTreeMap<SheetId, Vec<ConditionalFormat>>,
    pub charts: Vec<Chart>,
    pub filename: String,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub is_modified: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    sheets: Vec<SheetId>,
    active_sheet: SheetId,
    grids: BTreeMap<SheetId, Grid>,
    styles: SheetMap<StyleTags>,
    comments: SheetMap<Comment>,
    protections: SheetMap<Protection>,
    validations: SheetMap<ValidationRule>,
    conditional_formats: BTreeMap<SheetId, Vec<ConditionalFormat>>,
    charts: Vec<Chart>,
    is_modified: bool,
    filename: String,
    last_saved_at: Option<DateTime<Utc>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(DEFAULT_FILENAME)
    }
}

fn check_keys<'a>(
    sheets: &[SheetId],
    what: &str,
    mut keys: impl Iterator<Item = &'a SheetId>,
) -> Result<(), String> {
    match keys.find(|id| !sheets.contains(id)) {
        Some(id) => Err(format!("{what} refers to unknown sheet '{id}'")),
        None => Ok(()),
    }
}

/// Move a per-sheet entry to a new key.
fn rekey<T>(map: &mut BTreeMap<SheetId, T>, old: &SheetId, new: &SheetId) {
    if let Some(value) = map.remove(old) {
        map.insert(new.clone(), value);
    }
}

impl Document {
    /// Three empty sheets, `sheet1` active, not modified.
    pub fn new(filename: impl Into<String>) -> Self {
        let sheets: Vec<SheetId> = (1..=3).map(|n| SheetId::from(format!("sheet{n}"))).collect();
        let grids = sheets.iter().map(|id| (id.clone(), Grid::new())).collect();
        let styles = sheets.iter().map(|id| (id.clone(), CellMap::new())).collect();

        Self {
            active_sheet: sheets[0].clone(),
            sheets,
            grids,
            styles,
            comments: SheetMap::new(),
            protections: SheetMap::new(),
            validations: SheetMap::new(),
            conditional_formats: BTreeMap::new(),
            charts: Vec::new(),
            is_modified: false,
            filename: filename.into(),
            last_saved_at: None,
        }
    }

    /// Rebuild a document, checking every invariant. Sheets without a grid or
    /// style map get empty ones.
    pub fn from_parts(parts: DocumentParts) -> Result<Self, String> {
        let DocumentParts {
            sheets,
            active_sheet,
            mut grids,
            mut styles,
            comments,
            protections,
            validations,
            conditional_formats,
            charts,
            filename,
            last_saved_at,
            is_modified,
        } = parts;

        let Some(first) = sheets.first().cloned() else {
            return Err("document has no sheets".to_string());
        };
        for (i, id) in sheets.iter().enumerate() {
            if sheets[..i].contains(id) {
                return Err(format!("duplicate sheet id '{id}'"));
            }
        }

        check_keys(&sheets, "sheet data", grids.keys())?;
        check_keys(&sheets, "cell styles", styles.keys())?;
        check_keys(&sheets, "comments", comments.keys())?;
        check_keys(&sheets, "protected cells", protections.keys())?;
        check_keys(&sheets, "data validations", validations.keys())?;
        check_keys(&sheets, "conditional formats", conditional_formats.keys())?;
        check_keys(&sheets, "charts", charts.iter().map(|c| &c.sheet_id))?;

        let active_sheet = match active_sheet {
            Some(id) if sheets.contains(&id) => id,
            Some(id) => return Err(format!("active sheet '{id}' is not in the sheet list")),
            None => first,
        };

        for id in &sheets {
            grids.entry(id.clone()).or_default();
            styles.entry(id.clone()).or_default();
        }

        Ok(Self {
            sheets,
            active_sheet,
            grids,
            styles,
            comments,
            protections,
            validations,
            conditional_formats,
            charts,
            is_modified,
            filename,
            last_saved_at,
        })
    }

    pub fn to_parts(&self) -> DocumentParts {
        DocumentParts {
            sheets: self.sheets.clone(),
            active_sheet: Some(self.active_sheet.clone()),
            grids: self.grids.clone(),
            styles: self.styles.clone(),
            comments: self.comments.clone(),
            protections: self.protections.clone(),
            validations: self.validations.clone(),
            conditional_formats: self.conditional_formats.clone(),
            charts: self.charts.clone(),
            filename: self.filename.clone(),
            last_saved_at: self.last_saved_at,
            is_modified: self.is_modified,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn sheets(&self) -> &[SheetId] {
        &self.sheets
    }

    pub fn active_sheet(&self) -> &SheetId {
        &self.active_sheet
    }

    pub fn has_sheet(&self, sheet: &str) -> bool {
        self.sheets.iter().any(|id| id == sheet)
    }

    pub fn grid(&self, sheet: &str) -> Option<&Grid> {
        self.grids.get(sheet)
    }

    pub fn active_grid(&self) -> Option<&Grid> {
        self.grids.get(&self.active_sheet)
    }

    pub fn styles(&self, sheet: &str) -> Option<&CellMap<StyleTags>> {
        self.styles.get(sheet)
    }

    pub fn comments(&self, sheet: &str) -> Option<&CellMap<Comment>> {
        self.comments.get(sheet)
    }

    pub fn protections(&self, sheet: &str) -> Option<&CellMap<Protection>> {
        self.protections.get(sheet)
    }

    pub fn validations(&self, sheet: &str) -> Option<&CellMap<ValidationRule>> {
        self.validations.get(sheet)
    }

    pub fn conditional_formats(&self, sheet: &str) -> &[ConditionalFormat] {
        self.conditional_formats.get(sheet).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn charts(&self) -> &[Chart] {
        &self.charts
    }

    pub fn chart(&self, id: Uuid) -> Option<&Chart> {
        self.charts.iter().find(|c| c.id == id)
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    pub fn is_protected(&self, sheet: &str, coord: Coord) -> bool {
        self.protections.get(sheet).is_some_and(|m| m.contains_key(&coord))
    }

    /// Check a value against the validation rule on `coord`, if any.
    pub fn validate_input(&self, sheet: &str, coord: Coord, value: &CellValue) -> Verdict {
        match self.validations.get(sheet).and_then(|m| m.get(&coord)) {
            Some(rule) => rule.validate(value),
            None => Verdict::ok(),
        }
    }

    /// Stored tags patched by every matching conditional format, in the order
    /// the formats were added.
    pub fn effective_style(&self, sheet: &str, coord: Coord) -> StyleTags {
        let mut tags = self
            .styles
            .get(sheet)
            .and_then(|m| m.get(&coord))
            .cloned()
            .unwrap_or_default();

        let Some(grid) = self.grids.get(sheet) else {
            return tags;
        };
        let value = grid.get(coord);
        for format in self.conditional_formats(sheet) {
            if format.range.contains(coord) && format.condition.matches(value) {
                tags.apply(&format.style);
            }
        }
        tags
    }

    /// Grid and styles of `sheet` as they are now.
    pub fn snapshot_of(&self, sheet: &SheetId) -> Snapshot {
        Snapshot {
            sheet: sheet.clone(),
            grid: self.grids.get(sheet).cloned().unwrap_or_default(),
            styles: self.styles.get(sheet).cloned().unwrap_or_default(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_of(&self.active_sheet)
    }

    fn require(&self, sheet: &str) -> Result<SheetId, Notice> {
        self.sheets
            .iter()
            .find(|id| *id == sheet)
            .cloned()
            .ok_or_else(|| Notice::UnknownSheet(sheet.to_string()))
    }

    // =========================================================================
    // Sheet management
    // =========================================================================

    pub(crate) fn switch_sheet(&mut self, sheet: &str) -> Result<(), Notice> {
        let id = self.require(sheet)?;
        if self.active_sheet == id {
            return Err(Notice::AlreadyActive(id));
        }
        self.active_sheet = id;
        Ok(())
    }

    /// Append a sheet and make it active. A missing or blank name gets the
    /// next free `sheetN`.
    pub(crate) fn add_sheet(&mut self, name: Option<&str>) -> SheetId {
        let id = match name.and_then(normalize_sheet_name) {
            Some(base) => unique_sheet_id(&self.sheets, base, None),
            None => auto_sheet_id(&self.sheets),
        };
        self.sheets.push(id.clone());
        self.grids.insert(id.clone(), Grid::new());
        self.styles.insert(id.clone(), CellMap::new());
        self.active_sheet = id.clone();
        self.is_modified = true;
        id
    }

    /// Re-key `old` across every map. The new name is de-duplicated against
    /// the other sheets.
    pub(crate) fn rename_sheet(&mut self, old: &str, new: &str) -> Result<SheetId, Notice> {
        let old_id = self.require(old)?;
        let base = normalize_sheet_name(new).ok_or(Notice::EmptyName)?;
        let new_id = unique_sheet_id(&self.sheets, base, Some(old_id.as_str()));
        if new_id == old_id {
            return Err(Notice::SameName);
        }

        for id in self.sheets.iter_mut().filter(|id| **id == old_id) {
            *id = new_id.clone();
        }
        rekey(&mut self.grids, &old_id, &new_id);
        rekey(&mut self.styles, &old_id, &new_id);
        rekey(&mut self.comments, &old_id, &new_id);
        rekey(&mut self.protections, &old_id, &new_id);
        rekey(&mut self.validations, &old_id, &new_id);
        rekey(&mut self.conditional_formats, &old_id, &new_id);
        for chart in self.charts.iter_mut().filter(|c| c.sheet_id == old_id) {
            chart.sheet_id = new_id.clone();
        }
        if self.active_sheet == old_id {
            self.active_sheet = new_id.clone();
        }
        self.is_modified = true;
        Ok(new_id)
    }

    /// Remove a sheet and everything attached to it. The last sheet cannot go.
    pub(crate) fn delete_sheet(&mut self, sheet: &str) -> Result<SheetId, Notice> {
        let id = self.require(sheet)?;
        if self.sheets.len() <= 1 {
            return Err(Notice::LastSheet);
        }

        self.sheets.retain(|s| *s != id);
        self.grids.remove(&id);
        self.styles.remove(&id);
        self.comments.remove(&id);
        self.protections.remove(&id);
        self.validations.remove(&id);
        self.conditional_formats.remove(&id);
        self.charts.retain(|c| c.sheet_id != id);

        if self.active_sheet == id {
            if let Some(first) = self.sheets.first() {
                self.active_sheet = first.clone();
            }
        }
        self.is_modified = true;
        Ok(id)
    }

    /// Fold codec output into the document with the `add_sheet` naming rule.
    /// The first imported sheet becomes active.
    pub(crate) fn import_sheets(&mut self, imported: Vec<ImportedSheet>) -> Result<Vec<SheetId>, Notice> {
        if imported.is_empty() {
            return Err(Notice::NothingImported);
        }
        let mut ids = Vec::with_capacity(imported.len());
        for sheet in imported {
            let id = self.add_sheet(Some(&sheet.name));
            self.grids.insert(id.clone(), sheet.grid);
            ids.push(id);
        }
        if let Some(first) = ids.first() {
            self.active_sheet = first.clone();
        }
        Ok(ids)
    }

    // =========================================================================
    // Content
    // =========================================================================

    pub(crate) fn set_grid(&mut self, sheet: &str, grid: Grid) -> Result<(), Notice> {
        let id = self.require(sheet)?;
        self.grids.insert(id, grid);
        self.is_modified = true;
        Ok(())
    }

    /// Shallow union: each incoming coordinate replaces the stored tags.
    pub(crate) fn merge_styles(&mut self, sheet: &str, styles: CellMap<StyleTags>) -> Result<(), Notice> {
        let id = self.require(sheet)?;
        self.styles.entry(id).or_default().extend(styles);
        self.is_modified = true;
        Ok(())
    }

    /// Patch the tags of every cell in `range`. Protected cells are skipped
    /// unless their protection allows formatting. Returns the cells touched.
    pub(crate) fn apply_style(&mut self, sheet: &str, range: CellRange, patch: &StylePatch) -> Result<usize, Notice> {
        let id = self.require(sheet)?;
        let range = range.clamped().ok_or(Notice::OutOfBounds(range))?;
        let protections = self.protections.get(&id);
        let styles = self.styles.entry(id.clone()).or_default();

        let mut touched = 0;
        for coord in range.iter() {
            if protections
                .and_then(|m| m.get(&coord))
                .is_some_and(|p| !p.allow_formatting)
            {
                continue;
            }
            let mut tags = styles.get(&coord).cloned().unwrap_or_default();
            tags.apply(patch);
            if tags.is_default() {
                styles.remove(&coord);
            } else {
                styles.insert(coord, tags);
            }
            touched += 1;
        }

        if touched == 0 {
            return Err(Notice::Protected);
        }
        self.is_modified = true;
        Ok(touched)
    }

    pub(crate) fn replace_all(&mut self, sheet: &str, query: &SearchQuery) -> Result<usize, Notice> {
        let id = self.require(sheet)?;
        let grid = self.grids.entry(id).or_default();
        let changed = search::replace_all(grid, query);
        if changed == 0 {
            return Err(Notice::NoMatches);
        }
        self.is_modified = true;
        Ok(changed)
    }

    /// Put a snapshot back and activate its sheet. Returns false if the sheet
    /// no longer exists.
    pub(crate) fn restore(&mut self, snapshot: Snapshot) -> bool {
        if !self.sheets.contains(&snapshot.sheet) {
            return false;
        }
        self.grids.insert(snapshot.sheet.clone(), snapshot.grid);
        self.styles.insert(snapshot.sheet.clone(), snapshot.styles);
        self.active_sheet = snapshot.sheet;
        self.is_modified = true;
        true
    }

    // =========================================================================
    // Annotations
    // =========================================================================

    /// Create a comment, or replace the text of an existing one.
    pub(crate) fn set_comment(&mut self, sheet: &str, coord: Coord, text: String, at: DateTime<Utc>) -> Result<(), Notice> {
        let id = self.require(sheet)?;
        let comments = self.comments.entry(id).or_default();
        match comments.get_mut(&coord) {
            Some(comment) => {
                comment.text = text;
                comment.updated_at = at;
            }
            None => {
                comments.insert(coord, Comment::new(text, at));
            }
        }
        self.is_modified = true;
        Ok(())
    }

    pub(crate) fn remove_comment(&mut self, sheet: &str, coord: Coord) -> Result<(), Notice> {
        let id = self.require(sheet)?;
        remove_cell(&mut self.comments, &id, coord).ok_or(Notice::NoComment(coord))?;
        self.is_modified = true;
        Ok(())
    }

    pub(crate) fn protect_range(
        &mut self,
        sheet: &str,
        range: CellRange,
        allow_formatting: bool,
        at: DateTime<Utc>,
    ) -> Result<(), Notice> {
        let id = self.require(sheet)?;
        let range = range.clamped().ok_or(Notice::OutOfBounds(range))?;
        let protections = self.protections.entry(id).or_default();
        for coord in range.iter() {
            protections.insert(coord, Protection { allow_formatting, protected_at: at });
        }
        self.is_modified = true;
        Ok(())
    }

    pub(crate) fn unprotect_range(&mut self, sheet: &str, range: CellRange) -> Result<usize, Notice> {
        let id = self.require(sheet)?;
        let cells = self.protections.get_mut(&id).ok_or(Notice::NotProtected)?;
        let before = cells.len();
        cells.retain(|coord, _| !range.contains(*coord));
        let removed = before - cells.len();
        if cells.is_empty() {
            self.protections.remove(&id);
        }
        if removed == 0 {
            return Err(Notice::NotProtected);
        }
        self.is_modified = true;
        Ok(removed)
    }

    pub(crate) fn set_validation(&mut self, sheet: &str, coord: Coord, rule: ValidationRule) -> Result<(), Notice> {
        let id = self.require(sheet)?;
        self.validations.entry(id).or_default().insert(coord, rule);
        self.is_modified = true;
        Ok(())
    }

    pub(crate) fn remove_validation(&mut self, sheet: &str, coord: Coord) -> Result<(), Notice> {
        let id = self.require(sheet)?;
        remove_cell(&mut self.validations, &id, coord).ok_or(Notice::NoValidation(coord))?;
        self.is_modified = true;
        Ok(())
    }

    pub(crate) fn add_conditional_format(&mut self, sheet: &str, format: ConditionalFormat) -> Result<Uuid, Notice> {
        let id = self.require(sheet)?;
        let format_id = format.id;
        self.conditional_formats.entry(id).or_default().push(format);
        self.is_modified = true;
        Ok(format_id)
    }

    pub(crate) fn remove_conditional_format(&mut self, sheet: &str, format_id: Uuid) -> Result<(), Notice> {
        let id = self.require(sheet)?;
        let formats = self
            .conditional_formats
            .get_mut(&id)
            .ok_or(Notice::NoConditionalFormat(format_id))?;
        let before = formats.len();
        formats.retain(|f| f.id != format_id);
        if formats.len() == before {
            return Err(Notice::NoConditionalFormat(format_id));
        }
        if formats.is_empty() {
            self.conditional_formats.remove(&id);
        }
        self.is_modified = true;
        Ok(())
    }

    // =========================================================================
    // Charts
    // =========================================================================

    pub(crate) fn add_chart(&mut self, chart: Chart) -> Result<Uuid, Notice> {
        self.require(chart.sheet_id.as_str())?;
        let id = chart.id;
        self.charts.push(chart);
        self.is_modified = true;
        Ok(id)
    }

    pub(crate) fn update_chart(&mut self, id: Uuid, patch: &ChartPatch, at: DateTime<Utc>) -> Result<(), Notice> {
        let chart = self
            .charts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(Notice::UnknownChart(id))?;
        chart.apply(patch, at);
        self.is_modified = true;
        Ok(())
    }

    pub(crate) fn remove_chart(&mut self, id: Uuid) -> Result<(), Notice> {
        let before = self.charts.len();
        self.charts.retain(|c| c.id != id);
        if self.charts.len() == before {
            return Err(Notice::UnknownChart(id));
        }
        self.is_modified = true;
        Ok(())
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub(crate) fn set_modified(&mut self, modified: bool) {
        self.is_modified = modified;
    }

    pub(crate) fn set_filename(&mut self, filename: String) {
        self.filename = filename;
    }

    pub(crate) fn set_last_saved(&mut self, at: Option<DateTime<Utc>>) {
        self.last_saved_at = at;
    }

    /// Record a save point: clean, saved at `at`.
    pub fn mark_saved(&mut self, at: DateTime<Utc>) {
        self.is_modified = false;
        self.last_saved_at = Some(at);
    }
}

/// Remove one cell record, dropping the sheet entry once it is empty.
fn remove_cell<T>(map: &mut SheetMap<T>, sheet: &SheetId, coord: Coord) -> Option<T> {
    let cells = map.get_mut(sheet)?;
    let removed = cells.remove(&coord);
    if cells.is_empty() {
        map.remove(sheet);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{Condition, ValidationKind};
    use crate::chart::ChartKind;
    use crate::coord::{MAX_COLS, MAX_ROWS};

    fn doc() -> Document {
        Document::default()
    }

    fn ids(doc: &Document) -> Vec<&str> {
        doc.sheets().iter().map(SheetId::as_str).collect()
    }

    #[test]
    fn test_default_document() {
        let d = doc();
        assert_eq!(ids(&d), vec!["sheet1", "sheet2", "sheet3"]);
        assert_eq!(d.active_sheet().as_str(), "sheet1");
        assert!(!d.is_modified());
        assert_eq!(d.filename(), DEFAULT_FILENAME);
        assert!(d.grid("sheet2").is_some_and(Grid::is_empty));
    }

    #[test]
    fn test_add_sheet_names() {
        let mut d = doc();
        assert_eq!(d.add_sheet(None).as_str(), "sheet4");
        assert_eq!(d.active_sheet().as_str(), "sheet4");
        assert_eq!(d.add_sheet(Some("sheet1")).as_str(), "sheet1(1)");
        assert_eq!(d.add_sheet(Some("sheet1")).as_str(), "sheet1(2)");
        assert_eq!(d.add_sheet(Some("   ")).as_str(), "sheet7");
        assert!(d.is_modified());
    }

    #[test]
    fn test_rename_migrates_every_map() {
        let mut d = doc();
        let at = Utc::now();
        let a1 = Coord::new(0, 0);
        d.merge_styles("sheet1", CellMap::from([(a1, StyleTags::bold())])).unwrap();
        d.set_comment("sheet1", a1, "note".into(), at).unwrap();
        d.set_validation("sheet1", a1, ValidationRule::new(ValidationKind::Number { min: None, max: None }, at))
            .unwrap();
        d.protect_range("sheet1", CellRange::single(a1), false, at).unwrap();
        d.add_chart(Chart::new(SheetId::from("sheet1"), CellRange::single(a1), at)).unwrap();

        let new_id = d.rename_sheet("sheet1", "sheet2").unwrap();
        assert_eq!(new_id.as_str(), "sheet2(1)");
        assert_eq!(ids(&d), vec!["sheet2(1)", "sheet2", "sheet3"]);
        assert_eq!(d.active_sheet().as_str(), "sheet2(1)");
        assert!(d.styles("sheet2(1)").is_some_and(|m| m.contains_key(&a1)));
        assert!(d.comments("sheet2(1)").is_some_and(|m| m[&a1].text == "note"));
        assert!(d.validations("sheet2(1)").is_some_and(|m| m.contains_key(&a1)));
        assert!(!d.validate_input("sheet2(1)", a1, &CellValue::from("abc")).valid);
        assert!(d.is_protected("sheet2(1)", a1));
        assert!(d.protections("sheet2(1)").is_some_and(|m| !m[&a1].allow_formatting));
        assert_eq!(d.charts()[0].sheet_id.as_str(), "sheet2(1)");
        for old in [
            d.styles("sheet1").is_some(),
            d.comments("sheet1").is_some(),
            d.validations("sheet1").is_some(),
            d.protections("sheet1").is_some(),
            d.grid("sheet1").is_some(),
        ] {
            assert!(!old);
        }
        assert!(!d.is_protected("sheet1", a1));
        assert!(d.validate_input("sheet1", a1, &CellValue::from("abc")).valid);
    }

    #[test]
    fn test_rename_noops() {
        let mut d = doc();
        assert_eq!(d.rename_sheet("sheet1", " sheet1 "), Err(Notice::SameName));
        assert_eq!(d.rename_sheet("sheet1", ""), Err(Notice::EmptyName));
        assert_eq!(d.rename_sheet("nope", "x"), Err(Notice::UnknownSheet("nope".into())));
        assert!(!d.is_modified());
    }

    #[test]
    fn test_delete_active_falls_back_to_first() {
        let mut d = Document::from_parts(DocumentParts {
            sheets: vec!["a".into(), "b".into()],
            ..Default::default()
        })
        .unwrap();
        d.delete_sheet("a").unwrap();
        assert_eq!(ids(&d), vec!["b"]);
        assert_eq!(d.active_sheet().as_str(), "b");
        assert_eq!(d.delete_sheet("b"), Err(Notice::LastSheet));
    }

    #[test]
    fn test_delete_purges_charts_and_annotations() {
        let mut d = doc();
        let at = Utc::now();
        d.set_comment("sheet2", Coord::new(1, 1), "x".into(), at).unwrap();
        d.add_chart(Chart::new(SheetId::from("sheet2"), CellRange::single(Coord::new(0, 0)), at)).unwrap();
        d.delete_sheet("sheet2").unwrap();
        assert!(d.comments("sheet2").is_none());
        assert!(d.charts().is_empty());
        assert_eq!(d.active_sheet().as_str(), "sheet1");
    }

    #[test]
    fn test_from_parts_rejects_bad_layouts() {
        assert!(Document::from_parts(DocumentParts::default()).is_err());

        let dup = DocumentParts { sheets: vec!["a".into(), "a".into()], ..Default::default() };
        assert!(Document::from_parts(dup).is_err());

        let mut stray = DocumentParts { sheets: vec!["a".into()], ..Default::default() };
        stray.grids.insert("b".into(), Grid::new());
        assert!(Document::from_parts(stray).is_err());
    }

    #[test]
    fn test_apply_style_respects_protection() {
        let mut d = doc();
        let at = Utc::now();
        let range = CellRange::new(Coord::new(0, 0), Coord::new(0, 1));
        d.protect_range("sheet1", CellRange::single(Coord::new(0, 0)), false, at).unwrap();

        let bold = StylePatch { bold: Some(true), ..Default::default() };
        assert_eq!(d.apply_style("sheet1", range, &bold), Ok(1));
        assert!(d.styles("sheet1").is_some_and(|m| !m.contains_key(&Coord::new(0, 0))));

        let single = CellRange::single(Coord::new(0, 0));
        assert_eq!(d.apply_style("sheet1", single, &bold), Err(Notice::Protected));

        let unbold = StylePatch { bold: Some(false), ..Default::default() };
        d.apply_style("sheet1", range, &unbold).unwrap();
        assert!(d.styles("sheet1").is_some_and(|m| m.is_empty()));
    }

    #[test]
    fn test_validate_input_uses_the_cell_rule() {
        let mut d = doc();
        let at = Utc::now();
        let b2 = Coord::new(1, 1);
        d.set_validation("sheet1", b2, ValidationRule::new(ValidationKind::Number { min: Some(0.0), max: Some(10.0) }, at))
            .unwrap();

        assert!(d.validate_input("sheet1", b2, &CellValue::Number(10.0)).valid);
        let rejected = d.validate_input("sheet1", b2, &CellValue::Number(11.0));
        assert!(!rejected.valid);
        assert!(!rejected.message.is_empty());
        assert!(!d.validate_input("sheet1", b2, &CellValue::from("ten")).valid);

        // Cells without a rule and other sheets accept anything
        assert!(d.validate_input("sheet1", Coord::new(0, 0), &CellValue::from("ten")).valid);
        assert!(d.validate_input("sheet2", b2, &CellValue::Number(11.0)).valid);

        d.remove_validation("sheet1", b2).unwrap();
        assert!(d.validate_input("sheet1", b2, &CellValue::Number(11.0)).valid);
    }

    #[test]
    fn test_range_operations_stay_inside_the_sheet() {
        let mut d = doc();
        let at = Utc::now();
        let tail = CellRange::new(Coord::new(0, MAX_COLS - 2), Coord::new(1, usize::MAX));
        d.protect_range("sheet1", tail, true, at).unwrap();
        assert_eq!(d.protections("sheet1").map(|m| m.len()), Some(4));

        let bold = StylePatch { bold: Some(true), ..Default::default() };
        assert_eq!(d.apply_style("sheet1", tail, &bold), Ok(4));

        let everything = CellRange::new(Coord::new(0, 0), Coord::new(usize::MAX, usize::MAX));
        assert_eq!(d.unprotect_range("sheet1", everything), Ok(4));
        assert!(d.protections("sheet1").is_none());

        let past = CellRange::single(Coord::new(MAX_ROWS, 0));
        assert_eq!(d.protect_range("sheet1", past, false, at), Err(Notice::OutOfBounds(past)));
        assert_eq!(d.apply_style("sheet1", past, &bold), Err(Notice::OutOfBounds(past)));
    }

    #[test]
    fn test_effective_style_applies_matching_formats() {
        let mut d = doc();
        let grid = Grid::from_rows(vec![vec![CellValue::Number(5.0), CellValue::Number(50.0)]]);
        d.set_grid("sheet1", grid).unwrap();
        let range = CellRange::new(Coord::new(0, 0), Coord::new(0, 1));
        let italic = StylePatch { italic: Some(true), ..Default::default() };
        d.add_conditional_format("sheet1", ConditionalFormat::new(range, Condition::GreaterThan { value: 10.0 }, italic))
            .unwrap();

        assert!(!d.effective_style("sheet1", Coord::new(0, 0)).italic);
        assert!(d.effective_style("sheet1", Coord::new(0, 1)).italic);
    }

    #[test]
    fn test_chart_lifecycle() {
        let mut d = doc();
        let at = Utc::now();
        let orphan = Chart::new(SheetId::from("ghost"), CellRange::single(Coord::new(0, 0)), at);
        assert!(matches!(d.add_chart(orphan), Err(Notice::UnknownSheet(_))));

        let id = d.add_chart(Chart::new(SheetId::from("sheet1"), CellRange::single(Coord::new(0, 0)), at)).unwrap();
        let patch = ChartPatch { kind: Some(ChartKind::Pie), ..Default::default() };
        d.update_chart(id, &patch, at).unwrap();
        assert_eq!(d.chart(id).map(|c| c.kind), Some(ChartKind::Pie));
        d.remove_chart(id).unwrap();
        assert_eq!(d.remove_chart(id), Err(Notice::UnknownChart(id)));
    }

    #[test]
    fn test_import_sheets_dedups_and_activates_first() {
        let mut d = doc();
        let imported = vec![
            ImportedSheet { name: "sheet2".into(), grid: Grid::from_rows(vec![vec![CellValue::Number(1.0)]]) },
            ImportedSheet { name: "Data".into(), grid: Grid::new() },
        ];
        let added = d.import_sheets(imported).unwrap();
        assert_eq!(added, vec![SheetId::from("sheet2(1)"), SheetId::from("Data")]);
        assert_eq!(d.active_sheet().as_str(), "sheet2(1)");
        assert_eq!(*d.grid("sheet2(1)").unwrap().get(Coord::new(0, 0)), CellValue::Number(1.0));
        assert_eq!(d.import_sheets(Vec::new()), Err(Notice::NothingImported));
    }
}
