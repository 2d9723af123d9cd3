// Excel file import (xlsx, xls, xlsb, ods) and export (xlsx only)
//
// Import: every worksheet becomes one imported sheet holding cell values only.
// Export: values, style tags (with conditional formats resolved) and comments.

use std::collections::BTreeSet;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use rust_xlsxwriter::{Format, FormatAlign, FormatUnderline, Note, Workbook, Worksheet};

use gridbook_engine::cell::{CellValue, Grid};
use gridbook_engine::coord::Coord;
use gridbook_engine::document::{Document, ImportedSheet};
use gridbook_engine::style::{Align, FontFamily, FontSize, StyleTags, VerticalAlign};

use crate::error::Result;

/// Largest sheet accepted on import; cells beyond are dropped.
const MAX_ROWS: usize = gridbook_engine::coord::MAX_ROWS;
const MAX_COLS: usize = gridbook_engine::coord::MAX_COLS;

/// Last row and column an xlsx worksheet can address.
const XLSX_LAST_ROW: u32 = 1_048_575;
const XLSX_LAST_COL: u16 = 16_383;

// ============================================================================
// Import
// ============================================================================

pub fn import(path: &Path) -> Result<Vec<ImportedSheet>> {
    let workbook = open_workbook_auto(path)?;
    read_sheets(workbook)
}

pub fn import_bytes(bytes: Vec<u8>) -> Result<Vec<ImportedSheet>> {
    let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    read_sheets(workbook)
}

fn read_sheets<RS: Read + Seek>(mut workbook: Sheets<RS>) -> Result<Vec<ImportedSheet>> {
    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        let grid = range_to_grid(&name, &range);
        sheets.push(ImportedSheet { name, grid });
    }
    log::info!("read {} sheet(s) from workbook", sheets.len());
    Ok(sheets)
}

fn range_to_grid(name: &str, range: &Range<Data>) -> Grid {
    let mut grid = Grid::new();
    let (height, width) = range.get_size();
    if height == 0 || width == 0 {
        return grid;
    }
    if height > MAX_ROWS || width > MAX_COLS {
        log::warn!(
            "sheet '{}' truncated from {}x{} to {}x{}",
            name, height, width, height.min(MAX_ROWS), width.min(MAX_COLS)
        );
    }

    // Data may not begin at A1
    let (start_row, start_col) = range.start().unwrap_or((0, 0));

    for (row_idx, row) in range.rows().enumerate() {
        let target_row = start_row as usize + row_idx;
        if target_row >= MAX_ROWS {
            break;
        }
        for (col_idx, cell) in row.iter().enumerate() {
            let target_col = start_col as usize + col_idx;
            if target_col >= MAX_COLS {
                break;
            }
            let value = data_to_value(cell);
            if !value.is_blank() {
                grid.set(Coord::new(target_row, target_col), value);
            }
        }
    }
    grid
}

fn data_to_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::from_input(s),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::from(if *b { "TRUE" } else { "FALSE" }),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
        // Dates come through as their serial number
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

// ============================================================================
// Export
// ============================================================================

pub fn export(doc: &Document, path: &Path) -> Result<()> {
    let mut workbook = build_workbook(doc)?;
    workbook.save(path)?;
    log::info!("exported '{}' to {}", doc.filename(), path.display());
    Ok(())
}

pub fn export_bytes(doc: &Document) -> Result<Vec<u8>> {
    let mut workbook = build_workbook(doc)?;
    Ok(workbook.save_to_buffer()?)
}

fn build_workbook(doc: &Document) -> Result<Workbook> {
    let mut workbook = Workbook::new();

    for (index, sheet) in doc.sheets().iter().enumerate() {
        let worksheet = workbook.add_worksheet().set_name(sheet.as_str())?;
        write_sheet(doc, sheet.as_str(), worksheet)?;

        if sheet == doc.active_sheet() {
            if let Ok(ws) = workbook.worksheet_from_index(index) {
                ws.set_active(true);
            }
        }
    }
    Ok(workbook)
}

fn write_sheet(doc: &Document, sheet: &str, worksheet: &mut Worksheet) -> Result<()> {
    let empty = Grid::new();
    let grid = doc.grid(sheet).unwrap_or(&empty);

    // Non-blank cells plus styled blanks
    let mut coords: BTreeSet<Coord> = grid.cells().map(|(coord, _)| coord).collect();
    if let Some(styles) = doc.styles(sheet) {
        coords.extend(styles.keys().copied());
    }

    for coord in coords {
        let Some((row, col)) = cell_ref(sheet, coord) else {
            continue;
        };
        let tags = doc.effective_style(sheet, coord);
        let format = build_format(&tags);

        match grid.get(coord) {
            CellValue::Number(n) => {
                worksheet.write_number_with_format(row, col, *n, &format)?;
            }
            CellValue::Text(s) if !s.is_empty() => {
                worksheet.write_string_with_format(row, col, s, &format)?;
            }
            _ => {
                if !tags.is_default() {
                    worksheet.write_blank(row, col, &format)?;
                }
            }
        }
    }

    if let Some(comments) = doc.comments(sheet) {
        for (coord, comment) in comments {
            let Some((row, col)) = cell_ref(sheet, *coord) else {
                continue;
            };
            worksheet.insert_note(row, col, &Note::new(&comment.text))?;
        }
    }
    Ok(())
}

/// Worksheet address of `coord`, or `None` (logged) past the xlsx limits.
fn cell_ref(sheet: &str, coord: Coord) -> Option<(u32, u16)> {
    let row = u32::try_from(coord.row).ok().filter(|r| *r <= XLSX_LAST_ROW);
    let col = u16::try_from(coord.col).ok().filter(|c| *c <= XLSX_LAST_COL);
    match (row, col) {
        (Some(row), Some(col)) => Some((row, col)),
        _ => {
            log::warn!("skipping cell {} of '{}': outside the xlsx grid", coord, sheet);
            None
        }
    }
}

fn build_format(tags: &StyleTags) -> Format {
    let mut format = Format::new();

    if tags.bold {
        format = format.set_bold();
    }
    if tags.italic {
        format = format.set_italic();
    }
    if tags.underline {
        format = format.set_underline(FormatUnderline::Single);
    }
    if tags.strikethrough {
        format = format.set_font_strikethrough();
    }

    format = match tags.align {
        // Excel default: numbers right, text left
        Align::Left => format,
        Align::Center => format.set_align(FormatAlign::Center),
        Align::Right => format.set_align(FormatAlign::Right),
    };
    format = match tags.vertical_align {
        VerticalAlign::Top => format.set_align(FormatAlign::Top),
        VerticalAlign::Middle => format.set_align(FormatAlign::VerticalCenter),
        VerticalAlign::Bottom => format,
    };

    if let Some(points) = font_points(tags.font_size) {
        format = format.set_font_size(points);
    }
    if let Some(family) = tags.font_family {
        format = format.set_font_name(font_name(family));
    }
    if let Some(color) = tags.color {
        format = format.set_font_color(rust_xlsxwriter::Color::RGB(color.to_u32()));
    }
    if let Some(color) = tags.background_color {
        format = format.set_background_color(rust_xlsxwriter::Color::RGB(color.to_u32()));
    }

    format
}

fn font_points(size: FontSize) -> Option<f64> {
    match size {
        FontSize::XSmall => Some(8.0),
        FontSize::Small => Some(9.0),
        FontSize::Medium => None,
        FontSize::Large => Some(14.0),
        FontSize::XLarge => Some(18.0),
        FontSize::XxLarge => Some(24.0),
    }
}

fn font_name(family: FontFamily) -> &'static str {
    match family {
        FontFamily::SansSerif => "Arial",
        FontFamily::Serif => "Times New Roman",
        FontFamily::Monospace => "Courier New",
    }
}
