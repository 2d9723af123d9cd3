// CSV/TSV import and export

use std::io::{Read, Write};
use std::path::Path;

use encoding_rs::Encoding;

use gridbook_engine::cell::{CellValue, Grid};
use gridbook_engine::document::ImportedSheet;

use crate::error::Result;

/// How to read a delimited text file.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvOptions {
    /// Sniffed when `None`.
    pub delimiter: Option<u8>,
    /// Source encoding. `None` reads UTF-8 and falls back to Windows-1252.
    pub encoding: Option<&'static Encoding>,
    /// First row holds column names: trimmed and kept as text.
    pub has_header: bool,
}

/// Resolve an encoding name such as `Shift_JIS`, `EUC-JP`, `CP932` or `ISO-8859-1`.
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    let label = label.trim();
    // Windows code page 932 is the Shift_JIS superset encoding_rs decodes
    if label.eq_ignore_ascii_case("cp932") {
        return Some(encoding_rs::SHIFT_JIS);
    }
    Encoding::for_label(label.as_bytes())
}

/// Import a delimited text file as one sheet named after the file stem.
pub fn import(path: &Path, options: &CsvOptions) -> Result<ImportedSheet> {
    let content = match options.encoding {
        Some(encoding) => read_file_as(path, encoding)?,
        None => read_file_as_utf8(path)?,
    };
    let name = sheet_name_for(path);
    import_str(&name, &content, options)
}

pub fn import_str(name: &str, content: &str, options: &CsvOptions) -> Result<ImportedSheet> {
    let delimiter = options.delimiter.unwrap_or_else(|| sniff_delimiter(content));
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row = if options.has_header && rows.is_empty() {
            record.iter().map(header_cell).collect()
        } else {
            record.iter().map(CellValue::from_input).collect()
        };
        rows.push(row);
    }

    // Pad ragged records so the grid is rectangular
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in rows.iter_mut() {
        row.resize(width, CellValue::Null);
    }

    log::debug!("imported {} rows x {} cols into '{}'", rows.len(), width, name);
    Ok(ImportedSheet { name: name.to_string(), grid: Grid::from_rows(rows) })
}

fn header_cell(field: &str) -> CellValue {
    match field.trim() {
        "" => CellValue::Null,
        name => CellValue::Text(name.to_string()),
    }
}

pub(crate) fn sheet_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample: Vec<&str> = content.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample.iter().map(|line| fields_in_line(line, delim)).collect();

        let Some(&target) = counts.first() else {
            break;
        };
        if target <= 1 {
            continue;
        }

        // Lines agreeing with the first, weighted by field count
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

fn fields_in_line(line: &str, delim: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delim)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(|r| r.ok())
        .map(|r| r.len())
        .unwrap_or(1)
}

/// Read a file in a known encoding. A byte-order mark overrides it.
pub fn read_file_as(path: &Path, encoding: &'static Encoding) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let (decoded, used, had_errors) = encoding.decode(&bytes);
    if had_errors {
        log::warn!("{} is not valid {}; bad bytes were replaced", path.display(), used.name());
    }
    Ok(decoded.into_owned())
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Excel-exported CSVs are usually Windows-1252
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Write a grid as delimited text. Trailing blank cells and blank rows at the
/// end are omitted.
pub fn write_grid<W: Write>(grid: &Grid, writer: W, delimiter: u8) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(writer);

    let records: Vec<Vec<String>> = grid
        .rows()
        .iter()
        .map(|row| {
            let mut record: Vec<String> = row.iter().map(CellValue::display).collect();
            while record.last().is_some_and(|s| s.is_empty()) {
                record.pop();
            }
            record
        })
        .collect();
    let used = records.iter().rposition(|r| !r.is_empty()).map_or(0, |i| i + 1);

    for record in &records[..used] {
        if record.is_empty() {
            // A lone empty field keeps the blank line in place
            writer.write_record([""])?;
        } else {
            writer.write_record(record)?;
        }
    }

    writer.flush()?;
    Ok(())
}

pub fn export(grid: &Grid, path: &Path, delimiter: u8) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_grid(grid, std::io::BufWriter::new(file), delimiter)
}
