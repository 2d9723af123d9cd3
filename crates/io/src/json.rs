// JSON export

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use gridbook_engine::cell::{CellValue, Grid};

use crate::error::Result;

/// Rows of the grid with trailing blank cells and trailing blank rows removed.
fn trimmed_rows(grid: &Grid) -> Vec<&[CellValue]> {
    let mut rows: Vec<&[CellValue]> = grid
        .rows()
        .iter()
        .map(|row| {
            let used = row.iter().rposition(|v| !v.is_blank()).map_or(0, |i| i + 1);
            &row[..used]
        })
        .collect();
    while rows.last().is_some_and(|r| r.is_empty()) {
        rows.pop();
    }
    rows
}

/// Write the grid as a JSON array of arrays. Numbers stay numbers, blanks
/// are `null`.
pub fn write_grid<W: Write>(grid: &Grid, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, &trimmed_rows(grid))?;
    Ok(())
}

pub fn export(grid: &Grid, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_grid(grid, &mut writer)?;
    writer.flush()?;
    Ok(())
}
