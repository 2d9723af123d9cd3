// Status bar figures for the current selection

use serde::Serialize;

use crate::cell::Grid;
use crate::coord::CellRange;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionStats {
    pub sum: f64,
    /// Mean of the numeric cells; 0 when there are none.
    pub average: f64,
    /// Non-blank cells in the selection.
    pub count: usize,
    pub numeric_count: usize,
    /// A1 text of the selection ("B2:C4").
    pub selection: String,
}

impl SelectionStats {
    pub fn compute(grid: &Grid, range: CellRange) -> Self {
        let mut sum = 0.0;
        let mut count = 0;
        let mut numeric_count = 0;

        // Cells past the stored grid are blank
        if let Some(used) = grid.extent().and_then(|extent| range.intersect(&extent)) {
            for coord in used.iter() {
                let value = grid.get(coord);
                if value.is_blank() {
                    continue;
                }
                count += 1;
                if let Some(n) = value.as_number() {
                    sum += n;
                    numeric_count += 1;
                }
            }
        }

        let average = if numeric_count > 0 { sum / numeric_count as f64 } else { 0.0 };

        Self { sum, average, count, numeric_count, selection: range.to_a1() }
    }

    /// Status bar text, two decimals like the toolbar shows.
    pub fn summary(&self) -> String {
        format!(
            "{}  Sum: {:.2}  Average: {:.2}  Count: {}",
            self.selection, self.sum, self.average, self.count
        )
    }
}
