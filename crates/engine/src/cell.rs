use serde::{Deserialize, Serialize};

use crate::coord::{CellRange, Coord};

/// A single cell value as the grid widget hands it over.
///
/// Serialized as the bare JSON value: `null`, a number, or a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Interpret raw user input. Blank input is `Null`, numeric input is a
    /// `Number`, everything else is kept verbatim as `Text`.
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return CellValue::Null;
        }

        if let Ok(num) = trimmed.parse::<f64>() {
            if num.is_finite() {
                return CellValue::Number(num);
            }
        }

        CellValue::Text(input.to_string())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// Numeric view of the value. Text that parses as a number counts.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            CellValue::Null => None,
        }
    }

    /// Text shown in the grid.
    pub fn display(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// Full 2D contents of one sheet, row-major. Rows may be ragged; anything
/// outside the populated area reads as `Null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid(Vec<Vec<CellValue>>);

impl Grid {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> Self {
        Self(rows)
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.0
    }

    pub fn into_rows(self) -> Vec<Vec<CellValue>> {
        self.0
    }

    /// (row count, widest row)
    pub fn dimensions(&self) -> (usize, usize) {
        let width = self.0.iter().map(Vec::len).max().unwrap_or(0);
        (self.0.len(), width)
    }

    /// Range covering every stored row and column, or `None` when no cell is stored.
    pub fn extent(&self) -> Option<CellRange> {
        match self.dimensions() {
            (0, _) | (_, 0) => None,
            (rows, cols) => Some(CellRange::new(Coord::new(0, 0), Coord::new(rows - 1, cols - 1))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|row| row.iter().all(CellValue::is_blank))
    }

    pub fn get(&self, coord: Coord) -> &CellValue {
        static NULL: CellValue = CellValue::Null;
        self.0
            .get(coord.row)
            .and_then(|row| row.get(coord.col))
            .unwrap_or(&NULL)
    }

    /// Write a value, growing the grid with `Null` as needed.
    pub fn set(&mut self, coord: Coord, value: CellValue) {
        if self.0.len() <= coord.row {
            self.0.resize_with(coord.row + 1, Vec::new);
        }
        let row = &mut self.0[coord.row];
        if row.len() <= coord.col {
            row.resize(coord.col + 1, CellValue::Null);
        }
        row[coord.col] = value;
    }

    /// Populated (non-blank) cells, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (Coord, &CellValue)> {
        self.0.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, v)| !v.is_blank())
                .map(move |(c, v)| (Coord::new(r, c), v))
        })
    }
}
