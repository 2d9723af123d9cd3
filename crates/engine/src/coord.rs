//! Cell coordinates and rectangular ranges.
//!
//! A `Coord` is the (row, col) pair that keys every per-cell mapping of a
//! sheet (styles, comments, protections, validations). Its serialized form is
//! the string `"row,col"` so that per-sheet maps stay plain JSON objects.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Sheet bounds. Range operations never address cells past these.
pub const MAX_ROWS: usize = 65_536;
pub const MAX_COLS: usize = 256;

/// Position of one cell in a sheet (0-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Render as A1 notation (0,0 -> "A1").
    pub fn to_a1(&self) -> String {
        format!("{}{}", column_name(self.col), self.row.saturating_add(1))
    }

    /// Parse A1 notation ("B3" -> row 2, col 1). Lowercase letters are accepted.
    pub fn parse_a1(s: &str) -> Option<Self> {
        let s = s.trim();
        let split = s.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = s.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let row: usize = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self::new(row - 1, column_index(letters)?))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

impl FromStr for Coord {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (row, col) = s
            .split_once(',')
            .ok_or_else(|| format!("invalid cell key '{s}': expected \"row,col\""))?;
        let row = row.trim().parse().map_err(|_| format!("invalid row in cell key '{s}'"))?;
        let col = col.trim().parse().map_err(|_| format!("invalid column in cell key '{s}'"))?;
        Ok(Self::new(row, col))
    }
}

impl Serialize for Coord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Coord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Convert 0-based column index to letters (0 -> A, 25 -> Z, 26 -> AA).
pub fn column_name(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert column letters back to a 0-based index ("A" -> 0, "AA" -> 26).
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        n = n.checked_mul(26)?.checked_add(digit)?;
    }
    Some(n - 1)
}

// ============================================================================
// Ranges
// ============================================================================

/// Inclusive rectangular range. Always normalized: start <= end on both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RangeRepr", into = "RangeRepr")]
pub struct CellRange {
    start: Coord,
    end: Coord,
}

/// Wire form, matching the `{startRow, startCol, endRow, endCol}` selection shape.
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeRepr {
    start_row: usize,
    start_col: usize,
    end_row: usize,
    end_col: usize,
}

impl From<RangeRepr> for CellRange {
    fn from(r: RangeRepr) -> Self {
        CellRange::new(Coord::new(r.start_row, r.start_col), Coord::new(r.end_row, r.end_col))
    }
}

impl From<CellRange> for RangeRepr {
    fn from(r: CellRange) -> Self {
        RangeRepr {
            start_row: r.start.row,
            start_col: r.start.col,
            end_row: r.end.row,
            end_col: r.end.col,
        }
    }
}

impl CellRange {
    /// Build a range from any two corners.
    pub fn new(a: Coord, b: Coord) -> Self {
        Self {
            start: Coord::new(a.row.min(b.row), a.col.min(b.col)),
            end: Coord::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    pub fn single(coord: Coord) -> Self {
        Self { start: coord, end: coord }
    }

    pub fn start(&self) -> Coord {
        self.start
    }

    pub fn end(&self) -> Coord {
        self.end
    }

    pub fn rows(&self) -> usize {
        (self.end.row - self.start.row).saturating_add(1)
    }

    pub fn cols(&self) -> usize {
        (self.end.col - self.start.col).saturating_add(1)
    }

    pub fn contains(&self, coord: Coord) -> bool {
        (self.start.row..=self.end.row).contains(&coord.row)
            && (self.start.col..=self.end.col).contains(&coord.col)
    }

    /// The whole addressable sheet.
    pub fn sheet_bounds() -> Self {
        Self { start: Coord::new(0, 0), end: Coord::new(MAX_ROWS - 1, MAX_COLS - 1) }
    }

    /// Overlap of two ranges.
    pub fn intersect(&self, other: &CellRange) -> Option<Self> {
        let start = Coord::new(self.start.row.max(other.start.row), self.start.col.max(other.start.col));
        let end = Coord::new(self.end.row.min(other.end.row), self.end.col.min(other.end.col));
        (start.row <= end.row && start.col <= end.col).then_some(Self { start, end })
    }

    /// The part of the range inside [`CellRange::sheet_bounds`].
    pub fn clamped(&self) -> Option<Self> {
        self.intersect(&Self::sheet_bounds())
    }

    /// Every coordinate in the range, row-major.
    pub fn iter(&self) -> impl Iterator<Item = Coord> + '_ {
        let (start, end) = (self.start, self.end);
        (start.row..=end.row).flat_map(move |row| (start.col..=end.col).map(move |col| Coord::new(row, col)))
    }

    /// "A1:B2", or "A1" for a single cell.
    pub fn to_a1(&self) -> String {
        if self.start == self.end {
            self.start.to_a1()
        } else {
            format!("{}:{}", self.start.to_a1(), self.end.to_a1())
        }
    }

    /// Parse "A1:B2" or a single "A1".
    pub fn parse_a1(s: &str) -> Option<Self> {
        match s.split_once(':') {
            Some((a, b)) => Some(Self::new(Coord::parse_a1(a)?, Coord::parse_a1(b)?)),
            None => Coord::parse_a1(s).map(Self::single),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
        assert_eq!(column_index("aa"), Some(26));
        assert_eq!(column_index("ZZ"), Some(701));
        assert_eq!(column_index(""), None);
    }

    #[test]
    fn test_a1_parse() {
        assert_eq!(Coord::parse_a1("B3"), Some(Coord::new(2, 1)));
        assert_eq!(Coord::parse_a1("A0"), None);
        assert_eq!(Coord::parse_a1("3B"), None);
        assert_eq!(Coord::new(0, 26).to_a1(), "AA1");
    }

    #[test]
    fn test_range_normalizes_corners() {
        let r = CellRange::new(Coord::new(4, 3), Coord::new(1, 0));
        assert_eq!(r.start(), Coord::new(1, 0));
        assert_eq!(r.end(), Coord::new(4, 3));
        assert_eq!(r.to_a1(), "A2:D5");
        assert_eq!(r.iter().count(), 16);
        assert!(r.contains(Coord::new(2, 2)));
        assert!(!r.contains(Coord::new(0, 0)));
    }

    #[test]
    fn test_clamp_to_sheet_bounds() {
        let huge = CellRange::new(Coord::new(10, 10), Coord::new(usize::MAX, usize::MAX));
        let clamped = huge.clamped().unwrap();
        assert_eq!(clamped.start(), Coord::new(10, 10));
        assert_eq!(clamped.end(), Coord::new(MAX_ROWS - 1, MAX_COLS - 1));

        let outside = CellRange::single(Coord::new(0, MAX_COLS));
        assert_eq!(outside.clamped(), None);

        let a = CellRange::new(Coord::new(0, 0), Coord::new(3, 3));
        let b = CellRange::new(Coord::new(2, 1), Coord::new(8, 2));
        assert_eq!(a.intersect(&b).unwrap().to_a1(), "B3:C4");
        assert_eq!(a.intersect(&CellRange::single(Coord::new(9, 9))), None);
    }

    #[test]
    fn test_coord_serializes_as_key() {
        let json = serde_json::to_string(&Coord::new(3, 7)).unwrap();
        assert_eq!(json, "\"3,7\"");
        let back: Coord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Coord::new(3, 7));
        assert!(serde_json::from_str::<Coord>("\"3;7\"").is_err());
    }

    #[test]
    fn test_range_wire_shape() {
        let r: CellRange =
            serde_json::from_str(r#"{"startRow":2,"startCol":2,"endRow":0,"endCol":0}"#).unwrap();
        assert_eq!(r.to_a1(), "A1:C3");
        let json = serde_json::to_value(r).unwrap();
        assert_eq!(json["startRow"], 0);
        assert_eq!(json["endCol"], 2);
    }
}
