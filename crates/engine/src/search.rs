//! Find and replace over a single sheet grid.
//!
//! Matching is done on the display text of each non-blank cell, scanning
//! row-major. A plain-text query is escaped and compiled like a regex so both
//! modes share one matcher.

use regex::{NoExpand, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::cell::{CellValue, Grid};
use crate::coord::Coord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchQuery {
    pub text: String,
    pub replacement: String,
    pub case_sensitive: bool,
    /// The whole cell text must match, not a substring.
    pub whole_cell: bool,
    /// Treat `text` as a regular expression; `replacement` may use `$1`.
    pub regex: bool,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Default::default() }
    }

    pub fn replace_with(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = replacement.into();
        self
    }

    /// Build the matcher. Returns None for an empty query or a pattern that
    /// does not compile.
    pub fn compile(&self) -> Option<Matcher> {
        if self.text.is_empty() {
            return None;
        }

        let body = if self.regex { self.text.clone() } else { regex::escape(&self.text) };
        let pattern = if self.whole_cell { format!("^(?:{body})$") } else { body };

        match RegexBuilder::new(&pattern).case_insensitive(!self.case_sensitive).build() {
            Ok(re) => Some(Matcher { re, query: self.clone() }),
            Err(e) => {
                log::warn!("ignoring search pattern {:?}: {}", self.text, e);
                None
            }
        }
    }
}

/// A compiled [`SearchQuery`].
#[derive(Debug, Clone)]
pub struct Matcher {
    re: Regex,
    query: SearchQuery,
}

impl Matcher {
    pub fn is_match(&self, value: &CellValue) -> bool {
        !value.is_blank() && self.re.is_match(&value.display())
    }

    /// The replaced value, or None if the cell does not match.
    pub fn replace(&self, value: &CellValue) -> Option<CellValue> {
        if !self.is_match(value) {
            return None;
        }
        let text = value.display();
        let replaced = if self.query.regex {
            self.re.replace_all(&text, self.query.replacement.as_str())
        } else {
            self.re.replace_all(&text, NoExpand(&self.query.replacement))
        };
        Some(CellValue::from_input(&replaced))
    }
}

/// Next match strictly after `after` in row-major order, wrapping to the top
/// once. With `after == None` the scan starts at the first cell.
pub fn find_next(grid: &Grid, query: &SearchQuery, after: Option<Coord>) -> Option<Coord> {
    let matcher = query.compile()?;
    let mut first = None;
    for (coord, value) in grid.cells() {
        if !matcher.is_match(value) {
            continue;
        }
        match after {
            Some(pos) if coord <= pos => {
                first.get_or_insert(coord);
            }
            _ => return Some(coord),
        }
    }
    first
}

pub fn find_all(grid: &Grid, query: &SearchQuery) -> Vec<Coord> {
    let Some(matcher) = query.compile() else {
        return Vec::new();
    };
    grid.cells()
        .filter(|(_, value)| matcher.is_match(value))
        .map(|(coord, _)| coord)
        .collect()
}

/// Replace every match in `grid`. Returns the number of cells changed.
pub fn replace_all(grid: &mut Grid, query: &SearchQuery) -> usize {
    let Some(matcher) = query.compile() else {
        return 0;
    };
    let updates: Vec<(Coord, CellValue)> = grid
        .cells()
        .filter_map(|(coord, value)| {
            let next = matcher.replace(value)?;
            (next != *value).then_some((coord, next))
        })
        .collect();

    let changed = updates.len();
    for (coord, value) in updates {
        grid.set(coord, value);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        let cell = |s: &str| CellValue::from_input(s);
        Grid::from_rows(vec![
            vec![cell("Apple"), cell("pear"), cell("")],
            vec![cell("apple pie"), cell("42"), cell("Plum")],
        ])
    }

    #[test]
    fn test_find_all_case_insensitive_by_default() {
        let hits = find_all(&grid(), &SearchQuery::new("apple"));
        assert_eq!(hits, vec![Coord::new(0, 0), Coord::new(1, 0)]);
    }

    #[test]
    fn test_case_sensitive_and_whole_cell() {
        let q = SearchQuery { case_sensitive: true, ..SearchQuery::new("apple") };
        assert_eq!(find_all(&grid(), &q), vec![Coord::new(1, 0)]);

        let q = SearchQuery { whole_cell: true, ..SearchQuery::new("apple") };
        assert_eq!(find_all(&grid(), &q), vec![Coord::new(0, 0)]);
    }

    #[test]
    fn test_find_next_wraps() {
        let q = SearchQuery::new("apple");
        assert_eq!(find_next(&grid(), &q, None), Some(Coord::new(0, 0)));
        assert_eq!(find_next(&grid(), &q, Some(Coord::new(0, 0))), Some(Coord::new(1, 0)));
        assert_eq!(find_next(&grid(), &q, Some(Coord::new(1, 0))), Some(Coord::new(0, 0)));
        assert_eq!(find_next(&grid(), &SearchQuery::new("kiwi"), None), None);
    }

    #[test]
    fn test_empty_and_invalid_queries_match_nothing() {
        assert!(find_all(&grid(), &SearchQuery::new("")).is_empty());
        let bad = SearchQuery { regex: true, ..SearchQuery::new("(") };
        assert!(find_all(&grid(), &bad).is_empty());
    }

    #[test]
    fn test_replace_all_reparses_numbers() {
        let mut g = grid();
        let q = SearchQuery::new("42").replace_with("43");
        assert_eq!(replace_all(&mut g, &q), 1);
        assert_eq!(*g.get(Coord::new(1, 1)), CellValue::Number(43.0));
    }

    #[test]
    fn test_plain_replacement_is_literal() {
        let mut g = grid();
        let q = SearchQuery::new("plum").replace_with("$1 cost");
        replace_all(&mut g, &q);
        assert_eq!(*g.get(Coord::new(1, 2)), CellValue::from("$1 cost"));
    }

    #[test]
    fn test_regex_replacement_expands_groups() {
        let mut g = grid();
        let q = SearchQuery { regex: true, ..SearchQuery::new(r"(\w+) pie") }.replace_with("${1} tart");
        assert_eq!(replace_all(&mut g, &q), 1);
        assert_eq!(*g.get(Coord::new(1, 0)), CellValue::from("apple tart"));
    }
}
