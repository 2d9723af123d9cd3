// Chart descriptors
//
// Charts reference a sheet and a source range but never own grid data; the
// renderer pulls values through `series` when it draws.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cell::{CellValue, Grid};
use crate::coord::{CellRange, Coord};
use crate::sheet::SheetId;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Pie,
    Scatter,
    Area,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Default for Size {
    fn default() -> Self {
        Self { width: 400.0, height: 300.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: ChartKind,
    pub sheet_id: SheetId,
    pub data_range: CellRange,
    /// Renderer options, passed through untouched.
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub size: Size,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_title() -> String {
    Chart::DEFAULT_TITLE.to_string()
}

impl Chart {
    pub const DEFAULT_TITLE: &'static str = "New chart";

    pub fn new(sheet_id: SheetId, data_range: CellRange, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: Self::DEFAULT_TITLE.to_string(),
            kind: ChartKind::default(),
            sheet_id,
            data_range,
            options: serde_json::Map::new(),
            position: Position::default(),
            size: Size::default(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn with_kind(mut self, kind: ChartKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Apply the fields a patch sets and bump `updated_at`.
    pub fn apply(&mut self, patch: &ChartPatch, at: DateTime<Utc>) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(range) = patch.data_range {
            self.data_range = range;
        }
        if let Some(options) = &patch.options {
            self.options = options.clone();
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(size) = patch.size {
            self.size = size;
        }
        self.updated_at = at;
    }
}

/// Partial chart update. The owning sheet cannot be changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartPatch {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ChartKind>,
    pub data_range: Option<CellRange>,
    pub options: Option<serde_json::Map<String, serde_json::Value>>,
    pub position: Option<Position>,
    pub size: Option<Size>,
}

// ============================================================================
// Series preparation
// ============================================================================

/// Which edge of the range carries labels.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HeaderAxis {
    None,
    /// First column holds row labels.
    Row,
    /// First row holds column labels.
    Column,
    #[default]
    Both,
}

/// Whether each dataset is a column or a row of the range.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Columns,
    Rows,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeriesLayout {
    pub header_axis: HeaderAxis,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// Extract labels and numeric datasets from `range` of `grid`.
pub fn series(grid: &Grid, range: CellRange, layout: SeriesLayout) -> ChartData {
    let Some(range) = range.clamped() else {
        return ChartData::default();
    };
    let mut rows: Vec<Vec<CellValue>> = (range.start().row..=range.end().row)
        .map(|r| {
            (range.start().col..=range.end().col)
                .map(|c| grid.get(Coord::new(r, c)).clone())
                .collect()
        })
        .collect();

    let mut row_headers: Vec<String> = Vec::new();
    let mut col_headers: Vec<String> = Vec::new();

    if matches!(layout.header_axis, HeaderAxis::Row | HeaderAxis::Both) {
        row_headers = rows.iter_mut().map(|row| row.remove(0).display()).collect();
    }
    if matches!(layout.header_axis, HeaderAxis::Column | HeaderAxis::Both) && !rows.is_empty() {
        col_headers = rows.remove(0).iter().map(CellValue::display).collect();
        if !row_headers.is_empty() {
            row_headers.remove(0);
        }
    }

    let width = rows.first().map(Vec::len).unwrap_or(0);

    match layout.orientation {
        Orientation::Columns => {
            let labels = if row_headers.is_empty() {
                (1..=rows.len()).map(|i| i.to_string()).collect()
            } else {
                row_headers
            };
            let datasets = (0..width)
                .map(|i| Dataset {
                    label: col_headers.get(i).cloned().unwrap_or_else(|| format!("Series {}", i + 1)),
                    data: rows.iter().map(|row| row[i].as_number()).collect(),
                })
                .collect();
            ChartData { labels, datasets }
        }
        Orientation::Rows => {
            let labels = if col_headers.is_empty() {
                (1..=width).map(|i| i.to_string()).collect()
            } else {
                col_headers
            };
            let datasets = rows
                .iter()
                .enumerate()
                .map(|(i, row)| Dataset {
                    label: row_headers.get(i).cloned().unwrap_or_else(|| format!("Series {}", i + 1)),
                    data: row.iter().map(CellValue::as_number).collect(),
                })
                .collect();
            ChartData { labels, datasets }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Grid {
        let cell = |s: &str| CellValue::from_input(s);
        Grid::from_rows(vec![
            vec![cell(""), cell("Q1"), cell("Q2")],
            vec![cell("North"), cell("10"), cell("12")],
            vec![cell("South"), cell("7"), cell("n/a")],
        ])
    }

    #[test]
    fn test_series_by_columns_with_both_headers() {
        let range = CellRange::new(Coord::new(0, 0), Coord::new(2, 2));
        let data = series(&sample(), range, SeriesLayout::default());
        assert_eq!(data.labels, vec!["North", "South"]);
        assert_eq!(data.datasets.len(), 2);
        assert_eq!(data.datasets[0].label, "Q1");
        assert_eq!(data.datasets[0].data, vec![Some(10.0), Some(7.0)]);
        assert_eq!(data.datasets[1].data, vec![Some(12.0), None]);
    }

    #[test]
    fn test_series_by_rows() {
        let range = CellRange::new(Coord::new(0, 0), Coord::new(2, 2));
        let layout = SeriesLayout { header_axis: HeaderAxis::Both, orientation: Orientation::Rows };
        let data = series(&sample(), range, layout);
        assert_eq!(data.labels, vec!["Q1", "Q2"]);
        assert_eq!(data.datasets[1].label, "South");
        assert_eq!(data.datasets[1].data, vec![Some(7.0), None]);
    }

    #[test]
    fn test_series_without_headers() {
        let range = CellRange::new(Coord::new(1, 1), Coord::new(2, 2));
        let layout = SeriesLayout { header_axis: HeaderAxis::None, orientation: Orientation::Columns };
        let data = series(&sample(), range, layout);
        assert_eq!(data.labels, vec!["1", "2"]);
        assert_eq!(data.datasets[0].label, "Series 1");
    }

    #[test]
    fn test_series_past_the_sheet_is_empty() {
        let range = CellRange::single(Coord::new(0, crate::coord::MAX_COLS));
        assert_eq!(series(&sample(), range, SeriesLayout::default()), ChartData::default());
    }

    #[test]
    fn test_patch_keeps_sheet() {
        let at = Utc::now();
        let mut chart = Chart::new(SheetId::from("sheet1"), CellRange::single(Coord::new(0, 0)), at)
            .with_kind(ChartKind::Pie)
            .with_title("Draft");
        assert_eq!((chart.kind, chart.title.as_str()), (ChartKind::Pie, "Draft"));

        chart.apply(&ChartPatch { title: Some("Sales".into()), kind: Some(ChartKind::Line), ..Default::default() }, at);
        assert_eq!(chart.title, "Sales");
        assert_eq!(chart.kind, ChartKind::Line);
        assert_eq!(chart.sheet_id.as_str(), "sheet1");
        assert_eq!(chart.size, Size::default());
    }

    #[test]
    fn test_minimal_chart_json_fills_defaults() {
        let chart: Chart = serde_json::from_str(
            r#"{"sheetId":"sheet1","dataRange":{"startRow":0,"startCol":0,"endRow":3,"endCol":1}}"#,
        )
        .unwrap();
        assert_eq!(chart.title, "New chart");
        assert_eq!(chart.kind, ChartKind::Bar);
        assert_eq!(chart.size.width, 400.0);
        assert_eq!(chart.data_range.rows(), 4);
    }
}
