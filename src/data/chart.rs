use thiserror::Error;

use super::model::{CellValue, Dataset};

/// Rendering style picked in the visualize step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChartKind {
    #[default]
    Line,
    Bar,
    Area,
    Scatter,
    /// Share of the first series per category.
    Pie,
}

impl ChartKind {
    pub const ALL: [ChartKind; 5] = [
        ChartKind::Line,
        ChartKind::Bar,
        ChartKind::Area,
        ChartKind::Scatter,
        ChartKind::Pie,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ChartKind::Line => "Line",
            ChartKind::Bar => "Bar",
            ChartKind::Area => "Area",
            ChartKind::Scatter => "Scatter",
            ChartKind::Pie => "Pie",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChartError {
    #[error("select at least one series column")]
    NoSeries,
    #[error("column {0} does not exist")]
    ColumnOutOfRange(usize),
}

/// One plotted point. `x` is the position along the category axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub x: usize,
    pub value: CellValue,
}

impl ChartPoint {
    /// Numeric height, `None` for cells the renderer skips.
    pub fn y(&self) -> Option<f64> {
        self.value.as_f64()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub column: usize,
    pub points: Vec<ChartPoint>,
}

/// Category labels plus one series per selected column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartData {
    pub category_name: String,
    pub categories: Vec<String>,
    pub series: Vec<ChartSeries>,
}

/// Map visible rows into chart series.
///
/// Values are passed through untouched: no aggregation, binning or
/// null handling.
pub fn build_chart(
    dataset: &Dataset,
    rows: &[usize],
    category_column: usize,
    series_columns: &[usize],
) -> Result<ChartData, ChartError> {
    if series_columns.is_empty() {
        return Err(ChartError::NoSeries);
    }
    let width = dataset.column_count();
    if let Some(&bad) = std::iter::once(&category_column)
        .chain(series_columns)
        .find(|&&c| c >= width)
    {
        return Err(ChartError::ColumnOutOfRange(bad));
    }

    let visible: Vec<&Vec<CellValue>> = rows.iter().filter_map(|&r| dataset.rows.get(r)).collect();

    let categories = visible
        .iter()
        .map(|row| row[category_column].to_string())
        .collect();

    let series = series_columns
        .iter()
        .map(|&column| ChartSeries {
            name: dataset.headers[column].clone(),
            column,
            points: visible
                .iter()
                .enumerate()
                .map(|(x, row)| ChartPoint {
                    x,
                    value: row[column].clone(),
                })
                .collect(),
        })
        .collect();

    Ok(ChartData {
        category_name: dataset.headers[category_column].clone(),
        categories,
        series,
    })
}

/// One wedge of a pie chart. Angles are fractions of a full turn.
#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub label: String,
    pub value: f64,
    pub start: f64,
    pub sweep: f64,
}

/// Wedges for the first series, one per category with a positive value.
///
/// Zero, negative and non-numeric values have no share and are left out.
pub fn pie_slices(chart: &ChartData) -> Vec<PieSlice> {
    let Some(series) = chart.series.first() else {
        return Vec::new();
    };
    let values: Vec<(usize, f64)> = series
        .points
        .iter()
        .filter_map(|p| p.y().filter(|v| *v > 0.0).map(|v| (p.x, v)))
        .collect();
    let total: f64 = values.iter().map(|(_, v)| v).sum();
    if total <= 0.0 || !total.is_finite() {
        return Vec::new();
    }

    let mut start = 0.0;
    values
        .into_iter()
        .map(|(x, value)| {
            let sweep = value / total;
            let slice = PieSlice {
                label: chart.categories.get(x).cloned().unwrap_or_default(),
                value,
                start,
                sweep,
            };
            start += sweep;
            slice
        })
        .collect()
}

/// Category = first column, series = first later column holding a number.
pub fn default_chart_columns(dataset: &Dataset) -> Option<(usize, Vec<usize>)> {
    if dataset.column_count() < 2 {
        return None;
    }
    let series = (1..dataset.column_count()).find(|&c| dataset.is_numeric_column(c))?;
    Some((0, vec![series]))
}
