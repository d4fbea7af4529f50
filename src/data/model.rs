use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CellValue – a single cell of a loaded table
// ---------------------------------------------------------------------------

/// A cell value, typed once at parse time.
///
/// Text becomes `Number` only when it parses as a finite number and prints
/// back unchanged, so `Display` always reproduces the source text. Other
/// numeric spellings (`007`, `1.50`, `1e3`, `+5`, padded values) stay `Text`
/// and are numeric through [`CellValue::as_f64`]. Empty or whitespace-only
/// text becomes `Missing`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// Classify a raw text cell.
    pub fn from_text(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return CellValue::Missing;
        }
        match parse_number(raw) {
            Some(n) if CellValue::Number(n).to_string() == raw => CellValue::Number(n),
            _ => CellValue::Text(raw.to_string()),
        }
    }

    /// Numeric coercion used by the comparison operators, sort and charts.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => parse_number(s.trim()),
            CellValue::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Ordering used by the sort stage: numbers, then text, then missing.
    ///
    /// Numeric text ranks with the numbers. Numbers use `total_cmp`; text
    /// compares case-insensitively and falls back to byte order.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &CellValue) -> u8 {
            match v {
                CellValue::Missing => 2,
                _ if v.as_f64().is_some() => 0,
                _ => 1,
            }
        }
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.total_cmp(&b);
        }
        rank(self).cmp(&rank(other)).then_with(|| match (self, other) {
            (CellValue::Text(a), CellValue::Text(b)) => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b)),
            _ => Ordering::Equal,
        })
    }
}

/// Finite `f64` parse; rejects `NaN`/`inf` spellings that `str::parse` accepts.
pub fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Missing => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Ragged row handling
// ---------------------------------------------------------------------------

/// What to do with a data row whose length differs from the header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaggedRows {
    /// Pad short rows with `Missing`, truncate long rows.
    #[default]
    Pad,
    /// Drop the row and count it in the load report.
    Skip,
    /// Fail the whole load.
    Reject,
}

/// Counters collected while building a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub empty_rows_skipped: usize,
    pub rows_padded: usize,
    pub rows_truncated: usize,
    pub ragged_rows_dropped: usize,
}

// ---------------------------------------------------------------------------
// Dataset – headers + rows
// ---------------------------------------------------------------------------

/// A loaded table. Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Display name of the source (file name).
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Cell at `(row, column)`, `None` when either index is out of range.
    pub fn cell(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Whether any cell of `column` holds a number or numeric text.
    pub fn is_numeric_column(&self, column: usize) -> bool {
        self.rows
            .iter()
            .any(|r| r.get(column).and_then(CellValue::as_f64).is_some())
    }
}

/// Build a dataset from raw rows of string cells.
///
/// The first row that is not entirely blank becomes the header row. Blank
/// rows are skipped everywhere. Rows whose width differs from the header are
/// handled according to `ragged`.
pub(crate) struct DatasetBuilder {
    source: String,
    ragged: RaggedRows,
    headers: Option<Vec<String>>,
    rows: Vec<Vec<CellValue>>,
    report: LoadReport,
}

/// Raised by [`DatasetBuilder::push`] under [`RaggedRows::Reject`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RaggedRowError {
    /// 1-based data row number (header excluded).
    pub row: usize,
    pub expected: usize,
    pub found: usize,
}

impl DatasetBuilder {
    pub fn new(source: impl Into<String>, ragged: RaggedRows) -> Self {
        Self {
            source: source.into(),
            ragged,
            headers: None,
            rows: Vec::new(),
            report: LoadReport::default(),
        }
    }

    /// Feed one raw row already split into cells.
    pub fn push(&mut self, cells: Vec<CellValue>) -> Result<(), RaggedRowError> {
        if cells.iter().all(CellValue::is_missing) {
            self.report.empty_rows_skipped += 1;
            return Ok(());
        }

        let expected = match &self.headers {
            Some(headers) => headers.len(),
            None => {
                self.headers = Some(
                    cells
                        .iter()
                        .enumerate()
                        .map(|(i, c)| match c {
                            CellValue::Missing => format!("Column {}", i + 1),
                            other => other.to_string().trim().to_string(),
                        })
                        .collect(),
                );
                return Ok(());
            }
        };

        self.report.rows_read += 1;
        let mut row = cells;
        if row.len() != expected {
            match self.ragged {
                RaggedRows::Pad => {
                    if row.len() < expected {
                        self.report.rows_padded += 1;
                        row.resize(expected, CellValue::Missing);
                    } else {
                        self.report.rows_truncated += 1;
                        row.truncate(expected);
                    }
                }
                RaggedRows::Skip => {
                    self.report.ragged_rows_dropped += 1;
                    return Ok(());
                }
                RaggedRows::Reject => {
                    return Err(RaggedRowError {
                        row: self.report.rows_read,
                        expected,
                        found: row.len(),
                    });
                }
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// Header row plus at least one data row were seen.
    pub fn has_data(&self) -> bool {
        self.headers.is_some() && !self.rows.is_empty()
    }

    /// Number of non-blank rows seen, header included.
    pub fn non_empty_rows(&self) -> usize {
        usize::from(self.headers.is_some()) + self.report.rows_read
    }

    pub fn finish(self) -> (Dataset, LoadReport) {
        (
            Dataset {
                source: self.source,
                headers: self.headers.unwrap_or_default(),
                rows: self.rows,
            },
            self.report,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|c| CellValue::from_text(c)).collect()
    }

    #[test]
    fn cells_are_typed_once() {
        assert_eq!(CellValue::from_text("12.5"), CellValue::Number(12.5));
        assert_eq!(CellValue::from_text("-3"), CellValue::Number(-3.0));
        assert_eq!(CellValue::from_text("  "), CellValue::Missing);
        assert_eq!(CellValue::from_text("NaN"), CellValue::Text("NaN".into()));
        assert_eq!(
            CellValue::from_text("Excavator"),
            CellValue::Text("Excavator".into())
        );
    }

    #[test]
    fn numeric_spellings_keep_their_source_text() {
        for raw in ["007", "1.50", "1e3", "+5", " 12.5 ", "-0"] {
            let cell = CellValue::from_text(raw);
            assert_eq!(cell, CellValue::Text(raw.into()), "{raw}");
            assert_eq!(cell.to_string(), raw);
        }
        assert_eq!(CellValue::from_text("007").as_f64(), Some(7.0));
        assert_eq!(CellValue::from_text("1.50").as_f64(), Some(1.5));
        assert_eq!(CellValue::from_text("1e3").as_f64(), Some(1000.0));
        assert_eq!(CellValue::from_text(" 12.5 ").as_f64(), Some(12.5));
    }

    #[test]
    fn numeric_text_sorts_with_numbers() {
        let mut cells = vec![
            CellValue::Text("loader".into()),
            CellValue::from_text("010"),
            CellValue::Number(9.0),
            CellValue::from_text("1.50"),
        ];
        cells.sort_by(CellValue::sort_cmp);
        let shown: Vec<String> = cells.iter().map(CellValue::to_string).collect();
        assert_eq!(shown, vec!["1.50", "9", "010", "loader"]);
    }

    #[test]
    fn header_keeps_leading_zeros() {
        let mut b = DatasetBuilder::new("t.csv", RaggedRows::Pad);
        b.push(text_row(&["01", "2.0", "code"])).unwrap();
        b.push(text_row(&["x", "y", "007"])).unwrap();
        let (ds, _) = b.finish();
        assert_eq!(ds.headers, vec!["01", "2.0", "code"]);
        assert_eq!(ds.rows[0][2].to_string(), "007");
        assert!(ds.is_numeric_column(2));
    }

    #[test]
    fn integral_numbers_display_without_fraction() {
        assert_eq!(CellValue::Number(10.0).to_string(), "10");
        assert_eq!(CellValue::Number(2.25).to_string(), "2.25");
        assert_eq!(CellValue::Missing.to_string(), "");
    }

    #[test]
    fn sort_order_groups_numbers_text_missing() {
        let mut cells = vec![
            CellValue::Missing,
            CellValue::Text("b".into()),
            CellValue::Number(3.0),
            CellValue::Text("A".into()),
            CellValue::Number(-1.0),
        ];
        cells.sort_by(CellValue::sort_cmp);
        assert_eq!(
            cells,
            vec![
                CellValue::Number(-1.0),
                CellValue::Number(3.0),
                CellValue::Text("A".into()),
                CellValue::Text("b".into()),
                CellValue::Missing,
            ]
        );
    }

    #[test]
    fn builder_pads_short_rows_by_default() {
        let mut b = DatasetBuilder::new("t.csv", RaggedRows::Pad);
        b.push(text_row(&["id", "", "load"])).unwrap();
        b.push(text_row(&["1", "x"])).unwrap();
        b.push(text_row(&["", "", ""])).unwrap();
        b.push(text_row(&["2", "y", "3", "extra"])).unwrap();
        let (ds, report) = b.finish();

        assert_eq!(ds.headers, vec!["id", "Column 2", "load"]);
        assert_eq!(ds.rows[0][2], CellValue::Missing);
        assert_eq!(ds.rows[1].len(), 3);
        assert_eq!(report.rows_padded, 1);
        assert_eq!(report.rows_truncated, 1);
        assert_eq!(report.empty_rows_skipped, 1);
    }

    #[test]
    fn builder_skip_and_reject_policies() {
        let mut skip = DatasetBuilder::new("t", RaggedRows::Skip);
        skip.push(text_row(&["a", "b"])).unwrap();
        skip.push(text_row(&["1"])).unwrap();
        skip.push(text_row(&["1", "2"])).unwrap();
        let (ds, report) = skip.finish();
        assert_eq!(ds.len(), 1);
        assert_eq!(report.ragged_rows_dropped, 1);

        let mut reject = DatasetBuilder::new("t", RaggedRows::Reject);
        reject.push(text_row(&["a", "b"])).unwrap();
        let err = reject.push(text_row(&["1", "2", "3"])).unwrap_err();
        assert_eq!(
            err,
            RaggedRowError {
                row: 1,
                expected: 2,
                found: 3
            }
        );
    }
}
