use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use super::model::{parse_number, CellValue, Dataset};

// ---------------------------------------------------------------------------
// Filter predicates
// ---------------------------------------------------------------------------

/// A predicate on a single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Case-insensitive substring.
    Contains(String),
    /// Case-insensitive equality; numeric equality when both sides are numbers.
    Equals(String),
    GreaterThan(f64),
    LessThan(f64),
    /// Cell display string is one of the selected values.
    OneOf(BTreeSet<String>),
    /// Inclusive date range; a missing bound is unbounded.
    DateRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

/// Operator choice offered by the filter editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Contains,
    Equals,
    GreaterThan,
    LessThan,
    OneOf,
    DateRange,
}

impl FilterKind {
    pub const ALL: [FilterKind; 6] = [
        FilterKind::Contains,
        FilterKind::Equals,
        FilterKind::GreaterThan,
        FilterKind::LessThan,
        FilterKind::OneOf,
        FilterKind::DateRange,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FilterKind::Contains => "contains",
            FilterKind::Equals => "equals",
            FilterKind::GreaterThan => ">",
            FilterKind::LessThan => "<",
            FilterKind::OneOf => "one of",
            FilterKind::DateRange => "date range",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("'{0}' is not a date (expected YYYY-MM-DD)")]
    BadDate(String),
}

impl FilterOp {
    /// Build an operator from text typed in the filter editor.
    ///
    /// `OneOf` takes a comma-separated list; `DateRange` takes `from..to`
    /// where either side may be empty.
    pub fn parse(kind: FilterKind, input: &str) -> Result<Self, FilterError> {
        let input = input.trim();
        match kind {
            FilterKind::Contains => Ok(FilterOp::Contains(input.to_string())),
            FilterKind::Equals => Ok(FilterOp::Equals(input.to_string())),
            FilterKind::GreaterThan => parse_number(input)
                .map(FilterOp::GreaterThan)
                .ok_or_else(|| FilterError::NotANumber(input.to_string())),
            FilterKind::LessThan => parse_number(input)
                .map(FilterOp::LessThan)
                .ok_or_else(|| FilterError::NotANumber(input.to_string())),
            FilterKind::OneOf => Ok(FilterOp::OneOf(
                input
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            FilterKind::DateRange => {
                let (from, to) = input.split_once("..").unwrap_or((input, ""));
                Ok(FilterOp::DateRange {
                    from: parse_bound(from)?,
                    to: parse_bound(to)?,
                })
            }
        }
    }

    /// Evaluate against one cell.
    pub fn matches(&self, cell: &CellValue) -> bool {
        match self {
            FilterOp::Contains(needle) => cell
                .to_string()
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            FilterOp::Equals(expected) => {
                let expected = expected.trim();
                if let (Some(a), Some(b)) = (cell.as_f64(), parse_number(expected)) {
                    return a == b;
                }
                cell.to_string().trim().to_lowercase() == expected.to_lowercase()
            }
            FilterOp::GreaterThan(n) => cell.as_f64().is_some_and(|v| v > *n),
            FilterOp::LessThan(n) => cell.as_f64().is_some_and(|v| v < *n),
            FilterOp::OneOf(selected) => selected.contains(&cell.to_string()),
            FilterOp::DateRange { from, to } => match parse_date(&cell.to_string()) {
                Some(d) => from.map_or(true, |f| d >= f) && to.map_or(true, |t| d <= t),
                None => false,
            },
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOp::Contains(v) => write!(f, "contains \"{v}\""),
            FilterOp::Equals(v) => write!(f, "= \"{v}\""),
            FilterOp::GreaterThan(n) => write!(f, "> {n}"),
            FilterOp::LessThan(n) => write!(f, "< {n}"),
            FilterOp::OneOf(set) => {
                let items: Vec<&str> = set.iter().map(String::as_str).collect();
                write!(f, "in {{{}}}", items.join(", "))
            }
            FilterOp::DateRange { from, to } => {
                let bound = |d: &Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
                write!(f, "date {}..{}", bound(from), bound(to))
            }
        }
    }
}

fn parse_bound(s: &str) -> Result<Option<NaiveDate>, FilterError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    parse_date(s)
        .map(Some)
        .ok_or_else(|| FilterError::BadDate(s.to_string()))
}

/// Lenient date parse covering ISO dates/timestamps and day-first formats.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

// ---------------------------------------------------------------------------
// FilterSpec – predicate bound to a column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub column: usize,
    pub op: FilterOp,
}

impl FilterSpec {
    pub fn new(column: usize, op: FilterOp) -> Self {
        Self { column, op }
    }

    /// A column index past the end of the row fails the predicate.
    pub fn matches(&self, row: &[CellValue]) -> bool {
        row.get(self.column).is_some_and(|cell| self.op.matches(cell))
    }
}

/// Return indices of rows that pass every filter (logical AND), in dataset order.
pub fn filtered_indices(dataset: &Dataset, filters: &[FilterSpec]) -> Vec<usize> {
    dataset
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| filters.iter().all(|f| f.matches(row)))
        .map(|(i, _)| i)
        .collect()
}

/// Sorted distinct display values of a column, for the multi-select editor.
pub fn unique_values(dataset: &Dataset, column: usize) -> BTreeSet<String> {
    dataset
        .rows
        .iter()
        .filter_map(|row| row.get(column))
        .map(CellValue::to_string)
        .collect()
}
