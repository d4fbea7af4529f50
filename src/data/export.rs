use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::Dataset;

/// How exported fields are escaped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStyle {
    /// Quote fields containing the delimiter, quotes or line breaks.
    #[default]
    Rfc4180,
    /// Join fields verbatim. A field containing the delimiter shifts the
    /// columns of its line; kept for byte-compatible output with the web
    /// dashboard. Line breaks inside a field are written as spaces.
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub delimiter: char,
    pub quote_style: QuoteStyle,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote_style: QuoteStyle::Rfc4180,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("column {0} does not exist")]
    ColumnOutOfRange(usize),
    #[error("row {0} does not exist")]
    RowOutOfRange(usize),
    #[error("delimiter {0:?} must be a single ASCII character")]
    BadDelimiter(char),
    #[error("writing CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("flushing CSV: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialise the visible columns of the given rows, header record first.
///
/// The output always has `rows.len() + 1` records, each ending in `\n`. With
/// [`QuoteStyle::Rfc4180`] a quoted field may span several physical lines;
/// [`QuoteStyle::Legacy`] output is exactly one line per record.
pub fn export_delimited(
    dataset: &Dataset,
    columns: &[usize],
    rows: &[usize],
    options: &ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    if let Some(&bad) = columns.iter().find(|&&c| c >= dataset.column_count()) {
        return Err(ExportError::ColumnOutOfRange(bad));
    }
    if let Some(&bad) = rows.iter().find(|&&r| r >= dataset.len()) {
        return Err(ExportError::RowOutOfRange(bad));
    }
    let delimiter = u8::try_from(options.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or(ExportError::BadDelimiter(options.delimiter))?;

    let header = columns.iter().map(|&c| dataset.headers[c].clone());
    let body = rows.iter().map(|&r| {
        columns
            .iter()
            .map(|&c| dataset.rows[r][c].to_string())
            .collect::<Vec<_>>()
    });

    match options.quote_style {
        QuoteStyle::Rfc4180 => {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(delimiter)
                .terminator(csv::Terminator::Any(b'\n'))
                .quote_style(csv::QuoteStyle::Necessary)
                .from_writer(Vec::new());
            writer.write_record(header)?;
            for record in body {
                writer.write_record(&record)?;
            }
            writer.flush()?;
            writer
                .into_inner()
                .map_err(|e| ExportError::Io(e.into_error()))
        }
        QuoteStyle::Legacy => {
            let sep = char::from(delimiter).to_string();
            let mut out = String::new();
            for record in std::iter::once(header.collect::<Vec<_>>()).chain(body) {
                let line = record.join(&sep);
                out.push_str(&line.replace(|c| c == '\r' || c == '\n', " "));
                out.push('\n');
            }
            Ok(out.into_bytes())
        }
    }
}

/// `<stem>_<YYYYmmdd_HHMMSS>.<ext>`, used for CSV exports and chart snapshots.
pub fn export_file_name(stem: &str, ext: &str, now: NaiveDateTime) -> String {
    format!("{stem}_{}.{ext}", now.format("%Y%m%d_%H%M%S"))
}
