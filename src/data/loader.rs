use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use arrow::array::{
    Array, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array, Int8Array,
    LargeStringArray, StringArray, UInt16Array, UInt32Array, UInt64Array, UInt8Array,
};
use arrow::util::display::array_value_to_string;
use calamine::{Data, Reader};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{CellValue, Dataset, DatasetBuilder, LoadReport, RaggedRows, RaggedRowError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file type: .{0} (expected CSV, TSV, XLSX/XLS/ODS, PDF or Parquet)")]
    UnsupportedExtension(String),

    #[error("no data found: {found} non-empty row(s), need a header row and at least one data row")]
    TooFewRows { found: usize },

    #[error("row {row} has {found} cell(s), header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("reading file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing delimited text: {0}")]
    Csv(#[from] csv::Error),

    #[error("reading spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("workbook has no worksheets")]
    NoWorksheet,

    #[error("extracting PDF text: {0}")]
    Pdf(String),

    #[error("reading parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("reading parquet batch: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl From<RaggedRowError> for LoadError {
    fn from(e: RaggedRowError) -> Self {
        LoadError::RaggedRow {
            row: e.row,
            expected: e.expected,
            found: e.found,
        }
    }
}

// ---------------------------------------------------------------------------
// Options / file kinds
// ---------------------------------------------------------------------------

/// Parser options, part of the persisted analytics settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub ragged_rows: RaggedRows,
    /// Field delimiter for `.csv` input (`.tsv` always uses tab).
    pub delimiter: char,
}

impl LoadOptions {
    /// Delimiter as a byte; non-ASCII choices fall back to `,`.
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .unwrap_or(b',')
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            ragged_rows: RaggedRows::Pad,
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Delimited { tab: bool },
    Spreadsheet,
    Pdf,
    Parquet,
}

impl FileKind {
    /// Classify by extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "csv" | "txt" => Ok(FileKind::Delimited { tab: false }),
            "tsv" => Ok(FileKind::Delimited { tab: true }),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(FileKind::Spreadsheet),
            "pdf" => Ok(FileKind::Pdf),
            "parquet" | "pq" => Ok(FileKind::Parquet),
            other => Err(LoadError::UnsupportedExtension(other.to_string())),
        }
    }
}

/// Extensions offered by the open dialog.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "csv", "tsv", "txt", "xlsx", "xlsm", "xlsb", "xls", "ods", "pdf", "parquet", "pq",
];

/// Template offered from the upload page.
pub const SAMPLE_CSV: &str = "\
date,equipment,site,engine_hours,fuel_l,payload_t,status
2024-01-08,EX-01,North pit,120,410.5,0,ok
2024-01-08,DT-07,North pit,96,288,412,ok
2024-01-09,EX-02,South pit,131,436.25,0,service
2024-01-09,DT-11,South pit,88,270.75,398,ok
2024-01-10,LD-03,Stockpile,74,190,0,fault
";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a dataset from a file.  Dispatch by extension.
///
/// `progress` receives the approximate percentage of bytes read (0-99).
pub fn load_file(
    path: &Path,
    options: &LoadOptions,
    progress: &AtomicU8,
) -> Result<(Dataset, LoadReport), LoadError> {
    let kind = FileKind::from_path(path)?;
    let bytes = read_with_progress(path, progress)?;
    parse_bytes(kind, &source_name(path), bytes, options)
}

/// Parse an in-memory file. Pure: no filesystem access.
pub fn parse_bytes(
    kind: FileKind,
    source: &str,
    bytes: Vec<u8>,
    options: &LoadOptions,
) -> Result<(Dataset, LoadReport), LoadError> {
    let mut builder = DatasetBuilder::new(source, options.ragged_rows);
    match kind {
        FileKind::Delimited { tab } => {
            let delimiter = if tab { b'\t' } else { options.delimiter_byte() };
            read_delimited(&bytes, delimiter, &mut builder)?
        }
        FileKind::Spreadsheet => read_spreadsheet(bytes, &mut builder)?,
        FileKind::Pdf => read_pdf(&bytes, &mut builder)?,
        FileKind::Parquet => read_parquet(bytes, &mut builder)?,
    }

    if !builder.has_data() {
        return Err(LoadError::TooFewRows {
            found: builder.non_empty_rows(),
        });
    }
    let (dataset, report) = builder.finish();
    log::info!(
        "Parsed {}: {} rows x {} columns ({report:?})",
        dataset.source,
        dataset.len(),
        dataset.column_count()
    );
    Ok((dataset, report))
}

pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

const CHUNK: usize = 64 * 1024;

fn read_with_progress(path: &Path, progress: &AtomicU8) -> Result<Vec<u8>, LoadError> {
    let mut file = std::fs::File::open(path)?;
    let total = file.metadata()?.len().max(1);
    let mut bytes = Vec::with_capacity(usize::try_from(total).unwrap_or(0));
    let mut chunk = vec![0u8; CHUNK];
    loop {
        let n = file.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
        let pct = (bytes.len() as u64 * 100 / total).min(99);
        progress.store(pct as u8, Ordering::Relaxed);
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

fn read_delimited(
    bytes: &[u8],
    delimiter: u8,
    builder: &mut DatasetBuilder,
) -> Result<(), LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    for result in reader.records() {
        let record = result?;
        builder.push(record.iter().map(CellValue::from_text).collect())?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Spreadsheets (first worksheet only)
// ---------------------------------------------------------------------------

fn read_spreadsheet(bytes: Vec<u8>, builder: &mut DatasetBuilder) -> Result<(), LoadError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(LoadError::NoWorksheet)??;

    for row in range.rows() {
        builder.push(row.iter().map(spreadsheet_cell).collect())?;
    }
    Ok(())
}

fn spreadsheet_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Missing,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) if f.is_finite() => CellValue::Number(*f),
        Data::Float(f) => CellValue::Text(f.to_string()),
        Data::String(s) => CellValue::from_text(s),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) if naive.time() == chrono::NaiveTime::MIN => {
                CellValue::Text(naive.date().format("%Y-%m-%d").to_string())
            }
            Some(naive) => CellValue::Text(naive.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// PDF: whitespace-tokenised text lines
// ---------------------------------------------------------------------------

fn read_pdf(bytes: &[u8], builder: &mut DatasetBuilder) -> Result<(), LoadError> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| LoadError::Pdf(e.to_string()))?;
    tokenize_text_table(&text, builder)
}

/// Every non-blank line is a row; runs of whitespace separate cells.
fn tokenize_text_table(text: &str, builder: &mut DatasetBuilder) -> Result<(), LoadError> {
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        builder.push(line.split_whitespace().map(CellValue::from_text).collect())?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet: flat columns
// ---------------------------------------------------------------------------

fn read_parquet(bytes: Vec<u8>, builder: &mut DatasetBuilder) -> Result<(), LoadError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(bytes))?.build()?;

    let mut header_pushed = false;
    for batch_result in reader {
        let batch = batch_result?;
        let schema = batch.schema();

        if !header_pushed {
            builder.push(
                schema
                    .fields()
                    .iter()
                    .map(|f| CellValue::Text(f.name().clone()))
                    .collect(),
            )?;
            header_pushed = true;
        }

        for row in 0..batch.num_rows() {
            builder.push(
                batch
                    .columns()
                    .iter()
                    .map(|col| arrow_cell(col, row))
                    .collect(),
            )?;
        }
    }
    Ok(())
}

/// Extract a single cell from an Arrow column at a given row.
fn arrow_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Missing;
    }

    macro_rules! numeric {
        ($($ty:ty),*) => {
            $(
                if let Some(arr) = col.as_any().downcast_ref::<$ty>() {
                    let v = arr.value(row) as f64;
                    return if v.is_finite() {
                        CellValue::Number(v)
                    } else {
                        CellValue::Text(v.to_string())
                    };
                }
            )*
        };
    }
    numeric!(
        Int8Array, Int16Array, Int32Array, Int64Array, UInt8Array, UInt16Array, UInt32Array,
        UInt64Array, Float32Array, Float64Array
    );

    if let Some(s) = col.as_any().downcast_ref::<StringArray>() {
        return CellValue::from_text(s.value(row));
    }
    if let Some(s) = col.as_any().downcast_ref::<LargeStringArray>() {
        return CellValue::from_text(s.value(row));
    }

    match array_value_to_string(col.as_ref(), row) {
        Ok(s) => CellValue::from_text(&s),
        Err(e) => {
            log::warn!("Unrenderable {:?} cell at row {row}: {e}", col.data_type());
            CellValue::Missing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn parse_csv(text: &str, options: &LoadOptions) -> Result<(Dataset, LoadReport), LoadError> {
        parse_bytes(
            FileKind::Delimited { tab: false },
            "test.csv",
            text.as_bytes().to_vec(),
            options,
        )
    }

    #[test]
    fn csv_first_row_is_header() {
        let (ds, report) = parse_csv(
            "equipment,hours,status\nEX-01,120,ok\n,,\nDT-07,95.5,\"needs, service\"\n",
            &LoadOptions::default(),
        )
        .unwrap();

        assert_eq!(ds.headers, vec!["equipment", "hours", "status"]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows[1][1], CellValue::Number(95.5));
        assert_eq!(ds.rows[1][2], CellValue::Text("needs, service".into()));
        assert_eq!(report.empty_rows_skipped, 1);
    }

    #[test]
    fn csv_with_only_header_is_too_few_rows() {
        let err = parse_csv("a,b\n\n", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::TooFewRows { found: 1 }), "{err:?}");
    }

    #[test]
    fn ragged_csv_respects_policy() {
        let text = "a,b,c\n1,2\n4,5,6\n";
        let (padded, _) = parse_csv(text, &LoadOptions::default()).unwrap();
        assert_eq!(padded.rows[0], vec![
            CellValue::Number(1.0),
            CellValue::Number(2.0),
            CellValue::Missing
        ]);

        let reject = LoadOptions {
            ragged_rows: RaggedRows::Reject,
            ..LoadOptions::default()
        };
        let err = parse_csv(text, &reject).unwrap_err();
        assert!(matches!(err, LoadError::RaggedRow { row: 1, expected: 3, found: 2 }));
    }

    #[test]
    fn semicolon_delimiter_option() {
        let opts = LoadOptions {
            delimiter: ';',
            ..LoadOptions::default()
        };
        let (ds, _) = parse_csv("a;b\n1;x\n", &opts).unwrap();
        assert_eq!(ds.headers, vec!["a", "b"]);
        assert_eq!(ds.rows[0][1], CellValue::Text("x".into()));
    }

    #[test]
    fn sample_template_loads() {
        let (ds, report) = parse_csv(SAMPLE_CSV, &LoadOptions::default()).unwrap();
        assert_eq!(ds.column_count(), 7);
        assert_eq!(ds.len(), 5);
        assert_eq!(report.rows_read, 5);
        assert_eq!(report.rows_padded + report.rows_truncated, 0);
        assert_eq!(ds.rows[2][4].to_string(), "436.25");
        assert!(ds.is_numeric_column(3));
    }

    #[test]
    fn csv_keeps_numeric_spelling_and_header_text() {
        let (ds, _) = parse_csv("01,code\nx,007\ny,1.50\n", &LoadOptions::default()).unwrap();
        assert_eq!(ds.headers, vec!["01", "code"]);
        let shown: Vec<String> = ds.rows.iter().map(|r| r[1].to_string()).collect();
        assert_eq!(shown, vec!["007", "1.50"]);
        assert_eq!(ds.rows[1][1].as_f64(), Some(1.5));
    }

    #[test]
    fn unsupported_extension() {
        let err = FileKind::from_path(Path::new("report.docx")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedExtension(ext) if ext == "docx"));
        assert_eq!(
            FileKind::from_path(Path::new("DATA.XLSX")).unwrap(),
            FileKind::Spreadsheet
        );
    }

    #[test]
    fn text_lines_split_on_whitespace() {
        let mut b = DatasetBuilder::new("scan.pdf", RaggedRows::Pad);
        tokenize_text_table("  Unit   Hours\n\nEX-01  120\r\nDT-07\t95\n", &mut b).unwrap();
        let (ds, _) = b.finish();
        assert_eq!(ds.headers, vec!["Unit", "Hours"]);
        assert_eq!(ds.rows.len(), 2);
        assert_eq!(ds.rows[1], vec![
            CellValue::Text("DT-07".into()),
            CellValue::Number(95.0)
        ]);
    }

    #[test]
    fn load_file_reads_tsv_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        write!(file, "unit\tfuel\nEX-01\t40\n").unwrap();
        let progress = AtomicU8::new(0);
        let (ds, _) = load_file(file.path(), &LoadOptions::default(), &progress).unwrap();
        assert_eq!(ds.headers, vec!["unit", "fuel"]);
        assert_eq!(ds.rows[0][1], CellValue::Number(40.0));
        assert_eq!(progress.load(Ordering::Relaxed), 99);
    }

    #[test]
    fn xlsx_first_sheet_is_loaded() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "unit").unwrap();
        sheet.write_string(0, 1, "hours").unwrap();
        sheet.write_string(1, 0, "EX-01").unwrap();
        sheet.write_number(1, 1, 120.0).unwrap();
        sheet.write_string(2, 0, "DT-07").unwrap();
        sheet.write_number(2, 1, 95.5).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let (ds, _) =
            parse_bytes(FileKind::Spreadsheet, "t.xlsx", bytes, &LoadOptions::default()).unwrap();
        assert_eq!(ds.headers, vec!["unit", "hours"]);
        assert_eq!(ds.rows, vec![
            vec![CellValue::Text("EX-01".into()), CellValue::Number(120.0)],
            vec![CellValue::Text("DT-07".into()), CellValue::Number(95.5)],
        ]);
    }

    #[test]
    fn xlsx_text_cells_keep_their_spelling() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "01").unwrap();
        sheet.write_string(0, 1, "rate").unwrap();
        sheet.write_string(1, 0, "007").unwrap();
        sheet.write_string(1, 1, "1.50").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let (ds, _) =
            parse_bytes(FileKind::Spreadsheet, "t.xlsx", bytes, &LoadOptions::default()).unwrap();
        assert_eq!(ds.headers, vec!["01", "rate"]);
        assert_eq!(ds.rows[0], vec![
            CellValue::Text("007".into()),
            CellValue::Text("1.50".into())
        ]);
        assert_eq!(ds.rows[0][1].as_f64(), Some(1.5));
    }

    #[test]
    fn parquet_flat_columns() {
        use arrow::datatypes::{DataType, Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let schema = Arc::new(Schema::new(vec![
            Field::new("unit", DataType::Utf8, false),
            Field::new("hours", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["EX-01", "DT-07"])),
                Arc::new(Int64Array::from(vec![Some(120), None])),
            ],
        )
        .unwrap();
        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let (ds, _) =
            parse_bytes(FileKind::Parquet, "t.parquet", buf, &LoadOptions::default()).unwrap();
        assert_eq!(ds.headers, vec!["unit", "hours"]);
        assert_eq!(ds.rows[0][1], CellValue::Number(120.0));
        assert_eq!(ds.rows[1][1], CellValue::Missing);
    }
}
