//! # Schema Normalizer
//!
//! Turns a loosely typed upstream table into a validated `Vec<StockRecord>`.
//!
//! The work is split into pure steps that each take and return a table, so
//! every repair can be exercised on its own:
//!
//! | Step | Function |
//! |------|----------|
//! | Collapse composite labels | [`flatten_columns`] |
//! | Strip whitespace from names | [`trim_names`] |
//! | Locate or rename `Close` | [`resolve_close`] |
//! | Derive or fill `Adj Close` | [`repair_adjusted_close`] |
//! | Keep canonical columns in order | [`select_canonical_columns`] |
//! | Validate and convert rows | [`convert_rows`] |
//!
//! Only a missing `Close` column is fatal. Bad rows are dropped, logged and
//! reported through [`NormalizationReport`].

use std::collections::HashSet;

use crate::domain::validate_price;
use crate::error::{NormalizationError, NormalizationRowError};
use crate::{StockRecord, UtcDateTime};

pub const DATE: &str = "Date";
pub const DATETIME: &str = "Datetime";
pub const OPEN: &str = "Open";
pub const HIGH: &str = "High";
pub const LOW: &str = "Low";
pub const CLOSE: &str = "Close";
pub const ADJ_CLOSE: &str = "Adj Close";
pub const VOLUME: &str = "Volume";

/// Output column order.
pub const CANONICAL_COLUMNS: [&str; 7] = [DATE, OPEN, HIGH, LOW, CLOSE, ADJ_CLOSE, VOLUME];

/// Column label as delivered by the upstream source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnLabel {
    Flat(String),
    /// Multi-level label such as `("AAPL", "Close")` or `("Date", "")`.
    Composite(Vec<String>),
}

impl ColumnLabel {
    pub fn flat(name: impl Into<String>) -> Self {
        Self::Flat(name.into())
    }

    pub fn composite<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Composite(parts.into_iter().map(Into::into).collect())
    }
}

/// Loosely typed table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Float(f64),
    Int(i64),
    Text(String),
    Time(UtcDateTime),
}

impl Cell {
    /// `true` for cells a fill step may overwrite.
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Float(value) => value.is_nan(),
            Self::Text(value) => value.trim().is_empty(),
            Self::Int(_) | Self::Time(_) => false,
        }
    }
}

/// Raw upstream rows before any repair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<ColumnLabel>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(columns: Vec<ColumnLabel>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Canonical-shaped table holding `records`, one row per record.
    pub fn from_records(records: &[StockRecord]) -> Self {
        let columns = CANONICAL_COLUMNS
            .iter()
            .map(|name| ColumnLabel::flat(*name))
            .collect();
        let rows = records
            .iter()
            .map(|record| {
                let volume = i64::try_from(record.volume)
                    .map(Cell::Int)
                    .unwrap_or(Cell::Float(record.volume as f64));
                vec![
                    Cell::Time(record.date),
                    Cell::Float(record.open),
                    Cell::Float(record.high),
                    Cell::Float(record.low),
                    Cell::Float(record.close),
                    Cell::Float(record.adjusted_close),
                    volume,
                ]
            })
            .collect();
        Self { columns, rows }
    }
}

/// Table with single-level, named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub names: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Frame {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    fn cell(&self, row: usize, column: usize) -> Cell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .cloned()
            .unwrap_or(Cell::Missing)
    }
}

/// Records kept plus rows dropped by a normalization run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationReport {
    pub records: Vec<StockRecord>,
    pub rejected: Vec<NormalizationRowError>,
}

/// Runs the full pipeline and returns only the surviving records.
///
/// # Errors
///
/// Returns [`NormalizationError::MissingColumn`] when no `Close` column can
/// be located.
pub fn normalize(table: RawTable) -> Result<Vec<StockRecord>, NormalizationError> {
    normalize_with_report(table).map(|report| report.records)
}

/// Runs the full pipeline and also returns the rejected rows.
pub fn normalize_with_report(table: RawTable) -> Result<NormalizationReport, NormalizationError> {
    if table.is_empty() {
        return Ok(NormalizationReport::default());
    }

    let frame = trim_names(flatten_columns(table));
    let frame = resolve_close(frame)?;
    let frame = select_canonical_columns(repair_adjusted_close(frame));
    Ok(convert_rows(&frame))
}

/// Collapses composite labels: the second part wins when non-empty,
/// otherwise the first part is used.
pub fn flatten_columns(table: RawTable) -> Frame {
    let names = table
        .columns
        .into_iter()
        .map(|label| match label {
            ColumnLabel::Flat(name) => name,
            ColumnLabel::Composite(mut parts) => {
                if parts.len() > 1 && !parts[1].is_empty() {
                    parts.swap_remove(1)
                } else if parts.is_empty() {
                    String::new()
                } else {
                    parts.swap_remove(0)
                }
            }
        })
        .collect();

    Frame {
        names,
        rows: table.rows,
    }
}

pub fn trim_names(mut frame: Frame) -> Frame {
    for name in &mut frame.names {
        let trimmed = name.trim();
        if trimmed.len() != name.len() {
            *name = trimmed.to_owned();
        }
    }
    frame
}

/// Ensures a column named exactly `Close` exists.
///
/// When absent, the first column whose name contains `Close` (case
/// sensitive) is renamed. That includes `Adj Close`.
pub fn resolve_close(mut frame: Frame) -> Result<Frame, NormalizationError> {
    if frame.position(CLOSE).is_some() {
        return Ok(frame);
    }

    let candidate = frame
        .names
        .iter()
        .position(|name| name.contains(CLOSE))
        .ok_or_else(|| NormalizationError::MissingColumn(CLOSE.to_owned()))?;

    tracing::debug!(
        column = %frame.names[candidate],
        "renaming close-like column to Close"
    );
    frame.names[candidate] = CLOSE.to_owned();
    Ok(frame)
}

/// Creates `Adj Close` from `Close`, or fills its gaps from `Close`.
///
/// Expects [`resolve_close`] to have run; without a `Close` column the frame
/// is returned unchanged.
pub fn repair_adjusted_close(mut frame: Frame) -> Frame {
    let Some(close) = frame.position(CLOSE) else {
        return frame;
    };

    match frame.position(ADJ_CLOSE) {
        None => {
            frame.names.push(ADJ_CLOSE.to_owned());
            let width = frame.names.len();
            for row in &mut frame.rows {
                let value = row.get(close).cloned().unwrap_or(Cell::Missing);
                row.resize(width - 1, Cell::Missing);
                row.push(value);
            }
        }
        Some(adjusted) => {
            for row in &mut frame.rows {
                let needs_fill = row.get(adjusted).map_or(true, Cell::is_missing);
                if !needs_fill {
                    continue;
                }
                let value = row.get(close).cloned().unwrap_or(Cell::Missing);
                if row.len() <= adjusted {
                    row.resize(adjusted + 1, Cell::Missing);
                }
                row[adjusted] = value;
            }
        }
    }

    frame
}

/// Keeps canonical columns in canonical order, dropping everything else.
///
/// `Datetime` stands in for `Date` when only the intraday label is present.
/// Absent columns are omitted rather than invented.
pub fn select_canonical_columns(frame: Frame) -> Frame {
    let date_source = frame.position(DATE).or_else(|| frame.position(DATETIME));

    let selected: Vec<(&str, usize)> = CANONICAL_COLUMNS
        .iter()
        .filter_map(|name| {
            let source = if *name == DATE {
                date_source
            } else {
                frame.position(name)
            };
            source.map(|index| (*name, index))
        })
        .collect();

    let rows = (0..frame.rows.len())
        .map(|row| {
            selected
                .iter()
                .map(|(_, column)| frame.cell(row, *column))
                .collect()
        })
        .collect();

    Frame {
        names: selected.iter().map(|(name, _)| (*name).to_owned()).collect(),
        rows,
    }
}

/// Validates every row in encounter order.
///
/// Rows with a missing or unparseable date, a missing or invalid price, or a
/// date already seen are dropped. Volume falls back to `0`.
pub fn convert_rows(frame: &Frame) -> NormalizationReport {
    let columns = RowColumns::locate(frame);
    let mut seen = HashSet::with_capacity(frame.rows.len());
    let mut report = NormalizationReport {
        records: Vec::with_capacity(frame.rows.len()),
        rejected: Vec::new(),
    };

    for row in 0..frame.rows.len() {
        match convert_row(frame, &columns, row, &mut seen) {
            Ok(record) => report.records.push(record),
            Err(rejection) => {
                tracing::warn!(row, reason = %rejection, "dropping invalid upstream row");
                report.rejected.push(rejection);
            }
        }
    }

    report
}

struct RowColumns {
    date: Option<usize>,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: Option<usize>,
    adjusted_close: Option<usize>,
    volume: Option<usize>,
}

impl RowColumns {
    fn locate(frame: &Frame) -> Self {
        Self {
            date: frame.position(DATE).or_else(|| frame.position(DATETIME)),
            open: frame.position(OPEN),
            high: frame.position(HIGH),
            low: frame.position(LOW),
            close: frame.position(CLOSE),
            adjusted_close: frame.position(ADJ_CLOSE),
            volume: frame.position(VOLUME),
        }
    }
}

fn convert_row(
    frame: &Frame,
    columns: &RowColumns,
    row: usize,
    seen: &mut HashSet<UtcDateTime>,
) -> Result<StockRecord, NormalizationRowError> {
    let date = read_date(frame, columns.date, row)?;
    let open = read_price(frame, columns.open, row, OPEN)?;
    let high = read_price(frame, columns.high, row, HIGH)?;
    let low = read_price(frame, columns.low, row, LOW)?;
    let close = read_price(frame, columns.close, row, CLOSE)?;
    let adjusted_close = read_price(frame, columns.adjusted_close, row, ADJ_CLOSE)?;
    let volume = columns
        .volume
        .map_or(0, |column| coerce_volume(&frame.cell(row, column)));

    if !seen.insert(date) {
        return Err(NormalizationRowError::DuplicateDate {
            row,
            date: date.format_rfc3339(),
        });
    }

    StockRecord::new(date, open, high, low, close, adjusted_close, volume)
        .map_err(|source| NormalizationRowError::InvalidPrice { row, source })
}

fn read_date(
    frame: &Frame,
    column: Option<usize>,
    row: usize,
) -> Result<UtcDateTime, NormalizationRowError> {
    let cell = column.map_or(Cell::Missing, |column| frame.cell(row, column));
    match cell {
        Cell::Time(value) => Ok(value),
        Cell::Int(seconds) => UtcDateTime::from_unix(seconds).map_err(|_| {
            NormalizationRowError::InvalidDate {
                row,
                value: seconds.to_string(),
            }
        }),
        Cell::Text(text) if !text.trim().is_empty() => {
            let trimmed = text.trim();
            UtcDateTime::parse(trimmed)
                .or_else(|_| UtcDateTime::parse_date(trimmed))
                .map_err(|_| NormalizationRowError::InvalidDate {
                    row,
                    value: text.clone(),
                })
        }
        Cell::Float(value) if !value.is_nan() => Err(NormalizationRowError::InvalidDate {
            row,
            value: value.to_string(),
        }),
        _ => Err(NormalizationRowError::MissingDate { row }),
    }
}

fn read_price(
    frame: &Frame,
    column: Option<usize>,
    row: usize,
    field: &'static str,
) -> Result<f64, NormalizationRowError> {
    let cell = column.map_or(Cell::Missing, |column| frame.cell(row, column));
    let value = match cell {
        Cell::Missing => return Err(NormalizationRowError::MissingPrice { row, field }),
        Cell::Float(value) => value,
        Cell::Int(value) => value as f64,
        Cell::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(NormalizationRowError::MissingPrice { row, field });
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| NormalizationRowError::UnparseablePrice {
                    row,
                    field,
                    value: text.clone(),
                })?
        }
        Cell::Time(value) => {
            return Err(NormalizationRowError::UnparseablePrice {
                row,
                field,
                value: value.format_rfc3339(),
            })
        }
    };

    validate_price(field, value)
        .map(|()| value)
        .map_err(|source| NormalizationRowError::InvalidPrice { row, source })
}

/// Missing, NaN, negative or unparseable volume becomes `0`; fractions truncate.
fn coerce_volume(cell: &Cell) -> u64 {
    match cell {
        Cell::Int(value) => u64::try_from(*value).unwrap_or(0),
        Cell::Float(value) => float_volume(*value),
        Cell::Text(text) => {
            let trimmed = text.trim();
            trimmed
                .parse::<u64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(float_volume))
                .unwrap_or(0)
        }
        Cell::Missing | Cell::Time(_) => 0,
    }
}

fn float_volume(value: f64) -> u64 {
    if value.is_finite() && value >= 0.0 {
        value.trunc() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValidationError;

    fn ts(value: &str) -> Cell {
        Cell::Time(UtcDateTime::parse(value).expect("valid ts"))
    }

    fn frame(names: &[&str], rows: Vec<Vec<Cell>>) -> Frame {
        Frame {
            names: names.iter().map(|name| (*name).to_owned()).collect(),
            rows,
        }
    }

    #[test]
    fn text_dates_are_trimmed_before_parsing() {
        let dates = frame(
            &["Date"],
            vec![
                vec![Cell::Text(String::from("  2024-01-02\t"))],
                vec![Cell::Text(String::from(" 2024-01-03T14:30:00Z "))],
                vec![Cell::Text(String::from(" 01/04/2024 "))],
            ],
        );

        assert_eq!(
            read_date(&dates, Some(0), 0),
            Ok(UtcDateTime::parse("2024-01-02T00:00:00Z").expect("valid ts"))
        );
        assert_eq!(
            read_date(&dates, Some(0), 1),
            Ok(UtcDateTime::parse("2024-01-03T14:30:00Z").expect("valid ts"))
        );
        assert!(matches!(
            read_date(&dates, Some(0), 2),
            Err(NormalizationRowError::InvalidDate { row: 2, .. })
        ));
    }

    #[test]
    fn flatten_prefers_second_part_then_first() {
        let table = RawTable::new(
            vec![
                ColumnLabel::composite(["Date", ""]),
                ColumnLabel::composite(["AAPL", "Close"]),
                ColumnLabel::flat("Volume"),
                ColumnLabel::composite(["Open"]),
            ],
            Vec::new(),
        );

        let flattened = flatten_columns(table);
        assert_eq!(flattened.names, vec!["Date", "Close", "Volume", "Open"]);
    }

    #[test]
    fn trim_names_strips_surrounding_whitespace() {
        let trimmed = trim_names(frame(&[" Close ", "Open\t"], Vec::new()));
        assert_eq!(trimmed.names, vec!["Close", "Open"]);
    }

    #[test]
    fn resolve_close_keeps_exact_match() {
        let resolved =
            resolve_close(frame(&["Close", "Close Price"], Vec::new())).expect("close present");
        assert_eq!(resolved.names, vec!["Close", "Close Price"]);
    }

    #[test]
    fn resolve_close_renames_first_substring_match() {
        let resolved =
            resolve_close(frame(&["Open", "Close Price", "Last Close"], Vec::new()))
                .expect("close-like column present");
        assert_eq!(resolved.names, vec!["Open", "Close", "Last Close"]);
    }

    #[test]
    fn resolve_close_is_case_sensitive() {
        let err = resolve_close(frame(&["Open", "close"], Vec::new())).expect_err("must fail");
        assert_eq!(err, NormalizationError::MissingColumn(String::from("Close")));
    }

    #[test]
    fn adjusted_close_is_derived_when_absent() {
        let repaired = repair_adjusted_close(frame(
            &["Close"],
            vec![vec![Cell::Float(10.0)], vec![Cell::Float(11.0)]],
        ));
        assert_eq!(repaired.names, vec!["Close", "Adj Close"]);
        assert_eq!(repaired.rows[1], vec![Cell::Float(11.0), Cell::Float(11.0)]);
    }

    #[test]
    fn adjusted_close_gaps_are_filled_from_close() {
        let repaired = repair_adjusted_close(frame(
            &["Close", "Adj Close"],
            vec![
                vec![Cell::Float(10.0), Cell::Float(9.5)],
                vec![Cell::Float(11.0), Cell::Float(f64::NAN)],
                vec![Cell::Float(12.0), Cell::Missing],
                vec![Cell::Float(13.0)],
            ],
        ));
        assert_eq!(repaired.rows[0][1], Cell::Float(9.5));
        assert_eq!(repaired.rows[1][1], Cell::Float(11.0));
        assert_eq!(repaired.rows[2][1], Cell::Float(12.0));
        assert_eq!(repaired.rows[3][1], Cell::Float(13.0));
    }

    #[test]
    fn select_reorders_and_drops_extra_columns() {
        let selected = select_canonical_columns(frame(
            &["Volume", "Dividends", "Close", "Datetime"],
            vec![vec![
                Cell::Int(5),
                Cell::Float(0.2),
                Cell::Float(1.0),
                ts("2024-01-02T14:30:00Z"),
            ]],
        ));
        assert_eq!(selected.names, vec!["Date", "Close", "Volume"]);
        assert_eq!(
            selected.rows[0],
            vec![ts("2024-01-02T14:30:00Z"), Cell::Float(1.0), Cell::Int(5)]
        );
    }

    #[test]
    fn nan_close_row_is_dropped_and_null_volume_becomes_zero() {
        let table = RawTable::new(
            vec![
                ColumnLabel::flat("Date"),
                ColumnLabel::flat("Open"),
                ColumnLabel::flat("High"),
                ColumnLabel::flat("Low"),
                ColumnLabel::flat("Close"),
                ColumnLabel::flat("Volume"),
            ],
            vec![
                vec![
                    ts("2024-01-02T00:00:00Z"),
                    Cell::Float(1.0),
                    Cell::Float(2.0),
                    Cell::Float(0.5),
                    Cell::Float(f64::NAN),
                    Cell::Int(100),
                ],
                vec![
                    ts("2024-01-03T00:00:00Z"),
                    Cell::Float(1.0),
                    Cell::Float(2.0),
                    Cell::Float(0.5),
                    Cell::Float(1.5),
                    Cell::Missing,
                ],
            ],
        );

        let report = normalize_with_report(table).expect("close column present");
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].volume, 0);
        assert_eq!(report.records[0].adjusted_close, 1.5);
        assert_eq!(report.rejected.len(), 1);
        assert!(matches!(
            report.rejected[0],
            NormalizationRowError::InvalidPrice {
                row: 0,
                source: ValidationError::NonFiniteValue { field: "Close" }
            }
        ));
    }

    #[test]
    fn duplicate_dates_keep_the_first_occurrence() {
        let row = |close: f64| {
            vec![
                ts("2024-01-02T00:00:00Z"),
                Cell::Float(1.0),
                Cell::Float(2.0),
                Cell::Float(0.5),
                Cell::Float(close),
            ]
        };
        let table = RawTable::new(
            ["Date", "Open", "High", "Low", "Close"]
                .into_iter()
                .map(ColumnLabel::flat)
                .collect(),
            vec![row(1.1), row(1.2)],
        );

        let report = normalize_with_report(table).expect("close column present");
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].close, 1.1);
        assert!(matches!(
            report.rejected[0],
            NormalizationRowError::DuplicateDate { row: 1, .. }
        ));
    }

    #[test]
    fn text_prices_are_coerced_and_garbage_is_rejected() {
        let table = RawTable::new(
            ["Date", "Open", "High", "Low", "Close", "Volume"]
                .into_iter()
                .map(ColumnLabel::flat)
                .collect(),
            vec![
                vec![
                    Cell::Text(String::from("2024-01-02")),
                    Cell::Text(String::from(" 1.25 ")),
                    Cell::Int(2),
                    Cell::Float(0.5),
                    Cell::Float(1.0),
                    Cell::Text(String::from("1200.9")),
                ],
                vec![
                    Cell::Text(String::from("2024-01-03")),
                    Cell::Text(String::from("n/a")),
                    Cell::Int(2),
                    Cell::Float(0.5),
                    Cell::Float(1.0),
                    Cell::Int(-4),
                ],
            ],
        );

        let report = normalize_with_report(table).expect("close column present");
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].open, 1.25);
        assert_eq!(report.records[0].high, 2.0);
        assert_eq!(report.records[0].volume, 1200);
        assert!(matches!(
            report.rejected[0],
            NormalizationRowError::UnparseablePrice { row: 1, field: "Open", .. }
        ));
    }

    #[test]
    fn empty_table_normalizes_to_empty_without_column_checks() {
        let table = RawTable::new(vec![ColumnLabel::flat("Open")], Vec::new());
        assert_eq!(normalize(table), Ok(Vec::new()));
    }

    #[test]
    fn missing_close_column_is_fatal() {
        let table = RawTable::new(
            vec![ColumnLabel::flat("Date"), ColumnLabel::flat("Open")],
            vec![vec![ts("2024-01-02T00:00:00Z"), Cell::Float(1.0)]],
        );
        assert_eq!(
            normalize(table),
            Err(NormalizationError::MissingColumn(String::from("Close")))
        );
    }

    #[test]
    fn volume_coercion_covers_every_cell_kind() {
        assert_eq!(coerce_volume(&Cell::Float(12.9)), 12);
        assert_eq!(coerce_volume(&Cell::Float(f64::NAN)), 0);
        assert_eq!(coerce_volume(&Cell::Float(-1.0)), 0);
        assert_eq!(coerce_volume(&Cell::Text(String::from("abc"))), 0);
        assert_eq!(coerce_volume(&Cell::Missing), 0);
    }
}
