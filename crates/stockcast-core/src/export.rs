//! CSV export of normalized records.

use std::io::Write;
use std::path::Path;

use crate::error::ExportError;
use crate::StockRecord;

/// CSV header. Adjusted close is spelled with a space here, unlike the
/// `Adj_Close` JSON field.
pub const CSV_HEADER: [&str; 7] = ["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"];

/// Writes `records` as CSV to `writer`, header first.
pub fn write_csv<W: Write>(writer: W, records: &[StockRecord]) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;

    for record in records {
        wtr.write_record([
            csv_date(record),
            record.open.to_string(),
            record.high.to_string(),
            record.low.to_string(),
            record.close.to_string(),
            record.adjusted_close.to_string(),
            record.volume.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Renders `records` to an in-memory CSV string.
pub fn export_csv_string(records: &[StockRecord]) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, records)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Writes `records` to the file at `path`, replacing it if present.
pub fn export_csv(path: &Path, records: &[StockRecord]) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    write_csv(std::io::BufWriter::new(file), records)
}

/// Midnight stamps are written as plain dates, anything else as RFC3339.
fn csv_date(record: &StockRecord) -> String {
    if record.date.start_of_day() == record.date {
        record.date.format_date()
    } else {
        record.date.format_rfc3339()
    }
}
