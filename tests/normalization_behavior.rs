//! Behavior-driven tests for the schema normalizer
//!
//! These tests feed heterogeneous upstream tables through the full
//! normalization pipeline and check the canonical records that come out.

mod support;

use stockcast_core::{
    normalize, normalize_with_report, Cell, ColumnLabel, NormalizationError, RawTable,
    StockRecord,
};
use support::{chart_table, january_rows, midnight};

// =============================================================================
// Round trips and idempotence
// =============================================================================

#[test]
fn when_records_are_serialized_and_read_back_every_field_survives() {
    // Given: Records normalized from upstream-shaped rows
    let records = normalize(january_rows()).expect("valid rows");

    // When: They go through the cache encoding and back
    let payload = serde_json::to_vec(&records).expect("serializes");
    let decoded: Vec<StockRecord> = serde_json::from_slice(&payload).expect("deserializes");

    // Then: Nothing changed
    assert_eq!(decoded, records);
}

#[test]
fn when_full_precision_prices_are_cached_they_come_back_bit_for_bit() {
    // Given: Records carrying full-precision doubles like upstream adjclose
    let mut rng = fastrand::Rng::with_seed(7);
    let mut records = vec![StockRecord::new(
        midnight("2024-01-02"),
        116.48059100279703,
        117.0,
        115.0,
        116.48059100279703,
        116.48059100279703,
        1,
    )
    .expect("valid record")];
    for day in 0..5_000 {
        let price = rng.f64() * 1_000.0;
        records.push(
            StockRecord::new(
                midnight("2024-01-02").checked_add_days(day + 1).expect("in range"),
                price,
                price,
                price,
                price,
                price,
                day as u64,
            )
            .expect("valid record"),
        );
    }

    // When: They go through the cache encoding and back
    let payload = serde_json::to_vec(&records).expect("serializes");
    let decoded: Vec<StockRecord> = serde_json::from_slice(&payload).expect("deserializes");

    // Then: Every price is identical, not merely close
    for (before, after) in records.iter().zip(&decoded) {
        assert_eq!(before.close.to_bits(), after.close.to_bits());
        assert_eq!(before.adjusted_close.to_bits(), after.adjusted_close.to_bits());
    }
    assert_eq!(decoded, records);
}

#[test]
fn when_canonical_records_are_normalized_again_nothing_changes() {
    // Given: Already-canonical records
    let records = normalize(january_rows()).expect("valid rows");

    // When: A table built from them is normalized
    let again = normalize(RawTable::from_records(&records)).expect("canonical table");

    // Then: The output equals the input
    assert_eq!(again, records);
}

// =============================================================================
// Column repair
// =============================================================================

#[test]
fn when_only_adjusted_close_exists_it_becomes_close_and_is_copied_back() {
    // Given: A table that carries "Adj Close" but no "Close"
    let table = RawTable::new(
        vec![
            ColumnLabel::composite(["Date", ""]),
            ColumnLabel::composite(["MSFT", "Open"]),
            ColumnLabel::composite(["MSFT", "High"]),
            ColumnLabel::composite(["MSFT", "Low"]),
            ColumnLabel::composite(["MSFT", " Adj Close "]),
        ],
        vec![vec![
            Cell::Time(midnight("2024-02-01")),
            Cell::Float(400.0),
            Cell::Float(410.0),
            Cell::Float(395.0),
            Cell::Float(405.5),
        ]],
    );

    // When: The table is normalized
    let records = normalize(table).expect("close-like column present");

    // Then: The renamed column feeds both close fields
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].close, 405.5);
    assert_eq!(records[0].adjusted_close, 405.5);
}

#[test]
fn when_no_close_like_column_exists_normalization_fails() {
    // Given: A table with prices under unrelated names
    let table = RawTable::new(
        vec![ColumnLabel::flat("Date"), ColumnLabel::flat("Last")],
        vec![vec![Cell::Time(midnight("2024-02-01")), Cell::Float(1.0)]],
    );

    // When / Then: The normalizer reports the missing column
    assert_eq!(
        normalize(table),
        Err(NormalizationError::MissingColumn(String::from("Close")))
    );
}

#[test]
fn when_intraday_data_uses_datetime_label_it_is_accepted_as_date() {
    // Given: A flat table labelled the way intraday downloads are
    let stamp = stockcast_core::UtcDateTime::parse("2024-02-01T14:35:00Z").expect("valid ts");
    let table = RawTable::new(
        ["Datetime", "Open", "High", "Low", "Close", "Volume"]
            .into_iter()
            .map(ColumnLabel::flat)
            .collect(),
        vec![vec![
            Cell::Time(stamp),
            Cell::Float(1.0),
            Cell::Float(1.2),
            Cell::Float(0.9),
            Cell::Float(1.1),
            Cell::Int(300),
        ]],
    );

    // When: The table is normalized
    let records = normalize(table).expect("valid rows");

    // Then: The timestamp is kept as-is
    assert_eq!(records[0].date, stamp);
    assert_eq!(records[0].volume, 300);
}

// =============================================================================
// Row repair
// =============================================================================

#[test]
fn when_close_is_null_row_is_dropped_and_reported() {
    // Given: Rows where the middle close is NaN
    let table = chart_table(
        "AAPL",
        &[
            ("2024-01-02", 185.64, Some(1)),
            ("2024-01-03", f64::NAN, Some(2)),
            ("2024-01-04", 181.91, None),
        ],
    );

    // When: The table is normalized with a report
    let report = normalize_with_report(table).expect("close column present");

    // Then: Two records survive, one row is reported, null volume became 0
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].row(), 1);
    assert_eq!(report.records[1].volume, 0);
    assert_eq!(report.records[1].date, midnight("2024-01-04"));
}

#[test]
fn when_upstream_returns_no_rows_result_is_empty() {
    // Given: A chart table with no rows
    let table = chart_table("ZZZZNOTREAL", &[]);

    // When / Then: Normalization yields an empty sequence
    assert_eq!(normalize(table), Ok(Vec::new()));
}
