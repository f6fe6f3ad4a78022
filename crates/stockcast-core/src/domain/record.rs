use serde::{Deserialize, Serialize};

use crate::{UtcDateTime, ValidationError};

/// One trading-period observation in canonical shape.
///
/// Every price is finite and non-negative. Values are produced either by the
/// normalizer on a cache miss or by deserializing a cached payload, which
/// runs the same checks as [`StockRecord::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StockRecordWire")]
pub struct StockRecord {
    #[serde(rename = "Date")]
    pub date: UtcDateTime,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Adj_Close")]
    pub adjusted_close: f64,
    #[serde(rename = "Volume")]
    pub volume: u64,
}

impl StockRecord {
    pub fn new(
        date: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        adjusted_close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        validate_price("Open", open)?;
        validate_price("High", high)?;
        validate_price("Low", low)?;
        validate_price("Close", close)?;
        validate_price("Adj Close", adjusted_close)?;

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            adjusted_close,
            volume,
        })
    }
}

pub(crate) fn validate_price(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

#[derive(Deserialize)]
struct StockRecordWire {
    #[serde(rename = "Date")]
    date: UtcDateTime,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Adj_Close")]
    adjusted_close: f64,
    #[serde(rename = "Volume")]
    volume: u64,
}

impl TryFrom<StockRecordWire> for StockRecord {
    type Error = ValidationError;

    fn try_from(wire: StockRecordWire) -> Result<Self, Self::Error> {
        Self::new(
            wire.date,
            wire.open,
            wire.high,
            wire.low,
            wire.close,
            wire.adjusted_close,
            wire.volume,
        )
    }
}
