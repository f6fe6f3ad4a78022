//! # Forecasting
//!
//! The pipeline treats forecasting as a black box behind a fit/predict
//! contract: [`Forecaster::fit`] consumes history and returns a
//! [`ForecastModel`], whose [`predict`](ForecastModel::predict) emits the
//! in-sample fit followed by `horizon_days` future daily points.
//!
//! [`LinearTrendForecaster`] is the default model: an ordinary least squares
//! trend on close prices with confidence bands for the trend and prediction
//! bands for `yhat`.

use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::{StockRecord, UtcDateTime};

pub const DEFAULT_HORIZON_DAYS: u32 = 30;
pub const MAX_HORIZON_DAYS: u32 = 3650;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// One forecast point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub ds: UtcDateTime,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub trend: f64,
    pub trend_lower: f64,
    pub trend_upper: f64,
}

/// Fits a model to price history.
pub trait Forecaster: Send + Sync {
    fn fit(&self, history: &[StockRecord]) -> Result<Box<dyn ForecastModel>, ForecastError>;
}

/// Fitted model able to project forward.
pub trait ForecastModel: Send {
    fn predict(&self, horizon_days: u32) -> Result<Vec<ForecastRecord>, ForecastError>;
}

/// Fits `forecaster` on `history` and predicts `horizon_days` ahead.
///
/// # Errors
///
/// - [`ForecastError::EmptyInput`] when `history` is empty.
/// - [`ForecastError::HorizonTooLong`] above [`MAX_HORIZON_DAYS`].
/// - Any error raised by the model itself.
pub fn run_forecast(
    forecaster: &dyn Forecaster,
    history: &[StockRecord],
    horizon_days: u32,
) -> Result<Vec<ForecastRecord>, ForecastError> {
    if history.is_empty() {
        return Err(ForecastError::EmptyInput);
    }
    if horizon_days > MAX_HORIZON_DAYS {
        return Err(ForecastError::HorizonTooLong {
            requested: horizon_days,
            max: MAX_HORIZON_DAYS,
        });
    }

    forecaster.fit(history)?.predict(horizon_days)
}

/// Least-squares linear trend on close prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTrendForecaster {
    /// Two-sided z-score of the uncertainty bands (1.2816 gives 80%).
    pub z_score: f64,
}

impl Default for LinearTrendForecaster {
    fn default() -> Self {
        Self { z_score: 1.2816 }
    }
}

impl Forecaster for LinearTrendForecaster {
    fn fit(&self, history: &[StockRecord]) -> Result<Box<dyn ForecastModel>, ForecastError> {
        let first = history.first().ok_or(ForecastError::EmptyInput)?;
        let origin = history
            .iter()
            .map(|record| record.date)
            .min()
            .unwrap_or(first.date);

        let points: Vec<(UtcDateTime, f64, f64)> = history
            .iter()
            .map(|record| {
                let x = (record.date.unix_timestamp() - origin.unix_timestamp()) as f64
                    / SECONDS_PER_DAY;
                (record.date, x, record.close)
            })
            .collect();

        let n = points.len() as f64;
        let x_mean = points.iter().map(|(_, x, _)| x).sum::<f64>() / n;
        let y_mean = points.iter().map(|(_, _, y)| y).sum::<f64>() / n;
        let sxx: f64 = points.iter().map(|(_, x, _)| (x - x_mean).powi(2)).sum();
        let sxy: f64 = points
            .iter()
            .map(|(_, x, y)| (x - x_mean) * (y - y_mean))
            .sum();

        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let intercept = y_mean - slope * x_mean;

        let sse: f64 = points
            .iter()
            .map(|(_, x, y)| (y - (intercept + slope * x)).powi(2))
            .sum();
        let sigma = if points.len() > 2 {
            (sse / (n - 2.0)).sqrt()
        } else {
            0.0
        };

        if !(slope.is_finite() && intercept.is_finite() && sigma.is_finite()) {
            return Err(ForecastError::Model(String::from(
                "least squares produced non-finite coefficients",
            )));
        }

        let last = points
            .iter()
            .map(|(date, _, _)| *date)
            .max()
            .unwrap_or(origin);

        Ok(Box::new(LinearTrendModel {
            fitted: points.iter().map(|(date, x, _)| (*date, *x)).collect(),
            origin,
            last,
            slope,
            intercept,
            sigma,
            n,
            x_mean,
            sxx,
            z_score: self.z_score,
        }))
    }
}

#[derive(Debug, Clone)]
struct LinearTrendModel {
    fitted: Vec<(UtcDateTime, f64)>,
    origin: UtcDateTime,
    last: UtcDateTime,
    slope: f64,
    intercept: f64,
    sigma: f64,
    n: f64,
    x_mean: f64,
    sxx: f64,
    z_score: f64,
}

impl LinearTrendModel {
    fn point(&self, ds: UtcDateTime, x: f64) -> ForecastRecord {
        let trend = self.intercept + self.slope * x;
        let leverage = if self.sxx > 0.0 {
            (x - self.x_mean).powi(2) / self.sxx
        } else {
            0.0
        };
        let trend_spread = self.z_score * self.sigma * (1.0 / self.n + leverage).sqrt();
        let yhat_spread = self.z_score * self.sigma * (1.0 + 1.0 / self.n + leverage).sqrt();

        ForecastRecord {
            ds,
            yhat: trend,
            yhat_lower: trend - yhat_spread,
            yhat_upper: trend + yhat_spread,
            trend,
            trend_lower: trend - trend_spread,
            trend_upper: trend + trend_spread,
        }
    }
}

impl ForecastModel for LinearTrendModel {
    fn predict(&self, horizon_days: u32) -> Result<Vec<ForecastRecord>, ForecastError> {
        let mut output = Vec::with_capacity(self.fitted.len() + horizon_days as usize);
        output.extend(self.fitted.iter().map(|(ds, x)| self.point(*ds, *x)));

        let start = self.last.start_of_day();
        for day in 1..=i64::from(horizon_days) {
            let ds = start.checked_add_days(day).ok_or_else(|| {
                ForecastError::Model(format!("forecast date overflow at day {day}"))
            })?;
            let x = (ds.unix_timestamp() - self.origin.unix_timestamp()) as f64 / SECONDS_PER_DAY;
            output.push(self.point(ds, x));
        }

        Ok(output)
    }
}
