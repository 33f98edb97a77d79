// 🔮 Forecaster - fit on a training prefix, predict the held-out suffix + horizon
//
// The model sees a contiguous daily series: training data is resampled with
// zero fill first, and every requested date is mapped to its day offset after
// the training end, so index arithmetic stays valid across gaps.

use crate::aggregation::{DailyNetEntry, DailyNetSeries};
use crate::config::ForecastConfig;
use crate::error::{LedgerError, Result};
use crate::stats::{ArimaEstimator, ArimaOrder, FittedModel, ModelEstimator, ModelSummary};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    /// Observed net amount; None for horizon points
    pub actual_cents: Option<i64>,
    pub predicted_cents: f64,
}

impl ForecastPoint {
    pub fn is_horizon(&self) -> bool {
        self.actual_cents.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Test-aligned points first, then the horizon
    pub points: Vec<ForecastPoint>,
    /// None when nothing was requested and no model was fitted
    pub model: Option<ModelSummary>,
}

impl ForecastResult {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Mean absolute error in cents over points that carry an actual
    pub fn mean_absolute_error(&self) -> Option<f64> {
        let errors: Vec<f64> = self
            .points
            .iter()
            .filter_map(|p| p.actual_cents.map(|a| (a as f64 - p.predicted_cents).abs()))
            .collect();
        if errors.is_empty() {
            return None;
        }
        Some(errors.iter().sum::<f64>() / errors.len() as f64)
    }
}

// ============================================================================
// RESAMPLING
// ============================================================================

/// Strictly increasing dates, which also rules out a second merchant on a day
fn check_ordered(series: &DailyNetSeries, role: &str) -> Result<()> {
    if !series.is_empty() && !series.is_single_merchant() {
        return Err(LedgerError::data_shape(format!(
            "{} series spans several merchants",
            role
        )));
    }
    for pair in series.entries().windows(2) {
        if pair[0].date >= pair[1].date {
            return Err(LedgerError::data_shape(format!(
                "{} series dates must strictly increase ({} then {})",
                role, pair[0].date, pair[1].date
            )));
        }
    }
    Ok(())
}

/// Fill every missing calendar day between the first and last entry with 0
pub fn resample_daily(series: &DailyNetSeries) -> Result<DailyNetSeries> {
    check_ordered(series, "resampled")?;
    let (Some(first), Some(last)) = (series.first_date(), series.last_date()) else {
        return Ok(DailyNetSeries::new());
    };
    let merchant_type_code = series.entries()[0].merchant_type_code;

    let mut observed = series.iter().peekable();
    let mut entries = Vec::with_capacity((last - first).num_days() as usize + 1);
    for date in first.iter_days().take_while(|d| *d <= last) {
        let net_amount_cents = match observed.peek() {
            Some(entry) if entry.date == date => {
                let amount = entry.net_amount_cents;
                observed.next();
                amount
            }
            _ => 0,
        };
        entries.push(DailyNetEntry {
            date,
            merchant_type_code,
            net_amount_cents,
        });
    }

    DailyNetSeries::from_entries(entries)
}

// ============================================================================
// FORECASTER
// ============================================================================

#[derive(Debug, Clone)]
pub struct Forecaster<E = ArimaEstimator> {
    order: ArimaOrder,
    estimator: E,
}

impl Forecaster<ArimaEstimator> {
    pub fn new(order: ArimaOrder) -> Self {
        Forecaster {
            order,
            estimator: ArimaEstimator::default(),
        }
    }

    pub fn from_config(config: &ForecastConfig) -> Self {
        Forecaster {
            order: config.order,
            estimator: ArimaEstimator::new(config.max_iterations, config.tolerance),
        }
    }
}

impl Default for Forecaster<ArimaEstimator> {
    fn default() -> Self {
        Self::new(ArimaOrder::default())
    }
}

impl<E: ModelEstimator> Forecaster<E> {
    pub fn with_estimator(order: ArimaOrder, estimator: E) -> Self {
        Forecaster { order, estimator }
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    /// Fit on `train`, predict every `test` date plus `n_periods` further days
    pub fn forecast(
        &self,
        train: &DailyNetSeries,
        test: &DailyNetSeries,
        n_periods: usize,
    ) -> Result<ForecastResult> {
        check_ordered(train, "training")?;
        check_ordered(test, "test")?;

        if test.is_empty() && n_periods == 0 {
            return Ok(ForecastResult::default());
        }

        if train.has_gaps() {
            warn!(
                entries = train.len(),
                "training series has missing days, filling with zero"
            );
        }
        let resampled = resample_daily(train)?;
        let Some(train_end) = resampled.last_date() else {
            return Err(LedgerError::insufficient(
                format!("{} training", self.order),
                self.order.min_observations(),
                0,
            ));
        };

        if let (Some(train_code), Some(test_entry)) =
            (resampled.merchants().into_iter().next(), test.entries().first())
        {
            if test_entry.merchant_type_code != train_code {
                return Err(LedgerError::data_shape(format!(
                    "training merchant {} differs from test merchant {}",
                    train_code, test_entry.merchant_type_code
                )));
            }
            if test_entry.date <= train_end {
                return Err(LedgerError::data_shape(format!(
                    "test series starts {} but training runs through {}",
                    test_entry.date, train_end
                )));
            }
        }

        // Day offsets after the training end, 0-based
        let offset = |date: NaiveDate| ((date - train_end).num_days() - 1) as usize;
        let test_span = test.last_date().map_or(0, |d| offset(d) + 1);
        let total = test_span + n_periods;

        let model = self.estimator.fit(&resampled.amounts(), self.order)?;
        let start = resampled.len();
        let predictions = model.predict(start, start + total - 1)?;
        if predictions.len() != total {
            return Err(LedgerError::data_shape(format!(
                "model returned {} predictions for {} requested",
                predictions.len(),
                total
            )));
        }

        let mut points = Vec::with_capacity(test.len() + n_periods);
        for entry in test {
            points.push(ForecastPoint {
                date: entry.date,
                actual_cents: Some(entry.net_amount_cents),
                predicted_cents: predictions[offset(entry.date)],
            });
        }
        for step in test_span..total {
            points.push(ForecastPoint {
                date: train_end + Duration::days(step as i64 + 1),
                actual_cents: None,
                predicted_cents: predictions[step],
            });
        }

        let summary = model.summary();
        info!(
            order = %self.order,
            train_days = resampled.len(),
            test_points = test.len(),
            horizon = n_periods,
            "forecast complete"
        );

        Ok(ForecastResult {
            points,
            model: Some(summary),
        })
    }

    /// `series[..split_at]` trains, `series[split_at..]` is held out
    pub fn forecast_split(
        &self,
        series: &DailyNetSeries,
        split_at: usize,
        n_periods: usize,
    ) -> Result<ForecastResult> {
        let (train, test) = series.split_at(split_at);
        self.forecast(&train, &test, n_periods)
    }

    /// Hold out the last `test_days` calendar days of a resampled series
    pub fn forecast_trailing(
        &self,
        series: &DailyNetSeries,
        test_days: usize,
        n_periods: usize,
    ) -> Result<ForecastResult> {
        let daily = resample_daily(series)?;
        let split_at = daily.len().saturating_sub(test_days);
        self.forecast_split(&daily, split_at, n_periods)
    }
}
