// 📈 Stationarity Analyzer - unit-root test on a daily series
//
// Advisory only: the verdict is reported to the caller and never gates the
// forecaster.

use crate::aggregation::DailyNetSeries;
use crate::config::StationarityConfig;
use crate::error::{LedgerError, Result};
use crate::stats::{adfuller, CriticalValues};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityReport {
    pub statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
    pub nobs: usize,
    pub critical_values: CriticalValues,
    pub significance: f64,
    /// p_value < significance: the unit-root null is rejected
    pub is_stationary: bool,
}

impl StationarityReport {
    pub fn summary(&self) -> String {
        let verdict = if self.is_stationary {
            "stationary"
        } else {
            "non-stationary"
        };
        format!(
            "ADF statistic {:.4}, p-value {:.4} (lag {}, n = {}): {} at {}",
            self.statistic, self.p_value, self.used_lag, self.nobs, verdict, self.significance
        )
    }
}

#[derive(Debug, Clone)]
pub struct StationarityAnalyzer {
    pub significance: f64,
    pub min_observations: usize,
    pub max_lag: Option<usize>,
}

impl Default for StationarityAnalyzer {
    fn default() -> Self {
        Self::from_config(&StationarityConfig::default())
    }
}

impl StationarityAnalyzer {
    pub fn from_config(config: &StationarityConfig) -> Self {
        StationarityAnalyzer {
            significance: config.significance,
            min_observations: config.min_observations,
            max_lag: config.max_lag,
        }
    }

    pub fn analyze(&self, values: &[f64]) -> Result<StationarityReport> {
        if values.len() < self.min_observations {
            return Err(LedgerError::insufficient(
                "stationarity test",
                self.min_observations,
                values.len(),
            ));
        }

        let adf = adfuller(values, self.max_lag)?;
        let report = StationarityReport {
            statistic: adf.statistic,
            p_value: adf.p_value,
            used_lag: adf.used_lag,
            nobs: adf.nobs,
            critical_values: adf.critical_values,
            significance: self.significance,
            is_stationary: adf.p_value < self.significance,
        };
        debug!(
            statistic = report.statistic,
            p_value = report.p_value,
            used_lag = report.used_lag,
            "stationarity test complete"
        );
        Ok(report)
    }

    /// Test the net-amount column of a single-merchant series
    pub fn analyze_series(&self, series: &DailyNetSeries) -> Result<StationarityReport> {
        if !series.is_single_merchant() {
            return Err(LedgerError::data_shape(
                "stationarity test needs a single-merchant series",
            ));
        }
        self.analyze(&series.amounts())
    }
}
