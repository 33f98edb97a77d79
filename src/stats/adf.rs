//! Augmented Dickey–Fuller unit-root test (constant term, AIC lag selection).

use super::linalg::{ols, OlsFit};
use super::normal::normal_cdf;
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// MacKinnon (2010) critical values for the constant-only regression
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_percent: f64,
    pub five_percent: f64,
    pub ten_percent: f64,
}

impl CriticalValues {
    pub fn for_sample_size(nobs: usize) -> Self {
        let t = nobs.max(1) as f64;
        let surface = |b: [f64; 4]| b[0] + b[1] / t + b[2] / t.powi(2) + b[3] / t.powi(3);
        CriticalValues {
            one_percent: surface([-3.43035, -6.5393, -16.786, -79.433]),
            five_percent: surface([-2.86154, -2.8903, -4.234, -40.040]),
            ten_percent: surface([-2.56677, -1.5384, -2.809, 0.0]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdfResult {
    pub statistic: f64,
    pub p_value: f64,
    /// Lagged differences included in the final regression
    pub used_lag: usize,
    /// Observations in the final regression
    pub nobs: usize,
    pub critical_values: CriticalValues,
}

/// Approximate p-value, MacKinnon (1994) response surface, constant, N = 1
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    const TAU_MAX: f64 = 2.74;
    const TAU_MIN: f64 = -18.83;
    const TAU_STAR: f64 = -1.61;

    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }

    let t = statistic;
    let z = if t <= TAU_STAR {
        2.1659 + 1.4412 * t + 0.038269 * t * t
    } else {
        1.7339 + 0.93202 * t - 0.12745 * t * t - 0.010368 * t * t * t
    };
    normal_cdf(z)
}

/// Default lag bound `ceil(12 (n/100)^(1/4))`, capped so the regression keeps
/// degrees of freedom
pub fn default_max_lag(nobs: usize) -> usize {
    let schwert = (12.0 * (nobs as f64 / 100.0).powf(0.25)).ceil() as usize;
    schwert.min(lag_cap(nobs))
}

fn lag_cap(nobs: usize) -> usize {
    (nobs / 2).saturating_sub(2)
}

/// Δx_t on [x_{t-1}, Δx_{t-1}, .., Δx_{t-lag}, 1] for t >= start
fn regression(levels: &[f64], diffs: &[f64], lag: usize, start: usize) -> Option<OlsFit> {
    let mut y = Vec::with_capacity(diffs.len().saturating_sub(start));
    let mut rows = Vec::with_capacity(y.capacity());

    for t in start..diffs.len() {
        let mut row = Vec::with_capacity(lag + 2);
        row.push(levels[t]);
        for k in 1..=lag {
            row.push(diffs[t - k]);
        }
        row.push(1.0);
        rows.push(row);
        y.push(diffs[t]);
    }

    ols(&y, &rows)
}

fn degenerate(nobs: usize) -> AdfResult {
    AdfResult {
        statistic: 0.0,
        p_value: 1.0,
        used_lag: 0,
        nobs,
        critical_values: CriticalValues::for_sample_size(nobs),
    }
}

/// Run the test on `x`. `max_lag = None` picks the bound from the sample size.
///
/// Constant or otherwise degenerate input reports statistic 0 and p-value 1.
pub fn adfuller(x: &[f64], max_lag: Option<usize>) -> Result<AdfResult> {
    let n = x.len();
    if n < 4 {
        return Err(LedgerError::insufficient("unit-root test", 4, n));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(LedgerError::data_shape("unit-root test input contains non-finite values"));
    }

    let max_lag = max_lag
        .map(|l| l.min(lag_cap(n)))
        .unwrap_or_else(|| default_max_lag(n));
    let diffs: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

    // AIC search on a common sample; ties keep the shorter lag
    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=max_lag {
        if let Some(fit) = regression(x, &diffs, lag, max_lag) {
            let aic = fit.aic();
            if aic.is_finite() && best.map_or(true, |(b, _)| aic < b) {
                best = Some((aic, lag));
            }
        }
    }

    let Some((_, used_lag)) = best else {
        return Ok(degenerate(diffs.len() - max_lag));
    };

    let Some(fit) = regression(x, &diffs, used_lag, used_lag) else {
        return Ok(degenerate(diffs.len() - used_lag));
    };

    let statistic = fit.t_value(0);
    if !statistic.is_finite() {
        return Ok(degenerate(fit.nobs));
    }

    Ok(AdfResult {
        statistic,
        p_value: mackinnon_p_value(statistic),
        used_lag,
        nobs: fit.nobs,
        critical_values: CriticalValues::for_sample_size(fit.nobs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-noise in [-0.5, 0.5)
    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
            })
            .collect()
    }

    #[test]
    fn test_p_value_surface() {
        assert_eq!(mackinnon_p_value(5.0), 1.0);
        assert_eq!(mackinnon_p_value(-25.0), 0.0);
        // Around the 5% critical value for large samples
        let p = mackinnon_p_value(-2.86);
        assert!((p - 0.05).abs() < 0.01, "p = {p}");
        // Monotone in the statistic
        assert!(mackinnon_p_value(-4.0) < mackinnon_p_value(-2.0));
        assert!(mackinnon_p_value(-2.0) < mackinnon_p_value(0.0));
    }

    #[test]
    fn test_p_value_reference_points() {
        // Both branches of the response surface, evaluated by hand
        assert!((mackinnon_p_value(-3.0) - 0.034894400).abs() < 1e-6);
        assert!((mackinnon_p_value(-1.0) - 0.753264301).abs() < 1e-6);
    }

    const REFERENCE: [f64; 20] = [
        10.0, 12.0, 11.0, 14.0, 13.0, 12.0, 15.0, 16.0, 14.0, 13.0, 15.0, 17.0, 16.0, 14.0, 15.0,
        18.0, 17.0, 16.0, 19.0, 18.0,
    ];

    #[test]
    fn test_no_lag_statistic_reference() {
        // Δx_t on [x_{t-1}, 1] over all 19 differences
        let result = adfuller(&REFERENCE, Some(0)).unwrap();
        assert_eq!(result.used_lag, 0);
        assert_eq!(result.nobs, 19);
        assert!((result.statistic + 2.191685384).abs() < 1e-6, "{result:?}");
        assert!((result.p_value - 0.209277011).abs() < 1e-6, "{result:?}");
        let cv = result.critical_values;
        assert!((cv.one_percent + 3.832603141).abs() < 1e-6);
        assert!((cv.five_percent + 3.031227170).abs() < 1e-6);
        assert!((cv.ten_percent + 2.655519584).abs() < 1e-6);
    }

    #[test]
    fn test_aic_lag_selection_reference() {
        // Over lags 0..=4 on the common sample AIC picks 2 (AIC 60.5, 61.5,
        // 46.7, 48.7, 48.0); the final regression then starts at lag 2
        let result = adfuller(&REFERENCE, Some(4)).unwrap();
        assert_eq!(result.used_lag, 2);
        assert_eq!(result.nobs, 17);
        assert!((result.statistic + 1.795574698).abs() < 1e-6, "{result:?}");
        assert!((result.p_value - 0.382660936).abs() < 1e-6, "{result:?}");
    }

    #[test]
    fn test_critical_values_order() {
        let cv = CriticalValues::for_sample_size(100);
        assert!(cv.one_percent < cv.five_percent);
        assert!(cv.five_percent < cv.ten_percent);
        assert!((cv.five_percent + 2.89).abs() < 0.01);
    }

    #[test]
    fn test_default_max_lag() {
        assert_eq!(default_max_lag(100), 12);
        assert_eq!(default_max_lag(10), 3);
        assert_eq!(default_max_lag(4), 0);
    }

    #[test]
    fn test_white_noise_is_stationary() {
        let x = noise(200, 7);
        let result = adfuller(&x, None).unwrap();
        assert!(result.statistic < result.critical_values.one_percent);
        assert!(result.p_value < 0.01, "p = {}", result.p_value);
    }

    #[test]
    fn test_random_walk_is_not_rejected() {
        let steps = noise(200, 11);
        let walk: Vec<f64> = steps
            .iter()
            .scan(0.0, |acc, s| {
                *acc += s + 0.05;
                Some(*acc)
            })
            .collect();

        let result = adfuller(&walk, None).unwrap();
        assert!(result.p_value > 0.05, "p = {}", result.p_value);
    }

    #[test]
    fn test_constant_series_is_degenerate() {
        let x = vec![4200.0; 30];
        let first = adfuller(&x, None).unwrap();
        let second = adfuller(&x, None).unwrap();
        assert_eq!(first.p_value, 1.0);
        assert_eq!(first.statistic, 0.0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_too_short() {
        let err = adfuller(&[1.0, 2.0, 3.0], None).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientData { needed: 4, actual: 3, .. }));
    }
}
