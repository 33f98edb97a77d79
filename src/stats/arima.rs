//! ARIMA(p, d, q) estimation by exact Gaussian maximum likelihood.
//!
//! The differenced series is standardised and modelled as an ARMA(p, q)
//! process (with a mean when d = 0) in Harvey's state-space form. The Kalman
//! filter yields the exact likelihood with σ² concentrated out; Nelder–Mead
//! searches over unconstrained parameters mapped through the Monahan
//! transform, so every candidate is stationary and invertible.

use super::linalg::solve;
use super::optimize::NelderMead;
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

// ============================================================================
// ORDER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl Default for ArimaOrder {
    fn default() -> Self {
        ArimaOrder { p: 1, d: 0, q: 1 }
    }
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        ArimaOrder { p, d, q }
    }

    /// Shortest training series the estimator accepts. Differencing consumes
    /// `d` points, so the ARMA part always sees at least `max(p, q) + 1`.
    pub fn min_observations(&self) -> usize {
        self.p.max(self.q) + 1 + self.d
    }

    /// A mean term is estimated only for undifferenced series
    pub fn has_mean(&self) -> bool {
        self.d == 0
    }

    pub fn n_params(&self) -> usize {
        usize::from(self.has_mean()) + self.p + self.q
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

/// Parses "p,d,q"
impl FromStr for ArimaOrder {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let parse = |v: &str| {
            v.parse::<usize>()
                .map_err(|_| LedgerError::Config(format!("invalid order component '{}' in '{}'", v, s)))
        };
        match parts.as_slice() {
            [p, d, q] => Ok(ArimaOrder::new(parse(p)?, parse(d)?, parse(q)?)),
            _ => Err(LedgerError::Config(format!(
                "order must look like 'p,d,q', got '{}'",
                s
            ))),
        }
    }
}

// ============================================================================
// MODEL INTERFACE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub order: ArimaOrder,
    /// Mean of the (differenced) series; 0 when d > 0
    pub mean: f64,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub sigma2: f64,
    /// None for a degenerate (constant) training series
    pub log_likelihood: Option<f64>,
    pub aic: Option<f64>,
    pub nobs: usize,
    pub iterations: usize,
}

/// Fits a model of a given order to a series
pub trait ModelEstimator {
    type Model: FittedModel;

    fn fit(&self, series: &[f64], order: ArimaOrder) -> Result<Self::Model>;
}

pub trait FittedModel {
    /// Predictions for indices `start..=end` of the fitted series' timeline.
    ///
    /// Indices below the series length are one-step-ahead predictions, later
    /// ones are forecasts from the end of the series. `end < start` is empty.
    fn predict(&self, start: usize, end: usize) -> Result<Vec<f64>>;

    fn summary(&self) -> ModelSummary;
}

// ============================================================================
// STATE SPACE
// ============================================================================

#[derive(Debug, Clone)]
struct StateSpace {
    transition: Vec<Vec<f64>>,
    selection: Vec<f64>,
}

impl StateSpace {
    fn new(ar: &[f64], ma: &[f64]) -> Self {
        let r = ar.len().max(ma.len() + 1);
        let mut transition = vec![vec![0.0; r]; r];
        for (i, phi) in ar.iter().enumerate() {
            transition[i][0] = *phi;
        }
        for i in 0..r - 1 {
            transition[i][i + 1] = 1.0;
        }

        let mut selection = vec![0.0; r];
        selection[0] = 1.0;
        for (j, theta) in ma.iter().enumerate() {
            selection[j + 1] = *theta;
        }

        StateSpace {
            transition,
            selection,
        }
    }

    fn dim(&self) -> usize {
        self.selection.len()
    }

    fn step(&self, state: &[f64]) -> Vec<f64> {
        self.transition
            .iter()
            .map(|row| row.iter().zip(state).map(|(t, a)| t * a).sum())
            .collect()
    }

    /// Stationary state covariance: P = T P T' + R R' (unit innovation variance)
    fn initial_covariance(&self) -> Option<Vec<Vec<f64>>> {
        let r = self.dim();
        let t = &self.transition;
        let rr = r * r;

        let mut system = vec![vec![0.0; rr]; rr];
        let mut rhs = vec![0.0; rr];
        for i in 0..r {
            for j in 0..r {
                let row = i * r + j;
                rhs[row] = self.selection[i] * self.selection[j];
                for k in 0..r {
                    for l in 0..r {
                        let col = k * r + l;
                        let identity = if row == col { 1.0 } else { 0.0 };
                        system[row][col] = identity - t[i][k] * t[j][l];
                    }
                }
            }
        }

        let flat = solve(&system, &rhs)?;
        Some((0..r).map(|i| flat[i * r..(i + 1) * r].to_vec()).collect())
    }
}

struct FilterOutput {
    log_likelihood: f64,
    sigma2: f64,
    /// One-step-ahead predictions (mean included)
    predictions: Vec<f64>,
    /// State prediction for the first index after the sample
    final_state: Vec<f64>,
}

/// Kalman filter with σ² concentrated out of the likelihood
fn kalman_filter(y: &[f64], mean: f64, space: &StateSpace) -> Option<FilterOutput> {
    let r = space.dim();
    let t = &space.transition;
    let sel = &space.selection;

    let mut a = vec![0.0; r];
    let mut p = space.initial_covariance()?;
    let mut predictions = Vec::with_capacity(y.len());
    let mut sum_log_f = 0.0;
    let mut sum_sq = 0.0;

    for &obs in y {
        let predicted = mean + a[0];
        predictions.push(predicted);

        let v = obs - predicted;
        let f = p[0][0];
        if !(f.is_finite() && f > 1e-10) {
            return None;
        }

        // K = T P Z' / f
        let gain: Vec<f64> = (0..r)
            .map(|i| (0..r).map(|k| t[i][k] * p[k][0]).sum::<f64>() / f)
            .collect();

        let mut next_a = space.step(&a);
        for i in 0..r {
            next_a[i] += gain[i] * v;
        }

        // P = T P T' + R R' - f K K'
        let tp: Vec<Vec<f64>> = (0..r)
            .map(|i| (0..r).map(|j| (0..r).map(|k| t[i][k] * p[k][j]).sum()).collect())
            .collect();
        let mut next_p = vec![vec![0.0; r]; r];
        for i in 0..r {
            for j in 0..r {
                let tpt: f64 = (0..r).map(|k| tp[i][k] * t[j][k]).sum();
                next_p[i][j] = tpt + sel[i] * sel[j] - f * gain[i] * gain[j];
            }
        }

        sum_log_f += f.ln();
        sum_sq += v * v / f;
        a = next_a;
        p = next_p;
    }

    let n = y.len() as f64;
    let sigma2 = sum_sq / n;
    if !(sigma2.is_finite() && sigma2 > 0.0) {
        return None;
    }
    let log_likelihood =
        -0.5 * n * ((2.0 * std::f64::consts::PI).ln() + sigma2.ln() + 1.0) - 0.5 * sum_log_f;

    Some(FilterOutput {
        log_likelihood,
        sigma2,
        predictions,
        final_state: a,
    })
}

/// Monahan (1984): maps R^n onto the stationary AR coefficient region
fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let n = unconstrained.len();
    if n == 0 {
        return Vec::new();
    }
    let partials: Vec<f64> = unconstrained
        .iter()
        .map(|u| u / (1.0 + u * u).sqrt())
        .collect();

    let mut y = vec![vec![0.0; n]; n];
    for k in 0..n {
        for i in 0..k {
            y[k][i] = y[k - 1][i] + partials[k] * y[k - 1][k - i - 1];
        }
        y[k][k] = partials[k];
    }
    y[n - 1].iter().map(|v| -v).collect()
}

fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut out = series.to_vec();
    for _ in 0..d {
        out = out.windows(2).map(|w| w[1] - w[0]).collect();
    }
    out
}

fn binomial(n: usize, k: usize) -> f64 {
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

// ============================================================================
// ESTIMATOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct ArimaEstimator {
    pub max_iterations: usize,
    /// Convergence tolerance on the scaled negative log-likelihood
    pub tolerance: f64,
}

impl Default for ArimaEstimator {
    fn default() -> Self {
        ArimaEstimator {
            max_iterations: 2000,
            tolerance: 1e-8,
        }
    }
}

impl ArimaEstimator {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        ArimaEstimator {
            max_iterations,
            tolerance,
        }
    }
}

#[derive(Debug, Clone)]
struct Coefficients {
    mean: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
}

impl Coefficients {
    fn from_unconstrained(order: ArimaOrder, x: &[f64]) -> Self {
        let offset = usize::from(order.has_mean());
        let mean = if order.has_mean() { x[0] } else { 0.0 };
        let ar = constrain_stationary(&x[offset..offset + order.p]);
        let ma = constrain_stationary(&x[offset + order.p..])
            .into_iter()
            .map(|v| -v)
            .collect();
        Coefficients { mean, ar, ma }
    }
}

impl ModelEstimator for ArimaEstimator {
    type Model = FittedArima;

    fn fit(&self, series: &[f64], order: ArimaOrder) -> Result<FittedArima> {
        let needed = order.min_observations();
        if series.len() < needed {
            return Err(LedgerError::insufficient(
                format!("{} training", order),
                needed,
                series.len(),
            ));
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(LedgerError::data_shape("training series contains non-finite values"));
        }

        let diffed = difference(series, order.d);
        let n = diffed.len() as f64;

        let sample_mean = diffed.iter().sum::<f64>() / n;
        let spread = (diffed.iter().map(|v| (v - sample_mean).powi(2)).sum::<f64>() / n).sqrt();
        if spread <= 1e-10 * sample_mean.abs().max(1.0) {
            debug!(%order, "constant training series, fitting trivial model");
            return Ok(FittedArima::constant(order, series.to_vec(), sample_mean));
        }

        // Centre only when a mean is modelled; d > 0 keeps a zero-mean process
        let center = if order.has_mean() { sample_mean } else { 0.0 };
        let scale = (diffed.iter().map(|v| (v - center).powi(2)).sum::<f64>() / n).sqrt();

        let standardized: Vec<f64> = diffed.iter().map(|v| (v - center) / scale).collect();

        let objective = |x: &[f64]| {
            let coef = Coefficients::from_unconstrained(order, x);
            let space = StateSpace::new(&coef.ar, &coef.ma);
            match kalman_filter(&standardized, coef.mean, &space) {
                Some(out) => -out.log_likelihood / n,
                None => f64::INFINITY,
            }
        };

        // Near-cancelling AR and MA roots leave a flat likelihood ridge the
        // simplex never contracts along, so only the objective decides
        let optimizer = NelderMead {
            max_iterations: self.max_iterations,
            xatol: f64::INFINITY,
            fatol: self.tolerance,
            ..NelderMead::default()
        };
        let minimum = optimizer.minimize(objective, &vec![0.0; order.n_params()]);

        if !minimum.converged {
            return Err(LedgerError::ModelConvergence(format!(
                "{} optimizer did not converge within {} iterations",
                order, minimum.iterations
            )));
        }
        if !minimum.fx.is_finite() {
            return Err(LedgerError::ModelConvergence(format!(
                "{} likelihood is not finite at the optimum",
                order
            )));
        }

        let coef = Coefficients::from_unconstrained(order, &minimum.x);
        let space = StateSpace::new(&coef.ar, &coef.ma);
        let filtered = kalman_filter(&standardized, coef.mean, &space).ok_or_else(|| {
            LedgerError::ModelConvergence(format!("{} filter failed at the optimum", order))
        })?;

        // Back to the data scale: y = center + scale · z
        let log_likelihood = filtered.log_likelihood - n * scale.ln();
        let k = (order.n_params() + 1) as f64;

        debug!(
            %order,
            iterations = minimum.iterations,
            log_likelihood,
            "model fitted"
        );

        Ok(FittedArima {
            order,
            levels: series.to_vec(),
            center,
            scale,
            coefficients: coef,
            space,
            one_step: filtered.predictions,
            final_state: filtered.final_state,
            sigma2: filtered.sigma2 * scale * scale,
            log_likelihood: Some(log_likelihood),
            aic: Some(-2.0 * log_likelihood + 2.0 * k),
            iterations: minimum.iterations,
        })
    }
}

// ============================================================================
// FITTED MODEL
// ============================================================================

#[derive(Debug, Clone)]
pub struct FittedArima {
    order: ArimaOrder,
    /// Training series on the level scale
    levels: Vec<f64>,
    center: f64,
    scale: f64,
    /// Standardised-scale coefficients
    coefficients: Coefficients,
    space: StateSpace,
    one_step: Vec<f64>,
    final_state: Vec<f64>,
    sigma2: f64,
    log_likelihood: Option<f64>,
    aic: Option<f64>,
    iterations: usize,
}

impl FittedArima {
    /// Model of a series whose differenced values never vary
    fn constant(order: ArimaOrder, levels: Vec<f64>, center: f64) -> Self {
        let n_diffed = levels.len() - order.d;
        let space = StateSpace::new(&vec![0.0; order.p], &vec![0.0; order.q]);
        let dim = space.dim();
        FittedArima {
            order,
            levels,
            center,
            scale: 0.0,
            coefficients: Coefficients {
                mean: 0.0,
                ar: vec![0.0; order.p],
                ma: vec![0.0; order.q],
            },
            space,
            one_step: vec![0.0; n_diffed],
            final_state: vec![0.0; dim],
            sigma2: 0.0,
            log_likelihood: None,
            aic: None,
            iterations: 0,
        }
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    /// Predictions of the differenced series for indices `from..=to`
    fn predict_differenced(&self, from: usize, to: usize) -> Vec<f64> {
        let n = self.one_step.len();
        let mut out = Vec::with_capacity(to + 1 - from);

        if from < n {
            out.extend_from_slice(&self.one_step[from..=to.min(n - 1)]);
        }

        if to >= n {
            let mut state = self.final_state.clone();
            for k in n..=to {
                if k >= from {
                    out.push(self.coefficients.mean + state[0]);
                }
                state = self.space.step(&state);
            }
        }

        out.into_iter()
            .map(|z| self.center + self.scale * z)
            .collect()
    }
}

impl FittedModel for FittedArima {
    fn predict(&self, start: usize, end: usize) -> Result<Vec<f64>> {
        if end < start {
            return Ok(Vec::new());
        }
        let d = self.order.d;
        if start < d {
            return Err(LedgerError::data_shape(format!(
                "prediction start {} precedes the first differenced observation {}",
                start, d
            )));
        }

        if d == 0 {
            return Ok(self.predict_differenced(start, end));
        }

        // Undo differencing: y_i = Δ^d y_i - Σ_{k=1..d} (-1)^k C(d,k) y_{i-k},
        // with actual levels inside the sample and predictions beyond it.
        // Forecasts past the sample need every intermediate step.
        let n = self.levels.len();
        let from = start.min(n);
        let diffed = self.predict_differenced(from - d, end - d);
        let mut predicted: Vec<f64> = Vec::with_capacity(end + 1 - from);
        for (offset, w) in diffed.iter().enumerate() {
            let i = from + offset;
            let level = |j: usize| {
                if j < n {
                    self.levels[j]
                } else {
                    predicted[j - from]
                }
            };
            let carry: f64 = (1..=d)
                .map(|k| {
                    let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
                    sign * binomial(d, k) * level(i - k)
                })
                .sum();
            let value = w + carry;
            predicted.push(value);
        }

        Ok(predicted.split_off(start - from))
    }

    fn summary(&self) -> ModelSummary {
        // AR/MA coefficients are scale-free; the mean is reported on the data scale
        let mean = if self.order.has_mean() || self.scale == 0.0 {
            self.center + self.scale * self.coefficients.mean
        } else {
            0.0
        };
        ModelSummary {
            order: self.order,
            mean,
            ar: self.coefficients.ar.clone(),
            ma: self.coefficients.ma.clone(),
            sigma2: self.sigma2,
            log_likelihood: self.log_likelihood,
            aic: self.aic,
            nobs: self.one_step.len(),
            iterations: self.iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-noise with unit-ish variance
    fn shocks(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5) * 3.46
            })
            .collect()
    }

    fn simulate_arma(n: usize, mean: f64, phi: f64, theta: f64, seed: u64) -> Vec<f64> {
        let e = shocks(n + 50, seed);
        let mut x = vec![0.0; n + 50];
        for t in 1..n + 50 {
            x[t] = phi * x[t - 1] + e[t] + theta * e[t - 1];
        }
        x[50..].iter().map(|v| v + mean).collect()
    }

    #[test]
    fn test_order_parse_and_display() {
        let order: ArimaOrder = "2, 1, 0".parse().unwrap();
        assert_eq!(order, ArimaOrder::new(2, 1, 0));
        assert_eq!(order.to_string(), "ARIMA(2,1,0)");
        assert!("1,0".parse::<ArimaOrder>().is_err());
        assert!("a,b,c".parse::<ArimaOrder>().is_err());
        assert_eq!(ArimaOrder::default().min_observations(), 2);
        assert_eq!(ArimaOrder::new(2, 0, 1).min_observations(), 3);
        assert_eq!(ArimaOrder::new(1, 1, 1).min_observations(), 3);
        assert_eq!(ArimaOrder::new(0, 2, 0).min_observations(), 3);
        assert_eq!(ArimaOrder::default().n_params(), 3);
    }

    /// Fixed short series shared by the reference-value tests
    const REFERENCE: [f64; 20] = [
        10.0, 12.0, 11.0, 14.0, 13.0, 12.0, 15.0, 16.0, 14.0, 13.0, 15.0, 17.0, 16.0, 14.0, 15.0,
        18.0, 17.0, 16.0, 19.0, 18.0,
    ];

    #[test]
    fn test_white_noise_model_matches_closed_form() {
        // ARIMA(0,0,0): mean, population variance and the Gaussian log-likelihood
        let model = ArimaEstimator::default()
            .fit(&REFERENCE, ArimaOrder::new(0, 0, 0))
            .unwrap();
        let summary = model.summary();
        assert!((summary.mean - 14.75).abs() < 1e-3, "{summary:?}");
        assert!((summary.sigma2 - 5.6875).abs() < 1e-4, "{summary:?}");
        let ll = summary.log_likelihood.unwrap();
        assert!((ll + 45.761478506864).abs() < 1e-5, "ll = {ll}");
        assert!((summary.aic.unwrap() - 95.522957013728).abs() < 1e-4);
    }

    #[test]
    fn test_ar1_exact_likelihood_reference() {
        // Exact AR(1) maximum likelihood on the reference series, profiled
        // independently over (mean, phi) with σ² = S / n
        let model = ArimaEstimator::default()
            .fit(&REFERENCE, ArimaOrder::new(1, 0, 0))
            .unwrap();
        let summary = model.summary();
        assert!((summary.ar[0] - 0.734402).abs() < 2e-3, "{summary:?}");
        assert!((summary.mean - 14.587540).abs() < 2e-2, "{summary:?}");
        assert!((summary.sigma2 - 3.145420).abs() < 1e-2, "{summary:?}");
        let ll = summary.log_likelihood.unwrap();
        assert!((ll + 40.225800136).abs() < 1e-4, "ll = {ll}");
        assert!((summary.aic.unwrap() - 86.451600271).abs() < 1e-3);

        // One and two steps past the sample: mean + phi^h (x_n - mean)
        let forecast = model.predict(20, 21).unwrap();
        assert!((forecast[0] - 17.093659).abs() < 2e-2, "{forecast:?}");
        assert!((forecast[1] - 16.428040).abs() < 2e-2, "{forecast:?}");
    }

    #[test]
    fn test_constrain_stationary() {
        assert!(constrain_stationary(&[]).is_empty());
        let ar1 = constrain_stationary(&[1e6]);
        assert!(ar1[0].abs() < 1.0);
        let ar2 = constrain_stationary(&[3.0, -2.0]);
        // AR(2) stationarity triangle
        assert!(ar2[1].abs() < 1.0);
        assert!(ar2[0] + ar2[1] < 1.0);
        assert!(ar2[1] - ar2[0] < 1.0);
    }

    #[test]
    fn test_initial_covariance_ar1() {
        // Var of AR(1) with unit shocks = 1 / (1 - phi²)
        let space = StateSpace::new(&[0.6], &[]);
        let p = space.initial_covariance().unwrap();
        assert!((p[0][0] - 1.0 / (1.0 - 0.36)).abs() < 1e-10);
    }

    #[test]
    fn test_recovers_ar1() {
        let series = simulate_arma(400, 50.0, 0.6, 0.0, 3);
        let model = ArimaEstimator::default()
            .fit(&series, ArimaOrder::new(1, 0, 0))
            .unwrap();
        let summary = model.summary();

        assert!((summary.ar[0] - 0.6).abs() < 0.15, "phi = {}", summary.ar[0]);
        assert!((summary.mean - 50.0).abs() < 1.0, "mean = {}", summary.mean);
        assert!(summary.log_likelihood.unwrap().is_finite());
        assert_eq!(summary.nobs, 400);
    }

    #[test]
    fn test_arma11_fit_and_forecast_reverts_to_mean() {
        let series = simulate_arma(300, 1000.0, 0.5, 0.3, 17);
        let model = ArimaEstimator::default()
            .fit(&series, ArimaOrder::default())
            .unwrap();
        let summary = model.summary();
        assert!(summary.ar[0].abs() < 1.0);
        assert!(summary.ma[0].abs() < 1.0);

        let n = series.len();
        let forecast = model.predict(n, n + 199).unwrap();
        assert_eq!(forecast.len(), 200);
        assert!((forecast[199] - summary.mean).abs() < 1e-3);
    }

    #[test]
    fn test_in_sample_predictions() {
        let series = simulate_arma(120, 10.0, 0.4, 0.0, 5);
        let model = ArimaEstimator::default()
            .fit(&series, ArimaOrder::new(1, 0, 0))
            .unwrap();

        let in_sample = model.predict(0, 119).unwrap();
        assert_eq!(in_sample.len(), 120);
        // First prediction is the unconditional mean
        assert!((in_sample[0] - model.summary().mean).abs() < 1e-9);
        assert!(model.predict(5, 4).unwrap().is_empty());
    }

    #[test]
    fn test_differenced_constant_growth() {
        // Straight line: first differences are constant
        let series: Vec<f64> = (0..20).map(|i| 100.0 + 5.0 * i as f64).collect();
        let model = ArimaEstimator::default()
            .fit(&series, ArimaOrder::new(1, 1, 0))
            .unwrap();

        let forecast = model.predict(20, 22).unwrap();
        assert_eq!(forecast.len(), 3);
        // Constant differences carry the trend forward
        assert_eq!(forecast, vec![200.0, 205.0, 210.0]);
        assert_eq!(model.summary().mean, 5.0);
        // Forecasts starting beyond the sample still integrate every step
        assert_eq!(model.predict(22, 22).unwrap(), vec![210.0]);
    }

    #[test]
    fn test_random_walk_forecast_with_d1() {
        let steps = shocks(200, 23);
        let walk: Vec<f64> = steps
            .iter()
            .scan(500.0, |acc, s| {
                *acc += s;
                Some(*acc)
            })
            .collect();

        let model = ArimaEstimator::default()
            .fit(&walk, ArimaOrder::new(0, 1, 1))
            .unwrap();
        let forecast = model.predict(200, 209).unwrap();

        // ARIMA(0,1,1) forecasts are flat beyond the first step
        assert_eq!(forecast.len(), 10);
        for pair in forecast.windows(2) {
            assert!((pair[0] - pair[1]).abs() < 1e-9);
        }
        assert!(model.predict(0, 3).is_err());
    }

    #[test]
    fn test_constant_series_trivial_model() {
        let series = vec![3000.0; 15];
        let model = ArimaEstimator::default()
            .fit(&series, ArimaOrder::default())
            .unwrap();

        assert_eq!(model.predict(15, 17).unwrap(), vec![3000.0; 3]);
        let summary = model.summary();
        assert_eq!(summary.mean, 3000.0);
        assert_eq!(summary.log_likelihood, None);
    }

    #[test]
    fn test_insufficient_training() {
        let err = ArimaEstimator::default()
            .fit(&[1.0], ArimaOrder::default())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientData { needed: 2, actual: 1, .. }));
    }

    #[test]
    fn test_iteration_budget_surfaces_convergence_error() {
        let series = simulate_arma(100, 0.0, 0.5, 0.2, 9);
        let err = ArimaEstimator::new(2, 1e-12)
            .fit(&series, ArimaOrder::default())
            .unwrap_err();
        assert!(matches!(err, LedgerError::ModelConvergence(_)));
    }
}
