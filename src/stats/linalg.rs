//! Small dense linear algebra: Gaussian elimination and least squares.
//!
//! Matrices are row-major `Vec<Vec<f64>>`; sizes here are tiny (a handful of
//! regressors or a state dimension squared).

/// Solve `a · x = b` with partial pivoting. `None` if `a` is singular.
pub fn solve(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return None;
    }

    let scale = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let eps = scale * 1e-12;

    // Augmented matrix [a | b]
    let mut m: Vec<Vec<f64>> = a
        .iter()
        .zip(b)
        .map(|(row, &bi)| {
            let mut r = row.clone();
            r.push(bi);
            r
        })
        .collect();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))?;
        if m[pivot][col].abs() <= eps {
            return None;
        }
        m.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = m[row][col] / m[col][col];
            if factor != 0.0 {
                for k in col..=n {
                    m[row][k] -= factor * m[col][k];
                }
            }
        }
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let tail: f64 = ((i + 1)..n).map(|k| m[i][k] * x[k]).sum();
        x[i] = (m[i][n] - tail) / m[i][i];
    }

    x.iter().all(|v| v.is_finite()).then_some(x)
}

pub fn invert(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut columns = Vec::with_capacity(n);
    for j in 0..n {
        let e: Vec<f64> = (0..n).map(|i| if i == j { 1.0 } else { 0.0 }).collect();
        columns.push(solve(a, &e)?);
    }
    Some((0..n).map(|i| (0..n).map(|j| columns[j][i]).collect()).collect())
}

/// Ordinary least squares fit
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub params: Vec<f64>,
    pub std_errors: Vec<f64>,
    /// Sum of squared residuals
    pub ssr: f64,
    pub nobs: usize,
}

impl OlsFit {
    pub fn n_params(&self) -> usize {
        self.params.len()
    }

    /// Gaussian log-likelihood at the OLS estimate
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -0.5 * n * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.n_params() as f64
    }

    pub fn t_value(&self, index: usize) -> f64 {
        self.params[index] / self.std_errors[index]
    }
}

/// Regress `y` on the rows of `x` (no implicit intercept)
///
/// `None` when the design is rank deficient or has no residual degrees of freedom.
pub fn ols(y: &[f64], x: &[Vec<f64>]) -> Option<OlsFit> {
    let nobs = y.len();
    let k = x.first()?.len();
    if x.len() != nobs || nobs <= k || k == 0 {
        return None;
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &yi) in x.iter().zip(y) {
        for i in 0..k {
            xty[i] += row[i] * yi;
            for j in i..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }

    let xtx_inv = invert(&xtx)?;
    let params: Vec<f64> = (0..k)
        .map(|i| (0..k).map(|j| xtx_inv[i][j] * xty[j]).sum())
        .collect();

    let ssr: f64 = x
        .iter()
        .zip(y)
        .map(|(row, &yi)| {
            let fitted: f64 = row.iter().zip(&params).map(|(a, b)| a * b).sum();
            (yi - fitted).powi(2)
        })
        .sum();

    let sigma2 = ssr / (nobs - k) as f64;
    let std_errors = (0..k).map(|i| (sigma2 * xtx_inv[i][i]).max(0.0).sqrt()).collect();

    Some(OlsFit {
        params,
        std_errors,
        ssr,
        nobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_2x2() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let x = solve(&a, &[3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_solve_needs_pivoting() {
        let a = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let x = solve(&a, &[2.0, 3.0]).unwrap();
        assert_eq!(x, vec![3.0, 2.0]);
    }

    #[test]
    fn test_singular() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(solve(&a, &[1.0, 2.0]).is_none());
        assert!(invert(&a).is_none());
    }

    #[test]
    fn test_ols_recovers_line() {
        // y = 2 + 3x plus a symmetric wiggle
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let noise = [0.1, -0.1, 0.1, -0.1, 0.1, -0.1];
        let y: Vec<f64> = xs.iter().zip(noise).map(|(x, e)| 2.0 + 3.0 * x + e).collect();
        let rows: Vec<Vec<f64>> = xs.iter().map(|&x| vec![1.0, x]).collect();

        let fit = ols(&y, &rows).unwrap();

        assert!((fit.params[0] - 2.0).abs() < 0.2);
        assert!((fit.params[1] - 3.0).abs() < 0.1);
        assert!(fit.std_errors.iter().all(|s| *s > 0.0));
        assert!(fit.aic().is_finite());
    }

    #[test]
    fn test_ols_rank_deficient() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let rows: Vec<Vec<f64>> = (0..4).map(|_| vec![1.0, 5.0]).collect();
        assert!(ols(&y, &rows).is_none());
    }
}
