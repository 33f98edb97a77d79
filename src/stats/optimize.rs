//! Derivative-free minimisation (Nelder–Mead simplex).

#[derive(Debug, Clone)]
pub struct NelderMead {
    pub max_iterations: usize,
    /// Simplex spread in x (infinity norm) required for convergence
    pub xatol: f64,
    /// Spread of function values required for convergence
    pub fatol: f64,
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        NelderMead {
            max_iterations: 2000,
            xatol: 1e-4,
            fatol: 1e-8,
            initial_step: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub fx: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

impl NelderMead {
    /// Minimise `f` starting from `x0`. Non-finite values count as +inf.
    pub fn minimize<F>(&self, mut f: F, x0: &[f64]) -> Minimum
    where
        F: FnMut(&[f64]) -> f64,
    {
        let mut eval = |x: &[f64]| {
            let v = f(x);
            if v.is_nan() {
                f64::INFINITY
            } else {
                v
            }
        };

        let n = x0.len();
        if n == 0 {
            return Minimum {
                x: Vec::new(),
                fx: eval(x0),
                iterations: 0,
                converged: true,
            };
        }

        let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
        simplex.push(x0.to_vec());
        for i in 0..n {
            let mut vertex = x0.to_vec();
            vertex[i] += self.initial_step;
            simplex.push(vertex);
        }
        let mut values: Vec<f64> = simplex.iter().map(|x| eval(x)).collect();

        let mut iterations = 0;
        let converged = loop {
            // Best first
            let mut order: Vec<usize> = (0..=n).collect();
            order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
            simplex = order.iter().map(|&i| simplex[i].clone()).collect();
            values = order.iter().map(|&i| values[i]).collect();

            let x_spread = simplex[1..]
                .iter()
                .flat_map(|v| v.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
                .fold(0.0_f64, f64::max);
            let f_spread = values[1..]
                .iter()
                .map(|v| (v - values[0]).abs())
                .fold(0.0_f64, f64::max);
            if values[0].is_finite() && x_spread <= self.xatol && f_spread <= self.fatol {
                break true;
            }
            if iterations >= self.max_iterations {
                break false;
            }
            iterations += 1;

            let centroid: Vec<f64> = (0..n)
                .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
                .collect();
            let toward = |coef: f64, target: &[f64]| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(target)
                    .map(|(c, t)| c + coef * (t - c))
                    .collect()
            };

            let worst = simplex[n].clone();
            let reflected = toward(-REFLECT, &worst);
            let f_reflected = eval(&reflected);

            if f_reflected < values[0] {
                let expanded = toward(EXPAND, &reflected);
                let f_expanded = eval(&expanded);
                if f_expanded < f_reflected {
                    simplex[n] = expanded;
                    values[n] = f_expanded;
                } else {
                    simplex[n] = reflected;
                    values[n] = f_reflected;
                }
                continue;
            }

            if f_reflected < values[n - 1] {
                simplex[n] = reflected;
                values[n] = f_reflected;
                continue;
            }

            let (contracted, f_contracted, accept) = if f_reflected < values[n] {
                let c = toward(CONTRACT, &reflected);
                let fc = eval(&c);
                let ok = fc <= f_reflected;
                (c, fc, ok)
            } else {
                let c = toward(CONTRACT, &worst);
                let fc = eval(&c);
                let ok = fc < values[n];
                (c, fc, ok)
            };

            if accept {
                simplex[n] = contracted;
                values[n] = f_contracted;
                continue;
            }

            // Shrink toward the best vertex
            let best = simplex[0].clone();
            for i in 1..=n {
                simplex[i] = best
                    .iter()
                    .zip(&simplex[i])
                    .map(|(b, x)| b + SHRINK * (x - b))
                    .collect();
                values[i] = eval(&simplex[i]);
            }
        };

        Minimum {
            x: simplex.swap_remove(0),
            fx: values[0],
            iterations,
            converged,
        }
    }
}
