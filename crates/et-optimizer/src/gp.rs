//! Gaussian-process surrogate over the unit hypercube.

use et_types::{OptimizerError, TuneResult};

/// Length scales tried on every fit; the one with the highest marginal
/// likelihood wins.
pub const LENGTH_SCALES: [f64; 7] = [0.05, 0.1, 0.2, 0.3, 0.5, 0.8, 1.2];

const JITTER_RETRIES: usize = 3;

fn surrogate_error(message: impl Into<String>) -> et_types::TuneError {
    OptimizerError::SurrogateFailed {
        message: message.into(),
    }
    .into()
}

/// Zero-mean GP with a unit-variance RBF kernel, fitted to standardized
/// objective values.
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    x_train: Vec<Vec<f64>>,
    noise_variance: f64,
    length_scale: f64,
    y_mean: f64,
    y_std: f64,
    alpha: Vec<f64>,
    chol: Vec<Vec<f64>>,
}

struct Factorization {
    chol: Vec<Vec<f64>>,
    alpha: Vec<f64>,
    log_marginal_likelihood: f64,
}

impl GaussianProcess {
    pub fn new(noise_variance: f64) -> Self {
        Self {
            x_train: Vec::new(),
            noise_variance: noise_variance.max(1e-10),
            length_scale: LENGTH_SCALES[3],
            y_mean: 0.0,
            y_std: 1.0,
            alpha: Vec::new(),
            chol: Vec::new(),
        }
    }

    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    pub fn n_observations(&self) -> usize {
        self.x_train.len()
    }

    pub fn fit(&mut self, xs: &[Vec<f64>], ys: &[f64]) -> TuneResult<()> {
        if xs.is_empty() {
            return Err(surrogate_error("no observations"));
        }
        if xs.len() != ys.len() {
            return Err(surrogate_error(format!(
                "{} inputs but {} targets",
                xs.len(),
                ys.len()
            )));
        }
        if ys.iter().any(|y| !y.is_finite()) {
            return Err(surrogate_error("non-finite target"));
        }

        let n = ys.len() as f64;
        let y_mean = ys.iter().sum::<f64>() / n;
        let y_var = ys.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>() / n;
        let y_std = if y_var.sqrt() > 1e-12 { y_var.sqrt() } else { 1.0 };
        let y: Vec<f64> = ys.iter().map(|v| (v - y_mean) / y_std).collect();

        let mut best: Option<(f64, Factorization)> = None;
        for &ls in &LENGTH_SCALES {
            let Some(f) = self.factorize(xs, &y, ls) else {
                continue;
            };
            let better = best
                .as_ref()
                .map_or(true, |(_, b)| f.log_marginal_likelihood > b.log_marginal_likelihood);
            if better {
                best = Some((ls, f));
            }
        }

        let (length_scale, f) =
            best.ok_or_else(|| surrogate_error("covariance matrix not positive definite"))?;

        self.x_train = xs.to_vec();
        self.length_scale = length_scale;
        self.y_mean = y_mean;
        self.y_std = y_std;
        self.alpha = f.alpha;
        self.chol = f.chol;
        Ok(())
    }

    /// Posterior mean and standard deviation at `x`, in objective units.
    pub fn predict(&self, x: &[f64]) -> (f64, f64) {
        if self.x_train.is_empty() {
            return (self.y_mean, self.y_std);
        }

        let k_star: Vec<f64> = self
            .x_train
            .iter()
            .map(|xi| rbf(xi, x, self.length_scale))
            .collect();
        let mu: f64 = k_star.iter().zip(&self.alpha).map(|(k, a)| k * a).sum();

        let v = solve_lower(&self.chol, &k_star);
        let variance = (1.0 - v.iter().map(|vi| vi * vi).sum::<f64>()).max(1e-12);

        (self.y_mean + self.y_std * mu, self.y_std * variance.sqrt())
    }

    fn factorize(&self, xs: &[Vec<f64>], y: &[f64], length_scale: f64) -> Option<Factorization> {
        let n = xs.len();
        let mut noise = self.noise_variance;

        for _ in 0..JITTER_RETRIES {
            let mut k = vec![vec![0.0; n]; n];
            for i in 0..n {
                for j in 0..=i {
                    let v = rbf(&xs[i], &xs[j], length_scale);
                    k[i][j] = v;
                    k[j][i] = v;
                }
                k[i][i] += noise;
            }

            if let Some(chol) = cholesky(&k) {
                let alpha = solve_upper_transposed(&chol, &solve_lower(&chol, y));
                let data_fit: f64 = y.iter().zip(&alpha).map(|(a, b)| a * b).sum();
                let log_det: f64 = (0..n).map(|i| chol[i][i].ln()).sum();
                let log_marginal_likelihood = -0.5 * data_fit
                    - log_det
                    - 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln();
                return Some(Factorization {
                    chol,
                    alpha,
                    log_marginal_likelihood,
                });
            }
            noise *= 10.0;
        }
        None
    }
}

fn rbf(a: &[f64], b: &[f64], length_scale: f64) -> f64 {
    let sq_dist: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    (-sq_dist / (2.0 * length_scale * length_scale)).exp()
}

/// Lower-triangular `L` with `L * L^T = matrix`.
fn cholesky(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let d = matrix[i][i] - sum;
                if d <= 0.0 || !d.is_finite() {
                    return None;
                }
                l[i][j] = d.sqrt();
            } else {
                l[i][j] = (matrix[i][j] - sum) / l[j][j];
            }
        }
    }
    Some(l)
}

fn solve_lower(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();
    let mut x = vec![0.0; n];
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[i][j] * x[j]).sum();
        x[i] = (b[i] - sum) / l[i][i];
    }
    x
}

fn solve_upper_transposed(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[j][i] * x[j]).sum();
        x[i] = (b[i] - sum) / l[i][i];
    }
    x
}
