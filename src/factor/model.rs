//! Maximum-likelihood factor analysis.
//!
//! Model: `x = W^T z + mean + e`, with `z ~ N(0, I_k)` and
//! `e ~ N(0, diag(psi))`. `W` (`k x p`) holds the loadings, `psi` the
//! per-column noise variance.
//!
//! Fitting alternates two steps until the log-likelihood gain drops below
//! `tol`:
//!
//! - given `psi`, the optimal `W` comes from the leading `k` singular values
//!   of the whitened data `X / (sqrt(psi) * sqrt(n))`
//! - given `W`, `psi = max(var - diag(W^T W), SMALL)`
//!
//! Scores are the posterior means `E[z | x]`.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

use crate::error::PipelineError;
use crate::math::truncated_svd;

/// Floor for variances and logs.
const SMALL: f64 = 1e-12;

/// Factor-analysis estimator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorAnalysis {
    pub n_factors: usize,
    pub max_iter: usize,
    pub tol: f64,
}

/// A fitted factor model.
#[derive(Debug, Clone)]
pub struct FittedFactorModel {
    /// Loadings, `n_factors x n_columns`.
    pub components: DMatrix<f64>,
    /// Noise variance per column.
    pub noise_variance: DVector<f64>,
    /// Column means of the training data.
    pub mean: DVector<f64>,
    pub n_iter: usize,
    pub log_likelihood: f64,
    pub converged: bool,
}

impl FactorAnalysis {
    pub const DEFAULT_MAX_ITER: usize = 1000;
    pub const DEFAULT_TOL: f64 = 1e-2;

    pub fn new(n_factors: usize) -> Self {
        Self {
            n_factors,
            max_iter: Self::DEFAULT_MAX_ITER,
            tol: Self::DEFAULT_TOL,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Fit the model to `x` (`n_samples x n_columns`).
    pub fn fit(&self, x: &DMatrix<f64>) -> Result<FittedFactorModel, PipelineError> {
        let (n, p) = x.shape();
        let k = self.n_factors;
        if n == 0 || p == 0 {
            return Err(PipelineError::EmptyInput("data matrix has no rows or no columns".to_string()));
        }
        if k == 0 || k > p {
            return Err(PipelineError::InvalidFactorCount {
                requested: k,
                columns: p,
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Numerical("data matrix contains non-finite values".to_string()));
        }

        let mean = column_means(x);
        let centered = center(x, &mean);
        let var = DVector::from_iterator(
            p,
            centered.column_iter().map(|c| c.iter().map(|v| v * v).sum::<f64>() / n as f64),
        );

        let nsqrt = (n as f64).sqrt();
        let llconst = p as f64 * (2.0 * std::f64::consts::PI).ln() + k as f64;

        let mut psi = DVector::<f64>::from_element(p, 1.0);
        let mut components = DMatrix::zeros(k, p);
        let mut old_ll = f64::NEG_INFINITY;
        let mut ll = f64::NEG_INFINITY;
        let mut converged = false;
        let mut n_iter = 0;

        for _ in 0..self.max_iter.max(1) {
            n_iter += 1;

            let sqrt_psi = psi.map(|v| v.sqrt() + SMALL);
            let mut scaled = centered.clone();
            for (j, mut col) in scaled.column_iter_mut().enumerate() {
                col.scale_mut(1.0 / (sqrt_psi[j] * nsqrt));
            }

            let svd = truncated_svd(&scaled, k)
                .ok_or_else(|| PipelineError::Numerical("singular value decomposition failed".to_string()))?;
            let s2 = svd.singular_values.map(|s| s * s);

            components = svd.v_t;
            for (r, mut row) in components.row_iter_mut().enumerate() {
                row.scale_mut((s2[r] - 1.0).max(0.0).sqrt());
            }
            for (j, mut col) in components.column_iter_mut().enumerate() {
                col.scale_mut(sqrt_psi[j]);
            }

            ll = llconst
                + s2.iter().map(|v| v.max(SMALL).ln()).sum::<f64>()
                + svd.residual_energy
                + psi.iter().map(|v| v.ln()).sum::<f64>();
            ll *= -(n as f64) / 2.0;

            if ll - old_ll < self.tol {
                converged = true;
                break;
            }
            old_ll = ll;

            for (j, col) in components.column_iter().enumerate() {
                let explained: f64 = col.iter().map(|w| w * w).sum();
                psi[j] = (var[j] - explained).max(SMALL);
            }
        }

        if converged {
            debug!("Factor analysis converged after {n_iter} iteration(s), log-likelihood {ll:.4}");
        } else {
            warn!(
                "Factor analysis did not converge within {} iteration(s); consider raising --max-iter",
                self.max_iter
            );
        }

        Ok(FittedFactorModel {
            components,
            noise_variance: psi,
            mean,
            n_iter,
            log_likelihood: ll,
            converged,
        })
    }
}

impl FittedFactorModel {
    pub fn n_factors(&self) -> usize {
        self.components.nrows()
    }

    /// Posterior factor scores for `x` (`n_samples x n_factors`).
    pub fn transform(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, PipelineError> {
        if x.ncols() != self.components.ncols() {
            return Err(PipelineError::Numerical(format!(
                "expected {} columns, got {}",
                self.components.ncols(),
                x.ncols()
            )));
        }

        let centered = center(x, &self.mean);
        let mut w_psi = self.components.clone();
        for (j, mut col) in w_psi.column_iter_mut().enumerate() {
            col.scale_mut(1.0 / self.noise_variance[j]);
        }

        let k = self.n_factors();
        let precision = DMatrix::identity(k, k) + &w_psi * self.components.transpose();
        let cov_z = precision
            .try_inverse()
            .ok_or_else(|| PipelineError::Numerical("posterior covariance is singular".to_string()))?;

        Ok(centered * w_psi.transpose() * cov_z)
    }
}

fn column_means(x: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(x.ncols(), x.column_iter().map(|c| c.mean()))
}

fn center(x: &DMatrix<f64>, mean: &DVector<f64>) -> DMatrix<f64> {
    let mut out = x.clone();
    for (j, mut col) in out.column_iter_mut().enumerate() {
        col.add_scalar_mut(-mean[j]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    /// One latent factor driving three columns, plus a pure-noise column.
    fn one_factor_data(n: usize, seed: u64) -> (DMatrix<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let loadings = [0.9, 0.8, 0.7, 0.0];
        let noise = [0.3, 0.4, 0.5, 1.0];

        let mut latent = Vec::with_capacity(n);
        let mut x = DMatrix::zeros(n, 4);
        for i in 0..n {
            let z = normal.sample(&mut rng);
            latent.push(z);
            for j in 0..4 {
                x[(i, j)] = loadings[j] * z + noise[j] * normal.sample(&mut rng);
            }
        }
        (x, latent)
    }

    fn correlation(a: &[f64], b: &[f64]) -> f64 {
        let n = a.len() as f64;
        let ma = a.iter().sum::<f64>() / n;
        let mb = b.iter().sum::<f64>() / n;
        let cov: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum();
        let va: f64 = a.iter().map(|x| (x - ma).powi(2)).sum();
        let vb: f64 = b.iter().map(|y| (y - mb).powi(2)).sum();
        cov / (va * vb).sqrt()
    }

    #[test]
    fn recovers_single_factor_structure() {
        let (x, latent) = one_factor_data(600, 7);
        let model = FactorAnalysis::new(1).fit(&x).unwrap();

        assert!(model.converged);
        assert_eq!(model.components.shape(), (1, 4));
        assert_eq!(model.noise_variance.len(), 4);

        let w = model.components.row(0);
        assert!((w[0].abs() - 0.9).abs() < 0.1, "loading 0 = {}", w[0]);
        assert!(w[3].abs() < 0.15, "noise column loading = {}", w[3]);
        assert!((model.noise_variance[3] - 1.0).abs() < 0.2);
        assert!(model.noise_variance.iter().all(|v| *v > 0.0));

        let scores = model.transform(&x).unwrap();
        assert_eq!(scores.shape(), (600, 1));
        let scores: Vec<f64> = scores.column(0).iter().copied().collect();
        assert!(correlation(&scores, &latent).abs() > 0.9);
    }

    #[test]
    fn refit_is_deterministic_in_shape_and_value() {
        let (x, _) = one_factor_data(200, 11);
        let fa = FactorAnalysis::new(2);
        let a = fa.fit(&x).unwrap();
        let b = fa.fit(&x).unwrap();
        assert_eq!(a.components.shape(), (2, 4));
        assert_eq!(a.components, b.components);
        assert_eq!(a.noise_variance, b.noise_variance);
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let (x, _) = one_factor_data(100, 3);
        let model = FactorAnalysis::new(1).with_max_iter(1).fit(&x).unwrap();
        assert!(!model.converged);
        assert_eq!(model.n_iter, 1);
        assert_eq!(model.components.shape(), (1, 4));
        assert!(model.log_likelihood.is_finite());
    }

    #[test]
    fn rejects_bad_factor_counts() {
        let x = DMatrix::from_element(5, 2, 1.0);
        assert!(matches!(
            FactorAnalysis::new(0).fit(&x),
            Err(PipelineError::InvalidFactorCount { requested: 0, columns: 2 })
        ));
        assert!(matches!(
            FactorAnalysis::new(3).fit(&x),
            Err(PipelineError::InvalidFactorCount { requested: 3, columns: 2 })
        ));
    }

    #[test]
    fn rejects_non_finite_input() {
        let x = DMatrix::from_row_slice(2, 2, &[1.0, f64::NAN, 2.0, 3.0]);
        assert!(matches!(FactorAnalysis::new(1).fit(&x), Err(PipelineError::Numerical(_))));
    }
}
