//! Gaussian-process regression with a fixed RBF kernel.
//!
//! Hyperparameters are constants, not learned. Targets are centred on their
//! mean before fitting so the zero-mean prior sits at the observed average.

use crate::optimizer::linalg::{Cholesky, LinalgError, Matrix};

/// Diagonal jitter tried, in order, when the covariance will not factor.
pub const JITTER_LADDER: [f64; 4] = [1e-10, 1e-8, 1e-6, 1e-4];

/// Squared-exponential kernel `σ² · exp(-|a - b|² / 2ℓ²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RbfKernel {
    pub length_scale: f64,
    pub signal_variance: f64,
}

impl RbfKernel {
    #[inline]
    pub fn eval(&self, a: &[f64], b: &[f64]) -> f64 {
        let sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
        self.signal_variance * (-sq / (2.0 * self.length_scale * self.length_scale)).exp()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianProcess {
    pub kernel: RbfKernel,
    /// Observation noise variance, added to the covariance diagonal.
    pub noise: f64,
}

impl Default for GaussianProcess {
    fn default() -> Self {
        GaussianProcess {
            kernel: RbfKernel {
                length_scale: 0.5,
                signal_variance: 1.0,
            },
            noise: 0.1,
        }
    }
}

/// A GP conditioned on a set of observations.
#[derive(Debug, Clone)]
pub struct FittedGp {
    kernel: RbfKernel,
    xs: Vec<Vec<f64>>,
    chol: Cholesky,
    /// `K⁻¹·(y - ȳ)`
    alpha: Vec<f64>,
    y_mean: f64,
    /// Jitter needed to factor the covariance.
    pub jitter: f64,
}

impl GaussianProcess {
    pub fn fit(&self, xs: &[Vec<f64>], ys: &[f64]) -> Result<FittedGp, LinalgError> {
        if xs.len() != ys.len() {
            return Err(LinalgError::DimensionMismatch {
                expected: xs.len(),
                got: ys.len(),
            });
        }
        let n = xs.len();
        let mut k = Matrix::zeros(n);
        for i in 0..n {
            for j in 0..=i {
                let v = self.kernel.eval(&xs[i], &xs[j]);
                k.set(i, j, v);
                k.set(j, i, v);
            }
        }
        k.add_diagonal(self.noise);

        let (chol, jitter) = Cholesky::factor_with_jitter(&k, &JITTER_LADDER)?;

        let y_mean = if n == 0 {
            0.0
        } else {
            ys.iter().sum::<f64>() / n as f64
        };
        let centred: Vec<f64> = ys.iter().map(|y| y - y_mean).collect();
        let alpha = chol.solve(&centred)?;

        Ok(FittedGp {
            kernel: self.kernel,
            xs: xs.to_vec(),
            chol,
            alpha,
            y_mean,
            jitter,
        })
    }
}

impl FittedGp {
    /// Posterior mean and variance at `x`.
    pub fn predict(&self, x: &[f64]) -> (f64, f64) {
        let k_star: Vec<f64> = self.xs.iter().map(|xi| self.kernel.eval(x, xi)).collect();
        let mean = self.y_mean
            + k_star
                .iter()
                .zip(&self.alpha)
                .map(|(k, a)| k * a)
                .sum::<f64>();

        // v = L⁻¹·k*, var = k(x,x) - vᵀv
        let var = match self.chol.solve_lower(&k_star) {
            Ok(v) => self.kernel.eval(x, x) - v.iter().map(|vi| vi * vi).sum::<f64>(),
            Err(_) => self.kernel.signal_variance,
        };
        (mean, var.max(0.0))
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}
