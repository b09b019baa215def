//! Newton-Raphson maximum likelihood for the binary logit model

use faer::Mat;
use statrs::function::erf::erfc;

use super::covariance::{cluster_covariance, invert_hessian};
use super::design::ModelData;
use super::error::FitError;

/// Two-sided 95% critical value of the standard normal distribution
pub const Z_CRITICAL_95: f64 = 1.959_963_984_540_054;

/// How parameter standard errors are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceKind {
    /// Inverse of the observed information matrix
    Nonrobust,
    /// Sandwich estimator with scores summed within clusters
    Cluster,
}

/// Estimator settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Convergence threshold on the largest absolute Newton step
    pub tolerance: f64,
    pub covariance: CovarianceKind,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 35,
            tolerance: 1e-8,
            covariance: CovarianceKind::Nonrobust,
        }
    }
}

/// Estimate and inference for one design column
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub z: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl Coefficient {
    pub fn odds_ratio(&self) -> f64 {
        self.estimate.exp()
    }

    /// 95% interval of the odds ratio
    pub fn odds_ratio_ci(&self) -> (f64, f64) {
        (self.ci_lower.exp(), self.ci_upper.exp())
    }
}

/// A fitted logit model
#[derive(Debug, Clone)]
pub struct LogitFit {
    pub names: Vec<String>,
    pub params: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub log_likelihood: f64,
    pub null_log_likelihood: f64,
    pub n_obs: usize,
    /// Number of clusters behind a clustered covariance
    pub n_clusters: Option<usize>,
    pub iterations: usize,
    pub converged: bool,
    pub covariance: CovarianceKind,
}

impl LogitFit {
    /// Number of estimated parameters, intercept included
    pub fn n_params(&self) -> usize {
        self.params.len()
    }

    /// McFadden pseudo R²
    pub fn pseudo_r2(&self) -> f64 {
        if self.null_log_likelihood == 0.0 {
            return f64::NAN;
        }
        1.0 - self.log_likelihood / self.null_log_likelihood
    }

    /// McFadden pseudo R² penalised by the number of parameters
    pub fn adj_pseudo_r2(&self) -> f64 {
        if self.null_log_likelihood == 0.0 {
            return f64::NAN;
        }
        1.0 - (self.log_likelihood - self.n_params() as f64) / self.null_log_likelihood
    }

    pub fn coefficient(&self, name: &str) -> Option<Coefficient> {
        let j = self.names.iter().position(|n| n == name)?;
        Some(self.coefficient_at(j))
    }

    pub fn coefficients(&self) -> Vec<Coefficient> {
        (0..self.params.len()).map(|j| self.coefficient_at(j)).collect()
    }

    fn coefficient_at(&self, j: usize) -> Coefficient {
        let estimate = self.params[j];
        let std_error = self.std_errors[j];
        let z = estimate / std_error;
        Coefficient {
            name: self.names[j].clone(),
            estimate,
            std_error,
            z,
            p_value: two_sided_p_value(z),
            ci_lower: estimate - Z_CRITICAL_95 * std_error,
            ci_upper: estimate + Z_CRITICAL_95 * std_error,
        }
    }
}

/// Two-sided p-value of a standard normal statistic
pub fn two_sided_p_value(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    erfc(z.abs() / std::f64::consts::SQRT_2)
}

fn sigmoid(eta: f64) -> f64 {
    if eta >= 0.0 {
        1.0 / (1.0 + (-eta).exp())
    } else {
        let e = eta.exp();
        e / (1.0 + e)
    }
}

/// ln(1 + e^eta) without overflow
fn log1p_exp(eta: f64) -> f64 {
    if eta > 0.0 {
        eta + (-eta).exp().ln_1p()
    } else {
        eta.exp().ln_1p()
    }
}

fn linear_predictor(x: &Mat<f64>, beta: &Mat<f64>) -> Vec<f64> {
    let eta = x * beta;
    (0..eta.nrows()).map(|i| eta[(i, 0)]).collect()
}

fn log_likelihood(y: &[f64], eta: &[f64]) -> f64 {
    y.iter()
        .zip(eta)
        .map(|(yi, ei)| yi * ei - log1p_exp(*ei))
        .sum()
}

/// Log-likelihood of the intercept-only model
pub fn null_log_likelihood(y: &[f64]) -> f64 {
    let n = y.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p = y.iter().sum::<f64>() / n;
    let term = |share: f64| if share > 0.0 { share * share.ln() } else { 0.0 };
    n * (term(p) + term(1.0 - p))
}

/// Observed information X'WX with W = p(1-p)
fn information_matrix(x: &Mat<f64>, probs: &[f64]) -> Mat<f64> {
    let weighted = Mat::from_fn(x.nrows(), x.ncols(), |i, j| {
        x[(i, j)] * probs[i] * (1.0 - probs[i])
    });
    x.transpose() * &weighted
}

fn perfectly_predicted(y: &[f64], probs: &[f64]) -> bool {
    // Same closeness rule as numpy.allclose
    y.iter()
        .zip(probs)
        .all(|(yi, pi)| (pi - yi).abs() <= 1e-8 + 1e-5 * yi.abs())
}

/// Fit a logit model by Newton-Raphson starting from zero coefficients
pub fn fit_logit(data: &ModelData, options: &FitOptions) -> Result<LogitFit, FitError> {
    let n = data.n_obs();
    let k = data.n_params();
    if n == 0 {
        return Err(FitError::NoObservations);
    }
    if !data.outcome_varies() {
        return Err(FitError::NoOutcomeVariation);
    }

    let mut beta = Mat::<f64>::zeros(k, 1);
    let mut iterations = 0;
    let mut converged = false;

    for _ in 0..options.max_iterations {
        iterations += 1;
        let eta = linear_predictor(&data.x, &beta);
        let probs: Vec<f64> = eta.iter().map(|e| sigmoid(*e)).collect();
        if perfectly_predicted(&data.y, &probs) {
            return Err(FitError::PerfectSeparation);
        }

        let residuals = Mat::from_fn(n, 1, |i, _| data.y[i] - probs[i]);
        let gradient = data.x.transpose() * &residuals;
        let hessian_inv = invert_hessian(&information_matrix(&data.x, &probs))?;
        let step = &hessian_inv * &gradient;

        let mut max_step: f64 = 0.0;
        for j in 0..k {
            let delta = step[(j, 0)];
            if !delta.is_finite() {
                return Err(FitError::NonFiniteLikelihood);
            }
            beta[(j, 0)] += delta;
            max_step = max_step.max(delta.abs());
        }

        if max_step < options.tolerance {
            converged = true;
            break;
        }
    }

    let eta = linear_predictor(&data.x, &beta);
    let probs: Vec<f64> = eta.iter().map(|e| sigmoid(*e)).collect();
    let llf = log_likelihood(&data.y, &eta);
    if !llf.is_finite() {
        return Err(FitError::NonFiniteLikelihood);
    }
    if !converged && perfectly_predicted(&data.y, &probs) {
        return Err(FitError::PerfectSeparation);
    }
    if !converged {
        tracing::debug!(iterations, "logit did not converge");
    }

    let hessian_inv = invert_hessian(&information_matrix(&data.x, &probs))?;
    let (covariance, n_clusters) = match options.covariance {
        CovarianceKind::Nonrobust => (hessian_inv, None),
        CovarianceKind::Cluster => {
            let clusters = data.clusters.as_deref().ok_or(FitError::MissingClusters)?;
            let residuals: Vec<f64> = data.y.iter().zip(&probs).map(|(y, p)| y - p).collect();
            let cov = cluster_covariance(
                &data.x,
                &residuals,
                clusters,
                data.n_clusters,
                &hessian_inv,
            )?;
            (cov, Some(data.n_clusters))
        }
    };

    let std_errors: Vec<f64> = (0..k)
        .map(|j| {
            let v = covariance[(j, j)];
            if v >= 0.0 {
                v.sqrt()
            } else {
                f64::NAN
            }
        })
        .collect();

    Ok(LogitFit {
        names: data.names.clone(),
        params: (0..k).map(|j| beta[(j, 0)]).collect(),
        std_errors,
        log_likelihood: llf,
        null_log_likelihood: null_log_likelihood(&data.y),
        n_obs: n,
        n_clusters,
        iterations,
        converged,
        covariance: options.covariance,
    })
}
