//! Parameter covariance estimators

use faer::linalg::solvers::SolverCore;
use faer::{Mat, Side};

use super::error::FitError;

/// Invert the (positive definite) information matrix through its Cholesky factor
pub fn invert_hessian(information: &Mat<f64>) -> Result<Mat<f64>, FitError> {
    let factor = information
        .cholesky(Side::Lower)
        .map_err(|_| FitError::SingularHessian)?;
    let inverse = factor.inverse();

    let finite = (0..inverse.nrows())
        .all(|i| (0..inverse.ncols()).all(|j| inverse[(i, j)].is_finite()));
    if !finite {
        return Err(FitError::SingularHessian);
    }
    Ok(inverse)
}

/// Cluster-robust sandwich covariance
///
/// `H⁻¹ (Σ_g s_g s_gᵀ) H⁻¹ · G/(G-1) · (N-1)/(N-k)` where `s_g` sums the
/// score contributions `x_i (y_i - p_i)` of cluster `g`.
pub fn cluster_covariance(
    x: &Mat<f64>,
    residuals: &[f64],
    clusters: &[usize],
    n_clusters: usize,
    hessian_inv: &Mat<f64>,
) -> Result<Mat<f64>, FitError> {
    let n = x.nrows();
    let k = x.ncols();
    if n_clusters < 2 {
        return Err(FitError::TooFewClusters(n_clusters));
    }
    if n <= k {
        return Err(FitError::TooFewObservations {
            n_obs: n,
            n_params: k,
        });
    }

    let mut scores = Mat::<f64>::zeros(n_clusters, k);
    for (i, &g) in clusters.iter().enumerate() {
        for j in 0..k {
            scores[(g, j)] += x[(i, j)] * residuals[i];
        }
    }

    let meat = scores.transpose() * &scores;
    let sandwich = hessian_inv * &meat * hessian_inv;

    let g = n_clusters as f64;
    let correction = g / (g - 1.0) * (n as f64 - 1.0) / (n as f64 - k as f64);

    Ok(Mat::from_fn(k, k, |i, j| sandwich[(i, j)] * correction))
}
