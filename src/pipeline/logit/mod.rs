//! Binary logistic regression with fixed effects and clustered standard errors
//!
//! Newton-Raphson on the logit log-likelihood with normal-theory inference.
//! Covariance is the inverse information matrix or a cluster-robust sandwich.

mod covariance;
mod design;
mod error;
mod model;

pub use covariance::{cluster_covariance, invert_hessian};
pub use design::{dummy_name, FixedEffectLevels, ModelData, ModelSpec, INTERCEPT};
pub use error::FitError;
pub use model::{
    fit_logit, null_log_likelihood, two_sided_p_value, Coefficient, CovarianceKind, FitOptions,
    LogitFit, Z_CRITICAL_95,
};
