use thiserror::Error;

/// Reasons a logistic regression cannot produce estimates
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("no complete observations to fit")]
    NoObservations,

    #[error("dependent variable has no variation")]
    NoOutcomeVariation,

    #[error("Hessian is singular; predictors are collinear")]
    SingularHessian,

    #[error("perfect separation detected, results not available")]
    PerfectSeparation,

    #[error("log-likelihood is not finite")]
    NonFiniteLikelihood,

    #[error("clustered covariance needs at least 2 clusters, found {0}")]
    TooFewClusters(usize),

    #[error("clustered covariance needs more observations ({n_obs}) than parameters ({n_params})")]
    TooFewObservations { n_obs: usize, n_params: usize },

    #[error("clustered covariance requested but no cluster variable was given")]
    MissingClusters,
}
