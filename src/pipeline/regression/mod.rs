//! Regression stages built on the logit estimator

pub mod country;
pub mod pooled;

pub use country::{
    country_list, estimate_cell, min_observations, run_country_regressions, CellOutcome,
    CountryRegressions, CountryResult,
};
pub use pooled::{
    combined_table, fit_pooled_model, format_rounded, model_table, run_pooled_regressions,
    significance_stars, ModelTable, PooledModel, PooledOutcome, TableRow,
};
