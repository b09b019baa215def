//! Per-country logit models with a year control

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::RegressionConfig;
use crate::pipeline::loader::{column_keys, require_columns};
use crate::pipeline::logit::{fit_logit, CovarianceKind, FitOptions, ModelData, ModelSpec};
use crate::utils::{create_progress_bar, finish_with_success};

const PROGRESS_EVERY: usize = 25;

/// Outcome of one country × dependent variable model
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CellOutcome {
    Estimated {
        odds_ratio: f64,
        lower: f64,
        upper: f64,
        n_obs: usize,
    },
    InsufficientN {
        n_obs: usize,
        required: usize,
    },
    NoDvVariation,
    NoExplanatoryVars,
    /// Focus variable requested but dropped for lack of variation
    NotEstimatedDropped,
    /// Focus variable not among the explanatory variables
    NotEstimatedMissing,
    CiCalcError,
    FitError {
        message: String,
    },
}

impl CellOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CellOutcome::Estimated { .. } => "Estimated",
            CellOutcome::InsufficientN { .. } => "Insufficient N",
            CellOutcome::NoDvVariation => "No DV Variation",
            CellOutcome::NoExplanatoryVars => "No Expl Vars",
            CellOutcome::NotEstimatedDropped => "Not Estimated (Dropped)",
            CellOutcome::NotEstimatedMissing => "Not Estimated (Missing/Constant)",
            CellOutcome::CiCalcError => "CI Calc Error",
            CellOutcome::FitError { .. } => "Fit/CI Error",
        }
    }

    /// (lower, OR, upper) when the focus odds ratio was estimated
    pub fn estimate(&self) -> Option<(f64, f64, f64)> {
        match self {
            CellOutcome::Estimated {
                odds_ratio,
                lower,
                upper,
                ..
            } => Some((*lower, *odds_ratio, *upper)),
            _ => None,
        }
    }
}

/// Every model outcome of one country, in dependent variable order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryResult {
    pub country: String,
    pub cells: Vec<CellOutcome>,
}

/// Per-country results for all dependent variables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryRegressions {
    pub focus_variable: String,
    pub dependents: Vec<String>,
    pub results: Vec<CountryResult>,
}

/// Sorted distinct non-missing country codes
pub fn country_list(df: &DataFrame, country_column: &str) -> Result<Vec<String>> {
    let unique: BTreeSet<String> = column_keys(df, country_column)?.into_iter().flatten().collect();
    Ok(unique.into_iter().collect())
}

/// Minimum complete observations for a country model
pub fn min_observations(n_explanatory: usize, year_varies: bool, margin: usize) -> usize {
    n_explanatory + usize::from(year_varies) + margin
}

/// Fit one country model and classify the focus estimate
pub fn estimate_cell(
    df: &DataFrame,
    dependent: &str,
    focus: &str,
    config: &RegressionConfig,
) -> CellOutcome {
    let spec = ModelSpec {
        dependent: dependent.to_string(),
        explanatory: config.explanatory_variables.clone(),
        fixed_effects: config.year_variable.iter().cloned().collect(),
        cluster: None,
    };
    let data = match ModelData::build(df, &spec) {
        Ok(data) => data,
        Err(e) => {
            return CellOutcome::FitError {
                message: e.to_string(),
            }
        }
    };

    let year_varies = config
        .year_variable
        .as_deref()
        .and_then(|y| data.levels(y))
        .is_some_and(|levels| levels.len() > 1);
    let required = min_observations(
        config.explanatory_variables.len(),
        year_varies,
        config.min_obs_margin,
    );

    if data.n_obs() < required {
        return CellOutcome::InsufficientN {
            n_obs: data.n_obs(),
            required,
        };
    }
    if !data.outcome_varies() {
        return CellOutcome::NoDvVariation;
    }
    if data.kept_explanatory.is_empty() {
        return CellOutcome::NoExplanatoryVars;
    }

    let options = FitOptions {
        max_iterations: config.max_iterations,
        tolerance: config.tolerance,
        covariance: CovarianceKind::Nonrobust,
    };
    let fit = match fit_logit(&data, &options) {
        Ok(fit) => fit,
        Err(e) => {
            return CellOutcome::FitError {
                message: e.to_string(),
            }
        }
    };

    match fit.coefficient(focus) {
        Some(coef) => {
            let odds_ratio = coef.odds_ratio();
            let (lower, upper) = coef.odds_ratio_ci();
            if [odds_ratio, lower, upper].iter().all(|v| v.is_finite()) {
                CellOutcome::Estimated {
                    odds_ratio,
                    lower,
                    upper,
                    n_obs: fit.n_obs,
                }
            } else {
                CellOutcome::CiCalcError
            }
        }
        None if config.explanatory_variables.iter().any(|v| v == focus) => {
            CellOutcome::NotEstimatedDropped
        }
        None => CellOutcome::NotEstimatedMissing,
    }
}

/// Fit every country × dependent variable model, countries in parallel
pub fn run_country_regressions(
    df: &DataFrame,
    country_column: &str,
    focus: &str,
    config: &RegressionConfig,
) -> Result<CountryRegressions> {
    let mut required = vec![country_column.to_string()];
    required.extend(config.dependent_variables.iter().cloned());
    required.extend(config.explanatory_variables.iter().cloned());
    required.extend(config.year_variable.iter().cloned());
    require_columns(df, &required, "Regression dataset")?;

    let countries = country_list(df, country_column)?;
    let keys = column_keys(df, country_column)?;
    let total = countries.len();

    let pb = create_progress_bar(total as u64, "Fitting country models");
    let finished = AtomicUsize::new(0);

    let results: Vec<CountryResult> = countries
        .par_iter()
        .map(|country| -> Result<CountryResult> {
            let mask: BooleanChunked = keys
                .iter()
                .map(|k| k.as_deref() == Some(country.as_str()))
                .collect();
            let subset = df.filter(&mask)?;

            let cells: Vec<CellOutcome> = config
                .dependent_variables
                .iter()
                .map(|dv| estimate_cell(&subset, dv, focus, config))
                .collect();

            for (dv, cell) in config.dependent_variables.iter().zip(&cells) {
                if let CellOutcome::FitError { message } = cell {
                    tracing::warn!(country = %country, dependent = %dv, error = %message, "country model failed");
                }
            }

            pb.inc(1);
            let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
            if done % PROGRESS_EVERY == 0 || done == total {
                tracing::info!(done, total, "country models processed");
            }

            Ok(CountryResult {
                country: country.clone(),
                cells,
            })
        })
        .collect::<Result<_>>()?;

    finish_with_success(&pb, &format!("Processed {} countries", total));

    Ok(CountryRegressions {
        focus_variable: focus.to_string(),
        dependents: config.dependent_variables.clone(),
        results,
    })
}

fn format_estimate(value: Option<f64>) -> String {
    value.map_or_else(|| "NA".to_string(), |v| format!("{:.3}", v))
}

impl CountryRegressions {
    fn dependent_index(&self, dependent: &str) -> Result<usize> {
        self.dependents
            .iter()
            .position(|d| d == dependent)
            .ok_or_else(|| anyhow::anyhow!("No country results for '{}'", dependent))
    }

    /// `Country`, `Lower 95`, `OR`, `Higher 95` table of one dependent variable
    pub fn table(&self, dependent: &str) -> Result<DataFrame> {
        let idx = self.dependent_index(dependent)?;
        let estimates: Vec<Option<(f64, f64, f64)>> = self
            .results
            .iter()
            .map(|r| r.cells[idx].estimate())
            .collect();

        let frame = DataFrame::new(vec![
            Column::new(
                "Country".into(),
                self.results.iter().map(|r| r.country.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "Lower 95".into(),
                estimates
                    .iter()
                    .map(|e| format_estimate(e.map(|t| t.0)))
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "OR".into(),
                estimates
                    .iter()
                    .map(|e| format_estimate(e.map(|t| t.1)))
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "Higher 95".into(),
                estimates
                    .iter()
                    .map(|e| format_estimate(e.map(|t| t.2)))
                    .collect::<Vec<_>>(),
            ),
        ])?;
        Ok(frame)
    }

    /// Number of cells per status label for one dependent variable
    pub fn status_counts(&self, dependent: &str) -> Result<BTreeMap<&'static str, usize>> {
        let idx = self.dependent_index(dependent)?;
        let mut counts = BTreeMap::new();
        for result in &self.results {
            *counts.entry(result.cells[idx].label()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    pub fn estimated_count(&self, dependent: &str) -> Result<usize> {
        let idx = self.dependent_index(dependent)?;
        Ok(self
            .results
            .iter()
            .filter(|r| r.cells[idx].estimate().is_some())
            .count())
    }
}
