//! Pooled logit models with country and year fixed effects

use anyhow::Result;
use polars::prelude::*;

use crate::config::RegressionConfig;
use crate::pipeline::loader::require_columns;
use crate::pipeline::logit::{fit_logit, CovarianceKind, FitOptions, LogitFit, ModelData, ModelSpec};

pub const OR_COLUMN: &str = "Odds Ratio (OR)";
pub const CI_LOWER_COLUMN: &str = "OR CI 95% Lower";
pub const CI_UPPER_COLUMN: &str = "OR CI 95% Upper";

/// Rows appended after the variable rows of every table
pub const STATISTIC_ROWS: [&str; 7] = [
    "Country FE",
    "Year FE",
    "Clustered St.Er.",
    "Individuals",
    "Countries",
    "Pseudo R2",
    "Adj. Pseudo R2",
];

/// A successfully fitted pooled model
#[derive(Debug, Clone)]
pub struct PooledModel {
    pub dependent: String,
    pub fit: LogitFit,
    /// Explanatory variables dropped for lack of variation
    pub dropped_explanatory: Vec<String>,
}

/// Result of one pooled regression
#[derive(Debug, Clone)]
pub enum PooledOutcome {
    Fitted(PooledModel),
    Skipped { dependent: String, reason: String },
}

/// One labelled row of a regression table
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub label: String,
    pub cells: [String; 3],
}

/// Regression table of one model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTable {
    pub dependent: String,
    pub rows: Vec<TableRow>,
}

impl PooledModel {
    /// Requested explanatory variables without an estimate
    pub fn missing_explanatory(&self, explanatory: &[String]) -> Vec<String> {
        explanatory
            .iter()
            .filter(|v| !self.fit.names.contains(v))
            .cloned()
            .collect()
    }
}

/// Significance stars for a p-value
pub fn significance_stars(p_value: f64) -> &'static str {
    if p_value <= 0.001 {
        "***"
    } else if p_value <= 0.01 {
        "**"
    } else if p_value <= 0.05 {
        "*"
    } else {
        ""
    }
}

/// Round to `decimals` and print the shortest form, keeping at least one decimal
pub fn format_rounded(value: f64, decimals: i32) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let scale = 10f64.powi(decimals);
    let rounded = (value * scale).round() / scale;
    let text = rounded.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Fit the pooled model of one dependent variable
pub fn fit_pooled_model(
    df: &DataFrame,
    dependent: &str,
    config: &RegressionConfig,
) -> Result<PooledModel> {
    let spec = ModelSpec {
        dependent: dependent.to_string(),
        explanatory: config.explanatory_variables.clone(),
        fixed_effects: config.fixed_effects.clone(),
        cluster: Some(config.cluster_variable.clone()),
    };
    let data = ModelData::build(df, &spec)?;
    if data.n_obs() == 0 {
        anyhow::bail!("No observations remain after dropping missing values");
    }

    let options = FitOptions {
        max_iterations: config.max_iterations,
        tolerance: config.tolerance,
        covariance: CovarianceKind::Cluster,
    };
    let fit = fit_logit(&data, &options)?;
    tracing::info!(
        dependent,
        n_obs = fit.n_obs,
        iterations = fit.iterations,
        converged = fit.converged,
        "pooled model fitted"
    );

    Ok(PooledModel {
        dependent: dependent.to_string(),
        fit,
        dropped_explanatory: data.dropped_explanatory,
    })
}

/// Fit one pooled model per dependent variable.
///
/// Missing model columns are an error; a model that cannot be fitted is skipped.
pub fn run_pooled_regressions(df: &DataFrame, config: &RegressionConfig) -> Result<Vec<PooledOutcome>> {
    let mut required: Vec<String> = config.dependent_variables.clone();
    required.extend(config.explanatory_variables.iter().cloned());
    required.extend(config.fixed_effects.iter().cloned());
    required.push(config.cluster_variable.clone());
    require_columns(df, &required, "Regression dataset")?;

    let outcomes = config
        .dependent_variables
        .iter()
        .map(|dv| match fit_pooled_model(df, dv, config) {
            Ok(model) => PooledOutcome::Fitted(model),
            Err(e) => {
                tracing::warn!(dependent = %dv, error = %e, "pooled model skipped");
                PooledOutcome::Skipped {
                    dependent: dv.clone(),
                    reason: e.to_string(),
                }
            }
        })
        .collect();

    Ok(outcomes)
}

fn statistic_row(label: &str, value: String) -> TableRow {
    TableRow {
        label: label.to_string(),
        cells: [value, String::new(), String::new()],
    }
}

/// Odds ratio table of one model: variable rows, then fit statistics
pub fn model_table(model: &PooledModel, explanatory: &[String]) -> ModelTable {
    let mut rows = Vec::new();

    for variable in explanatory {
        let Some(coef) = model.fit.coefficient(variable) else {
            tracing::warn!(
                dependent = %model.dependent,
                variable = %variable,
                "variable not estimated"
            );
            continue;
        };
        let (lower, upper) = coef.odds_ratio_ci();
        rows.push(TableRow {
            label: variable.clone(),
            cells: [
                format!(
                    "{}{}",
                    format_rounded(coef.odds_ratio(), 4),
                    significance_stars(coef.p_value)
                ),
                format!("{:.4}", lower),
                format!("{:.4}", upper),
            ],
        });
    }

    rows.push(statistic_row("Country FE", "YES".to_string()));
    rows.push(statistic_row("Year FE", "YES".to_string()));
    rows.push(statistic_row("Clustered St.Er.", "YES".to_string()));
    rows.push(statistic_row("Individuals", model.fit.n_obs.to_string()));
    rows.push(statistic_row(
        "Countries",
        model.fit.n_clusters.unwrap_or_default().to_string(),
    ));
    rows.push(statistic_row("Pseudo R2", format!("{:.4}", model.fit.pseudo_r2())));
    rows.push(statistic_row(
        "Adj. Pseudo R2",
        format!("{:.4}", model.fit.adj_pseudo_r2()),
    ));

    ModelTable {
        dependent: model.dependent.clone(),
        rows,
    }
}

/// Side-by-side table of several models.
///
/// Variable rows come first in order of appearance, statistic rows last;
/// cells of variables a model did not estimate are empty.
pub fn combined_table(tables: &[ModelTable]) -> Result<DataFrame> {
    let mut variables: Vec<String> = Vec::new();
    for table in tables {
        for row in &table.rows {
            let is_statistic = STATISTIC_ROWS.contains(&row.label.as_str());
            if !is_statistic && !variables.contains(&row.label) {
                variables.push(row.label.clone());
            }
        }
    }
    let labels: Vec<String> = variables
        .into_iter()
        .chain(STATISTIC_ROWS.iter().map(|s| s.to_string()))
        .collect();

    let mut columns = vec![Column::new("Variable".into(), labels.clone())];
    for table in tables {
        for (c, name) in [OR_COLUMN, CI_LOWER_COLUMN, CI_UPPER_COLUMN].iter().enumerate() {
            let values: Vec<String> = labels
                .iter()
                .map(|label| {
                    table
                        .rows
                        .iter()
                        .find(|r| &r.label == label)
                        .map(|r| r.cells[c].clone())
                        .unwrap_or_default()
                })
                .collect();
            let header = format!("{}: {}", table.dependent, name);
            columns.push(Column::new(header.as_str().into(), values));
        }
    }

    Ok(DataFrame::new(columns)?)
}
