//! JSON status report of the per-country regressions
//!
//! Records, for every country and dependent variable, whether the focus odds
//! ratio was estimated and, when it was not, why.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::config::RegressionConfig;
use crate::pipeline::regression::{CellOutcome, CountryRegressions};

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct StatusMetadata {
    pub timestamp: String,
    pub findex_version: String,
    pub input_file: String,
    pub focus_variable: String,
    pub explanatory_variables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_variable: Option<String>,
    pub min_obs_margin: usize,
}

/// Status totals of one dependent variable
#[derive(Debug, Clone, Serialize)]
pub struct DependentSummary {
    pub dependent: String,
    pub estimated: usize,
    pub status_counts: BTreeMap<String, usize>,
}

/// Every model outcome of one country
#[derive(Debug, Clone, Serialize)]
pub struct CountryEntry {
    pub country: String,
    pub models: BTreeMap<String, CellOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub metadata: StatusMetadata,
    pub summary: Vec<DependentSummary>,
    pub countries: Vec<CountryEntry>,
}

impl StatusReport {
    pub fn build(regressions: &CountryRegressions, input: &Path, config: &RegressionConfig) -> Result<Self> {
        let metadata = StatusMetadata {
            timestamp: Utc::now().to_rfc3339(),
            findex_version: env!("CARGO_PKG_VERSION").to_string(),
            input_file: input.display().to_string(),
            focus_variable: regressions.focus_variable.clone(),
            explanatory_variables: config.explanatory_variables.clone(),
            year_variable: config.year_variable.clone(),
            min_obs_margin: config.min_obs_margin,
        };

        let summary = regressions
            .dependents
            .iter()
            .map(|dv| -> Result<DependentSummary> {
                Ok(DependentSummary {
                    dependent: dv.clone(),
                    estimated: regressions.estimated_count(dv)?,
                    status_counts: regressions
                        .status_counts(dv)?
                        .into_iter()
                        .map(|(label, count)| (label.to_string(), count))
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let countries = regressions
            .results
            .iter()
            .map(|result| CountryEntry {
                country: result.country.clone(),
                models: regressions
                    .dependents
                    .iter()
                    .cloned()
                    .zip(result.cells.iter().cloned())
                    .collect(),
            })
            .collect();

        Ok(Self {
            metadata,
            summary,
            countries,
        })
    }
}

/// Write the status report as pretty JSON
pub fn export_status_report(report: &StatusReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize regression status report to JSON")?;

    std::fs::write(output_path, json).with_context(|| {
        format!(
            "Failed to write regression status report to {}",
            output_path.display()
        )
    })?;

    Ok(())
}
