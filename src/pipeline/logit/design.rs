//! Design matrix construction: listwise deletion, treatment-coded fixed effects

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use faer::Mat;
use polars::prelude::*;

use crate::pipeline::loader::{column_f64, column_keys, require_columns};

pub const INTERCEPT: &str = "Intercept";

/// Which columns a logistic model reads and how
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub dependent: String,
    pub explanatory: Vec<String>,
    /// Categorical controls expanded into dummies
    pub fixed_effects: Vec<String>,
    pub cluster: Option<String>,
}

impl ModelSpec {
    /// Every column the model reads, in order and without duplicates
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        let all = std::iter::once(&self.dependent)
            .chain(self.explanatory.iter())
            .chain(self.fixed_effects.iter())
            .chain(self.cluster.iter());
        for name in all {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
        columns
    }
}

/// Observed levels of one fixed effect, reference level first
#[derive(Debug, Clone, PartialEq)]
pub struct FixedEffectLevels {
    pub variable: String,
    pub levels: Vec<String>,
}

/// Complete-case data ready for fitting
#[derive(Debug, Clone)]
pub struct ModelData {
    /// Design column names, `Intercept` first
    pub names: Vec<String>,
    pub x: Mat<f64>,
    pub y: Vec<f64>,
    /// Cluster index of every row, when a cluster variable was given
    pub clusters: Option<Vec<usize>>,
    pub n_clusters: usize,
    pub fixed_effects: Vec<FixedEffectLevels>,
    pub kept_explanatory: Vec<String>,
    /// Explanatory variables without variation in the complete rows
    pub dropped_explanatory: Vec<String>,
}

/// Name of the dummy column for one non-reference level
pub fn dummy_name(variable: &str, level: &str) -> String {
    format!("C({})[T.{}]", variable, level)
}

fn is_present(value: Option<f64>) -> bool {
    value.is_some_and(|v| !v.is_nan())
}

/// Sort levels numerically when every level is a number, lexically otherwise
fn sort_levels(mut levels: Vec<String>) -> Vec<String> {
    let numeric: Option<Vec<f64>> = levels.iter().map(|l| l.parse::<f64>().ok()).collect();
    match numeric {
        Some(values) => {
            let mut pairs: Vec<(f64, String)> = values.into_iter().zip(levels).collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            pairs.into_iter().map(|(_, l)| l).collect()
        }
        None => {
            levels.sort();
            levels
        }
    }
}

fn distinct_levels(keys: &[Option<String>], rows: &[usize]) -> Vec<String> {
    let unique: BTreeSet<&String> = rows.iter().filter_map(|&i| keys[i].as_ref()).collect();
    sort_levels(unique.into_iter().cloned().collect())
}

impl ModelData {
    /// Listwise deletion over every column of `spec`, then build the design matrix.
    ///
    /// The dependent variable must be coded 0/1 in the complete rows.
    pub fn build(df: &DataFrame, spec: &ModelSpec) -> Result<Self> {
        require_columns(df, &spec.columns(), "Model data")?;

        let y_raw = column_f64(df, &spec.dependent)?;
        let x_raw: Vec<Vec<Option<f64>>> = spec
            .explanatory
            .iter()
            .map(|v| column_f64(df, v))
            .collect::<Result<_>>()?;
        let fe_raw: Vec<Vec<Option<String>>> = spec
            .fixed_effects
            .iter()
            .map(|v| column_keys(df, v))
            .collect::<Result<_>>()?;
        let cluster_raw = spec
            .cluster
            .as_deref()
            .map(|c| column_keys(df, c))
            .transpose()?;

        let rows: Vec<usize> = (0..df.height())
            .filter(|&i| {
                is_present(y_raw[i])
                    && x_raw.iter().all(|c| is_present(c[i]))
                    && fe_raw.iter().all(|c| c[i].is_some())
                    && cluster_raw.as_ref().map_or(true, |c| c[i].is_some())
            })
            .collect();
        let n = rows.len();

        let y: Vec<f64> = rows.iter().filter_map(|&i| y_raw[i]).collect();
        if let Some(bad) = y.iter().find(|v| **v != 0.0 && **v != 1.0) {
            anyhow::bail!(
                "Dependent variable '{}' must be coded 0/1, found {}",
                spec.dependent,
                bad
            );
        }

        let mut kept_explanatory = Vec::new();
        let mut dropped_explanatory = Vec::new();
        let mut kept_values: Vec<Vec<f64>> = Vec::new();
        for (name, raw) in spec.explanatory.iter().zip(&x_raw) {
            let values: Vec<f64> = rows.iter().filter_map(|&i| raw[i]).collect();
            let varies = values.first().map_or(true, |first| values.iter().any(|v| v != first));
            if varies {
                kept_explanatory.push(name.clone());
                kept_values.push(values);
            } else {
                dropped_explanatory.push(name.clone());
            }
        }

        let fixed_effects: Vec<FixedEffectLevels> = spec
            .fixed_effects
            .iter()
            .zip(&fe_raw)
            .map(|(variable, keys)| FixedEffectLevels {
                variable: variable.clone(),
                levels: distinct_levels(keys, &rows),
            })
            .collect();

        let mut names = vec![INTERCEPT.to_string()];
        names.extend(kept_explanatory.iter().cloned());
        for fe in &fixed_effects {
            names.extend(fe.levels.iter().skip(1).map(|l| dummy_name(&fe.variable, l)));
        }

        let mut x = Mat::<f64>::zeros(n, names.len());
        for r in 0..n {
            x[(r, 0)] = 1.0;
            for (j, values) in kept_values.iter().enumerate() {
                x[(r, j + 1)] = values[r];
            }
        }

        let mut offset = 1 + kept_values.len();
        for (fe, keys) in fixed_effects.iter().zip(&fe_raw) {
            let index: HashMap<&str, usize> = fe
                .levels
                .iter()
                .enumerate()
                .map(|(i, l)| (l.as_str(), i))
                .collect();
            for (r, &i) in rows.iter().enumerate() {
                let level = keys[i].as_deref().and_then(|k| index.get(k)).copied();
                if let Some(l) = level.filter(|l| *l > 0) {
                    x[(r, offset + l - 1)] = 1.0;
                }
            }
            offset += fe.levels.len().saturating_sub(1);
        }

        let (clusters, n_clusters) = match &cluster_raw {
            Some(keys) => {
                let levels = distinct_levels(keys, &rows);
                let index: HashMap<&str, usize> = levels
                    .iter()
                    .enumerate()
                    .map(|(i, l)| (l.as_str(), i))
                    .collect();
                let assignment: Vec<usize> = rows
                    .iter()
                    .filter_map(|&i| keys[i].as_deref().and_then(|k| index.get(k)).copied())
                    .collect();
                (Some(assignment), levels.len())
            }
            None => (None, 0),
        };

        Ok(Self {
            names,
            x,
            y,
            clusters,
            n_clusters,
            fixed_effects,
            kept_explanatory,
            dropped_explanatory,
        })
    }

    pub fn n_obs(&self) -> usize {
        self.y.len()
    }

    pub fn n_params(&self) -> usize {
        self.names.len()
    }

    /// Whether both outcome values occur
    pub fn outcome_varies(&self) -> bool {
        let ones = self.y.iter().filter(|v| **v == 1.0).count();
        ones > 0 && ones < self.y.len()
    }

    /// Observed levels of a fixed effect
    pub fn levels(&self, variable: &str) -> Option<&[String]> {
        self.fixed_effects
            .iter()
            .find(|fe| fe.variable == variable)
            .map(|fe| fe.levels.as_slice())
    }
}
