//! Column selection and country exclusion

use anyhow::{Context, Result};
use polars::prelude::*;

use super::loader::{column_keys, require_columns};
use crate::config::Rename;

/// Row counts before and after country exclusion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterStats {
    pub original_rows: usize,
    pub filtered_rows: usize,
}

impl FilterStats {
    pub fn removed_rows(&self) -> usize {
        self.original_rows - self.filtered_rows
    }

    pub fn removed_pct(&self) -> f64 {
        if self.original_rows == 0 {
            0.0
        } else {
            self.removed_rows() as f64 / self.original_rows as f64 * 100.0
        }
    }
}

/// Rename columns, then keep the renamed columns plus the country column
pub fn rename_and_select(
    mut df: DataFrame,
    renames: &[Rename],
    country_column: &str,
) -> Result<DataFrame> {
    let sources: Vec<String> = renames.iter().map(|r| r.from.clone()).collect();
    require_columns(&df, &sources, "Recoded dataset")?;
    require_columns(&df, &[country_column.to_string()], "Recoded dataset")?;

    for rename in renames.iter().filter(|r| r.from != r.to) {
        // A target name that already exists would collide with the rename
        if df.column(&rename.to).is_ok() {
            let _ = df.drop_in_place(&rename.to)?;
        }
        df.rename(&rename.from, rename.to.as_str().into())
            .with_context(|| format!("Failed to rename '{}' to '{}'", rename.from, rename.to))?;
    }

    let mut keep: Vec<String> = renames.iter().map(|r| r.to.clone()).collect();
    if !keep.iter().any(|c| c == country_column) {
        keep.push(country_column.to_string());
    }

    Ok(df.select(keep.iter().map(|c| c.as_str()))?)
}

/// Remove rows whose country code is in `excluded`
pub fn exclude_countries(
    df: &DataFrame,
    country_column: &str,
    excluded: &[String],
) -> Result<(DataFrame, FilterStats)> {
    let keys = column_keys(df, country_column)?;
    let mask: BooleanChunked = keys
        .iter()
        .map(|k| match k {
            Some(code) => !excluded.iter().any(|e| e == code),
            None => true,
        })
        .collect();

    let filtered = df.filter(&mask)?;
    let stats = FilterStats {
        original_rows: df.height(),
        filtered_rows: filtered.height(),
    };
    Ok((filtered, stats))
}

/// Keep only rows whose country code is in `kept`
pub fn keep_countries(df: &DataFrame, country_column: &str, kept: &[String]) -> Result<DataFrame> {
    let keys = column_keys(df, country_column)?;
    let mask: BooleanChunked = keys
        .iter()
        .map(|k| k.as_ref().is_some_and(|code| kept.contains(code)))
        .collect();
    Ok(df.filter(&mask)?)
}
