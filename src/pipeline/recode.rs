//! Recoding of raw survey codes into binary indicators
//!
//! Two kinds of rules are applied:
//! - recode rules replace a column with its 1/0/NA mapping
//! - split rules derive one dummy column per category of a multi-valued column

use anyhow::{Context, Result};
use polars::prelude::*;

use super::loader::column_codes;
use crate::config::{RecodeRule, SplitRule};

/// What the recode stage did to the dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecodeSummary {
    pub recoded: Vec<String>,
    pub skipped: Vec<String>,
    pub derived: Vec<String>,
}

/// Map raw codes through a recode rule; unmapped codes become missing
pub fn recode_values(codes: &[Option<i64>], rule: &RecodeRule) -> Vec<Option<i32>> {
    codes
        .iter()
        .map(|code| {
            code.and_then(|c| rule.mapping.get(&c))
                .and_then(|mapped| mapped.value())
        })
        .collect()
}

/// Dummy values for one category of a split rule
pub fn split_values(codes: &[Option<i64>], rule: &SplitRule, category_code: i64) -> Vec<Option<i32>> {
    codes
        .iter()
        .map(|code| match code {
            None => None,
            Some(c) if rule.missing_codes.contains(c) => None,
            Some(c) if *c == category_code => Some(1),
            Some(_) => Some(0),
        })
        .collect()
}

/// Apply split rules first (from the raw source columns), then recode rules.
/// Rules whose column is absent are skipped.
pub fn apply_recoding(
    mut df: DataFrame,
    rules: &[RecodeRule],
    splits: &[SplitRule],
) -> Result<(DataFrame, RecodeSummary)> {
    let mut summary = RecodeSummary::default();

    for split in splits {
        if df.column(&split.source).is_err() {
            tracing::warn!(column = %split.source, "split source column not found");
            summary.skipped.push(split.source.clone());
            continue;
        }
        let codes = column_codes(&df, &split.source)?;
        for category in &split.categories {
            let values = split_values(&codes, split, category.code);
            df.with_column(Column::new(category.column.as_str().into(), values))
                .with_context(|| format!("Failed to add derived column '{}'", category.column))?;
            summary.derived.push(category.column.clone());
        }
    }

    for rule in rules {
        if df.column(&rule.column).is_err() {
            summary.skipped.push(rule.column.clone());
            continue;
        }
        let codes = column_codes(&df, &rule.column)?;
        let values = recode_values(&codes, rule);
        df.with_column(Column::new(rule.column.as_str().into(), values))
            .with_context(|| format!("Failed to recode column '{}'", rule.column))?;
        summary.recoded.push(rule.column.clone());
    }

    Ok((df, summary))
}
