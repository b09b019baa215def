//! Non-missing coverage of survey variables

use anyhow::Result;
use polars::prelude::*;

/// Non-missing share of one variable over the whole dataset
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageEntry {
    pub variable: String,
    pub non_missing: usize,
    pub total: usize,
    pub share: f64,
}

/// Variables from `variables` that exist in the DataFrame, plus the ones that do not
pub fn split_present(df: &DataFrame, variables: &[String]) -> (Vec<String>, Vec<String>) {
    variables
        .iter()
        .cloned()
        .partition(|v| df.column(v.as_str()).is_ok())
}

/// Count non-missing values of each variable over all rows
pub fn analyze_coverage(df: &DataFrame, variables: &[String]) -> Result<Vec<CoverageEntry>> {
    let total = df.height();
    let mut entries = Vec::with_capacity(variables.len());

    for variable in variables {
        let column = df.column(variable)?;
        let non_missing = column.len() - column.null_count();
        let share = if total == 0 {
            0.0
        } else {
            non_missing as f64 / total as f64
        };
        entries.push(CoverageEntry {
            variable: variable.clone(),
            non_missing,
            total,
            share,
        });
    }

    Ok(entries)
}

/// Percentage of non-missing rows per group and variable, rounded to 2 decimals.
/// Groups are sorted; rows with a missing group key are left out.
pub fn coverage_by_group(df: &DataFrame, group_column: &str, variables: &[String]) -> Result<DataFrame> {
    let exprs: Vec<Expr> = variables
        .iter()
        .map(|v| {
            (col(v.as_str()).is_not_null().cast(DataType::Float64).mean() * lit(100.0))
                .alias(v.as_str())
        })
        .collect();

    let mut grouped = df
        .clone()
        .lazy()
        .filter(col(group_column).is_not_null())
        .group_by([col(group_column)])
        .agg(exprs)
        .sort([group_column], SortMultipleOptions::default())
        .collect()?;

    for variable in variables {
        let rounded: Vec<Option<f64>> = grouped
            .column(variable)?
            .f64()?
            .into_iter()
            .map(|v| v.map(|x| (x * 100.0).round() / 100.0))
            .collect();
        grouped.with_column(Column::new(variable.as_str().into(), rounded))?;
    }

    Ok(grouped)
}

/// Overall coverage as a DataFrame for export
pub fn coverage_frame(entries: &[CoverageEntry]) -> Result<DataFrame> {
    let frame = DataFrame::new(vec![
        Column::new(
            "variable".into(),
            entries.iter().map(|e| e.variable.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "non_missing".into(),
            entries.iter().map(|e| e.non_missing as u64).collect::<Vec<_>>(),
        ),
        Column::new(
            "total".into(),
            entries.iter().map(|e| e.total as u64).collect::<Vec<_>>(),
        ),
        Column::new(
            "share".into(),
            entries.iter().map(|e| e.share).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(frame)
}
