//! Descriptive statistics and country-level aggregates

use anyhow::Result;
use polars::prelude::*;

use super::filter::keep_countries;
use super::loader::column_keys;

/// Outcome of the credit card ownership threshold filter
#[derive(Debug, Clone)]
pub struct ThresholdFilter {
    pub data: DataFrame,
    pub kept_countries: Vec<String>,
    pub original_countries: usize,
}

impl ThresholdFilter {
    pub fn removed_countries(&self) -> usize {
        self.original_countries - self.kept_countries.len()
    }
}

/// Summary statistics of one column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub variable: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Per-country means of `variables`, sorted by country code
pub fn country_means(df: &DataFrame, country_column: &str, variables: &[String]) -> Result<DataFrame> {
    let exprs: Vec<Expr> = variables
        .iter()
        .map(|v| col(v.as_str()).cast(DataType::Float64).mean().alias(v.as_str()))
        .collect();

    let means = df
        .clone()
        .lazy()
        .filter(col(country_column).is_not_null())
        .group_by([col(country_column)])
        .agg(exprs)
        .sort([country_column], SortMultipleOptions::default())
        .collect()?;

    Ok(means)
}

/// Keep countries whose mean of `variable` is at least `threshold`
pub fn filter_by_country_mean(
    df: &DataFrame,
    country_column: &str,
    variable: &str,
    threshold: f64,
) -> Result<ThresholdFilter> {
    let means = country_means(df, country_column, &[variable.to_string()])?;
    let countries = column_keys(&means, country_column)?;
    let values: Vec<Option<f64>> = means.column(variable)?.f64()?.into_iter().collect();

    let kept_countries: Vec<String> = countries
        .into_iter()
        .zip(values)
        .filter_map(|(country, mean)| match (country, mean) {
            (Some(c), Some(m)) if m >= threshold => Some(c),
            _ => None,
        })
        .collect();

    let data = keep_countries(df, country_column, &kept_countries)?;

    Ok(ThresholdFilter {
        data,
        kept_countries,
        original_countries: means.height(),
    })
}

/// Count, mean, sample standard deviation, min and max of every column.
/// Non-numeric columns only get a count.
pub fn describe_columns(df: &DataFrame) -> Result<Vec<ColumnStats>> {
    let mut stats = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        let count = column.len() - column.null_count();
        let variable = column.name().to_string();

        if !column.dtype().is_primitive_numeric() {
            stats.push(ColumnStats {
                variable,
                count,
                mean: None,
                std: None,
                min: None,
                max: None,
            });
            continue;
        }

        let cast = column.cast(&DataType::Float64)?;
        let values: Vec<f64> = cast
            .f64()?
            .into_iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .collect();
        stats.push(summarize(variable, count, &values));
    }

    Ok(stats)
}

fn summarize(variable: String, count: usize, values: &[f64]) -> ColumnStats {
    let n = values.len();
    if n == 0 {
        return ColumnStats {
            variable,
            count,
            mean: None,
            std: None,
            min: None,
            max: None,
        };
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let std = if n > 1 {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        Some((ss / (n - 1) as f64).sqrt())
    } else {
        None
    };
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    ColumnStats {
        variable,
        count,
        mean: Some(mean),
        std,
        min: Some(min),
        max: Some(max),
    }
}

/// Descriptive statistics as a DataFrame for export
pub fn stats_frame(stats: &[ColumnStats]) -> Result<DataFrame> {
    let frame = DataFrame::new(vec![
        Column::new(
            "variable".into(),
            stats.iter().map(|s| s.variable.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "count".into(),
            stats.iter().map(|s| s.count as u64).collect::<Vec<_>>(),
        ),
        Column::new("mean".into(), stats.iter().map(|s| s.mean).collect::<Vec<_>>()),
        Column::new("std".into(), stats.iter().map(|s| s.std).collect::<Vec<_>>()),
        Column::new("min".into(), stats.iter().map(|s| s.min).collect::<Vec<_>>()),
        Column::new("max".into(), stats.iter().map(|s| s.max).collect::<Vec<_>>()),
    ])?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_sample_std() {
        let stats = summarize("x".to_string(), 4, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stats.mean, Some(2.5));
        let std = stats.std.unwrap();
        assert!((std - 1.2909944487).abs() < 1e-9);
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(4.0));
    }

    #[test]
    fn test_summarize_single_value_has_no_std() {
        let stats = summarize("x".to_string(), 1, &[7.0]);
        assert_eq!(stats.mean, Some(7.0));
        assert!(stats.std.is_none());
    }

    #[test]
    fn test_summarize_empty() {
        let stats = summarize("x".to_string(), 0, &[]);
        assert!(stats.mean.is_none());
        assert!(stats.min.is_none());
    }
}
