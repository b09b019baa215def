//! Pearson correlation matrix over numeric survey columns

use anyhow::Result;
use faer::Mat;
use polars::prelude::*;
use rayon::prelude::*;

/// Symmetric correlation matrix with its column names
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    /// NaN where the correlation is undefined
    pub values: Mat<f64>,
}

/// Represents a correlated pair of variables
#[derive(Debug, Clone)]
pub struct CorrelatedPair {
    pub feature1: String,
    pub feature2: String,
    pub correlation: f64,
}

/// Numeric columns of the DataFrame, cast to Float64
fn numeric_columns(df: &DataFrame) -> Vec<(String, Vec<Option<f64>>)> {
    df.get_columns()
        .iter()
        .filter(|col| col.dtype().is_primitive_numeric())
        .filter_map(|col| {
            let cast = col.cast(&DataType::Float64).ok()?;
            let values: Vec<Option<f64>> = cast.f64().ok()?.into_iter().collect();
            Some((col.name().to_string(), values))
        })
        .collect()
}

/// Correlation matrix over all numeric columns using pairwise-complete observations
pub fn correlation_matrix(df: &DataFrame) -> Result<CorrelationMatrix> {
    let columns = numeric_columns(df);
    let n = columns.len();

    // Upper triangle including the diagonal
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (i..n).map(move |j| (i, j)))
        .collect();

    let results: Vec<(usize, usize, f64)> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let corr = pearson_pairwise(&columns[i].1, &columns[j].1).unwrap_or(f64::NAN);
            (i, j, corr)
        })
        .collect();

    let mut values = Mat::<f64>::zeros(n, n);
    for (i, j, corr) in results {
        values[(i, j)] = corr;
        values[(j, i)] = corr;
    }

    Ok(CorrelationMatrix {
        names: columns.into_iter().map(|(name, _)| name).collect(),
        values,
    })
}

/// Pearson correlation over rows where both values are present
///
/// Uses a single-pass Welford update for numerical stability. Returns `None`
/// with fewer than two complete pairs or when either side has zero variance.
pub fn pearson_pairwise(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }

    let mut n = 0.0;
    let mut mean_x = 0.0;
    let mut mean_y = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    let mut cov_xy = 0.0;

    for (a, b) in x.iter().zip(y.iter()) {
        let (Some(a), Some(b)) = (a, b) else {
            continue;
        };
        if a.is_nan() || b.is_nan() {
            continue;
        }
        n += 1.0;
        let dx = a - mean_x;
        let dy = b - mean_y;
        mean_x += dx / n;
        mean_y += dy / n;
        var_x += dx * (a - mean_x);
        var_y += dy * (b - mean_y);
        cov_xy += dx * (b - mean_y);
    }

    if n < 2.0 || var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }

    Some((cov_xy / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        let value = self.values[(i, j)];
        (!value.is_nan()).then_some(value)
    }

    /// Off-diagonal pairs with |r| above `threshold`, strongest first
    pub fn pairs_above(&self, threshold: f64) -> Vec<CorrelatedPair> {
        let n = self.names.len();
        let mut pairs = Vec::new();

        for i in 0..n {
            for j in (i + 1)..n {
                let corr = self.values[(i, j)];
                if corr.abs() > threshold && !corr.is_nan() {
                    pairs.push(CorrelatedPair {
                        feature1: self.names[i].clone(),
                        feature2: self.names[j].clone(),
                        correlation: corr,
                    });
                }
            }
        }

        pairs.sort_by(|a, b| {
            b.correlation
                .abs()
                .partial_cmp(&a.correlation.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        pairs
    }

    /// Matrix as a DataFrame: a `variable` column followed by one column per variable
    pub fn to_frame(&self) -> Result<DataFrame> {
        let n = self.names.len();
        let mut columns = Vec::with_capacity(n + 1);
        columns.push(Column::new("variable".into(), self.names.clone()));

        for (j, name) in self.names.iter().enumerate() {
            let values: Vec<Option<f64>> = (0..n)
                .map(|i| {
                    let v = self.values[(i, j)];
                    (!v.is_nan()).then_some(v)
                })
                .collect();
            columns.push(Column::new(name.as_str().into(), values));
        }

        Ok(DataFrame::new(columns)?)
    }
}
