//! Merging of yearly survey waves

use anyhow::{Context, Result};
use polars::prelude::*;

use super::loader::require_columns;

/// One yearly survey extract
#[derive(Debug, Clone)]
pub struct Wave {
    pub year: i64,
    pub data: DataFrame,
}

/// Select the allowlisted columns of each wave, tag rows with the wave year
/// and stack the waves in order.
pub fn merge_waves(waves: Vec<Wave>, columns: &[String], year_column: &str) -> Result<DataFrame> {
    if waves.is_empty() {
        anyhow::bail!("No survey waves to merge");
    }

    let mut tagged: Vec<DataFrame> = Vec::with_capacity(waves.len());
    for wave in waves {
        require_columns(&wave.data, columns, &format!("Wave {}", wave.year))?;

        let mut selected = wave
            .data
            .select(columns.iter().map(|c| c.as_str()))
            .with_context(|| format!("Failed to select columns for wave {}", wave.year))?;
        let height = selected.height();
        selected
            .with_column(Column::new(year_column.into(), vec![wave.year; height]))
            .with_context(|| format!("Failed to add year column for wave {}", wave.year))?;
        tagged.push(selected);
    }

    align_dtypes(&mut tagged)?;

    let mut iter = tagged.into_iter();
    let mut merged = iter.next().unwrap_or_else(DataFrame::empty);
    for frame in iter {
        merged.vstack_mut(&frame).context("Failed to stack survey waves")?;
    }

    Ok(merged)
}

/// Cast columns whose dtype differs between frames to a shared dtype:
/// Float64 when every variant is numeric (or all-null), String otherwise.
fn align_dtypes(frames: &mut [DataFrame]) -> Result<()> {
    let Some(first) = frames.first() else {
        return Ok(());
    };
    let names: Vec<String> = first
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    for name in &names {
        let dtypes: Vec<DataType> = frames
            .iter()
            .map(|df| df.column(name).map(|c| c.dtype().clone()))
            .collect::<PolarsResult<_>>()?;

        if dtypes.windows(2).all(|w| w[0] == w[1]) {
            continue;
        }

        let all_numeric = dtypes
            .iter()
            .all(|dt| dt.is_primitive_numeric() || dt == &DataType::Null);
        let target = if all_numeric {
            DataType::Float64
        } else {
            DataType::String
        };
        tracing::debug!(column = %name, ?target, "aligning column dtype across waves");

        for df in frames.iter_mut() {
            let cast = df.column(name)?.cast(&target)?;
            df.with_column(cast)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_tags_years_in_order() {
        let first = df! { "a" => [1i64, 2], "b" => ["x", "y"], "extra" => [0i64, 0] }.unwrap();
        let second = df! { "a" => [3i64], "b" => ["z"] }.unwrap();

        let merged = merge_waves(
            vec![
                Wave { year: 2017, data: first },
                Wave { year: 2021, data: second },
            ],
            &cols(&["a", "b"]),
            "Year",
        )
        .unwrap();

        assert_eq!(merged.shape(), (3, 3));
        let years: Vec<Option<i64>> = merged.column("Year").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(years, vec![Some(2017), Some(2017), Some(2021)]);
        assert!(merged.column("extra").is_err());
    }

    #[test]
    fn test_merge_widens_mismatched_numeric_columns() {
        let first = df! { "age" => [30i64, 40] }.unwrap();
        let second = df! { "age" => [Some(25.5f64), None] }.unwrap();

        let merged = merge_waves(
            vec![
                Wave { year: 2017, data: first },
                Wave { year: 2021, data: second },
            ],
            &cols(&["age"]),
            "Year",
        )
        .unwrap();

        assert_eq!(merged.column("age").unwrap().dtype(), &DataType::Float64);
        assert_eq!(merged.height(), 4);
    }

    #[test]
    fn test_merge_missing_column_is_error() {
        let first = df! { "a" => [1i64] }.unwrap();
        let second = df! { "b" => [1i64] }.unwrap();

        let err = merge_waves(
            vec![
                Wave { year: 2017, data: first },
                Wave { year: 2021, data: second },
            ],
            &cols(&["a"]),
            "Year",
        )
        .unwrap_err()
        .to_string();

        assert!(err.contains("Wave 2021"), "unexpected error: {}", err);
    }
}
