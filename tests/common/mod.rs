//! Shared test utilities and fixture generators

#![allow(dead_code)]

use findex::config::{RegressionConfig, StudyConfig};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// (economycode, economy, share of adults with a credit card)
pub const COUNTRIES: &[(&str, &str, f64)] = &[
    ("ARG", "Argentina", 0.40),
    ("BRA", "Brazil", 0.35),
    ("CHL", "Chile", 0.30),
    ("IND", "India", 0.25),
    ("KEN", "Kenya", 0.20),
    // Excluded by the default filter
    ("JAM", "Jamaica", 0.30),
    // Below the 10% credit card threshold
    ("NER", "Niger", 0.02),
];

/// Countries that survive both the exclusion list and the credit card threshold
pub const STUDY_COUNTRIES: &[&str] = &["ARG", "BRA", "CHL", "IND", "KEN"];

fn yes_no(rng: &mut StdRng, p_yes: f64) -> Option<i64> {
    let draw: f64 = rng.gen();
    if draw < 0.01 {
        Some(3)
    } else if rng.gen_bool(p_yes) {
        Some(1)
    } else {
        Some(2)
    }
}

/// A raw survey extract with every column the merge stage keeps.
///
/// Answers use the raw survey codes; `fin7` (credit card) drives `saved` and
/// `fin17a` so the focus odds ratio is above one.
pub fn create_raw_wave(seed: u64, rows_per_country: usize) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = COUNTRIES.len() * rows_per_country;

    let country_of = |row: usize| COUNTRIES[row / rows_per_country];
    let has_card: Vec<bool> = (0..n)
        .map(|row| rng.gen_bool(country_of(row).2))
        .collect();

    let columns = StudyConfig::default().merge.columns;
    let mut frame: Vec<Column> = Vec::with_capacity(columns.len());
    for name in &columns {
        let column = match name.as_str() {
            "economy" => Column::new(
                name.as_str().into(),
                (0..n).map(|r| country_of(r).1.to_string()).collect::<Vec<_>>(),
            ),
            "economycode" => Column::new(
                name.as_str().into(),
                (0..n).map(|r| country_of(r).0.to_string()).collect::<Vec<_>>(),
            ),
            "regionwb" => Column::new(name.as_str().into(), vec!["Region"; n]),
            "pop_adult" => Column::new(name.as_str().into(), vec![1.0e6f64; n]),
            "wpid_random" => Column::new(name.as_str().into(), (0..n as i64).collect::<Vec<_>>()),
            "wgt" => Column::new(
                name.as_str().into(),
                (0..n).map(|_| rng.gen_range(0.5..1.5)).collect::<Vec<f64>>(),
            ),
            "age" => Column::new(
                name.as_str().into(),
                (0..n).map(|_| rng.gen_range(15i64..80)).collect::<Vec<_>>(),
            ),
            "female" | "emp_in" => Column::new(
                name.as_str().into(),
                (0..n).map(|_| rng.gen_range(1i64..=2)).collect::<Vec<_>>(),
            ),
            "educ" => Column::new(
                name.as_str().into(),
                (0..n).map(|_| rng.gen_range(1i64..=3)).collect::<Vec<_>>(),
            ),
            "inc_q" => Column::new(
                name.as_str().into(),
                (0..n).map(|_| rng.gen_range(1i64..=5)).collect::<Vec<_>>(),
            ),
            "account_fin" | "account_mob" | "account" | "borrowed" => Column::new(
                name.as_str().into(),
                (0..n).map(|_| i64::from(rng.gen_bool(0.5))).collect::<Vec<_>>(),
            ),
            "saved" => Column::new(
                name.as_str().into(),
                has_card
                    .iter()
                    .map(|&card| i64::from(rng.gen_bool(if card { 0.6 } else { 0.35 })))
                    .collect::<Vec<_>>(),
            ),
            "receive_wages" | "receive_transfers" | "receive_pension" | "receive_agriculture"
            | "pay_utilities" => Column::new(
                name.as_str().into(),
                (0..n).map(|_| rng.gen_range(1i64..=5)).collect::<Vec<_>>(),
            ),
            "remittances" | "fin45" => Column::new(
                name.as_str().into(),
                (0..n).map(|_| rng.gen_range(1i64..=6)).collect::<Vec<_>>(),
            ),
            "fin14c" => Column::new(
                name.as_str().into(),
                (0..n).map(|_| rng.gen_range(1i64..=5)).collect::<Vec<_>>(),
            ),
            "fin24" => Column::new(
                name.as_str().into(),
                (0..n).map(|_| rng.gen_range(1i64..=9)).collect::<Vec<_>>(),
            ),
            "fin7" => Column::new(
                name.as_str().into(),
                has_card
                    .iter()
                    .map(|&card| Some(if card { 1i64 } else { 2 }))
                    .collect::<Vec<_>>(),
            ),
            "fin17a" => Column::new(
                name.as_str().into(),
                has_card
                    .iter()
                    .map(|&card| yes_no(&mut rng, if card { 0.5 } else { 0.25 }))
                    .collect::<Vec<_>>(),
            ),
            _ => Column::new(
                name.as_str().into(),
                (0..n).map(|_| yes_no(&mut rng, 0.5)).collect::<Vec<_>>(),
            ),
        };
        frame.push(column);
    }

    DataFrame::new(frame).unwrap()
}

/// A cleaned regression dataset: country, year, three outcomes and the
/// default explanatory variables, all 0/1 except `age`.
pub fn create_regression_dataframe(seed: u64, countries: &[&str], rows_per_country: usize) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let config = RegressionConfig::default();
    let n = countries.len() * rows_per_country;

    let economycode: Vec<String> = (0..n)
        .map(|r| countries[r / rows_per_country].to_string())
        .collect();
    let year: Vec<i64> = (0..n)
        .map(|r| if r % 2 == 0 { 2017 } else { 2021 })
        .collect();
    let card: Vec<i64> = (0..n).map(|_| i64::from(rng.gen_bool(0.3))).collect();

    let mut frame = vec![
        Column::new("economycode".into(), economycode),
        Column::new("year".into(), year),
    ];

    let mut outcome = |p_card: f64, p_other: f64| -> Vec<i64> {
        card.iter()
            .map(|&c| i64::from(rng.gen_bool(if c == 1 { p_card } else { p_other })))
            .collect()
    };
    let saved = outcome(0.65, 0.35);
    let saved_account = outcome(0.45, 0.20);
    let saved_retirement = outcome(0.30, 0.15);
    frame.push(Column::new("saved".into(), saved));
    frame.push(Column::new("saved_account".into(), saved_account));
    frame.push(Column::new("saved_retirement".into(), saved_retirement));

    for name in &config.explanatory_variables {
        let column = match name.as_str() {
            "has_credit_card" => Column::new(name.as_str().into(), card.clone()),
            "age" => Column::new(
                name.as_str().into(),
                (0..n).map(|_| rng.gen_range(15.0..80.0)).collect::<Vec<f64>>(),
            ),
            _ => Column::new(
                name.as_str().into(),
                (0..n).map(|_| i64::from(rng.gen_bool(0.5))).collect::<Vec<_>>(),
            ),
        };
        frame.push(column);
    }

    DataFrame::new(frame).unwrap()
}

/// Write `df` as CSV to `path`
pub fn write_csv(df: &mut DataFrame, path: &Path) {
    let mut file = std::fs::File::create(path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");
    write_csv(df, &csv_path);
    (temp_dir, csv_path)
}

/// Assert that DataFrame has expected columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for col in expected_cols {
        assert!(
            actual.iter().any(|c| c == col),
            "Expected column '{}' not found. Actual columns: {:?}",
            col,
            actual
        );
    }
}

/// Values of a column as `Option<f64>`
pub fn column_values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

/// A study configuration that never prompts
pub fn quiet_context() -> findex::cli::RunContext {
    findex::cli::RunContext::new(StudyConfig::default())
}

/// Replace `target` with a copy of `source`
pub fn copy_column(df: &mut DataFrame, source: &str, target: &str) {
    let values = df.column(source).unwrap().clone().with_name(target.into());
    df.with_column(values).unwrap();
}

/// Per-country models with the credit card as the only regressor and no
/// year control, so a country whose outcome equals the credit card is
/// perfectly separated
pub fn credit_card_only_config() -> RegressionConfig {
    RegressionConfig {
        explanatory_variables: vec!["has_credit_card".to_string()],
        fixed_effects: Vec::new(),
        year_variable: None,
        ..RegressionConfig::default()
    }
}
