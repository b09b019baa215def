//! Integration tests for the pooled and per-country regressions

use findex::config::RegressionConfig;
use findex::pipeline::column_keys;
use findex::pipeline::regression::*;
use polars::prelude::*;

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_pooled_models_find_credit_card_effect() {
    let df = create_regression_dataframe(7, STUDY_COUNTRIES, 200);
    let config = RegressionConfig::default();

    let outcomes = run_pooled_regressions(&df, &config).unwrap();
    assert_eq!(outcomes.len(), 3);

    for outcome in &outcomes {
        let PooledOutcome::Fitted(model) = outcome else {
            panic!("expected a fitted model, got {:?}", outcome);
        };
        assert_eq!(model.fit.n_obs, df.height());
        assert_eq!(model.fit.n_clusters, Some(STUDY_COUNTRIES.len()));
        assert!(model.missing_explanatory(&config.explanatory_variables).is_empty());

        let card = model.fit.coefficient("has_credit_card").unwrap();
        assert!(
            card.odds_ratio() > 1.0,
            "{}: credit card OR = {}",
            model.dependent,
            card.odds_ratio()
        );
    }
}

#[test]
fn test_combined_table_layout() {
    let df = create_regression_dataframe(11, STUDY_COUNTRIES, 150);
    let config = RegressionConfig::default();

    let tables: Vec<ModelTable> = run_pooled_regressions(&df, &config)
        .unwrap()
        .iter()
        .filter_map(|o| match o {
            PooledOutcome::Fitted(model) => Some(model_table(model, &config.explanatory_variables)),
            PooledOutcome::Skipped { .. } => None,
        })
        .collect();
    let combined = combined_table(&tables).unwrap();

    // Variable column plus OR, lower and upper per model
    assert_eq!(combined.width(), 1 + 3 * 3);
    assert_eq!(
        combined.height(),
        config.explanatory_variables.len() + 7
    );
    assert_has_columns(
        &combined,
        &["Variable", "saved: Odds Ratio (OR)", "saved_retirement: OR CI 95% Upper"],
    );

    let labels = column_keys(&combined, "Variable").unwrap();
    assert_eq!(labels[0].as_deref(), Some("has_credit_card"));
    assert_eq!(labels.last().unwrap().as_deref(), Some("Adj. Pseudo R2"));
}

#[test]
fn test_missing_dependent_is_an_error() {
    let df = create_regression_dataframe(3, &["ARG", "BRA"], 50)
        .drop("saved_account")
        .unwrap();
    let result = run_pooled_regressions(&df, &RegressionConfig::default());
    assert!(result.is_err());
}

#[test]
fn test_country_models_estimate_every_country() {
    let df = create_regression_dataframe(5, STUDY_COUNTRIES, 250);
    let config = RegressionConfig::default();

    let regressions = run_country_regressions(&df, "economycode", "has_credit_card", &config).unwrap();

    let countries: Vec<&str> = regressions.results.iter().map(|r| r.country.as_str()).collect();
    assert_eq!(countries, STUDY_COUNTRIES.to_vec());
    assert_eq!(regressions.estimated_count("saved").unwrap(), STUDY_COUNTRIES.len());

    for result in &regressions.results {
        let (lower, odds_ratio, upper) = result.cells[0].estimate().unwrap();
        assert!(lower < odds_ratio && odds_ratio < upper);
    }

    let table = regressions.table("saved").unwrap();
    assert_has_columns(&table, &["Country", "Lower 95", "OR", "Higher 95"]);
    assert_eq!(table.height(), STUDY_COUNTRIES.len());
}

#[test]
fn test_country_status_reasons() {
    let config = RegressionConfig::default();
    let small = create_regression_dataframe(1, &["BHR"], 10);
    let mut flat = create_regression_dataframe(2, &["KEN"], 120);
    flat.with_column(Column::new("saved".into(), vec![0i64; 120]))
        .unwrap();
    let full = create_regression_dataframe(3, &["ARG"], 200);

    let mut df = full;
    df.vstack_mut(&small).unwrap();
    df.vstack_mut(&flat).unwrap();

    let regressions = run_country_regressions(&df, "economycode", "has_credit_card", &config).unwrap();
    let cell = |country: &str| -> CellOutcome {
        regressions
            .results
            .iter()
            .find(|r| r.country == country)
            .unwrap()
            .cells[0]
            .clone()
    };

    assert!(matches!(cell("ARG"), CellOutcome::Estimated { .. }));
    assert_eq!(
        cell("BHR"),
        CellOutcome::InsufficientN {
            n_obs: 10,
            required: min_observations(config.explanatory_variables.len(), true, 5),
        }
    );
    assert_eq!(cell("KEN"), CellOutcome::NoDvVariation);

    let counts = regressions.status_counts("saved").unwrap();
    assert_eq!(counts.get("Estimated"), Some(&1));
    assert_eq!(counts.get("Insufficient N"), Some(&1));
    assert_eq!(counts.get("No DV Variation"), Some(&1));

    let table = regressions.table("saved").unwrap();
    let or_values = column_keys(&table, "OR").unwrap();
    assert_eq!(or_values.iter().filter(|v| v.as_deref() == Some("NA")).count(), 2);
}

#[test]
fn test_focus_outside_model_is_reported() {
    let df = create_regression_dataframe(9, &["ARG"], 200);
    let config = RegressionConfig::default();

    let regressions = run_country_regressions(&df, "economycode", "not_a_regressor", &config).unwrap();
    assert_eq!(regressions.results[0].cells[0], CellOutcome::NotEstimatedMissing);
}

#[test]
fn test_constant_focus_is_reported_dropped() {
    let config = RegressionConfig::default();
    let mut df = create_regression_dataframe(12, &["ARG"], 200);
    let mut no_cards = create_regression_dataframe(13, &["BRA"], 200);
    no_cards
        .with_column(Column::new("has_credit_card".into(), vec![0i64; 200]))
        .unwrap();
    df.vstack_mut(&no_cards).unwrap();

    let regressions = run_country_regressions(&df, "economycode", "has_credit_card", &config).unwrap();

    assert!(matches!(regressions.results[0].cells[0], CellOutcome::Estimated { .. }));
    assert_eq!(regressions.results[1].cells[0], CellOutcome::NotEstimatedDropped);
    assert_eq!(regressions.results[1].cells[0].label(), "Not Estimated (Dropped)");

    let counts = regressions.status_counts("saved").unwrap();
    assert_eq!(counts.get("Not Estimated (Dropped)"), Some(&1));
}

#[test]
fn test_separated_country_is_a_fit_error() {
    let config = credit_card_only_config();
    let mut df = create_regression_dataframe(14, &["ARG"], 200);
    let mut separated = create_regression_dataframe(15, &["CHL"], 200);
    copy_column(&mut separated, "has_credit_card", "saved");
    df.vstack_mut(&separated).unwrap();

    let regressions = run_country_regressions(&df, "economycode", "has_credit_card", &config).unwrap();

    assert!(matches!(regressions.results[0].cells[0], CellOutcome::Estimated { .. }));
    let cell = &regressions.results[1].cells[0];
    match cell {
        CellOutcome::FitError { message } => {
            assert!(message.contains("separation"), "unexpected message: {}", message)
        }
        other => panic!("expected a fit error, got {:?}", other),
    }
    assert_eq!(cell.label(), "Fit/CI Error");
    // The other outcomes of the separated country are unaffected
    assert!(matches!(regressions.results[1].cells[1], CellOutcome::Estimated { .. }));

    let table = regressions.table("saved").unwrap();
    let or_values = column_keys(&table, "OR").unwrap();
    assert_eq!(or_values[1].as_deref(), Some("NA"));
}

#[test]
fn test_pooled_models_all_separated_are_skipped() {
    let config = credit_card_only_config();
    let mut df = create_regression_dataframe(16, STUDY_COUNTRIES, 80);
    for dependent in &config.dependent_variables {
        copy_column(&mut df, "has_credit_card", dependent);
    }

    let outcomes = run_pooled_regressions(&df, &config).unwrap();
    assert_eq!(outcomes.len(), 3);
    for outcome in &outcomes {
        match outcome {
            PooledOutcome::Skipped { reason, .. } => assert!(reason.contains("separation")),
            PooledOutcome::Fitted(model) => panic!("{} should not fit", model.dependent),
        }
    }
}
