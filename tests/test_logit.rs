//! Integration tests for the logit estimator

use findex::pipeline::logit::*;
use polars::prelude::*;

fn spec(dependent: &str, explanatory: &[&str], fixed_effects: &[&str], cluster: Option<&str>) -> ModelSpec {
    ModelSpec {
        dependent: dependent.to_string(),
        explanatory: explanatory.iter().map(|s| s.to_string()).collect(),
        fixed_effects: fixed_effects.iter().map(|s| s.to_string()).collect(),
        cluster: cluster.map(|s| s.to_string()),
    }
}

/// 2x2 table with 6/2 successes when x = 1 and 2/6 when x = 0
fn two_by_two() -> DataFrame {
    let x: Vec<i64> = [vec![1; 8], vec![0; 8]].concat();
    let y: Vec<i64> = [vec![1; 6], vec![0; 2], vec![1; 2], vec![0; 6]].concat();
    df! { "y" => y, "x" => x }.unwrap()
}

#[test]
fn test_odds_ratio_of_two_by_two_table() {
    let data = ModelData::build(&two_by_two(), &spec("y", &["x"], &[], None)).unwrap();
    let fit = fit_logit(&data, &FitOptions::default()).unwrap();

    assert!(fit.converged);
    let coef = fit.coefficient("x").unwrap();
    assert!((coef.odds_ratio() - 9.0).abs() < 1e-6, "OR = {}", coef.odds_ratio());
    assert!((coef.std_error - (4.0f64 / 3.0).sqrt()).abs() < 1e-6);

    let z = 9.0f64.ln() / (4.0f64 / 3.0).sqrt();
    assert!((coef.z - z).abs() < 1e-6);
    assert!((coef.p_value - two_sided_p_value(z)).abs() < 1e-9);

    let (lower, upper) = coef.odds_ratio_ci();
    let half_width = Z_CRITICAL_95 * (4.0f64 / 3.0).sqrt();
    assert!((lower - (9.0f64.ln() - half_width).exp()).abs() < 1e-6);
    assert!((upper - (9.0f64.ln() + half_width).exp()).abs() < 1e-6);
}

#[test]
fn test_intercept_only_cluster_covariance() {
    let df = df! {
        "y" => [1i64, 1, 1, 0],
        "id" => ["a", "b", "c", "d"],
    }
    .unwrap();
    let data = ModelData::build(&df, &spec("y", &[], &[], Some("id"))).unwrap();
    assert_eq!(data.n_clusters, 4);

    let nonrobust = fit_logit(&data, &FitOptions::default()).unwrap();
    assert!((nonrobust.params[0] - 3.0f64.ln()).abs() < 1e-8);
    assert!((nonrobust.std_errors[0].powi(2) - 4.0 / 3.0).abs() < 1e-8);

    let options = FitOptions {
        covariance: CovarianceKind::Cluster,
        ..FitOptions::default()
    };
    let clustered = fit_logit(&data, &options).unwrap();
    assert_eq!(clustered.n_clusters, Some(4));
    // Singleton clusters: sandwich equals 4/3, small-sample factor G/(G-1) = 4/3
    assert!((clustered.std_errors[0].powi(2) - 16.0 / 9.0).abs() < 1e-8);
}

#[test]
fn test_pseudo_r2_of_intercept_only_model_is_zero() {
    let df = df! { "y" => [1i64, 0, 1, 0, 1] }.unwrap();
    let data = ModelData::build(&df, &spec("y", &[], &[], None)).unwrap();
    let fit = fit_logit(&data, &FitOptions::default()).unwrap();

    assert!((fit.log_likelihood - fit.null_log_likelihood).abs() < 1e-10);
    assert!(fit.pseudo_r2().abs() < 1e-10);
}

#[test]
fn test_fixed_effects_become_treatment_dummies() {
    let df = df! {
        "y" => [1i64, 0, 1, 0, 1, 0],
        "x" => [0.5f64, 1.5, 2.0, 0.1, 0.7, 1.1],
        "country" => ["KEN", "ARG", "BRA", "KEN", "ARG", "BRA"],
        "year" => [2021i64, 2017, 2021, 2017, 2021, 2017],
    }
    .unwrap();

    let data = ModelData::build(&df, &spec("y", &["x"], &["country", "year"], None)).unwrap();

    assert_eq!(
        data.names,
        vec![
            INTERCEPT.to_string(),
            "x".to_string(),
            dummy_name("country", "BRA"),
            dummy_name("country", "KEN"),
            dummy_name("year", "2021"),
        ]
    );
    assert_eq!(data.levels("year").unwrap(), &["2017".to_string(), "2021".to_string()]);
    assert_eq!(data.n_params(), 5);
}

#[test]
fn test_listwise_deletion_and_constant_columns() {
    let df = df! {
        "y" => [Some(1i64), Some(0), None, Some(1), Some(0)],
        "x" => [Some(1.0f64), None, Some(2.0), Some(3.0), Some(0.5)],
        "flat" => [Some(1.0f64), Some(1.0), Some(1.0), Some(1.0), Some(1.0)],
    }
    .unwrap();

    let data = ModelData::build(&df, &spec("y", &["x", "flat"], &[], None)).unwrap();

    assert_eq!(data.n_obs(), 3);
    assert_eq!(data.kept_explanatory, vec!["x".to_string()]);
    assert_eq!(data.dropped_explanatory, vec!["flat".to_string()]);
}

#[test]
fn test_non_binary_outcome_is_rejected() {
    let df = df! { "y" => [0i64, 1, 2], "x" => [1.0f64, 2.0, 3.0] }.unwrap();
    assert!(ModelData::build(&df, &spec("y", &["x"], &[], None)).is_err());
}

#[test]
fn test_separated_data_fails() {
    let df = df! {
        "y" => [0i64, 0, 0, 1, 1, 1],
        "x" => [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0],
    }
    .unwrap();
    let data = ModelData::build(&df, &spec("y", &["x"], &[], None)).unwrap();

    let result = fit_logit(&data, &FitOptions::default());
    assert!(result.is_err(), "Perfectly separated data must not produce a fit");
}

#[test]
fn test_binary_predictor_separation_is_reported() {
    let df = df! {
        "y" => [0i64, 0, 0, 1, 1, 1],
        "x" => [0i64, 0, 0, 1, 1, 1],
    }
    .unwrap();
    let data = ModelData::build(&df, &spec("y", &["x"], &[], None)).unwrap();

    assert_eq!(
        fit_logit(&data, &FitOptions::default()).unwrap_err(),
        FitError::PerfectSeparation
    );
}

#[test]
fn test_constant_outcome_fails() {
    let df = df! { "y" => [1i64, 1, 1], "x" => [1.0f64, 2.0, 3.0] }.unwrap();
    let data = ModelData::build(&df, &spec("y", &["x"], &[], None)).unwrap();

    assert!(!data.outcome_varies());
    assert_eq!(
        fit_logit(&data, &FitOptions::default()).unwrap_err(),
        FitError::NoOutcomeVariation
    );
}
