//! Benchmark of the logit estimator on fixed-effect designs
//!
//! Run with: cargo bench --bench logit_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use polars::prelude::*;
use rand::prelude::*;
use rand::SeedableRng;

use findex::pipeline::logit::{fit_logit, CovarianceKind, FitOptions, ModelData, ModelSpec};

/// Binary regressors, a country fixed effect and an outcome driven by the first regressor
fn generate_survey(n_rows: usize, n_regressors: usize, n_countries: usize, seed: u64) -> (DataFrame, ModelSpec) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

    let countries: Vec<String> = (0..n_rows)
        .map(|i| format!("C{:03}", i % n_countries))
        .collect();
    let mut columns = vec![Column::new("country".into(), countries)];

    let mut first: Vec<f64> = Vec::new();
    let mut names = Vec::with_capacity(n_regressors);
    for j in 0..n_regressors {
        let values: Vec<f64> = (0..n_rows).map(|_| f64::from(u8::from(rng.gen_bool(0.4)))).collect();
        if j == 0 {
            first = values.clone();
        }
        let name = format!("x{}", j);
        columns.push(Column::new(name.as_str().into(), values));
        names.push(name);
    }

    let y: Vec<f64> = first
        .iter()
        .map(|x| f64::from(u8::from(rng.gen_bool(if *x > 0.0 { 0.6 } else { 0.35 }))))
        .collect();
    columns.push(Column::new("y".into(), y));

    let spec = ModelSpec {
        dependent: "y".to_string(),
        explanatory: names,
        fixed_effects: vec!["country".to_string()],
        cluster: Some("country".to_string()),
    };
    (DataFrame::new(columns).unwrap(), spec)
}

fn benchmark_fit_by_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("logit_by_rows");
    group.sample_size(20);

    for n_rows in [1_000, 10_000, 50_000] {
        let (df, spec) = generate_survey(n_rows, 17, 40, 42);
        let data = ModelData::build(&df, &spec).unwrap();
        let options = FitOptions {
            covariance: CovarianceKind::Cluster,
            ..FitOptions::default()
        };

        group.throughput(Throughput::Elements(n_rows as u64));
        group.bench_with_input(BenchmarkId::new("cluster", n_rows), &data, |b, data| {
            b.iter(|| fit_logit(black_box(data), black_box(&options)).unwrap())
        });
    }

    group.finish();
}

fn benchmark_design_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("design_matrix");
    group.sample_size(20);

    for n_countries in [10, 60, 120] {
        let (df, spec) = generate_survey(20_000, 17, n_countries, 7);
        group.bench_with_input(
            BenchmarkId::new("countries", n_countries),
            &(df, spec),
            |b, (df, spec)| b.iter(|| ModelData::build(black_box(df), black_box(spec)).unwrap()),
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_fit_by_rows, benchmark_design_build);
criterion_main!(benches);
