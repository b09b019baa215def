//! Stage commands: load the input, run one pipeline stage, write its outputs

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use console::style;
use polars::prelude::*;

use super::prompts::confirm_overwrite;
use crate::config::StudyConfig;
use crate::pipeline::correlation::correlation_matrix;
use crate::pipeline::coverage::{analyze_coverage, coverage_by_group, coverage_frame, split_present};
use crate::pipeline::describe::{country_means, describe_columns, filter_by_country_mean, stats_frame};
use crate::pipeline::filter::{exclude_countries, rename_and_select};
use crate::pipeline::loader::{load_dataset, save_dataset};
use crate::pipeline::merge::{merge_waves, Wave};
use crate::pipeline::recode::apply_recoding;
use crate::pipeline::regression::{
    combined_table, model_table, run_country_regressions, run_pooled_regressions, PooledOutcome,
};
use crate::plot::{load_forest_table, render_forest, render_scatter, scatter_points};
use crate::report::{
    export_status_report, package_reports, print_country_status, print_coverage, print_frame,
    print_model_table, PipelineSummary, StageRecord, StatusReport,
};
use crate::utils::{
    create_spinner, finish_with_success, finish_with_warning, print_banner, print_completion,
    print_config, print_count, print_info, print_list, print_step_header, print_step_time,
    print_success, print_warning,
};

pub const MERGED_FILE: &str = "data_2017_2021.csv";
pub const RECODED_FILE: &str = "data_recoded.csv";
pub const CLEANED_FILE: &str = "data_cleaned.csv";
pub const REGRESSION_DATA_FILE: &str = "data_for_regressions.csv";
pub const COVERAGE_OVERALL_FILE: &str = "coverage_overall.csv";
pub const COVERAGE_BY_COUNTRY_FILE: &str = "coverage_by_country.csv";
pub const DESCRIPTIVE_FILE: &str = "descriptive_overall.csv";
pub const CORRELATION_FILE: &str = "correlation_matrix_overall.csv";
pub const COUNTRY_MEANS_FILE: &str = "country_means.csv";
pub const POOLED_TABLE_FILE: &str = "regression_table_full_data.csv";
pub const STATUS_REPORT_FILE: &str = "regression_status.json";
pub const BUNDLE_FILE: &str = "findex_reports.zip";

/// Correlations above this magnitude are listed after `describe`
const STRONG_CORRELATION: f64 = 0.5;

pub fn per_country_file(dependent: &str) -> String {
    format!("regression_results_per_country_{}.csv", dependent)
}

/// Scatter plot of `dependent` against the focus variable, named without a
/// leading `has_`
pub fn scatter_file(dependent: &str, focus: &str) -> String {
    let focus = focus.strip_prefix("has_").unwrap_or(focus);
    format!("scatter_{}_vs_{}.png", dependent, focus)
}

pub fn forest_file(dependent: &str) -> String {
    format!("forest_plot_{}.png", dependent)
}

/// Settings shared by every stage command
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: StudyConfig,
    pub no_confirm: bool,
    pub infer_schema_length: usize,
}

impl RunContext {
    pub fn new(config: StudyConfig) -> Self {
        Self {
            config,
            no_confirm: true,
            infer_schema_length: 0,
        }
    }

    fn load(&self, path: &Path) -> Result<DataFrame> {
        let spinner = create_spinner(&format!("Loading {}", path.display()));
        match load_dataset(path, self.infer_schema_length) {
            Ok(df) => {
                finish_with_success(
                    &spinner,
                    &format!("Loaded {} rows × {} columns", df.height(), df.width()),
                );
                Ok(df)
            }
            Err(e) => {
                spinner.finish_and_clear();
                Err(e)
            }
        }
    }

    /// Write a dataset unless the user keeps the existing file
    fn save(&self, df: &mut DataFrame, path: &Path) -> Result<()> {
        if !confirm_overwrite(path, self.no_confirm)? {
            print_warning(&format!("Kept existing {}", path.display()));
            return Ok(());
        }
        save_dataset(df, path)?;
        print_success(&format!("Saved {}", path.display()));
        Ok(())
    }
}

fn finish_stage(
    name: &str,
    rows: Option<usize>,
    outputs: Vec<PathBuf>,
    warnings: Vec<String>,
    start: Instant,
) -> StageRecord {
    let elapsed = start.elapsed();
    print_step_time(elapsed);
    StageRecord {
        name: name.to_string(),
        rows,
        outputs,
        elapsed,
        warnings,
    }
}

/// Stage 1: stack the two waves with a year column
pub fn run_merge(ctx: &RunContext, first: &Path, second: &Path, output: &Path) -> Result<StageRecord> {
    print_step_header(1, "Merge Survey Waves");
    let start = Instant::now();
    let merge = &ctx.config.merge;

    let (first_year, second_year) = match merge.wave_years.as_slice() {
        [a, b] => (*a, *b),
        other => anyhow::bail!("Exactly two wave years are required, got {}", other.len()),
    };

    let waves = vec![
        Wave {
            year: first_year,
            data: ctx.load(first)?,
        },
        Wave {
            year: second_year,
            data: ctx.load(second)?,
        },
    ];
    let mut merged = merge_waves(waves, &merge.columns, &merge.year_column)?;
    print_info(&format!(
        "Merged dataset: {} rows × {} columns",
        merged.height(),
        merged.width()
    ));

    ctx.save(&mut merged, output)?;
    Ok(finish_stage(
        "Merge",
        Some(merged.height()),
        vec![output.to_path_buf()],
        Vec::new(),
        start,
    ))
}

/// Stage 2: recode raw answers and derive dummies
pub fn run_recode(ctx: &RunContext, input: &Path, output: &Path) -> Result<StageRecord> {
    print_step_header(2, "Recode Survey Answers");
    let start = Instant::now();
    let recode = &ctx.config.recode;

    let df = ctx.load(input)?;
    let (mut recoded, summary) = apply_recoding(df, &recode.rules, &recode.splits)?;

    print_count("columns recoded", summary.recoded.len(), None);
    print_count("dummy columns derived", summary.derived.len(), None);
    print_list("Not found, left as is", &summary.skipped);
    let warnings = summary
        .skipped
        .iter()
        .map(|c| format!("Column '{}' not found, not recoded", c))
        .collect();

    ctx.save(&mut recoded, output)?;
    Ok(finish_stage(
        "Recode",
        Some(recoded.height()),
        vec![output.to_path_buf()],
        warnings,
        start,
    ))
}

/// Stage 3: non-missing coverage overall and per economy
pub fn run_coverage(ctx: &RunContext, input: &Path, output_dir: &Path) -> Result<StageRecord> {
    print_step_header(3, "Coverage of Survey Variables");
    let start = Instant::now();
    let coverage = &ctx.config.coverage;

    let df = ctx.load(input)?;
    let (present, absent) = split_present(&df, &coverage.variables);
    let mut warnings: Vec<String> = absent
        .iter()
        .map(|v| format!("Coverage variable '{}' not found", v))
        .collect();
    for warning in &warnings {
        print_warning(warning);
    }

    let entries = analyze_coverage(&df, &present)?;
    print_coverage(&entries);

    let mut outputs = Vec::new();
    let overall_path = output_dir.join(COVERAGE_OVERALL_FILE);
    ctx.save(&mut coverage_frame(&entries)?, &overall_path)?;
    outputs.push(overall_path);

    if df.column(&coverage.group_column).is_ok() {
        let mut by_group = coverage_by_group(&df, &coverage.group_column, &present)?;
        print_info(&format!(
            "Coverage computed for {} groups of '{}'",
            by_group.height(),
            coverage.group_column
        ));
        let by_group_path = output_dir.join(COVERAGE_BY_COUNTRY_FILE);
        ctx.save(&mut by_group, &by_group_path)?;
        outputs.push(by_group_path);
    } else {
        let warning = format!("Group column '{}' not found", coverage.group_column);
        print_warning(&warning);
        warnings.push(warning);
    }

    Ok(finish_stage("Coverage", Some(df.height()), outputs, warnings, start))
}

/// Stage 4: rename, select and drop excluded countries
pub fn run_filter(ctx: &RunContext, input: &Path, output: &Path) -> Result<StageRecord> {
    print_step_header(4, "Select Variables and Countries");
    let start = Instant::now();
    let filter = &ctx.config.filter;
    let country = &ctx.config.country_column;

    let df = ctx.load(input)?;
    let selected = rename_and_select(df, &filter.renames, country)?;
    let (mut filtered, stats) = exclude_countries(&selected, country, &filter.excluded_countries)?;

    print_info(&format!("Original rows: {}", stats.original_rows));
    print_info(&format!("Rows after excluding countries: {}", stats.filtered_rows));
    print_count(
        "rows removed",
        stats.removed_rows(),
        Some(format!("({:.2}%)", stats.removed_pct()).as_str()),
    );

    ctx.save(&mut filtered, output)?;
    Ok(finish_stage(
        "Filter",
        Some(filtered.height()),
        vec![output.to_path_buf()],
        Vec::new(),
        start,
    ))
}

/// Stage 5: credit card threshold, descriptive statistics, correlations, country means
pub fn run_describe(ctx: &RunContext, input: &Path, output_dir: &Path, plots: bool) -> Result<StageRecord> {
    print_step_header(5, "Descriptive Statistics");
    let start = Instant::now();
    let country = &ctx.config.country_column;
    let focus = &ctx.config.focus_variable;
    let threshold = ctx.config.describe.credit_card_threshold;

    let df = ctx.load(input)?;
    let filtered = filter_by_country_mean(&df, country, focus, threshold)?;
    print_info(&format!("Countries before filter: {}", filtered.original_countries));
    print_info(&format!(
        "Countries with mean '{}' >= {:.2}: {}",
        focus,
        threshold,
        filtered.kept_countries.len()
    ));
    print_count("countries removed", filtered.removed_countries(), None);

    let mut outputs = Vec::new();
    let mut warnings = Vec::new();
    let mut data = filtered.data;
    let data_path = output_dir.join(REGRESSION_DATA_FILE);
    ctx.save(&mut data, &data_path)?;
    outputs.push(data_path);

    let mut stats = stats_frame(&describe_columns(&data)?)?;
    print_frame(&stats, 40);
    let stats_path = output_dir.join(DESCRIPTIVE_FILE);
    ctx.save(&mut stats, &stats_path)?;
    outputs.push(stats_path);

    let correlations = correlation_matrix(&data)?;
    let strong = correlations.pairs_above(STRONG_CORRELATION);
    print_count(
        "variable pairs",
        strong.len(),
        Some(format!("with |r| > {}", STRONG_CORRELATION).as_str()),
    );
    for pair in strong.iter().take(10) {
        println!(
            "        {} {} ↔ {}: {:.3}",
            style("•").dim(),
            pair.feature1,
            pair.feature2,
            pair.correlation
        );
    }
    let corr_path = output_dir.join(CORRELATION_FILE);
    ctx.save(&mut correlations.to_frame()?, &corr_path)?;
    outputs.push(corr_path);

    let (mean_vars, absent) = split_present(&data, &ctx.config.country_mean_variables());
    for variable in absent {
        let warning = format!("Variable '{}' not found, no country mean", variable);
        print_warning(&warning);
        warnings.push(warning);
    }
    let mut means = country_means(&data, country, &mean_vars)?;
    let means_path = output_dir.join(COUNTRY_MEANS_FILE);
    ctx.save(&mut means, &means_path)?;
    outputs.push(means_path);

    if plots {
        for dependent in mean_vars.iter().filter(|v| *v != focus) {
            let path = output_dir.join(scatter_file(dependent, focus));
            let rendered = scatter_points(&means, country, focus, dependent)
                .and_then(|points| render_scatter(&points, focus, dependent, &path));
            match rendered {
                Ok(()) => {
                    print_success(&format!("Saved {}", path.display()));
                    outputs.push(path);
                }
                Err(e) => {
                    let warning = format!("Scatter plot for '{}' failed: {}", dependent, e);
                    print_warning(&warning);
                    warnings.push(warning);
                }
            }
        }
    }

    Ok(finish_stage("Describe", Some(data.height()), outputs, warnings, start))
}

/// Stage 6: pooled models with country and year fixed effects
pub fn run_regress(ctx: &RunContext, input: &Path, output: &Path) -> Result<StageRecord> {
    print_step_header(6, "Pooled Logit Regressions");
    let start = Instant::now();
    let regression = &ctx.config.regression;

    let df = ctx.load(input)?;
    let spinner = create_spinner("Fitting pooled models...");
    let outcomes = match run_pooled_regressions(&df, regression) {
        Ok(outcomes) => outcomes,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, PooledOutcome::Skipped { .. }))
        .count();
    if skipped == 0 {
        finish_with_success(&spinner, &format!("Fitted {} models", outcomes.len()));
    } else {
        finish_with_warning(
            &spinner,
            &format!("{} of {} models skipped", skipped, outcomes.len()),
        );
    }

    let mut tables = Vec::new();
    let mut warnings = Vec::new();
    for outcome in &outcomes {
        match outcome {
            PooledOutcome::Fitted(model) => {
                println!();
                print_info(&format!(
                    "Dependent variable: {}",
                    style(&model.dependent).bold()
                ));
                if !model.fit.converged {
                    let warning = format!(
                        "Model for '{}' did not converge after {} iterations",
                        model.dependent, model.fit.iterations
                    );
                    print_warning(&warning);
                    warnings.push(warning);
                }
                let missing = model.missing_explanatory(&regression.explanatory_variables);
                if !missing.is_empty() {
                    print_list("Not estimated", &missing);
                    warnings.push(format!(
                        "Model for '{}' did not estimate: {}",
                        model.dependent,
                        missing.join(", ")
                    ));
                }
                let table = model_table(model, &regression.explanatory_variables);
                print_model_table(&table);
                tables.push(table);
            }
            PooledOutcome::Skipped { dependent, reason } => {
                let warning = format!("Model for '{}' skipped: {}", dependent, reason);
                print_warning(&warning);
                warnings.push(warning);
            }
        }
    }

    if tables.is_empty() {
        print_warning("No model could be fitted; no regression table written");
        return Ok(finish_stage("Regress", Some(df.height()), Vec::new(), warnings, start));
    }

    let mut combined = combined_table(&tables)?;
    ctx.save(&mut combined, output)?;
    Ok(finish_stage(
        "Regress",
        Some(df.height()),
        vec![output.to_path_buf()],
        warnings,
        start,
    ))
}

/// Stage 7: one model per country and dependent variable
pub fn run_regress_country(ctx: &RunContext, input: &Path, output_dir: &Path) -> Result<StageRecord> {
    print_step_header(7, "Per-Country Logit Regressions");
    let start = Instant::now();
    let regression = &ctx.config.regression;

    let df = ctx.load(input)?;
    let regressions = run_country_regressions(
        &df,
        &ctx.config.country_column,
        &ctx.config.focus_variable,
        regression,
    )?;
    println!();
    print_country_status(&regressions);

    let mut outputs = Vec::new();
    let mut warnings = Vec::new();
    for dependent in &regressions.dependents {
        let estimated = regressions.estimated_count(dependent)?;
        print_count(
            &format!("countries with an odds ratio for '{}'", dependent),
            estimated,
            Some(format!("of {}", regressions.results.len()).as_str()),
        );
        if estimated == 0 {
            warnings.push(format!("No country estimate for '{}'", dependent));
        }
        let mut table = regressions.table(dependent)?;
        let path = output_dir.join(per_country_file(dependent));
        ctx.save(&mut table, &path)?;
        outputs.push(path);
    }

    let report = StatusReport::build(&regressions, input, regression)?;
    let status_path = output_dir.join(STATUS_REPORT_FILE);
    if confirm_overwrite(&status_path, ctx.no_confirm)? {
        export_status_report(&report, &status_path)?;
        print_success(&format!("Saved {}", status_path.display()));
    }
    outputs.push(status_path);

    Ok(finish_stage(
        "Regress per country",
        Some(regressions.results.len()),
        outputs,
        warnings,
        start,
    ))
}

/// Stage 8: forest plot of one per-country table
pub fn run_plot(ctx: &RunContext, input: &Path, output: &Path, groups: Option<usize>) -> Result<StageRecord> {
    print_step_header(8, "Forest Plot");
    let start = Instant::now();

    let mut plot_config = ctx.config.plot.clone();
    if let Some(groups) = groups {
        if groups == 0 {
            anyhow::bail!("Number of groups must be at least 1");
        }
        plot_config.num_groups = groups;
    }

    let data = load_forest_table(input)?;
    let mut warnings = Vec::new();
    if !data.skipped.is_empty() {
        let warning = format!(
            "{} countries without a numeric estimate skipped",
            data.skipped.len()
        );
        print_warning(&warning);
        warnings.push(warning);
    }
    print_info(&format!(
        "Plotting {} countries in {} group(s)",
        data.rows.len(),
        plot_config.num_groups
    ));

    let mut outputs = Vec::new();
    if confirm_overwrite(output, ctx.no_confirm)? {
        render_forest(&data.rows, &plot_config, output)?;
        print_success(&format!("Saved {}", output.display()));
        outputs.push(output.to_path_buf());
    }

    Ok(finish_stage(
        "Forest plot",
        Some(data.rows.len()),
        outputs,
        warnings,
        start,
    ))
}

/// Report files packaged by `run --bundle`
fn bundled_reports(output_dir: &Path, dependents: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = [
        COVERAGE_OVERALL_FILE,
        COVERAGE_BY_COUNTRY_FILE,
        DESCRIPTIVE_FILE,
        CORRELATION_FILE,
        COUNTRY_MEANS_FILE,
        POOLED_TABLE_FILE,
    ]
    .iter()
    .map(|f| output_dir.join(f))
    .collect();
    files.extend(dependents.iter().map(|d| output_dir.join(per_country_file(d))));
    files.push(output_dir.join(STATUS_REPORT_FILE));
    files
}

/// Every stage in sequence into one output directory
pub fn run_all(
    ctx: &RunContext,
    first: &Path,
    second: &Path,
    output_dir: &Path,
    plots: bool,
    bundle: bool,
) -> Result<PipelineSummary> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    print_config(
        first,
        output_dir,
        &ctx.config.focus_variable,
        ctx.config.describe.credit_card_threshold,
        &ctx.config.regression.dependent_variables,
    );

    let merged = output_dir.join(MERGED_FILE);
    let recoded = output_dir.join(RECODED_FILE);
    let cleaned = output_dir.join(CLEANED_FILE);
    let regression_data = output_dir.join(REGRESSION_DATA_FILE);

    let mut summary = PipelineSummary::new();
    summary.record(run_merge(ctx, first, second, &merged)?);
    summary.record(run_recode(ctx, &merged, &recoded)?);
    summary.record(run_coverage(ctx, &recoded, output_dir)?);
    summary.record(run_filter(ctx, &recoded, &cleaned)?);
    summary.record(run_describe(ctx, &cleaned, output_dir, plots)?);
    summary.record(run_regress(ctx, &regression_data, &output_dir.join(POOLED_TABLE_FILE))?);
    summary.record(run_regress_country(ctx, &regression_data, output_dir)?);

    let dependents = &ctx.config.regression.dependent_variables;
    if plots {
        for dependent in dependents {
            let table = output_dir.join(per_country_file(dependent));
            let image = output_dir.join(forest_file(dependent));
            match run_plot(ctx, &table, &image, None) {
                Ok(record) => summary.record(record),
                Err(e) => {
                    let warning = format!("Forest plot for '{}' failed: {}", dependent, e);
                    print_warning(&warning);
                    summary.record(StageRecord {
                        name: format!("Forest plot ({})", dependent),
                        rows: None,
                        outputs: Vec::new(),
                        elapsed: Duration::ZERO,
                        warnings: vec![warning],
                    });
                }
            }
        }
    }

    if bundle {
        let zip_path = output_dir.join(BUNDLE_FILE);
        let added = package_reports(&bundled_reports(output_dir, dependents), &zip_path)?;
        print_success(&format!(
            "Packaged {} reports into {}",
            added.len(),
            zip_path.display()
        ));
    }

    summary.display();
    print_completion();
    Ok(summary)
}

/// Write the default study configuration
pub fn run_init_config(output: &Path, no_confirm: bool) -> Result<()> {
    if !confirm_overwrite(output, no_confirm)? {
        print_warning(&format!("Kept existing {}", output.display()));
        return Ok(());
    }
    StudyConfig::default().save(output)?;
    print_success(&format!("Default configuration written to {}", output.display()));
    Ok(())
}

/// Banner shown before any stage command
pub fn print_header() {
    print_banner(env!("CARGO_PKG_VERSION"));
}
