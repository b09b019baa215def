//! Findex: credit card ownership and household savings CLI

use anyhow::Result;
use clap::Parser;

use findex::cli::commands::{
    print_header, run_all, run_coverage, run_describe, run_filter, run_init_config, run_merge,
    run_plot, run_recode, run_regress, run_regress_country,
};
use findex::cli::{Cli, Commands, RunContext};
use findex::config::StudyConfig;
use findex::utils::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Commands::InitConfig { output } = &cli.command {
        return run_init_config(output, cli.no_confirm);
    }

    let config = StudyConfig::load_or_default(cli.config.as_deref())?;
    config.validate()?;
    tracing::debug!(config = ?cli.config, "study configuration loaded");

    print_header();
    let ctx = RunContext {
        config,
        no_confirm: cli.no_confirm,
        infer_schema_length: cli.infer_schema_length,
    };

    match &cli.command {
        Commands::Merge {
            first,
            second,
            output,
        } => {
            run_merge(&ctx, first, second, output)?;
        }
        Commands::Recode { input, output } => {
            run_recode(&ctx, input, output)?;
        }
        Commands::Coverage { input, output_dir } => {
            std::fs::create_dir_all(output_dir)?;
            run_coverage(&ctx, input, output_dir)?;
        }
        Commands::Filter { input, output } => {
            run_filter(&ctx, input, output)?;
        }
        Commands::Describe {
            input,
            output_dir,
            no_plots,
        } => {
            std::fs::create_dir_all(output_dir)?;
            run_describe(&ctx, input, output_dir, !no_plots)?;
        }
        Commands::Regress { input, output } => {
            run_regress(&ctx, input, output)?;
        }
        Commands::RegressCountry { input, output_dir } => {
            std::fs::create_dir_all(output_dir)?;
            run_regress_country(&ctx, input, output_dir)?;
        }
        Commands::Plot {
            input,
            output,
            groups,
        } => {
            run_plot(&ctx, input, output, *groups)?;
        }
        Commands::Run {
            first,
            second,
            output_dir,
            no_plots,
            bundle,
        } => {
            run_all(&ctx, first, second, output_dir, !no_plots, *bundle)?;
        }
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}
