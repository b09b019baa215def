//! Command-line argument definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Findex - survey pipeline linking credit card ownership and household savings
#[derive(Parser, Debug)]
#[command(name = "findex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Study configuration (JSON). Omitted fields keep the study defaults.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Overwrite existing outputs without asking
    #[arg(long, global = true, default_value = "false")]
    pub no_confirm: bool,

    /// Diagnostic log level written to stderr (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Number of rows to use for schema inference (CSV only).
    /// 0 scans the whole file, so columns that only start late in the
    /// merged waves are still typed as numbers.
    #[arg(long, global = true, default_value = "0")]
    pub infer_schema_length: usize,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge the two survey waves into one dataset
    Merge {
        /// Extract of the first wave (e.g. 2017)
        first: PathBuf,

        /// Extract of the second wave (e.g. 2021)
        second: PathBuf,

        /// Merged output file (CSV or Parquet)
        #[arg(short, long, default_value = "data_2017_2021.csv")]
        output: PathBuf,
    },

    /// Recode raw survey answers into binary indicators
    Recode {
        #[arg(short, long, default_value = "data_2017_2021.csv")]
        input: PathBuf,

        #[arg(short, long, default_value = "data_recoded.csv")]
        output: PathBuf,
    },

    /// Report non-missing coverage overall and per economy
    Coverage {
        #[arg(short, long, default_value = "data_recoded.csv")]
        input: PathBuf,

        /// Directory for the coverage tables
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Rename and select study variables, then drop excluded countries
    Filter {
        #[arg(short, long, default_value = "data_recoded.csv")]
        input: PathBuf,

        #[arg(short, long, default_value = "data_cleaned.csv")]
        output: PathBuf,
    },

    /// Apply the credit card threshold and write descriptive statistics
    Describe {
        #[arg(short, long, default_value = "data_cleaned.csv")]
        input: PathBuf,

        /// Directory for the filtered dataset, statistics and scatter plots
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Skip the scatter plots
        #[arg(long, default_value = "false")]
        no_plots: bool,
    },

    /// Fit pooled logit models with country and year fixed effects
    Regress {
        #[arg(short, long, default_value = "data_for_regressions.csv")]
        input: PathBuf,

        #[arg(short, long, default_value = "regression_table_full_data.csv")]
        output: PathBuf,
    },

    /// Fit one logit model per country and dependent variable
    RegressCountry {
        #[arg(short, long, default_value = "data_for_regressions.csv")]
        input: PathBuf,

        /// Directory for the per-country tables and the status report
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Draw a forest plot from a per-country results table
    Plot {
        #[arg(short, long)]
        input: PathBuf,

        /// Image file (.png or .svg)
        #[arg(short, long, default_value = "forest_plot.png")]
        output: PathBuf,

        /// Number of panels (overrides the configuration)
        #[arg(long)]
        groups: Option<usize>,
    },

    /// Run every stage in sequence
    Run {
        /// Extract of the first wave (e.g. 2017)
        first: PathBuf,

        /// Extract of the second wave (e.g. 2021)
        second: PathBuf,

        /// Directory for all outputs
        #[arg(long, default_value = "findex_output")]
        output_dir: PathBuf,

        /// Skip scatter and forest plots
        #[arg(long, default_value = "false")]
        no_plots: bool,

        /// Also package the reports into findex_reports.zip
        #[arg(long, default_value = "false")]
        bundle: bool,
    },

    /// Write the default study configuration as JSON
    InitConfig {
        #[arg(short, long, default_value = "findex.json")]
        output: PathBuf,
    },
}
