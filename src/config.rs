//! Study configuration
//!
//! Every column list, recoding dictionary and threshold used by the pipeline
//! lives here. `StudyConfig::default()` reproduces the 2017/2021 savings study;
//! a JSON file passed with `--config` may override any subset of fields.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration problems detected before any stage runs
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("at least one dependent variable is required")]
    NoDependentVariables,
    #[error("at least one explanatory variable is required")]
    NoExplanatoryVariables,
    #[error("credit card threshold must be between 0.0 and 1.0, got {0}")]
    ThresholdOutOfRange(f64),
    #[error("forest plots need at least one group")]
    ZeroGroups,
    #[error("exactly two survey waves are required, got {0}")]
    WaveCount(usize),
    #[error("split rule for '{0}' has no categories")]
    EmptySplit(String),
    #[error("split rule for '{column}' lists code {code} as both a category and missing")]
    SplitCodeConflict { column: String, code: i64 },
}

/// Cleaned value a raw survey code maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Code {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "0")]
    Zero,
    #[serde(rename = "NA")]
    Missing,
}

impl Code {
    pub fn value(self) -> Option<i32> {
        match self {
            Code::One => Some(1),
            Code::Zero => Some(0),
            Code::Missing => None,
        }
    }
}

/// Raw code -> cleaned value dictionary for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecodeRule {
    pub column: String,
    pub mapping: BTreeMap<i64, Code>,
}

impl RecodeRule {
    pub fn new(column: &str, pairs: &[(i64, Code)]) -> Self {
        Self {
            column: column.to_string(),
            mapping: pairs.iter().copied().collect(),
        }
    }
}

/// One derived dummy of a split rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitCategory {
    pub code: i64,
    pub column: String,
}

/// One-hot split of a multi-category column into dummies.
///
/// Codes in `missing_codes` become NA in every dummy; any other answer that is
/// not the dummy's own category counts as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRule {
    pub source: String,
    pub categories: Vec<SplitCategory>,
    #[serde(default)]
    pub missing_codes: Vec<i64>,
}

impl SplitRule {
    pub fn new(source: &str, categories: &[(i64, &str)], missing_codes: &[i64]) -> Self {
        Self {
            source: source.to_string(),
            categories: categories
                .iter()
                .map(|(code, column)| SplitCategory {
                    code: *code,
                    column: column.to_string(),
                })
                .collect(),
            missing_codes: missing_codes.to_vec(),
        }
    }

    pub fn is_category(&self, code: i64) -> bool {
        self.categories.iter().any(|cat| cat.code == code)
    }
}

/// Column rename applied by the filter stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub columns: Vec<String>,
    pub wave_years: Vec<i64>,
    pub year_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecodeConfig {
    pub rules: Vec<RecodeRule>,
    pub splits: Vec<SplitRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub renames: Vec<Rename>,
    pub excluded_countries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    pub variables: Vec<String>,
    pub group_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescribeConfig {
    pub credit_card_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    pub dependent_variables: Vec<String>,
    pub explanatory_variables: Vec<String>,
    pub fixed_effects: Vec<String>,
    pub cluster_variable: String,
    /// Year control for per-country models; `None` disables it
    pub year_variable: Option<String>,
    /// Extra observations required on top of one per predictor
    pub min_obs_margin: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub num_groups: usize,
    pub title: String,
    pub subtitle: String,
    pub significant_label: String,
    pub nonsignificant_label: String,
    pub significant_color: String,
    pub nonsignificant_color: String,
    pub width: u32,
    pub height: u32,
}

/// Complete study configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    /// Country code column shared by every stage after filtering
    pub country_column: String,
    /// Main explanatory variable of the study
    pub focus_variable: String,
    pub merge: MergeConfig,
    pub recode: RecodeConfig,
    pub filter: FilterConfig,
    pub coverage: CoverageConfig,
    pub describe: DescribeConfig,
    pub regression: RegressionConfig,
    pub plot: PlotConfig,
}

impl StudyConfig {
    /// Load a configuration from JSON; omitted fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: StudyConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use the study defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.regression.dependent_variables.is_empty() {
            return Err(ConfigError::NoDependentVariables);
        }
        if self.regression.explanatory_variables.is_empty() {
            return Err(ConfigError::NoExplanatoryVariables);
        }
        let threshold = self.describe.credit_card_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::ThresholdOutOfRange(threshold));
        }
        if self.plot.num_groups == 0 {
            return Err(ConfigError::ZeroGroups);
        }
        if self.merge.wave_years.len() != 2 {
            return Err(ConfigError::WaveCount(self.merge.wave_years.len()));
        }
        if let Some(split) = self.recode.splits.iter().find(|s| s.categories.is_empty()) {
            return Err(ConfigError::EmptySplit(split.source.clone()));
        }
        for split in &self.recode.splits {
            if let Some(code) = split.missing_codes.iter().find(|c| split.is_category(**c)) {
                return Err(ConfigError::SplitCodeConflict {
                    column: split.source.clone(),
                    code: *code,
                });
            }
        }
        Ok(())
    }

    /// Focus variable followed by the dependent variables
    pub fn country_mean_variables(&self) -> Vec<String> {
        let mut vars = vec![self.focus_variable.clone()];
        vars.extend(self.regression.dependent_variables.iter().cloned());
        vars
    }
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            country_column: "economycode".to_string(),
            focus_variable: "has_credit_card".to_string(),
            merge: MergeConfig::default(),
            recode: RecodeConfig::default(),
            filter: FilterConfig::default(),
            coverage: CoverageConfig::default(),
            describe: DescribeConfig::default(),
            regression: RegressionConfig::default(),
            plot: PlotConfig::default(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            columns: strings(&[
                "economy", "economycode", "regionwb", "pop_adult", "wpid_random", "wgt",
                "female", "age", "educ", "inc_q", "emp_in", "account_fin", "account_mob",
                "account", "borrowed", "saved", "receive_wages", "receive_transfers",
                "receive_pension", "receive_agriculture", "pay_utilities", "remittances",
                "mobileowner", "fin2", "fin4", "fin5", "fin6", "fin7", "fin8", "fin9", "fin10",
                "fin11a", "fin11b", "fin11c", "fin11d", "fin11e", "fin11f", "fin11g", "fin11h",
                "fin14a", "fin14b", "fin14c", "fin16", "fin17a", "fin17b", "fin20", "fin22a",
                "fin22b", "fin22c", "fin24", "fin26", "fin27c1", "fin27c2", "fin28", "fin29c1",
                "fin29c2", "fin30", "fin31a", "fin31b", "fin31c", "fin32", "fin33", "fin34a",
                "fin34b", "fin35", "fin37", "fin38", "fin39a", "fin39b", "fin42", "fin43a",
                "fin43b", "fin45",
            ]),
            wave_years: vec![2017, 2021],
            year_column: "Year".to_string(),
        }
    }
}

impl Default for RecodeConfig {
    fn default() -> Self {
        use Code::{Missing as N, One as I, Zero as O};

        let yes_no = [(1, I), (2, O), (3, N), (4, N)];
        let received = [(1, I), (2, I), (3, I), (4, O), (5, N)];

        let mut rules = vec![
            RecodeRule::new("female", &[(1, I), (2, O)]),
            RecodeRule::new("emp_in", &[(1, I), (2, O)]),
            RecodeRule::new("educ", &[(1, O), (2, O), (3, I)]),
        ];
        for column in [
            "fin16", "fin17a", "fin17b", "fin20", "fin22a", "fin22b", "fin22c", "fin32",
            "fin33", "fin34a", "fin34b", "fin35", "fin37", "fin38", "fin39a", "fin39b", "fin42",
            "fin43a", "fin43b", "mobileowner", "fin5", "fin6", "fin14a", "fin14b", "fin31b",
            "fin2", "fin4", "fin7", "fin8", "fin9", "fin10", "fin11a", "fin11b", "fin11c",
            "fin11d", "fin11e", "fin11f", "fin11g", "fin11h", "fin31a", "fin26", "fin27c1",
            "fin27c2", "fin28", "fin29c1", "fin29c2", "fin30", "fin31c",
        ] {
            rules.push(RecodeRule::new(column, &yes_no));
        }
        for column in [
            "receive_wages",
            "receive_transfers",
            "receive_pension",
            "receive_agriculture",
        ] {
            rules.push(RecodeRule::new(column, &received));
        }
        rules.push(RecodeRule::new(
            "remittances",
            &[(1, I), (2, I), (3, I), (4, I), (5, O), (6, N)],
        ));
        rules.push(RecodeRule::new(
            "pay_utilities",
            &[(1, I), (2, O), (3, O), (4, O), (5, N)],
        ));

        let splits = vec![
            SplitRule::new(
                "fin45",
                &[
                    (1, "worried_old_age"),
                    (2, "worried_medical_costs"),
                    (3, "worried_monthly_expenses"),
                    (4, "worried_education_fees"),
                ],
                &[5, 6],
            ),
            SplitRule::new(
                "inc_q",
                &[
                    (1, "inc_q_1"),
                    (2, "inc_q_2"),
                    (3, "inc_q_3"),
                    (4, "inc_q_4"),
                    (5, "inc_q_5"),
                ],
                &[],
            ),
            SplitRule::new(
                "fin14c",
                &[(1, "fin14c_online"), (2, "fin14c_cash"), (3, "fin14c_both")],
                &[4, 5],
            ),
            SplitRule::new(
                "fin24",
                &[
                    (1, "fin24_savings"),
                    (2, "fin24_family"),
                    (3, "fin24_work"),
                    (4, "fin24_borrowings"),
                    (5, "fin24_sale"),
                    (6, "fin24_other"),
                    (7, "fin24_no"),
                ],
                &[8, 9],
            ),
        ];

        Self { rules, splits }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        let pairs = [
            ("saved", "saved"),
            ("fin17a", "saved_account"),
            ("fin16", "saved_retirement"),
            ("fin2", "has_debit_card"),
            ("fin7", "has_credit_card"),
            ("female", "female"),
            ("age", "age"),
            ("educ", "higher_educ"),
            ("emp_in", "employed"),
            ("inc_q_1", "inc_quint1"),
            ("inc_q_2", "inc_quint2"),
            ("inc_q_3", "inc_quint3"),
            ("inc_q_4", "inc_quint4"),
            ("inc_q_5", "inc_quint5"),
            ("fin32", "recv_wage"),
            ("fin37", "recv_govt_trans"),
            ("fin38", "recv_pension"),
            ("borrowed", "borrowed"),
            ("mobileowner", "has_mobile"),
            ("fin30", "paid_utility"),
            ("fin14a", "paid_bills_online"),
            ("fin14b", "bought_online"),
            ("Year", "year"),
        ];
        Self {
            renames: pairs
                .iter()
                .map(|(from, to)| Rename {
                    from: from.to_string(),
                    to: to.to_string(),
                })
                .collect(),
            // Countries whose sparse responses break the regressions
            excluded_countries: strings(&[
                "TTO", "MOZ", "BLR", "SWZ", "LUX", "MNE", "LBY", "KWT", "BHR", "ARE", "ISL", "JAM",
            ]),
        }
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            variables: strings(&[
                "remittances", "receive_wages", "receive_transfers", "receive_pension",
                "receive_agriculture", "pay_utilities", "fin14a", "fin14b", "fin14c", "fin5",
                "fin6", "fin34a", "fin34b", "fin35", "fin39a", "fin39b", "fin43a", "fin43b",
                "fin27c1", "fin27c2", "fin29c1", "fin29c2", "fin31a", "fin31b", "fin31c",
            ]),
            group_column: "economy".to_string(),
        }
    }
}

impl Default for DescribeConfig {
    fn default() -> Self {
        Self {
            credit_card_threshold: 0.10,
        }
    }
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            dependent_variables: strings(&["saved", "saved_account", "saved_retirement"]),
            // inc_quint1 is the omitted reference quintile
            explanatory_variables: strings(&[
                "has_credit_card",
                "female",
                "age",
                "higher_educ",
                "employed",
                "inc_quint2",
                "inc_quint3",
                "inc_quint4",
                "inc_quint5",
                "recv_wage",
                "recv_govt_trans",
                "recv_pension",
                "borrowed",
                "has_mobile",
                "paid_utility",
                "paid_bills_online",
                "bought_online",
            ]),
            fixed_effects: strings(&["economycode", "year"]),
            cluster_variable: "economycode".to_string(),
            year_variable: Some("year".to_string()),
            min_obs_margin: 5,
            max_iterations: 35,
            tolerance: 1e-8,
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            num_groups: 2,
            title: "Odds Ratios for association between \"Has a Credit Card\" and \"Made Savings\""
                .to_string(),
            subtitle: "Across Countries (Sorted by OR, Highest First) with 95% Confidence Intervals"
                .to_string(),
            significant_label: "Statistically Significant at 95% CI".to_string(),
            nonsignificant_label: "Non-Statistically Significant at 95% CI".to_string(),
            significant_color: "#1F77B4".to_string(),
            nonsignificant_color: "#D62728".to_string(),
            width: 1800,
            height: 1400,
        }
    }
}
