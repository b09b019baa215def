//! Pipeline run summary

use std::path::PathBuf;
use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

/// What one stage produced
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub name: String,
    /// Rows of the stage's main output, when it has one
    pub rows: Option<usize>,
    pub outputs: Vec<PathBuf>,
    pub elapsed: Duration,
    pub warnings: Vec<String>,
}

/// Summary of a full pipeline run
#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub stages: Vec<StageRecord>,
}

impl PipelineSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: StageRecord) {
        self.stages.push(record);
    }

    pub fn total_elapsed(&self) -> Duration {
        self.stages.iter().map(|s| s.elapsed).sum()
    }

    /// Every file written by the run, in stage order
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.stages.iter().flat_map(|s| s.outputs.iter().cloned()).collect()
    }

    fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Stage").add_attribute(Attribute::Bold),
            Cell::new("Rows").add_attribute(Attribute::Bold),
            Cell::new("Outputs").add_attribute(Attribute::Bold),
            Cell::new("Time").add_attribute(Attribute::Bold),
        ]);

        for stage in &self.stages {
            let name = if stage.warnings.is_empty() {
                Cell::new(&stage.name)
            } else {
                Cell::new(format!("{} ({} warnings)", stage.name, stage.warnings.len()))
                    .fg(Color::Yellow)
            };
            table.add_row(vec![
                name,
                Cell::new(stage.rows.map_or_else(|| "-".to_string(), |r| r.to_string())),
                Cell::new(stage.outputs.len()),
                Cell::new(format!("{:.2}s", stage.elapsed.as_secs_f64())),
            ]);
        }

        table.add_row(vec![
            Cell::new("Total").add_attribute(Attribute::Bold),
            Cell::new(""),
            Cell::new(self.outputs().len())
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
            Cell::new(format!("{:.2}s", self.total_elapsed().as_secs_f64()))
                .add_attribute(Attribute::Bold),
        ]);
        table
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("PIPELINE SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        for line in self.to_table().to_string().lines() {
            println!("    {}", line);
        }

        let warned: Vec<&StageRecord> = self.stages.iter().filter(|s| !s.warnings.is_empty()).collect();
        if !warned.is_empty() {
            println!();
            println!("    {} {}", style("📝").cyan(), style("WARNINGS").white().bold());
            println!("    {}", style("─".repeat(50)).dim());
            for stage in warned {
                println!();
                println!("      {}:", style(&stage.name).yellow());
                for warning in &stage.warnings {
                    println!("        {} {}", style("•").dim(), warning);
                }
            }
        }
    }
}
