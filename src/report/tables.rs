//! Console tables for stage results

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use polars::prelude::*;

use crate::pipeline::coverage::CoverageEntry;
use crate::pipeline::regression::{CountryRegressions, ModelTable};

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(*h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn cell_text(column: &Column, row: usize) -> String {
    match column.get(row) {
        Ok(AnyValue::Null) | Err(_) => String::new(),
        Ok(AnyValue::String(s)) => s.to_string(),
        Ok(AnyValue::Float64(v)) => format!("{:.4}", v),
        Ok(AnyValue::Float32(v)) => format!("{:.4}", v),
        Ok(value) => value.to_string(),
    }
}

/// Up to `max_rows` rows of a DataFrame as a table
pub fn frame_table(df: &DataFrame, max_rows: usize) -> Table {
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let headers: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    let mut table = new_table(&headers);

    for row in 0..df.height().min(max_rows) {
        let cells: Vec<Cell> = df
            .get_columns()
            .iter()
            .map(|c| Cell::new(cell_text(c, row)))
            .collect();
        table.add_row(cells);
    }
    table
}

pub fn print_frame(df: &DataFrame, max_rows: usize) {
    print_indented(&frame_table(df, max_rows));
    if df.height() > max_rows {
        println!("    ... {} more rows", df.height() - max_rows);
    }
}

/// Overall coverage, lowest share highlighted
pub fn coverage_table(entries: &[CoverageEntry]) -> Table {
    let mut table = new_table(&["Variable", "Non-missing", "Total", "Share"]);
    for entry in entries {
        let color = if entry.share < 0.5 {
            Color::Red
        } else if entry.share < 0.9 {
            Color::Yellow
        } else {
            Color::Green
        };
        table.add_row(vec![
            Cell::new(&entry.variable),
            Cell::new(entry.non_missing),
            Cell::new(entry.total),
            Cell::new(format!("{:.1}%", entry.share * 100.0)).fg(color),
        ]);
    }
    table
}

pub fn print_coverage(entries: &[CoverageEntry]) {
    print_indented(&coverage_table(entries));
}

/// Odds ratio table of one pooled model
pub fn model_table_display(table: &ModelTable) -> Table {
    let mut display = new_table(&["Variable", "Odds Ratio (OR)", "CI 95% Lower", "CI 95% Upper"]);
    for row in &table.rows {
        let or_cell = if row.cells[0].ends_with('*') {
            Cell::new(&row.cells[0]).fg(Color::Green)
        } else {
            Cell::new(&row.cells[0])
        };
        display.add_row(vec![
            Cell::new(&row.label),
            or_cell,
            Cell::new(&row.cells[1]),
            Cell::new(&row.cells[2]),
        ]);
    }
    display
}

pub fn print_model_table(table: &ModelTable) {
    print_indented(&model_table_display(table));
}

/// Status counts per dependent variable
pub fn country_status_table(regressions: &CountryRegressions) -> Table {
    let mut headers = vec!["Status"];
    headers.extend(regressions.dependents.iter().map(|d| d.as_str()));
    let mut table = new_table(&headers);

    let counts: Vec<_> = regressions
        .dependents
        .iter()
        .filter_map(|d| regressions.status_counts(d).ok())
        .collect();
    let mut labels: Vec<&'static str> = counts.iter().flat_map(|c| c.keys().copied()).collect();
    labels.sort();
    labels.dedup();

    for label in labels {
        let mut row = vec![Cell::new(label)];
        row.extend(
            counts
                .iter()
                .map(|c| Cell::new(c.get(label).copied().unwrap_or(0))),
        );
        table.add_row(row);
    }
    table
}

pub fn print_country_status(regressions: &CountryRegressions) {
    print_indented(&country_status_table(regressions));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::regression::TableRow;

    #[test]
    fn test_frame_table_truncates() {
        let df = df! { "a" => [1i32, 2, 3], "b" => [Some(0.5), None, Some(1.25)] }.unwrap();
        let rendered = frame_table(&df, 2).to_string();
        assert!(rendered.contains("0.5000"));
        assert!(!rendered.contains("1.2500"));
    }

    #[test]
    fn test_model_table_display_rows() {
        let table = ModelTable {
            dependent: "saved".to_string(),
            rows: vec![TableRow {
                label: "has_credit_card".to_string(),
                cells: ["1.9***".to_string(), "1.5".to_string(), "2.4".to_string()],
            }],
        };
        let rendered = model_table_display(&table).to_string();
        assert!(rendered.contains("has_credit_card"));
        assert!(rendered.contains("1.9***"));
    }
}
