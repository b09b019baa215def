//! Forest plot of per-country odds ratios with 95% confidence intervals

use std::path::Path;

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use polars::prelude::*;

use super::{create_parent_dir, parse_hex_color, plot_error, ImageFormat};
use crate::config::PlotConfig;
use crate::pipeline::loader::{load_dataset, require_columns};

const COUNTRY: &str = "Country";
const ODDS_RATIO: &str = "OR";
const LOWER: &str = "Lower 95";
const UPPER: &str = "Higher 95";

/// One country with a numeric estimate
#[derive(Debug, Clone, PartialEq)]
pub struct ForestRow {
    pub country: String,
    pub odds_ratio: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ForestRow {
    /// Significant when the interval does not contain 1
    pub fn is_significant(&self) -> bool {
        !(self.lower <= 1.0 && self.upper >= 1.0)
    }
}

/// Rows of a per-country table, split into plottable and skipped countries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForestData {
    pub rows: Vec<ForestRow>,
    pub skipped: Vec<String>,
}

/// Numeric values of a column that may have been read as text
fn lenient_numbers(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?;
    let values = match column.dtype() {
        DataType::String => column
            .str()?
            .into_iter()
            .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()))
            .collect(),
        _ => {
            let cast = column.cast(&DataType::Float64)?;
            cast.f64()?.into_iter().collect()
        }
    };
    Ok(values)
}

/// Extract forest rows from a per-country table, sorted by OR descending
pub fn forest_rows(df: &DataFrame) -> Result<ForestData> {
    let required: Vec<String> = [COUNTRY, ODDS_RATIO, LOWER, UPPER]
        .iter()
        .map(|s| s.to_string())
        .collect();
    require_columns(df, &required, "Forest plot table")?;

    let countries = df.column(COUNTRY)?.cast(&DataType::String)?;
    let countries: Vec<Option<String>> = countries
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    let odds = lenient_numbers(df, ODDS_RATIO)?;
    let lower = lenient_numbers(df, LOWER)?;
    let upper = lenient_numbers(df, UPPER)?;

    let mut data = ForestData::default();
    for (i, country) in countries.into_iter().enumerate() {
        let country = country.unwrap_or_default();
        match (odds[i], lower[i], upper[i]) {
            (Some(or), Some(lo), Some(hi)) if or.is_finite() && lo.is_finite() && hi.is_finite() => {
                data.rows.push(ForestRow {
                    country,
                    odds_ratio: or,
                    lower: lo,
                    upper: hi,
                })
            }
            _ => data.skipped.push(country),
        }
    }

    data.rows.sort_by(|a, b| {
        b.odds_ratio
            .partial_cmp(&a.odds_ratio)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(data)
}

/// Load a per-country results file for plotting
pub fn load_forest_table(path: &Path) -> Result<ForestData> {
    let df = load_dataset(path, 0)
        .with_context(|| format!("Failed to load forest plot table: {}", path.display()))?;
    let data = forest_rows(&df)?;
    if !data.skipped.is_empty() {
        tracing::warn!(
            count = data.skipped.len(),
            countries = ?data.skipped,
            "rows without numeric estimates skipped"
        );
    }
    Ok(data)
}

/// Split into `n` consecutive groups; the first `len % n` groups get one extra item
pub fn split_into_groups<T: Clone>(items: &[T], n: usize) -> Vec<Vec<T>> {
    if n == 0 {
        return Vec::new();
    }
    let base = items.len() / n;
    let extra = items.len() % n;

    let mut groups = Vec::with_capacity(n);
    let mut start = 0;
    for g in 0..n {
        let size = base + usize::from(g < extra);
        groups.push(items[start..start + size].to_vec());
        start += size;
    }
    groups
}

/// Largest upper bound rounded up to the next multiple of 0.5
pub fn axis_max(rows: &[ForestRow]) -> f64 {
    let max_upper = rows.iter().map(|r| r.upper).fold(f64::NEG_INFINITY, f64::max);
    let rounded = (max_upper * 2.0).ceil() / 2.0;
    if rounded.is_finite() && rounded > 0.0 {
        rounded
    } else {
        1.0
    }
}

/// Whole-number tick positions from 0 up to `x_max`
pub fn integer_ticks(x_max: f64) -> Vec<f64> {
    let last = if x_max.is_finite() && x_max > 0.0 {
        x_max.floor() as usize
    } else {
        0
    };
    (0..=last).map(|v| v as f64).collect()
}

/// (rows, columns) of the panel grid
pub fn grid_layout(groups: usize) -> (usize, usize) {
    if groups <= 2 {
        (1, groups.max(1))
    } else {
        (2, groups.div_ceil(2))
    }
}

/// Country label of a y tick; row 0 sits at the top
fn country_label(names: &[String], y: f64) -> String {
    let nearest = y.round();
    if (y - nearest).abs() > 1e-6 || nearest < 0.0 {
        return String::new();
    }
    let idx = nearest as usize;
    if idx >= names.len() {
        return String::new();
    }
    names[names.len() - 1 - idx].clone()
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    group: &[ForestRow],
    x_max: f64,
    significant: RGBColor,
    nonsignificant: RGBColor,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let n = group.len();
    let names: Vec<String> = group.iter().map(|r| r.country.clone()).collect();
    let y_of = |i: usize| (n - 1 - i) as f64;
    let label_formatter = |y: &f64| country_label(&names, *y);

    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(
            (0.0..x_max).with_key_points(integer_ticks(x_max)),
            -0.5..(n as f64 - 0.5),
        )?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_labels(n)
        .y_label_formatter(&label_formatter)
        .x_desc("Odds Ratio (95% CI)")
        .label_style(("sans-serif", 16))
        .draw()?;

    let reference = RGBColor(0x55, 0x55, 0x55);
    chart.draw_series(DashedLineSeries::new(
        vec![(1.0, -0.5), (1.0, n as f64 - 0.5)],
        8,
        6,
        reference.stroke_width(2),
    ))?;

    for (i, row) in group.iter().enumerate() {
        let color = if row.is_significant() {
            significant
        } else {
            nonsignificant
        };
        let y = y_of(i);
        let cap = 0.2;

        chart.draw_series(std::iter::once(PathElement::new(
            vec![(row.lower, y), (row.upper, y)],
            color.stroke_width(2),
        )))?;
        for x in [row.lower, row.upper] {
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(x, y - cap), (x, y + cap)],
                color.stroke_width(2),
            )))?;
        }
        chart.draw_series(std::iter::once(Circle::new(
            (row.odds_ratio, y),
            6,
            color.filled(),
        )))?;
    }

    Ok(())
}

fn draw_forest<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    groups: &[Vec<ForestRow>],
    x_max: f64,
    config: &PlotConfig,
    significant: RGBColor,
    nonsignificant: RGBColor,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let titled = root.titled(&config.title, ("sans-serif", 34).into_font().style(FontStyle::Bold))?;
    let body = titled.titled(&config.subtitle, ("sans-serif", 24))?;
    let (_, height) = body.dim_in_pixel();
    let (panels_area, legend_area) = body.split_vertically((height as i32 - 60).max(0));

    let (rows, cols) = grid_layout(groups.len());
    let panels = panels_area.split_evenly((rows, cols));
    for (group, panel) in groups.iter().zip(panels.iter()) {
        if !group.is_empty() {
            draw_panel(panel, group, x_max, significant, nonsignificant)?;
        }
    }

    let (width, _) = legend_area.dim_in_pixel();
    let center = width as i32 / 2;
    let entries = [
        (center - 420, significant, config.significant_label.as_str()),
        (center + 40, nonsignificant, config.nonsignificant_label.as_str()),
    ];
    for (x, color, label) in entries {
        legend_area.draw(&Circle::new((x, 30), 8, color.filled()))?;
        legend_area.draw(&Text::new(label.to_string(), (x + 18, 20), ("sans-serif", 20)))?;
    }

    Ok(())
}

/// Render the forest plot; the format follows the file extension
pub fn render_forest(rows: &[ForestRow], config: &PlotConfig, path: &Path) -> Result<()> {
    if rows.is_empty() {
        anyhow::bail!("No countries with numeric estimates to plot");
    }
    let format = ImageFormat::from_path(path)?;
    create_parent_dir(path)?;

    let groups = split_into_groups(rows, config.num_groups.max(1));
    let x_max = axis_max(rows);
    let significant = parse_hex_color(&config.significant_color)?;
    let nonsignificant = parse_hex_color(&config.nonsignificant_color)?;
    let size = (config.width, config.height);

    match format {
        ImageFormat::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_forest(&root, &groups, x_max, config, significant, nonsignificant)
                .map_err(plot_error)?;
            root.present().map_err(plot_error)?;
        }
        ImageFormat::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_forest(&root, &groups, x_max, config, significant, nonsignificant)
                .map_err(plot_error)?;
            root.present().map_err(plot_error)?;
        }
    }

    tracing::info!(path = %path.display(), countries = rows.len(), "forest plot written");
    Ok(())
}
