//! Country-mean scatter plots with a least-squares line

use std::path::Path;

use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use polars::prelude::*;

use super::{create_parent_dir, plot_error, ImageFormat};
use crate::pipeline::correlation::pearson_pairwise;
use crate::pipeline::loader::{column_f64, column_keys};

/// One labelled country
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub label: String,
    pub x: f64,
    pub y: f64,
}

/// Points from a country-means table; rows with a missing value are dropped
pub fn scatter_points(
    means: &DataFrame,
    label_column: &str,
    x_variable: &str,
    y_variable: &str,
) -> Result<Vec<ScatterPoint>> {
    let labels = column_keys(means, label_column)?;
    let xs = column_f64(means, x_variable)?;
    let ys = column_f64(means, y_variable)?;

    let points = labels
        .into_iter()
        .zip(xs)
        .zip(ys)
        .filter_map(|((label, x), y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some(ScatterPoint {
                label: label.unwrap_or_default(),
                x,
                y,
            }),
            _ => None,
        })
        .collect();

    Ok(points)
}

/// Ordinary least squares (slope, intercept) of y on x
pub fn least_squares(points: &[ScatterPoint]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.x - mean_x).powi(2)).sum();
    let sxy: f64 = points.iter().map(|p| (p.x - mean_x) * (p.y - mean_y)).sum();
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let pad = ((max - min) * 0.05).max(0.01);
    (min - pad, max + pad)
}

fn draw_scatter<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    points: &[ScatterPoint],
    x_label: &str,
    y_label: &str,
    title: &str,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let (x_min, x_max) = padded_range(points.iter().map(|p| p.x));
    let (y_min, y_max) = padded_range(points.iter().map(|p| p.y));
    let point_color = RGBColor(0x1F, 0x77, 0xB4);

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .draw()?;

    chart.draw_series(
        points
            .iter()
            .map(|p| Circle::new((p.x, p.y), 4, point_color.mix(0.7).filled())),
    )?;
    chart.draw_series(points.iter().map(|p| {
        Text::new(p.label.clone(), (p.x, p.y), ("sans-serif", 11).into_font())
    }))?;

    if let Some((slope, intercept)) = least_squares(points) {
        chart.draw_series(LineSeries::new(
            vec![
                (x_min, intercept + slope * x_min),
                (x_max, intercept + slope * x_max),
            ],
            RED.stroke_width(2),
        ))?;
    }

    let xs: Vec<Option<f64>> = points.iter().map(|p| Some(p.x)).collect();
    let ys: Vec<Option<f64>> = points.iter().map(|p| Some(p.y)).collect();
    let annotation = match pearson_pairwise(&xs, &ys) {
        Some(r) => format!("Correlation: {:.2}", r),
        None => "Correlation: n/a".to_string(),
    };
    root.draw(&Text::new(annotation, (100, 60), ("sans-serif", 18)))?;

    Ok(())
}

/// Render a scatter plot of country means; the format follows the file extension
pub fn render_scatter(
    points: &[ScatterPoint],
    x_label: &str,
    y_label: &str,
    path: &Path,
) -> Result<()> {
    if points.is_empty() {
        anyhow::bail!("No country means to plot for '{}'", y_label);
    }
    let format = ImageFormat::from_path(path)?;
    create_parent_dir(path)?;

    let title = format!("Country means: {} vs {}", y_label, x_label);
    let size = (1200, 900);

    match format {
        ImageFormat::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_scatter(&root, points, x_label, y_label, &title).map_err(plot_error)?;
            root.present().map_err(plot_error)?;
        }
        ImageFormat::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_scatter(&root, points, x_label, y_label, &title).map_err(plot_error)?;
            root.present().map_err(plot_error)?;
        }
    }

    Ok(())
}
