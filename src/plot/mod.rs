//! Figures: per-country forest plots and country-mean scatter plots

pub mod forest;
pub mod scatter;

use std::path::Path;

use anyhow::Result;
use plotters::prelude::*;

pub use forest::{
    axis_max, forest_rows, grid_layout, load_forest_table, render_forest, split_into_groups,
    ForestData, ForestRow,
};
pub use scatter::{least_squares, render_scatter, scatter_points, ScatterPoint};

/// Image format chosen from the output file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Svg,
}

impl ImageFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match extension.as_str() {
            "png" => Ok(ImageFormat::Png),
            "svg" => Ok(ImageFormat::Svg),
            _ => anyhow::bail!(
                "Unsupported image format: {}. Supported formats: png, svg",
                extension
            ),
        }
    }
}

/// Parse a `#RRGGBB` colour
pub fn parse_hex_color(hex: &str) -> Result<RGBColor> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        anyhow::bail!("Invalid colour '{}', expected #RRGGBB", hex);
    }
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map_err(|_| anyhow::anyhow!("Invalid colour '{}', expected #RRGGBB", hex))
    };
    Ok(RGBColor(channel(0)?, channel(2)?, channel(4)?))
}

pub(crate) fn plot_error<E: std::error::Error + Send + Sync>(
    err: DrawingAreaErrorKind<E>,
) -> anyhow::Error {
    anyhow::anyhow!("Failed to draw plot: {}", err)
}

pub(crate) fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
