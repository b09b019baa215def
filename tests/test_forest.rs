//! Tests for reading and laying out forest plot data

use findex::plot::*;
use std::path::Path;

fn write_table(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("regression_results_per_country_saved.csv");
    std::fs::write(
        &path,
        "Country,Lower 95,OR,Higher 95\n\
         ARG,0.800,1.200,1.900\n\
         BRA,NA,NA,NA\n\
         CHL,1.500,2.400,3.700\n\
         KEN,0.300,0.600,0.950\n",
    )
    .unwrap();
    path
}

#[test]
fn test_forest_table_skips_missing_and_sorts() {
    let dir = tempfile::tempdir().unwrap();
    let data = load_forest_table(&write_table(dir.path())).unwrap();

    assert_eq!(data.skipped, vec!["BRA".to_string()]);
    let countries: Vec<&str> = data.rows.iter().map(|r| r.country.as_str()).collect();
    assert_eq!(countries, vec!["CHL", "ARG", "KEN"]);

    let significant: Vec<bool> = data.rows.iter().map(|r| r.is_significant()).collect();
    assert_eq!(significant, vec![true, false, true]);
}

#[test]
fn test_table_from_country_regressions_round_trips() {
    use findex::pipeline::regression::{CellOutcome, CountryRegressions, CountryResult};

    let regressions = CountryRegressions {
        focus_variable: "has_credit_card".to_string(),
        dependents: vec!["saved".to_string()],
        results: vec![
            CountryResult {
                country: "ARG".to_string(),
                cells: vec![CellOutcome::Estimated {
                    odds_ratio: 1.5,
                    lower: 1.1,
                    upper: 2.05,
                    n_obs: 800,
                }],
            },
            CountryResult {
                country: "BHR".to_string(),
                cells: vec![CellOutcome::NoDvVariation],
            },
        ],
    };

    let table = regressions.table("saved").unwrap();
    let data = forest_rows(&table).unwrap();

    assert_eq!(data.rows.len(), 1);
    assert_eq!(data.rows[0].odds_ratio, 1.5);
    assert_eq!(data.skipped, vec!["BHR".to_string()]);
}

#[test]
fn test_groups_follow_array_split() {
    let items: Vec<u32> = (0..10).collect();
    let groups = split_into_groups(&items, 3);

    let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
    assert_eq!(sizes, vec![4, 3, 3]);
    assert_eq!(groups[1], vec![4, 5, 6]);

    let more_groups_than_items = split_into_groups(&items[..2], 4);
    assert_eq!(more_groups_than_items.len(), 4);
    assert!(more_groups_than_items[3].is_empty());
}

#[test]
fn test_axis_and_grid() {
    let rows = vec![
        ForestRow {
            country: "ARG".to_string(),
            odds_ratio: 1.2,
            lower: 0.8,
            upper: 2.3,
        },
        ForestRow {
            country: "KEN".to_string(),
            odds_ratio: 0.6,
            lower: 0.3,
            upper: 0.9,
        },
    ];
    assert_eq!(axis_max(&rows), 2.5);
    assert_eq!(axis_max(&[]), 1.0);

    assert_eq!(grid_layout(1), (1, 1));
    assert_eq!(grid_layout(2), (1, 2));
    assert_eq!(grid_layout(4), (2, 2));
    assert_eq!(grid_layout(5), (2, 3));
}

#[test]
fn test_image_format_and_colours() {
    assert_eq!(ImageFormat::from_path(Path::new("plot.PNG")).unwrap(), ImageFormat::Png);
    assert_eq!(ImageFormat::from_path(Path::new("plot.svg")).unwrap(), ImageFormat::Svg);
    assert!(ImageFormat::from_path(Path::new("plot.jpg")).is_err());

    let colour = parse_hex_color("#1f77b4").unwrap();
    assert_eq!((colour.0, colour.1, colour.2), (0x1f, 0x77, 0xb4));
    assert!(parse_hex_color("blue").is_err());
}
