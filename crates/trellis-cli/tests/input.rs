//! Integration tests for CSV input.

use std::fs;

use insta::assert_snapshot;
use trellis_cli::input::read_csv_dataset;
use trellis_core::{BuildOptions, Display, MetaType, Value};

const GAPMINDER: &str = "\
country,continent,year,life_exp,plot
Belgium,Europe,2007,79.44,https://example.org/belgium.png
Chile,Americas,2007,,https://example.org/chile.png
Japan,Asia,2007,82.6,https://example.org/japan.png
Kenya,Africa,2007,54.11,
Norway,Europe,2007,80.2,https://example.org/norway.png
";

#[test]
fn reads_typed_columns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("gapminder.csv");
    fs::write(&path, GAPMINDER).expect("write csv");

    let dataset = read_csv_dataset(&path).expect("read csv");

    assert_snapshot!(dataset.column_names().join("|"), @"country|continent|year|life_exp|plot");
    assert_eq!(dataset.height(), 5);
    assert_eq!(dataset.value("year", 0), Some(&Value::Int(2007)));
    assert_eq!(dataset.value("life_exp", 1), Some(&Value::Null));
    assert_eq!(dataset.value("life_exp", 2), Some(&Value::Float(82.6)));
    assert_eq!(dataset.value("plot", 3), Some(&Value::Null));
}

#[test]
fn csv_builds_a_display() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("gapminder.csv");
    fs::write(&path, GAPMINDER).expect("write csv");

    let dataset = read_csv_dataset(&path).expect("read csv");
    let display = Display::build(dataset, "gapminder", BuildOptions::default()).expect("build");

    assert_eq!(display.key_columns(), ["country"]);
    assert_eq!(display.panel_columns(), vec!["plot"]);
    let meta_type = |name: &str| display.metas().get(name).map(|m| m.meta_type());
    assert_eq!(meta_type("life_exp"), Some(MetaType::Number));
    assert_eq!(meta_type("year"), Some(MetaType::Number));
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.csv");

    let err = read_csv_dataset(&path).unwrap_err();
    assert!(format!("{err:#}").contains("absent.csv"));
}
