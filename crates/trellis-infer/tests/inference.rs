//! Integration tests for meta inference.

use std::io;
use std::path::Path;
use std::sync::Arc;

use proptest::prelude::*;
use trellis_infer::{InferenceOptions, infer, infer_keys};
use trellis_model::{
    ColumnData, Dataset, DiagnosticKind, DisplayError, Figure, MetaType, PanelKind, Value,
};

struct NoopFigure;

impl Figure for NoopFigure {
    fn render_to_file(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

fn strs(items: &[&str]) -> ColumnData {
    ColumnData::Values(items.iter().map(|s| Value::from(*s)).collect())
}

fn floats(items: &[f64]) -> ColumnData {
    ColumnData::Values(items.iter().map(|v| Value::Float(*v)).collect())
}

fn gapminder() -> Dataset {
    Dataset::new(vec![
        ("country", strs(&["Belgium", "France", "Belgium", "France"])),
        ("continent", strs(&["Europe", "Europe", "Europe", "Europe"])),
        ("year", ColumnData::Values(vec![2002.into(), 2002.into(), 2007.into(), 2007.into()])),
        ("lat", floats(&[50.8, 48.8, 50.8, 48.8])),
        ("lon", floats(&[4.3, 2.3, 4.3, 2.3])),
        ("img", strs(&["p/be02.png", "p/fr02.png", "p/be07.png", "p/fr07.png"])),
    ])
    .expect("valid dataset")
}

#[test]
fn infers_types_panels_and_keys() {
    let inference = infer(&gapminder(), &InferenceOptions::default()).expect("infer");
    let types: Vec<(String, MetaType)> = inference
        .metas
        .iter()
        .map(|m| (m.varname().to_string(), m.meta_type()))
        .collect();
    assert_eq!(
        types,
        vec![
            ("country".to_string(), MetaType::Factor),
            ("continent".to_string(), MetaType::Factor),
            ("year".to_string(), MetaType::Number),
            ("lat".to_string(), MetaType::Number),
            ("lon".to_string(), MetaType::Number),
            ("img".to_string(), MetaType::Panel),
            ("geo".to_string(), MetaType::Geo),
        ]
    );
    assert_eq!(inference.panel_columns, vec!["img"]);
    assert_eq!(inference.key_columns, vec!["country", "year"]);
    assert!(inference.diagnostics.is_empty());
}

#[test]
fn figure_columns_are_panels() {
    let figure: Arc<dyn Figure> = Arc::new(NoopFigure);
    let dataset = Dataset::new(vec![
        ("name", strs(&["a", "b"])),
        ("plot", ColumnData::Figures(vec![Some(figure.clone()), Some(figure)])),
    ])
    .expect("valid dataset");
    let inference = infer(&dataset, &InferenceOptions::default()).expect("infer");
    let plot = inference.metas.get("plot").expect("plot meta");
    assert_eq!(plot.panel_spec().map(|s| s.panelkind), Some(PanelKind::Figure));
    assert_eq!(inference.key_columns, vec!["name"]);
}

#[test]
fn empty_dataset_is_rejected() {
    let empty = Dataset::new(vec![("a", strs(&[]))]).expect("valid dataset");
    assert!(matches!(
        infer(&empty, &InferenceOptions::default()),
        Err(DisplayError::EmptyDataset { .. })
    ));
    assert!(matches!(
        infer(&Dataset::default(), &InferenceOptions::default()),
        Err(DisplayError::EmptyDataset { .. })
    ));
}

#[test]
fn duplicated_rows_fall_back_with_warning() {
    let dataset = Dataset::new(vec![
        ("a", strs(&["x", "x"])),
        ("b", strs(&["y", "y"])),
    ])
    .expect("valid dataset");
    let inference = infer(&dataset, &InferenceOptions::default()).expect("inference proceeds");
    assert_eq!(inference.key_columns, vec!["a", "b"]);
    assert_eq!(inference.diagnostics.len(), 1);
    assert_eq!(inference.diagnostics[0].kind, DiagnosticKind::AmbiguousKey);
}

#[test]
fn caller_hints_take_precedence() {
    let options = InferenceOptions::default()
        .with_type_override("year", MetaType::Factor)
        .with_key_columns(["country", "year"])
        .with_panel_column("continent");
    let inference = infer(&gapminder(), &options).expect("infer");
    assert_eq!(
        inference.metas.get("year").map(|m| m.meta_type()),
        Some(MetaType::Factor)
    );
    assert_eq!(inference.panel_columns, vec!["continent", "img"]);
    assert_eq!(inference.key_columns, vec!["country", "year"]);
}

#[test]
fn type_override_contradicting_the_data_is_rejected() {
    let options = InferenceOptions::default().with_type_override("year", MetaType::Date);
    match infer(&gapminder(), &options) {
        Err(DisplayError::InvalidMeta { varname, message }) => {
            assert_eq!(varname, "year");
            assert!(message.contains("row 0"), "{message}");
        }
        other => panic!("expected invalid meta, got {other:?}"),
    }
}

#[test]
fn unknown_hint_column_is_fatal() {
    let options = InferenceOptions::default().with_key_columns(["nope"]);
    assert!(matches!(
        infer(&gapminder(), &options),
        Err(DisplayError::MissingColumn { .. })
    ));
}

proptest! {
    #[test]
    fn inferred_keys_identify_distinct_rows(
        rows in prop::collection::vec((0u8..4, 0u8..4, 0u8..3), 1..20)
    ) {
        let column = |pick: fn(&(u8, u8, u8)) -> u8, prefix: &str| {
            ColumnData::Values(rows.iter().map(|r| Value::from(format!("{prefix}{}", pick(r)))).collect())
        };
        let dataset = Dataset::new(vec![
            ("a", column(|r| r.0, "a")),
            ("b", column(|r| r.1, "b")),
            ("c", column(|r| r.2, "c")),
        ])
        .expect("valid dataset");

        let search = infer_keys(&dataset, &["a", "b", "c"]).expect("search");
        let keys: Vec<&str> = search.columns.iter().map(String::as_str).collect();
        let distinct = dataset.distinct_count(&keys).expect("count");
        let all_distinct = dataset.distinct_count(&["a", "b", "c"]).expect("count");

        if all_distinct == rows.len() {
            prop_assert!(search.diagnostic.is_none());
            prop_assert_eq!(distinct, rows.len());
        } else {
            let diagnostic = search.diagnostic.expect("ambiguous key diagnostic");
            prop_assert_eq!(diagnostic.kind, DiagnosticKind::AmbiguousKey);
            prop_assert_eq!(keys, vec!["a", "b", "c"]);
        }
    }
}
