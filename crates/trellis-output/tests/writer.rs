//! Integration tests for the display writer.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use trellis_model::{
    ColumnData, Dataset, DisplayError, DisplayState, Figure, LabelState, LayoutState, Meta,
    MetaSet, PanelKind, PanelSpec, SortEntry, SortState, Value, View,
};
use trellis_output::{
    DisplayContent, DisplayListEntry, OutputFormat, PLACEHOLDER_STEM, WriteOptions,
    read_display_info, read_document, write_display,
};

struct Square(&'static str);

impl Figure for Square {
    fn render_to_file(&self, path: &Path) -> io::Result<()> {
        fs::write(path, format!("<svg><title>{}</title></svg>", self.0))
    }

    fn extension(&self) -> &str {
        "svg"
    }
}

struct Fixture {
    dataset: Dataset,
    metas: MetaSet,
    keys: Vec<String>,
    state: DisplayState,
    views: Vec<View>,
    tags: Vec<String>,
}

impl Fixture {
    fn new(countries: &[&'static str]) -> Self {
        let figures: Vec<Option<Arc<dyn Figure>>> = countries
            .iter()
            .map(|c| Some(Arc::new(Square(*c)) as Arc<dyn Figure>))
            .collect();
        let n = countries.len();
        let dataset = Dataset::new(vec![
            (
                "country",
                ColumnData::Values(countries.iter().map(|c| Value::from(*c)).collect()),
            ),
            (
                "continent",
                ColumnData::Values(
                    (0..n)
                        .map(|i| Value::from(if i % 2 == 0 { "Asia" } else { "Europe" }))
                        .collect(),
                ),
            ),
            (
                "lat",
                ColumnData::Values((0..n).map(|i| Value::Float(10.25 + i as f64)).collect()),
            ),
            (
                "lon",
                ColumnData::Values((0..n).map(|i| Value::Float(20.5 + i as f64)).collect()),
            ),
            ("plot", ColumnData::Figures(figures)),
        ])
        .expect("valid dataset");
        let metas: MetaSet = [
            Meta::string("country"),
            Meta::factor("continent", vec!["Asia".into(), "Europe".into()]),
            Meta::number("lat"),
            Meta::number("lon"),
            Meta::geo("coords", "lat", "lon"),
            Meta::panel("plot", PanelSpec::new(PanelKind::Figure)),
        ]
        .into_iter()
        .collect();
        let state = DisplayState::new(
            LayoutState::new(2),
            LabelState::new(["country"]),
            SortState::new(vec![SortEntry::asc("country")]),
        );
        Self {
            dataset,
            metas,
            keys: vec!["country".to_string()],
            views: vec![View::new("by continent", state.clone())],
            state,
            tags: vec!["demo".to_string()],
        }
    }

    /// Keyed by `id`, with one figure column per entry of `panels`.
    fn with_panels(
        ids: &[&str],
        panels: Vec<(&'static str, Vec<Option<Arc<dyn Figure>>>)>,
    ) -> Self {
        let mut columns = vec![(
            "id",
            ColumnData::Values(ids.iter().map(|id| Value::from(*id)).collect()),
        )];
        let mut metas = vec![Meta::string("id")];
        for (name, figures) in panels {
            columns.push((name, ColumnData::Figures(figures)));
            metas.push(Meta::panel(name, PanelSpec::new(PanelKind::Figure)));
        }
        let dataset = Dataset::new(columns).expect("valid dataset");
        let state = DisplayState::new(
            LayoutState::new(1),
            LabelState::new(["id"]),
            SortState::new(vec![SortEntry::asc("id")]),
        );
        Self {
            dataset,
            metas: metas.into_iter().collect(),
            keys: vec!["id".to_string()],
            views: Vec::new(),
            state,
            tags: Vec::new(),
        }
    }

    fn content<'a>(&'a self, name: &'a str) -> DisplayContent<'a> {
        DisplayContent {
            name,
            description: "test display",
            tags: &self.tags,
            dataset: &self.dataset,
            metas: &self.metas,
            key_columns: &self.keys,
            state: &self.state,
            views: &self.views,
            primary_panel: None,
        }
    }
}

#[test]
fn writes_expected_layout() {
    let root = tempfile::tempdir().expect("tempdir");
    let fixture = Fixture::new(&["Japan", "France"]);
    let handle = write_display(&fixture.content("Life Exp"), root.path(), &WriteOptions::default())
        .expect("write display");

    let display = root.path().join("displays/life_exp");
    assert_eq!(handle.display_path, display);
    assert_eq!(handle.row_count, 2);
    assert_eq!(handle.id.len(), 16);
    assert!(handle.diagnostics.is_empty());
    for file in [
        "displayInfo.json",
        "metaData.json",
        "panels/plot/japan.svg",
        "panels/plot/france.svg",
    ] {
        assert!(display.join(file).is_file(), "missing {file}");
    }
    assert!(root.path().join("displayList.json").is_file());
    assert!(root.path().join("config.json").is_file());
}

#[test]
fn display_info_round_trips_metas() {
    let root = tempfile::tempdir().expect("tempdir");
    let fixture = Fixture::new(&["Japan", "France"]);
    let handle = write_display(&fixture.content("gap"), root.path(), &WriteOptions::default())
        .expect("write display");

    let info = read_display_info(&handle.display_path).expect("read displayInfo");
    assert_eq!(info.schema_version, 1);
    assert_eq!(info.metas, fixture.metas);
    assert_eq!(info.state, fixture.state);
    assert_eq!(info.views, fixture.views);
    assert_eq!(info.keycols, vec!["country"]);
    assert_eq!(info.n, 2);
    assert_eq!(info.primarypanel.as_deref(), Some("plot"));
    assert_eq!(info.thumbnailurl.as_deref(), Some("panels/plot/japan.svg"));
}

#[test]
fn metadata_encodes_factors_geo_and_panels() {
    let root = tempfile::tempdir().expect("tempdir");
    let fixture = Fixture::new(&["Japan", "France"]);
    let handle = write_display(&fixture.content("gap"), root.path(), &WriteOptions::default())
        .expect("write display");

    let rows: serde_json::Value =
        read_document(&handle.display_path.join("metaData.json")).expect("read metaData");
    insta::assert_json_snapshot!(rows, @r#"
    [
      {
        "continent": 1,
        "coords": [
          10.25,
          20.5
        ],
        "country": "Japan",
        "lat": 10.25,
        "lon": 20.5,
        "plot": "panels/plot/japan.svg"
      },
      {
        "continent": 2,
        "coords": [
          11.25,
          21.5
        ],
        "country": "France",
        "lat": 11.25,
        "lon": 21.5,
        "plot": "panels/plot/france.svg"
      }
    ]
    "#);
}

#[test]
fn rewrite_is_byte_identical() {
    let root = tempfile::tempdir().expect("tempdir");
    let fixture = Fixture::new(&["Japan", "France", "Chile"]);
    let options = WriteOptions::default().with_concurrency(3);
    let display = root.path().join("displays/gap");

    let first = write_display(&fixture.content("gap"), root.path(), &options).expect("first write");
    let info = fs::read(display.join("displayInfo.json")).expect("read");
    let meta = fs::read(display.join("metaData.json")).expect("read");

    let second = write_display(&fixture.content("gap"), root.path(), &options).expect("second write");
    assert_eq!(first.id, second.id);
    assert_eq!(fs::read(display.join("displayInfo.json")).expect("read"), info);
    assert_eq!(fs::read(display.join("metaData.json")).expect("read"), meta);
}

#[test]
fn collision_aborts_before_any_file_is_written() {
    let parent = tempfile::tempdir().expect("tempdir");
    let root = parent.path().join("out");
    let fixture = Fixture::new(&["Côte d'Ivoire", "côte d ivoire"]);

    let err = write_display(&fixture.content("gap"), &root, &WriteOptions::default())
        .expect_err("collision");
    assert!(matches!(err, DisplayError::PanelNameCollision { .. }));
    assert!(!root.exists());
}

#[test]
fn panel_columns_sharing_a_directory_are_rejected() {
    let parent = tempfile::tempdir().expect("tempdir");
    let root = parent.path().join("out");
    let fixture = Fixture::with_panels(
        &["a"],
        vec![
            ("Plot", vec![Some(Arc::new(Square("FIRST")) as Arc<dyn Figure>)]),
            ("plot", vec![Some(Arc::new(Square("SECOND")) as Arc<dyn Figure>)]),
        ],
    );

    let err = write_display(&fixture.content("gap"), &root, &WriteOptions::default())
        .expect_err("directory collision");
    match err {
        DisplayError::PanelDirectoryCollision {
            first,
            second,
            path,
        } => {
            assert_eq!((first.as_str(), second.as_str()), ("Plot", "plot"));
            assert_eq!(path, "panels/plot");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!root.exists());
}

#[test]
fn placeholder_never_replaces_a_rendered_panel() {
    let root = tempfile::tempdir().expect("tempdir");
    let fixture = Fixture::with_panels(
        &["__missing__", "b"],
        vec![("plot", vec![Some(Arc::new(Square("REAL")) as Arc<dyn Figure>), None])],
    );

    let handle = write_display(&fixture.content("gap"), root.path(), &WriteOptions::default())
        .expect("write display");
    let panels = handle.display_path.join("panels/plot");
    let real = fs::read_to_string(panels.join("__missing__.svg")).expect("read row asset");
    assert_eq!(real, "<svg><title>REAL</title></svg>");
    let placeholder = fs::read_to_string(panels.join(format!("{PLACEHOLDER_STEM}.svg")))
        .expect("read placeholder");
    assert!(placeholder.contains("panel unavailable"));
    assert_eq!(handle.diagnostics.len(), 1);
}

#[test]
fn sibling_displays_are_preserved() {
    let root = tempfile::tempdir().expect("tempdir");
    let fixture = Fixture::new(&["Japan", "France"]);
    let options = WriteOptions::default();
    write_display(&fixture.content("beta"), root.path(), &options).expect("write beta");
    write_display(&fixture.content("alpha"), root.path(), &options).expect("write alpha");
    write_display(&fixture.content("beta"), root.path(), &options).expect("rewrite beta");

    assert!(root.path().join("displays/alpha/displayInfo.json").is_file());
    let list: Vec<DisplayListEntry> =
        read_document(&root.path().join("displayList.json")).expect("read displayList");
    let names: Vec<&str> = list.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "beta"]);
    assert_eq!(
        list[0].thumbnailurl.as_deref(),
        Some("displays/alpha/panels/plot/japan.svg")
    );
}

#[test]
fn existing_config_format_is_adopted() {
    let root = tempfile::tempdir().expect("tempdir");
    let fixture = Fixture::new(&["Japan"]);
    let jsonp = WriteOptions::default().with_format(OutputFormat::Jsonp);
    let handle = write_display(&fixture.content("one"), root.path(), &jsonp).expect("write jsonp");

    let info = fs::read_to_string(handle.display_path.join("displayInfo.jsonp")).expect("read");
    assert!(info.starts_with(&format!("__loadDisplayInfo__{}(", handle.id)));

    write_display(&fixture.content("two"), root.path(), &WriteOptions::default())
        .expect("write json request");
    assert!(root.path().join("displays/two/displayInfo.jsonp").is_file());
    assert!(!root.path().join("displays/two/displayInfo.json").exists());
}

#[test]
fn incompatible_schema_version_conflicts() {
    let root = tempfile::tempdir().expect("tempdir");
    let display = root.path().join("displays/gap");
    fs::create_dir_all(&display).expect("mkdir");
    fs::write(display.join("displayInfo.json"), r#"{"name":"gap","schemaVersion":0}"#)
        .expect("seed");

    let fixture = Fixture::new(&["Japan"]);
    let err = write_display(&fixture.content("gap"), root.path(), &WriteOptions::default())
        .expect_err("conflict");
    assert!(matches!(err, DisplayError::WriteTargetConflict { .. }));
    assert!(!display.join("metaData.json").exists());
}

#[test]
fn root_that_is_a_file_conflicts() {
    let parent = tempfile::tempdir().expect("tempdir");
    let root = parent.path().join("taken");
    fs::write(&root, "x").expect("seed");
    let fixture = Fixture::new(&["Japan"]);
    let err = write_display(&fixture.content("gap"), &root, &WriteOptions::default())
        .expect_err("conflict");
    assert!(matches!(err, DisplayError::WriteTargetConflict { .. }));
}
