//! Tests for trellis-model types.

use chrono::NaiveDate;
use trellis_model::{
    DisplayState, FilterState, LabelState, LayoutState, Meta, MetaSet, MetaType, PanelKind,
    PanelSpec, SortEntry, SortState, ViewType,
};

fn all_metas() -> MetaSet {
    [
        Meta::string("name").with_label("Name"),
        Meta::number("gdp").with_range(Some(0.5), Some(12.75)).with_digits(2),
        Meta::currency("price", Some("EUR")).expect("valid currency"),
        Meta::date("day"),
        Meta::datetime("stamp"),
        Meta::factor("continent", vec!["Africa".into(), "Asia".into()]),
        Meta::geo("coords", "lat", "lon").with_tags(vec!["place".into()]),
        Meta::href("wiki"),
        Meta::panel("plot", PanelSpec::new(PanelKind::Figure)),
    ]
    .into_iter()
    .collect()
}

#[test]
fn metas_round_trip_through_json() {
    let metas = all_metas();
    let json = serde_json::to_string(&metas).expect("serialize metas");
    let round: MetaSet = serde_json::from_str(&json).expect("deserialize metas");
    assert_eq!(round, metas);
    let types: Vec<MetaType> = round.iter().map(Meta::meta_type).collect();
    assert_eq!(types, MetaType::ALL.to_vec());
}

#[test]
fn datetime_meta_defaults_timezone() {
    let json = r#"{"varname":"t","tags":[],"type":"datetime","format":"%H","filterable":true,"sortable":true}"#;
    let meta: Meta = serde_json::from_str(json).expect("deserialize meta");
    let value = serde_json::to_value(&meta).expect("serialize meta");
    assert_eq!(value["timezone"], "UTC");
}

#[test]
fn display_state_round_trip() {
    let mut state = DisplayState::new(
        LayoutState::new(3).with_nrow(2).with_viewtype(ViewType::Table),
        LabelState::new(["name", "gdp"]),
        SortState::new(vec![SortEntry::desc("gdp"), SortEntry::asc("name")]),
    );
    state.set_filter(FilterState::date_range(
        "day",
        NaiveDate::from_ymd_opt(2020, 1, 1),
        NaiveDate::from_ymd_opt(2020, 6, 30),
    ));
    state.set_filter(FilterState::string_search("name", "an"));
    state.validate(&all_metas()).expect("valid state");

    let json = serde_json::to_string(&state).expect("serialize state");
    let round: DisplayState = serde_json::from_str(&json).expect("deserialize state");
    assert_eq!(round, state);
}

#[test]
fn geo_and_href_are_label_only() {
    let metas = all_metas();
    let labels = LabelState::new(["coords", "wiki"]);
    assert!(labels.validate(&metas).is_ok());
    let sort = SortState::new(vec![SortEntry::asc("wiki")]);
    assert!(sort.validate(&metas).is_err());
}
