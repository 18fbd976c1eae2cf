//! Column type classification.
//!
//! # Algorithm
//!
//! A variable column is assigned the first type whose rule matches, in this
//! precedence order:
//!
//! 1. **Override**: a caller-supplied [`MetaType`]
//! 2. **Datetime**: every value is text parsing as a timestamp
//! 3. **Date**: every value is text parsing as a calendar date
//! 4. **Number**: every value is an integer or float
//! 5. **Factor**: booleans, or text with bounded cardinality
//! 6. **Geo**: numeric latitude/longitude pairs (see [`detect_geo`])
//! 7. **Href**: every value is an http(s) URL
//! 8. **String**: fallback, including mixed-type and all-missing columns

use std::collections::BTreeSet;

use trellis_model::temporal::{
    DEFAULT_DATE_FORMAT, DEFAULT_DATETIME_FORMAT, parse_date, parse_datetime,
};
use trellis_model::{
    Dataset, DisplayError, Meta, MetaKind, MetaSet, MetaType, Result, Value, is_url,
};

use crate::options::InferenceOptions;
use crate::panels;

/// Shape of a column's non-missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Empty,
    Text,
    Numeric,
    Boolean,
    Mixed,
}

fn shape_of(values: &[Value]) -> Shape {
    let mut shape = Shape::Empty;
    for value in values.iter().filter(|v| !v.is_null()) {
        let current = match value {
            Value::Str(_) => Shape::Text,
            Value::Int(_) | Value::Float(_) => Shape::Numeric,
            Value::Bool(_) => Shape::Boolean,
            Value::Null => continue,
        };
        shape = match shape {
            Shape::Empty => current,
            existing if existing == current => existing,
            _ => return Shape::Mixed,
        };
    }
    shape
}

fn texts(values: &[Value]) -> impl Iterator<Item = &str> {
    values.iter().filter_map(Value::as_str)
}

/// Infer the meta type of a variable column without building the meta.
pub fn classify(values: &[Value], options: &InferenceOptions) -> MetaType {
    match shape_of(values) {
        Shape::Empty | Shape::Mixed => MetaType::String,
        Shape::Numeric => MetaType::Number,
        Shape::Boolean => MetaType::Factor,
        Shape::Text => {
            if texts(values).all(|s| parse_datetime(s).is_some()) {
                MetaType::Datetime
            } else if texts(values).all(|s| parse_date(s).is_some()) {
                MetaType::Date
            } else if is_factor(values, options) {
                MetaType::Factor
            } else if texts(values).all(is_url) {
                MetaType::Href
            } else {
                MetaType::String
            }
        }
    }
}

fn is_factor(values: &[Value], options: &InferenceOptions) -> bool {
    let present: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
    let distinct: BTreeSet<String> = present.iter().map(|v| v.to_string()).collect();
    options.is_factor_cardinality(distinct.len(), present.len())
}

/// Build the meta of a variable column, recording observed ranges and
/// levels. `meta_type` forces the type; otherwise it is classified.
pub fn infer_meta(
    varname: &str,
    values: &[Value],
    meta_type: Option<MetaType>,
    options: &InferenceOptions,
) -> Result<Meta> {
    let meta_type = meta_type.unwrap_or_else(|| classify(values, options));
    let meta = match meta_type {
        MetaType::String => Meta::string(varname),
        MetaType::Href => Meta::href(varname),
        MetaType::Number => {
            let (min, max) = numeric_range(values);
            Meta::number(varname).with_range(min, max)
        }
        MetaType::Currency => {
            let (min, max) = numeric_range(values);
            Meta::currency(varname, None)?.with_range(min, max)
        }
        MetaType::Date => {
            let observed: Vec<_> = texts(values).filter_map(parse_date).collect();
            Meta::new(
                varname,
                MetaKind::Date {
                    min: observed.iter().min().copied(),
                    max: observed.iter().max().copied(),
                    format: DEFAULT_DATE_FORMAT.to_string(),
                },
            )
        }
        MetaType::Datetime => {
            let observed: Vec<_> = texts(values).filter_map(parse_datetime).collect();
            Meta::new(
                varname,
                MetaKind::Datetime {
                    min: observed.iter().min().copied(),
                    max: observed.iter().max().copied(),
                    format: DEFAULT_DATETIME_FORMAT.to_string(),
                    timezone: "UTC".to_string(),
                },
            )
        }
        MetaType::Factor => {
            let levels: BTreeSet<String> = values
                .iter()
                .filter(|v| !v.is_null())
                .map(ToString::to_string)
                .collect();
            Meta::factor(varname, levels.into_iter().collect())
        }
        MetaType::Panel => Meta::panel(varname, panels::spec_for_values(values)),
        MetaType::Geo => {
            return Err(DisplayError::InvalidMeta {
                varname: varname.to_string(),
                message: "geo metas combine two columns and cannot be inferred from one"
                    .to_string(),
            });
        }
    };
    Ok(meta)
}

fn numeric_range(values: &[Value]) -> (Option<f64>, Option<f64>) {
    values
        .iter()
        .filter_map(Value::as_f64)
        .filter(|v| v.is_finite())
        .fold((None, None), |(min, max), v| {
            (
                Some(min.map_or(v, |m: f64| m.min(v))),
                Some(max.map_or(v, |m: f64| m.max(v))),
            )
        })
}

/// Split `name` into a prefix and a coordinate suffix from `suffixes`.
///
/// `lat` matches with an empty prefix, `city_lat` with prefix `city`.
fn coordinate_prefix<'a>(name: &'a str, suffixes: &[String]) -> Option<&'a str> {
    let lower = name.to_lowercase();
    suffixes.iter().find_map(|suffix| {
        if lower == *suffix {
            return Some("");
        }
        let tail = format!("_{suffix}");
        if lower.ends_with(&tail) {
            return name.get(..name.len().checked_sub(tail.len())?);
        }
        None
    })
}

/// Find numeric latitude/longitude column pairs sharing a prefix and build a
/// geo meta for each pair whose values are valid coordinates.
pub fn detect_geo(dataset: &Dataset, metas: &MetaSet, options: &InferenceOptions) -> Vec<Meta> {
    let numeric: Vec<&str> = metas
        .iter()
        .filter(|meta| meta.meta_type() == MetaType::Number)
        .map(Meta::varname)
        .collect();

    let mut found = Vec::new();
    for lat in &numeric {
        let Some(prefix) = coordinate_prefix(lat, &options.latitude_names) else {
            continue;
        };
        let Some(lon) = numeric.iter().find(|candidate| {
            coordinate_prefix(candidate, &options.longitude_names)
                .is_some_and(|p| p.eq_ignore_ascii_case(prefix))
        }) else {
            continue;
        };

        let base = if prefix.is_empty() { "geo" } else { prefix };
        let taken = |name: &str| {
            dataset.has_column(name)
                || metas.contains(name)
                || found.iter().any(|m: &Meta| m.varname() == name)
        };
        let varname = if taken(base) {
            format!("{base}_geo")
        } else {
            base.to_string()
        };
        if taken(&varname) {
            tracing::debug!(latvar = lat, longvar = lon, "geo name already in use");
            continue;
        }

        let meta = Meta::geo(varname, *lat, *lon);
        match meta.check_with_data(dataset) {
            Ok(()) => found.push(meta),
            Err(err) => tracing::debug!(latvar = lat, longvar = lon, %err, "not a geo pair"),
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_model::ColumnData;

    fn strs(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| Value::from(*s)).collect()
    }

    fn opts() -> InferenceOptions {
        InferenceOptions::default()
    }

    #[test]
    fn test_dates() {
        let values = strs(&["2020-01-01", "2020-02-01"]);
        assert_eq!(classify(&values, &opts()), MetaType::Date);
        let meta = infer_meta("day", &values, None, &opts()).unwrap();
        match meta.kind() {
            MetaKind::Date { min, max, .. } => {
                assert_eq!(min.map(|d| d.to_string()).as_deref(), Some("2020-01-01"));
                assert_eq!(max.map(|d| d.to_string()).as_deref(), Some("2020-02-01"));
            }
            other => panic!("expected date, got {other:?}"),
        }
    }

    #[test]
    fn test_datetime_before_date() {
        let values = strs(&["2020-01-01 10:00:00", "2020-01-02 11:30:00"]);
        assert_eq!(classify(&values, &opts()), MetaType::Datetime);
        let mixed = strs(&["2020-01-01 10:00:00", "2020-01-02"]);
        assert_ne!(classify(&mixed, &opts()), MetaType::Datetime);
    }

    #[test]
    fn test_numbers_with_missing() {
        let values = vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Null];
        let meta = infer_meta("x", &values, None, &opts()).unwrap();
        assert_eq!(meta.meta_type(), MetaType::Number);
        match meta.kind() {
            MetaKind::Number { min, max, .. } => {
                assert_eq!(*min, Some(1.0));
                assert_eq!(*max, Some(3.0));
            }
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn test_factor_levels_sorted() {
        let values = strs(&["a", "b", "a", "c"]);
        let meta = infer_meta("f", &values, None, &opts()).unwrap();
        assert_eq!(meta.meta_type(), MetaType::Factor);
        assert_eq!(meta.levels().unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn test_unique_text_is_string() {
        let values = strs(&["a", "b", "c", "d"]);
        assert_eq!(classify(&values, &opts()), MetaType::String);
    }

    #[test]
    fn test_mixed_types_downgrade_to_string() {
        let values = vec![Value::Int(1), Value::from("two"), Value::Int(3)];
        assert_eq!(classify(&values, &opts()), MetaType::String);
    }

    #[test]
    fn test_all_missing_is_string() {
        assert_eq!(classify(&[Value::Null, Value::Null], &opts()), MetaType::String);
    }

    #[test]
    fn test_booleans_are_factors() {
        let values = vec![Value::Bool(true), Value::Bool(false)];
        let meta = infer_meta("flag", &values, None, &opts()).unwrap();
        assert_eq!(meta.levels().unwrap(), ["false", "true"]);
    }

    #[test]
    fn test_unique_urls_are_href() {
        let values = strs(&["https://a.org", "https://b.org", "http://c.org"]);
        assert_eq!(classify(&values, &opts()), MetaType::Href);
    }

    #[test]
    fn test_override_wins() {
        let values = vec![Value::Int(1), Value::Int(2)];
        let meta = infer_meta("x", &values, Some(MetaType::String), &opts()).unwrap();
        assert_eq!(meta.meta_type(), MetaType::String);
        let currency = infer_meta("x", &values, Some(MetaType::Currency), &opts()).unwrap();
        assert_eq!(currency.meta_type(), MetaType::Currency);
        assert!(infer_meta("x", &values, Some(MetaType::Geo), &opts()).is_err());
    }

    #[test]
    fn test_coordinate_prefix() {
        let lat = opts().latitude_names;
        assert_eq!(coordinate_prefix("lat", &lat), Some(""));
        assert_eq!(coordinate_prefix("City_Latitude", &lat), Some("City"));
        assert_eq!(coordinate_prefix("plate", &lat), None);
    }

    #[test]
    fn test_detect_geo() {
        let dataset = Dataset::new(vec![
            ("city", ColumnData::Values(strs(&["Ghent", "Paris"]))),
            ("city_lat", ColumnData::Values(vec![Value::Float(51.05), Value::Float(48.85)])),
            ("city_lon", ColumnData::Values(vec![Value::Float(3.72), Value::Float(2.35)])),
        ])
        .unwrap();
        let metas: MetaSet = [
            Meta::string("city"),
            Meta::number("city_lat"),
            Meta::number("city_lon"),
        ]
        .into_iter()
        .collect();
        let geo = detect_geo(&dataset, &metas, &opts());
        assert_eq!(geo.len(), 1);
        assert_eq!(geo[0].varname(), "city_geo");
        assert_eq!(geo[0].source_columns(), vec!["city_lat", "city_lon"]);
    }
}
