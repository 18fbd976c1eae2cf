//! In-memory tabular dataset consumed by the display engine.
//!
//! A [`Dataset`] is an ordered set of equally long named columns. Variable
//! columns hold scalar [`Value`]s; figure columns hold renderable [`Figure`]
//! objects that are materialized into panel assets at write time.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use polars::prelude::{AnyValue, DataFrame};
use serde::{Serialize, Serializer};
use trellis_common::{any_to_string, format_numeric};

use crate::error::{DisplayError, Result};

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Missing values: `Null` and NaN floats.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Text used to compare and name rows by key.
    ///
    /// Missing values render as `\0` so they never equal an empty string.
    pub fn key_text(&self) -> String {
        if self.is_null() {
            return "\u{0}".to_string();
        }
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => f.write_str(&format_numeric(*v)),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            Value::Float(_) => serializer.serialize_none(),
            Value::Str(s) => serializer.serialize_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A renderable object producing one panel image.
pub trait Figure: Send + Sync {
    /// Render this figure to `path`, creating or replacing the file.
    fn render_to_file(&self, path: &Path) -> io::Result<()>;

    /// File extension of the rendered asset, without the dot.
    fn extension(&self) -> &str {
        "png"
    }
}

/// Storage of one column.
#[derive(Clone)]
pub enum ColumnData {
    Values(Vec<Value>),
    Figures(Vec<Option<Arc<dyn Figure>>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Values(values) => values.len(),
            ColumnData::Figures(figures) => figures.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values(&self) -> Option<&[Value]> {
        match self {
            ColumnData::Values(values) => Some(values),
            ColumnData::Figures(_) => None,
        }
    }

    pub fn figures(&self) -> Option<&[Option<Arc<dyn Figure>>]> {
        match self {
            ColumnData::Values(_) => None,
            ColumnData::Figures(figures) => Some(figures),
        }
    }

    fn take(&self, rows: &[usize]) -> ColumnData {
        match self {
            ColumnData::Values(values) => {
                ColumnData::Values(rows.iter().map(|&row| values[row].clone()).collect())
            }
            ColumnData::Figures(figures) => {
                ColumnData::Figures(rows.iter().map(|&row| figures[row].clone()).collect())
            }
        }
    }
}

impl fmt::Debug for ColumnData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnData::Values(values) => f.debug_tuple("Values").field(values).finish(),
            ColumnData::Figures(figures) => write!(f, "Figures({} rows)", figures.len()),
        }
    }
}

impl From<Vec<Value>> for ColumnData {
    fn from(values: Vec<Value>) -> Self {
        ColumnData::Values(values)
    }
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    data: ColumnData,
}

/// Rows sharing the same values in the grouping columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub keys: Vec<Value>,
    pub rows: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    /// Build a dataset from named columns, rejecting duplicate names and
    /// ragged lengths.
    pub fn new<N: Into<String>>(columns: Vec<(N, ColumnData)>) -> Result<Self> {
        let mut dataset = Dataset::default();
        for (name, data) in columns {
            dataset = dataset.with_column(name, data)?;
        }
        Ok(dataset)
    }

    /// Append a column.
    pub fn with_column(mut self, name: impl Into<String>, data: impl Into<ColumnData>) -> Result<Self> {
        let name = name.into();
        let data = data.into();
        if self.has_column(&name) {
            return Err(DisplayError::InvalidDataset {
                message: format!("duplicate column `{name}`"),
            });
        }
        if let Some(first) = self.columns.first()
            && first.data.len() != data.len()
        {
            return Err(DisplayError::InvalidDataset {
                message: format!(
                    "column `{name}` has {} rows, expected {}",
                    data.len(),
                    first.data.len()
                ),
            });
        }
        self.columns.push(Column { name, data });
        Ok(self)
    }

    pub fn height(&self) -> usize {
        self.columns.first().map_or(0, |column| column.data.len())
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| &column.data)
    }

    /// Scalar cell lookup. `None` for unknown columns, figure columns, or
    /// out-of-range rows.
    pub fn value(&self, column: &str, row: usize) -> Option<&Value> {
        self.column(column)?.values()?.get(row)
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        (0..self.height()).map(move |index| Row {
            dataset: self,
            index,
        })
    }

    /// Partition rows by the values of `columns`, in order of first
    /// appearance.
    pub fn group_by(&self, columns: &[&str]) -> Result<Vec<Group>> {
        let mut sources = Vec::with_capacity(columns.len());
        for name in columns {
            let values = self
                .column(name)
                .ok_or_else(|| DisplayError::MissingColumn {
                    varname: (*name).to_string(),
                })?
                .values()
                .ok_or_else(|| DisplayError::InvalidDataset {
                    message: format!("cannot group by figure column `{name}`"),
                })?;
            sources.push(values);
        }

        let mut index: HashMap<Vec<String>, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();
        for row in 0..self.height() {
            let key: Vec<String> = sources.iter().map(|values| values[row].key_text()).collect();
            match index.get(&key) {
                Some(&position) => groups[position].rows.push(row),
                None => {
                    index.insert(key, groups.len());
                    groups.push(Group {
                        keys: sources.iter().map(|values| values[row].clone()).collect(),
                        rows: vec![row],
                    });
                }
            }
        }
        Ok(groups)
    }

    /// Number of distinct value combinations across `columns`.
    pub fn distinct_count(&self, columns: &[&str]) -> Result<usize> {
        Ok(self.group_by(columns)?.len())
    }

    /// Keep only `names`, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<Dataset> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let data = self.column(name).ok_or_else(|| DisplayError::MissingColumn {
                varname: (*name).to_string(),
            })?;
            columns.push(((*name).to_string(), data.clone()));
        }
        Dataset::new(columns)
    }

    /// Keep only the given rows, in the given order.
    pub fn take(&self, rows: &[usize]) -> Result<Dataset> {
        if let Some(&bad) = rows.iter().find(|&&row| row >= self.height()) {
            return Err(DisplayError::InvalidDataset {
                message: format!("row {bad} is out of range for {} rows", self.height()),
            });
        }
        Ok(Dataset {
            columns: self
                .columns
                .iter()
                .map(|column| Column {
                    name: column.name.clone(),
                    data: column.data.take(rows),
                })
                .collect(),
        })
    }

    /// Convert a polars frame. Integer, float, boolean and string cells keep
    /// their type; anything else is stringified.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let mut columns = Vec::with_capacity(df.width());
        for name in df.get_column_names_owned() {
            let column = df
                .column(name.as_str())
                .map_err(|err| DisplayError::InvalidDataset {
                    message: err.to_string(),
                })?;
            let mut values = Vec::with_capacity(df.height());
            for idx in 0..df.height() {
                let cell = column.get(idx).map_err(|err| DisplayError::InvalidDataset {
                    message: err.to_string(),
                })?;
                values.push(any_to_value(cell));
            }
            columns.push((name.to_string(), ColumnData::Values(values)));
        }
        tracing::debug!(columns = columns.len(), rows = df.height(), "converted data frame");
        Dataset::new(columns)
    }
}

fn any_to_value(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(v) => Value::Bool(v),
        AnyValue::Int8(v) => Value::Int(i64::from(v)),
        AnyValue::Int16(v) => Value::Int(i64::from(v)),
        AnyValue::Int32(v) => Value::Int(i64::from(v)),
        AnyValue::Int64(v) => Value::Int(v),
        AnyValue::UInt8(v) => Value::Int(i64::from(v)),
        AnyValue::UInt16(v) => Value::Int(i64::from(v)),
        AnyValue::UInt32(v) => Value::Int(i64::from(v)),
        AnyValue::UInt64(v) => i64::try_from(v).map_or(Value::Float(v as f64), Value::Int),
        AnyValue::Float32(v) => Value::Float(f64::from(v)),
        AnyValue::Float64(v) => Value::Float(v),
        AnyValue::String(s) => Value::Str(s.to_string()),
        AnyValue::StringOwned(s) => Value::Str(s.to_string()),
        other => Value::Str(any_to_string(other)),
    }
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    dataset: &'a Dataset,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.dataset.value(column, self.index)
    }

    pub fn figure(&self, column: &str) -> Option<&'a Arc<dyn Figure>> {
        self.dataset.column(column)?.figures()?.get(self.index)?.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values<T: Into<Value>>(items: Vec<T>) -> ColumnData {
        ColumnData::Values(items.into_iter().map(Into::into).collect())
    }

    fn sample() -> Dataset {
        Dataset::new(vec![
            ("country", values(vec!["BE", "FR", "BE", "NL"])),
            ("year", values(vec![2000, 2000, 2001, 2000])),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_ragged_columns() {
        let result = Dataset::new(vec![
            ("a", values(vec![1, 2])),
            ("b", values(vec![1])),
        ]);
        assert!(matches!(result, Err(DisplayError::InvalidDataset { .. })));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let result = Dataset::new(vec![("a", values(vec![1])), ("a", values(vec![2]))]);
        assert!(matches!(result, Err(DisplayError::InvalidDataset { .. })));
    }

    #[test]
    fn test_group_by_first_appearance() {
        let groups = sample().group_by(&["country"]).unwrap();
        let keys: Vec<String> = groups.iter().map(|g| g.keys[0].to_string()).collect();
        assert_eq!(keys, vec!["BE", "FR", "NL"]);
        assert_eq!(groups[0].rows, vec![0, 2]);
    }

    #[test]
    fn test_distinct_count() {
        let dataset = sample();
        assert_eq!(dataset.distinct_count(&["year"]).unwrap(), 2);
        assert_eq!(dataset.distinct_count(&["country", "year"]).unwrap(), 4);
    }

    #[test]
    fn test_take_and_select() {
        let dataset = sample();
        let subset = dataset.take(&[2, 0]).unwrap().select(&["year"]).unwrap();
        assert_eq!(subset.column_names(), vec!["year"]);
        assert_eq!(subset.value("year", 0), Some(&Value::Int(2001)));
        assert!(dataset.take(&[9]).is_err());
    }

    #[test]
    fn test_null_and_nan_serialize_as_null() {
        let json = serde_json::to_string(&vec![Value::Null, Value::Float(f64::NAN), Value::Int(3)]).unwrap();
        assert_eq!(json, "[null,null,3]");
        assert!(Value::Float(f64::NAN).is_null());
    }

    #[test]
    fn test_key_text_distinguishes_null_from_empty() {
        assert_ne!(Value::Null.key_text(), Value::from("").key_text());
        assert_eq!(Value::Float(2.0).key_text(), "2");
    }

    #[test]
    fn test_from_frame() {
        use polars::prelude::{DataFrame, IntoColumn, NamedFrom, Series};

        let df = DataFrame::new(vec![
            Series::new("name".into(), vec![Some("a"), None]).into_column(),
            Series::new("score".into(), vec![1.5f64, 2.0]).into_column(),
            Series::new("flag".into(), vec![true, false]).into_column(),
        ])
        .unwrap();
        let dataset = Dataset::from_frame(&df).unwrap();
        assert_eq!(dataset.height(), 2);
        assert_eq!(dataset.value("name", 1), Some(&Value::Null));
        assert_eq!(dataset.value("score", 0), Some(&Value::Float(1.5)));
        assert_eq!(dataset.value("flag", 0), Some(&Value::Bool(true)));
    }
}
