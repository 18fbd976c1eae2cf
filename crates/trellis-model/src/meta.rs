//! Typed column descriptors ("metas").
//!
//! Every variable column of a display is described by a [`Meta`]: its name,
//! label, tags, and a [`MetaKind`] carrying the type-specific constraints.
//! Capabilities (filterable, sortable, labelable) are fixed by the type and
//! drive which states may bind to the meta.
//!
//! # Serialization
//!
//! Metas serialize to the flat, `type`-tagged objects the viewer reads:
//!
//! ```json
//! {"varname": "gdp", "label": "GDP", "tags": [], "type": "number",
//!  "locale": true, "min": 1.2, "max": 9.8, "filterable": true, "sortable": true}
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::currency::{DEFAULT_CURRENCY, is_valid_currency};
use crate::dataset::{ColumnData, Dataset, Value};
use crate::error::{DisplayError, Result};
use crate::state::StateKind;
use crate::temporal::{DEFAULT_DATE_FORMAT, DEFAULT_DATETIME_FORMAT, parse_date, parse_datetime};

/// The type tag of a meta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaType {
    String,
    Number,
    Currency,
    Date,
    Datetime,
    Factor,
    Geo,
    Href,
    Panel,
}

impl MetaType {
    pub const ALL: [MetaType; 9] = [
        MetaType::String,
        MetaType::Number,
        MetaType::Currency,
        MetaType::Date,
        MetaType::Datetime,
        MetaType::Factor,
        MetaType::Geo,
        MetaType::Href,
        MetaType::Panel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetaType::String => "string",
            MetaType::Number => "number",
            MetaType::Currency => "currency",
            MetaType::Date => "date",
            MetaType::Datetime => "datetime",
            MetaType::Factor => "factor",
            MetaType::Geo => "geo",
            MetaType::Href => "href",
            MetaType::Panel => "panel",
        }
    }

    pub fn is_filterable(self) -> bool {
        matches!(
            self,
            MetaType::String
                | MetaType::Number
                | MetaType::Currency
                | MetaType::Date
                | MetaType::Datetime
                | MetaType::Factor
        )
    }

    pub fn is_sortable(self) -> bool {
        self.is_filterable()
    }

    pub fn is_labelable(self) -> bool {
        self != MetaType::Panel
    }

    /// Number and currency metas share range semantics.
    pub fn is_numeric(self) -> bool {
        matches!(self, MetaType::Number | MetaType::Currency)
    }
}

impl fmt::Display for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetaType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "string" => Ok(MetaType::String),
            "number" | "numeric" => Ok(MetaType::Number),
            "currency" => Ok(MetaType::Currency),
            "date" => Ok(MetaType::Date),
            "datetime" => Ok(MetaType::Datetime),
            "factor" => Ok(MetaType::Factor),
            "geo" => Ok(MetaType::Geo),
            "href" => Ok(MetaType::Href),
            "panel" => Ok(MetaType::Panel),
            _ => Err(format!("Unknown meta type: {s}")),
        }
    }
}

/// How a panel is embedded by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelType {
    Img,
    Iframe,
}

/// Where a panel's asset comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelKind {
    /// Local image file referenced by path.
    File,
    /// Image referenced by URL.
    Remote,
    /// In-memory figure rendered at write time.
    Figure,
}

impl PanelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelKind::File => "file",
            PanelKind::Remote => "remote",
            PanelKind::Figure => "figure",
        }
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSource {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(rename = "isLocal")]
    pub is_local: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSpec {
    pub paneltype: PanelType,
    pub panelkind: PanelKind,
    /// Width over height.
    pub aspect: f64,
    pub source: PanelSource,
}

impl PanelSpec {
    pub fn new(kind: PanelKind) -> Self {
        Self {
            paneltype: PanelType::Img,
            panelkind: kind,
            aspect: 1.0,
            source: PanelSource {
                source_type: SourceType::File,
                is_local: kind != PanelKind::Remote,
            },
        }
    }

    pub fn with_aspect(mut self, aspect: f64) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn with_paneltype(mut self, paneltype: PanelType) -> Self {
        self.paneltype = paneltype;
        self
    }
}

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Type-specific part of a meta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetaKind {
    String,
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        digits: Option<u8>,
        #[serde(default = "default_true")]
        locale: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Currency {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Date {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<NaiveDate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<NaiveDate>,
        format: String,
    },
    Datetime {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<NaiveDateTime>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<NaiveDateTime>,
        format: String,
        #[serde(default = "default_timezone")]
        timezone: String,
    },
    Factor {
        levels: Vec<String>,
    },
    Geo {
        latvar: String,
        longvar: String,
    },
    Href,
    Panel(PanelSpec),
}

impl MetaKind {
    pub fn meta_type(&self) -> MetaType {
        match self {
            MetaKind::String => MetaType::String,
            MetaKind::Number { .. } => MetaType::Number,
            MetaKind::Currency { .. } => MetaType::Currency,
            MetaKind::Date { .. } => MetaType::Date,
            MetaKind::Datetime { .. } => MetaType::Datetime,
            MetaKind::Factor { .. } => MetaType::Factor,
            MetaKind::Geo { .. } => MetaType::Geo,
            MetaKind::Href => MetaType::Href,
            MetaKind::Panel(_) => MetaType::Panel,
        }
    }
}

/// Descriptor of one variable or panel column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    varname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(flatten)]
    kind: MetaKind,
    filterable: bool,
    sortable: bool,
}

impl Meta {
    pub fn new(varname: impl Into<String>, kind: MetaKind) -> Self {
        let meta_type = kind.meta_type();
        Self {
            varname: varname.into(),
            label: None,
            tags: Vec::new(),
            kind,
            filterable: meta_type.is_filterable(),
            sortable: meta_type.is_sortable(),
        }
    }

    pub fn string(varname: impl Into<String>) -> Self {
        Self::new(varname, MetaKind::String)
    }

    pub fn number(varname: impl Into<String>) -> Self {
        Self::new(
            varname,
            MetaKind::Number {
                digits: None,
                locale: true,
                min: None,
                max: None,
            },
        )
    }

    /// Currency meta; `code` must be an ISO 4217 code.
    pub fn currency(varname: impl Into<String>, code: Option<&str>) -> Result<Self> {
        let meta = Self::new(
            varname,
            MetaKind::Currency {
                code: code.unwrap_or(DEFAULT_CURRENCY).to_string(),
                min: None,
                max: None,
            },
        );
        meta.check_definition()?;
        Ok(meta)
    }

    pub fn date(varname: impl Into<String>) -> Self {
        Self::new(
            varname,
            MetaKind::Date {
                min: None,
                max: None,
                format: DEFAULT_DATE_FORMAT.to_string(),
            },
        )
    }

    pub fn datetime(varname: impl Into<String>) -> Self {
        Self::new(
            varname,
            MetaKind::Datetime {
                min: None,
                max: None,
                format: DEFAULT_DATETIME_FORMAT.to_string(),
                timezone: default_timezone(),
            },
        )
    }

    pub fn factor(varname: impl Into<String>, levels: Vec<String>) -> Self {
        Self::new(varname, MetaKind::Factor { levels })
    }

    pub fn geo(
        varname: impl Into<String>,
        latvar: impl Into<String>,
        longvar: impl Into<String>,
    ) -> Self {
        Self::new(
            varname,
            MetaKind::Geo {
                latvar: latvar.into(),
                longvar: longvar.into(),
            },
        )
    }

    pub fn href(varname: impl Into<String>) -> Self {
        Self::new(varname, MetaKind::Href)
    }

    pub fn panel(varname: impl Into<String>, spec: PanelSpec) -> Self {
        Self::new(varname, MetaKind::Panel(spec))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the range of a number or currency meta. Ignored for other types.
    pub fn with_range(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        if let MetaKind::Number { min, max, .. } | MetaKind::Currency { min, max, .. } =
            &mut self.kind
        {
            *min = lower;
            *max = upper;
        }
        self
    }

    /// Set the displayed digits of a number meta. Ignored for other types.
    pub fn with_digits(mut self, value: u8) -> Self {
        if let MetaKind::Number { digits, .. } = &mut self.kind {
            *digits = Some(value);
        }
        self
    }

    pub fn varname(&self) -> &str {
        &self.varname
    }

    /// The label, falling back to the variable name.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.varname)
    }

    pub fn has_label(&self) -> bool {
        self.label.is_some()
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
    }

    pub fn kind(&self) -> &MetaKind {
        &self.kind
    }

    pub fn meta_type(&self) -> MetaType {
        self.kind.meta_type()
    }

    pub fn is_filterable(&self) -> bool {
        self.filterable
    }

    pub fn is_sortable(&self) -> bool {
        self.sortable
    }

    pub fn is_panel(&self) -> bool {
        matches!(self.kind, MetaKind::Panel(_))
    }

    pub fn panel_spec(&self) -> Option<&PanelSpec> {
        match &self.kind {
            MetaKind::Panel(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn levels(&self) -> Option<&[String]> {
        match &self.kind {
            MetaKind::Factor { levels } => Some(levels),
            _ => None,
        }
    }

    /// Dataset columns this meta reads: both coordinates for geo metas,
    /// otherwise the variable itself.
    pub fn source_columns(&self) -> Vec<&str> {
        match &self.kind {
            MetaKind::Geo { latvar, longvar } => vec![latvar.as_str(), longvar.as_str()],
            _ => vec![self.varname.as_str()],
        }
    }

    /// Whether a state of `state` kind may bind to this meta.
    pub fn check_compatible(&self, state: StateKind) -> bool {
        match state {
            StateKind::Layout => true,
            StateKind::Labels => self.meta_type().is_labelable(),
            StateKind::Sort => self.sortable,
            StateKind::Filter(kind) => self.filterable && kind.applies_to(self.meta_type()),
        }
    }

    pub fn require_compatible(&self, state: StateKind) -> Result<()> {
        if self.check_compatible(state) {
            Ok(())
        } else {
            Err(DisplayError::IncompatibleState {
                varname: self.varname.clone(),
                state,
                meta_type: self.meta_type(),
            })
        }
    }

    /// Whether a single value is acceptable for this meta. Missing values are
    /// always accepted.
    pub fn validate(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match &self.kind {
            MetaKind::String => true,
            MetaKind::Number { min, max, .. } | MetaKind::Currency { min, max, .. } => value
                .as_f64()
                .is_some_and(|v| min.is_none_or(|lo| v >= lo) && max.is_none_or(|hi| v <= hi)),
            MetaKind::Date { .. } => value.as_str().and_then(parse_date).is_some(),
            MetaKind::Datetime { .. } => value.as_str().and_then(parse_datetime).is_some(),
            MetaKind::Factor { levels } => {
                let text = value.to_string();
                levels.iter().any(|level| *level == text)
            }
            MetaKind::Geo { .. } => value.as_f64().is_some_and(|v| (-180.0..=180.0).contains(&v)),
            MetaKind::Href => value.as_str().is_some_and(is_url),
            MetaKind::Panel(_) => value.as_str().is_some_and(|s| !s.trim().is_empty()),
        }
    }

    /// Check the meta's own fields, independent of any data.
    pub fn check_definition(&self) -> Result<()> {
        if self.varname.trim().is_empty() {
            return Err(DisplayError::invalid_meta(&self.varname, "variable name is empty"));
        }
        match &self.kind {
            MetaKind::Number { min, max, .. } | MetaKind::Currency { min, max, .. } => {
                if let (Some(lo), Some(hi)) = (min, max)
                    && lo > hi
                {
                    return Err(DisplayError::invalid_meta(
                        &self.varname,
                        format!("min {lo} is greater than max {hi}"),
                    ));
                }
                if let MetaKind::Currency { code, .. } = &self.kind
                    && !is_valid_currency(code)
                {
                    return Err(DisplayError::invalid_meta(
                        &self.varname,
                        format!("`{code}` is not a known ISO 4217 currency code"),
                    ));
                }
            }
            MetaKind::Factor { levels } => {
                let mut seen = std::collections::HashSet::new();
                if let Some(dup) = levels.iter().find(|level| !seen.insert(level.as_str())) {
                    return Err(DisplayError::invalid_meta(
                        &self.varname,
                        format!("duplicate factor level `{dup}`"),
                    ));
                }
            }
            MetaKind::Geo { latvar, longvar } if latvar == longvar => {
                return Err(DisplayError::invalid_meta(
                    &self.varname,
                    "latitude and longitude must be different columns",
                ));
            }
            MetaKind::Panel(spec) if !(spec.aspect.is_finite() && spec.aspect > 0.0) => {
                return Err(DisplayError::invalid_meta(
                    &self.varname,
                    format!("panel aspect must be positive, got {}", spec.aspect),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// Check the meta against the column(s) it describes.
    pub fn check_with_data(&self, dataset: &Dataset) -> Result<()> {
        self.check_definition()?;
        match &self.kind {
            MetaKind::Geo { latvar, longvar } => {
                self.check_coordinate(dataset, latvar, 90.0)?;
                self.check_coordinate(dataset, longvar, 180.0)
            }
            MetaKind::Panel(_) => {
                let column = dataset.column(&self.varname).ok_or_else(|| {
                    DisplayError::MissingColumn {
                        varname: self.varname.clone(),
                    }
                })?;
                if let ColumnData::Values(values) = column
                    && let Some(row) = values
                        .iter()
                        .position(|value| !value.is_null() && value.as_str().is_none())
                {
                    return Err(DisplayError::invalid_meta(
                        &self.varname,
                        format!("row {row} is not a panel reference"),
                    ));
                }
                Ok(())
            }
            MetaKind::Href => {
                let values = scalar_column(dataset, &self.varname)?;
                match values
                    .iter()
                    .position(|value| !value.is_null() && value.as_str().is_none())
                {
                    Some(row) => Err(DisplayError::invalid_meta(
                        &self.varname,
                        format!("row {row} is not a link"),
                    )),
                    None => Ok(()),
                }
            }
            _ => {
                let values = scalar_column(dataset, &self.varname)?;
                match values.iter().position(|value| !self.validate(value)) {
                    Some(row) => Err(DisplayError::invalid_meta(
                        &self.varname,
                        format!(
                            "row {row} value `{}` is not a valid {} value",
                            values[row],
                            self.meta_type()
                        ),
                    )),
                    None => Ok(()),
                }
            }
        }
    }

    fn check_coordinate(&self, dataset: &Dataset, column: &str, bound: f64) -> Result<()> {
        let values = scalar_column(dataset, column)?;
        for (row, value) in values.iter().enumerate() {
            if value.is_null() {
                continue;
            }
            let in_bounds = value.as_f64().is_some_and(|v| (-bound..=bound).contains(&v));
            if !in_bounds {
                return Err(DisplayError::invalid_meta(
                    &self.varname,
                    format!("`{column}` row {row} value `{value}` is outside [-{bound}, {bound}]"),
                ));
            }
        }
        Ok(())
    }
}

fn scalar_column<'a>(dataset: &'a Dataset, column: &str) -> Result<&'a [Value]> {
    dataset
        .column(column)
        .ok_or_else(|| DisplayError::MissingColumn {
            varname: column.to_string(),
        })?
        .values()
        .ok_or_else(|| {
            DisplayError::invalid_meta(column, "column holds figures, not scalar values")
        })
}

/// Whether `text` is an absolute http(s) URL.
pub fn is_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://")
}

/// Ordered collection of metas, unique by variable name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaSet {
    metas: Vec<Meta>,
}

impl MetaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    pub fn get(&self, varname: &str) -> Option<&Meta> {
        self.metas.iter().find(|meta| meta.varname == varname)
    }

    pub fn get_mut(&mut self, varname: &str) -> Option<&mut Meta> {
        self.metas.iter_mut().find(|meta| meta.varname == varname)
    }

    pub fn contains(&self, varname: &str) -> bool {
        self.get(varname).is_some()
    }

    /// Insert a meta, replacing one with the same name in place. Returns the
    /// replaced meta.
    pub fn insert(&mut self, meta: Meta) -> Option<Meta> {
        match self.metas.iter().position(|m| m.varname == meta.varname) {
            Some(index) => Some(std::mem::replace(&mut self.metas[index], meta)),
            None => {
                self.metas.push(meta);
                None
            }
        }
    }

    pub fn remove(&mut self, varname: &str) -> Option<Meta> {
        let index = self.metas.iter().position(|m| m.varname == varname)?;
        Some(self.metas.remove(index))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Meta> {
        self.metas.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Meta> {
        self.metas.iter_mut()
    }

    pub fn names(&self) -> Vec<&str> {
        self.metas.iter().map(Meta::varname).collect()
    }

    pub fn panels(&self) -> impl Iterator<Item = &Meta> {
        self.metas.iter().filter(|meta| meta.is_panel())
    }

    /// Look up `varname` for a state binding and check the capability.
    pub fn resolve_for(&self, varname: &str, state: StateKind) -> Result<&Meta> {
        let meta = self.get(varname).ok_or_else(|| DisplayError::UnknownVariable {
            varname: varname.to_string(),
            state,
        })?;
        meta.require_compatible(state)?;
        Ok(meta)
    }
}

impl FromIterator<Meta> for MetaSet {
    fn from_iter<I: IntoIterator<Item = Meta>>(iter: I) -> Self {
        let mut set = MetaSet::new();
        for meta in iter {
            set.insert(meta);
        }
        set
    }
}

impl<'a> IntoIterator for &'a MetaSet {
    type Item = &'a Meta;
    type IntoIter = std::slice::Iter<'a, Meta>;

    fn into_iter(self) -> Self::IntoIter {
        self.metas.iter()
    }
}
