//! View state: layout, labels, sort, and filters.
//!
//! Each state validates itself against a [`MetaSet`]. Merge policy when a
//! new state is set on a [`DisplayState`]:
//!
//! - layout, labels, sort: the new state replaces the previous one wholesale
//! - filters: appended, or replacing the existing filter on the same variable

use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DisplayError, Result};
use crate::meta::{MetaSet, MetaType};

/// Kind of filter, as written in the `filtertype` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Category,
    NumberRange,
    DateRange,
    DatetimeRange,
    StringSearch,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Category => "category",
            FilterKind::NumberRange => "numberrange",
            FilterKind::DateRange => "daterange",
            FilterKind::DatetimeRange => "datetimerange",
            FilterKind::StringSearch => "stringsearch",
        }
    }

    /// Meta types this filter can bind to.
    pub fn applies_to(self, meta_type: MetaType) -> bool {
        match self {
            FilterKind::Category => matches!(meta_type, MetaType::Factor | MetaType::String),
            FilterKind::NumberRange => meta_type.is_numeric(),
            FilterKind::DateRange => matches!(meta_type, MetaType::Date | MetaType::Datetime),
            FilterKind::DatetimeRange => meta_type == MetaType::Datetime,
            FilterKind::StringSearch => matches!(meta_type, MetaType::String | MetaType::Factor),
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of state binding to a meta, used in compatibility checks and
/// error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    Layout,
    Labels,
    Sort,
    Filter(FilterKind),
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKind::Layout => f.write_str("layout"),
            StateKind::Labels => f.write_str("labels"),
            StateKind::Sort => f.write_str("sort"),
            StateKind::Filter(kind) => write!(f, "{kind} filter"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    #[default]
    Grid,
    Table,
}

/// Panel arrangement and the initial page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutState {
    pub ncol: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nrow: Option<u32>,
    pub page: u32,
    #[serde(default)]
    pub viewtype: ViewType,
}

impl LayoutState {
    pub fn new(ncol: u32) -> Self {
        Self {
            ncol,
            nrow: None,
            page: 1,
            viewtype: ViewType::Grid,
        }
    }

    /// A single-page grid sized to hold `panels` panels, at most `max_ncol`
    /// wide.
    pub fn for_panel_count(panels: usize, max_ncol: u32) -> Self {
        let max_ncol = max_ncol.max(1);
        let panels = u32::try_from(panels.max(1)).unwrap_or(u32::MAX);
        let mut ncol = 1u32;
        while ncol < max_ncol && ncol.saturating_mul(ncol) < panels {
            ncol += 1;
        }
        Self {
            nrow: Some(panels.div_ceil(ncol)),
            ..Self::new(ncol)
        }
    }

    pub fn with_nrow(mut self, nrow: u32) -> Self {
        self.nrow = Some(nrow);
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_viewtype(mut self, viewtype: ViewType) -> Self {
        self.viewtype = viewtype;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ncol == 0 {
            return Err(DisplayError::invalid_state(
                StateKind::Layout,
                "ncol must be at least 1",
            ));
        }
        if self.nrow == Some(0) {
            return Err(DisplayError::invalid_state(
                StateKind::Layout,
                "nrow must be at least 1",
            ));
        }
        if self.page == 0 {
            return Err(DisplayError::invalid_state(
                StateKind::Layout,
                "page numbers start at 1",
            ));
        }
        Ok(())
    }
}

/// Ordered variables shown under each panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelState {
    pub varnames: Vec<String>,
}

impl LabelState {
    pub fn new<S: Into<String>>(varnames: impl IntoIterator<Item = S>) -> Self {
        Self {
            varnames: varnames.into_iter().map(Into::into).collect(),
        }
    }

    pub fn validate(&self, metas: &MetaSet) -> Result<()> {
        check_unique(StateKind::Labels, self.varnames.iter().map(String::as_str))?;
        for varname in &self.varnames {
            metas.resolve_for(varname, StateKind::Labels)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub varname: String,
    pub dir: SortDirection,
}

impl SortEntry {
    pub fn asc(varname: impl Into<String>) -> Self {
        Self {
            varname: varname.into(),
            dir: SortDirection::Asc,
        }
    }

    pub fn desc(varname: impl Into<String>) -> Self {
        Self {
            varname: varname.into(),
            dir: SortDirection::Desc,
        }
    }
}

/// Ordered sort specification. Always replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortState {
    entries: Vec<SortEntry>,
}

impl SortState {
    pub fn new(entries: Vec<SortEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[SortEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn validate(&self, metas: &MetaSet) -> Result<()> {
        check_unique(
            StateKind::Sort,
            self.entries.iter().map(|entry| entry.varname.as_str()),
        )?;
        for entry in &self.entries {
            metas.resolve_for(&entry.varname, StateKind::Sort)?;
        }
        Ok(())
    }
}

/// A filter bound to a single variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filtertype", rename_all = "lowercase")]
pub enum FilterState {
    Category {
        varname: String,
        #[serde(default)]
        values: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        regexp: Option<String>,
    },
    NumberRange {
        varname: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    DateRange {
        varname: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<NaiveDate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<NaiveDate>,
    },
    DatetimeRange {
        varname: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<NaiveDateTime>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<NaiveDateTime>,
    },
    StringSearch {
        varname: String,
        pattern: String,
        #[serde(default)]
        case_sensitive: bool,
    },
}

impl FilterState {
    pub fn category<S: Into<String>>(
        varname: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        FilterState::Category {
            varname: varname.into(),
            values: values.into_iter().map(Into::into).collect(),
            regexp: None,
        }
    }

    pub fn category_regexp(varname: impl Into<String>, regexp: impl Into<String>) -> Self {
        FilterState::Category {
            varname: varname.into(),
            values: Vec::new(),
            regexp: Some(regexp.into()),
        }
    }

    pub fn number_range(varname: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        FilterState::NumberRange {
            varname: varname.into(),
            min,
            max,
        }
    }

    pub fn date_range(
        varname: impl Into<String>,
        min: Option<NaiveDate>,
        max: Option<NaiveDate>,
    ) -> Self {
        FilterState::DateRange {
            varname: varname.into(),
            min,
            max,
        }
    }

    pub fn datetime_range(
        varname: impl Into<String>,
        min: Option<NaiveDateTime>,
        max: Option<NaiveDateTime>,
    ) -> Self {
        FilterState::DatetimeRange {
            varname: varname.into(),
            min,
            max,
        }
    }

    pub fn string_search(varname: impl Into<String>, pattern: impl Into<String>) -> Self {
        FilterState::StringSearch {
            varname: varname.into(),
            pattern: pattern.into(),
            case_sensitive: false,
        }
    }

    pub fn varname(&self) -> &str {
        match self {
            FilterState::Category { varname, .. }
            | FilterState::NumberRange { varname, .. }
            | FilterState::DateRange { varname, .. }
            | FilterState::DatetimeRange { varname, .. }
            | FilterState::StringSearch { varname, .. } => varname,
        }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            FilterState::Category { .. } => FilterKind::Category,
            FilterState::NumberRange { .. } => FilterKind::NumberRange,
            FilterState::DateRange { .. } => FilterKind::DateRange,
            FilterState::DatetimeRange { .. } => FilterKind::DatetimeRange,
            FilterState::StringSearch { .. } => FilterKind::StringSearch,
        }
    }

    pub fn state_kind(&self) -> StateKind {
        StateKind::Filter(self.kind())
    }

    pub fn validate(&self, metas: &MetaSet) -> Result<()> {
        let state = self.state_kind();
        let meta = metas.resolve_for(self.varname(), state)?;
        match self {
            FilterState::Category { values, regexp, .. } => {
                if values.is_empty() && regexp.is_none() {
                    return Err(DisplayError::invalid_state(
                        state,
                        format!("filter on `{}` selects no values", self.varname()),
                    ));
                }
                if let Some(pattern) = regexp {
                    Regex::new(pattern).map_err(|err| {
                        DisplayError::invalid_state(state, format!("invalid regexp: {err}"))
                    })?;
                }
                if let Some(levels) = meta.levels()
                    && let Some(unknown) = values.iter().find(|value| !levels.contains(value))
                {
                    return Err(DisplayError::invalid_state(
                        state,
                        format!("`{unknown}` is not a level of `{}`", self.varname()),
                    ));
                }
                Ok(())
            }
            FilterState::NumberRange { min, max, .. } => check_range(state, *min, *max),
            FilterState::DateRange { min, max, .. } => check_range(state, *min, *max),
            FilterState::DatetimeRange { min, max, .. } => check_range(state, *min, *max),
            FilterState::StringSearch { pattern, .. } => {
                if pattern.is_empty() {
                    return Err(DisplayError::invalid_state(state, "search pattern is empty"));
                }
                Ok(())
            }
        }
    }
}

fn check_range<T: PartialOrd + fmt::Display>(
    state: StateKind,
    min: Option<T>,
    max: Option<T>,
) -> Result<()> {
    match (min, max) {
        (None, None) => Err(DisplayError::invalid_state(
            state,
            "range needs a min or a max",
        )),
        (Some(lo), Some(hi)) if lo > hi => Err(DisplayError::invalid_state(
            state,
            format!("min {lo} is greater than max {hi}"),
        )),
        _ => Ok(()),
    }
}

fn check_unique<'a>(state: StateKind, varnames: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for varname in varnames {
        if !seen.insert(varname) {
            return Err(DisplayError::invalid_state(
                state,
                format!("`{varname}` appears more than once"),
            ));
        }
    }
    Ok(())
}

/// The complete initial view of a display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayState {
    layout: LayoutState,
    labels: LabelState,
    #[serde(default)]
    sort: SortState,
    #[serde(default)]
    filter: Vec<FilterState>,
}

impl DisplayState {
    pub fn new(layout: LayoutState, labels: LabelState, sort: SortState) -> Self {
        Self {
            layout,
            labels,
            sort,
            filter: Vec::new(),
        }
    }

    pub fn layout(&self) -> &LayoutState {
        &self.layout
    }

    pub fn labels(&self) -> &LabelState {
        &self.labels
    }

    pub fn sort(&self) -> &SortState {
        &self.sort
    }

    pub fn filters(&self) -> &[FilterState] {
        &self.filter
    }

    pub fn filter_on(&self, varname: &str) -> Option<&FilterState> {
        self.filter.iter().find(|f| f.varname() == varname)
    }

    /// Validate every state against `metas`, stopping at the first invalid
    /// binding.
    pub fn validate(&self, metas: &MetaSet) -> Result<()> {
        self.layout.validate()?;
        self.labels.validate(metas)?;
        self.sort.validate(metas)?;
        let mut seen = HashSet::new();
        for filter in &self.filter {
            if !seen.insert(filter.varname()) {
                return Err(DisplayError::invalid_state(
                    filter.state_kind(),
                    format!("`{}` has more than one filter", filter.varname()),
                ));
            }
            filter.validate(metas)?;
        }
        Ok(())
    }

    pub fn set_layout(&mut self, layout: LayoutState) {
        info!(ncol = layout.ncol, page = layout.page, "replacing existing layout state");
        self.layout = layout;
    }

    pub fn set_labels(&mut self, labels: LabelState) {
        info!(labels = ?labels.varnames, "replacing existing labels state");
        self.labels = labels;
    }

    pub fn set_sort(&mut self, sort: SortState) {
        info!(entries = sort.entries.len(), "replacing existing sort state");
        self.sort = sort;
    }

    /// Append `filter`, or replace the filter already bound to its variable.
    /// Returns the replaced filter.
    pub fn set_filter(&mut self, filter: FilterState) -> Option<FilterState> {
        match self
            .filter
            .iter()
            .position(|existing| existing.varname() == filter.varname())
        {
            Some(index) => {
                info!(varname = filter.varname(), "replacing existing filter state");
                Some(std::mem::replace(&mut self.filter[index], filter))
            }
            None => {
                self.filter.push(filter);
                None
            }
        }
    }

    pub fn remove_filter(&mut self, varname: &str) -> Option<FilterState> {
        let index = self.filter.iter().position(|f| f.varname() == varname)?;
        Some(self.filter.remove(index))
    }

    pub fn clear_filters(&mut self) {
        self.filter.clear();
    }

    /// The first state that references `varname`, if any.
    pub fn references(&self, varname: &str) -> Option<StateKind> {
        if self.labels.varnames.iter().any(|v| v == varname) {
            return Some(StateKind::Labels);
        }
        if self.sort.entries.iter().any(|e| e.varname == varname) {
            return Some(StateKind::Sort);
        }
        self.filter_on(varname).map(FilterState::state_kind)
    }
}

/// A named alternative state offered by the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub state: DisplayState,
}

impl View {
    pub fn new(name: impl Into<String>, state: DisplayState) -> Self {
        Self {
            name: name.into(),
            state,
        }
    }

    pub fn validate(&self, metas: &MetaSet) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DisplayError::invalid_state(
                StateKind::Layout,
                "view name is empty",
            ));
        }
        self.state.validate(metas)
    }
}
