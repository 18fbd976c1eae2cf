//! The display aggregate.
//!
//! A [`Display`] owns a dataset, its metas, key columns, default state, and
//! views. [`Display::build`] infers what the caller did not supply; every
//! setter validates against the current metas before committing, so a failed
//! call leaves the display unchanged. Once written, the display is frozen.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, info_span};
use trellis_infer::{InferenceOptions, infer};
use trellis_model::{
    Dataset, Diagnostic, DisplayError, DisplayState, FilterState, LabelState, LayoutState, Meta,
    MetaSet, MetaType, Result, SortEntry, SortState, StateKind, View,
};
use trellis_output::{DisplayContent, WriteOptions, WrittenDisplayHandle, write_display};

/// Field-level overrides applied over an inferred meta.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaOverride {
    pub label: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Forces the inferred type.
    pub meta_type: Option<MetaType>,
    /// Width over height of a panel column.
    pub aspect: Option<f64>,
}

impl MetaOverride {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn meta_type(meta_type: MetaType) -> Self {
        Self {
            meta_type: Some(meta_type),
            ..Self::default()
        }
    }
}

/// Caller-supplied settings for [`Display::build`].
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Inference parameters, panel columns, key columns, and type overrides.
    pub inference: InferenceOptions,
    /// Complete metas replacing inferred ones of the same name.
    pub metas: Vec<Meta>,
    pub meta_overrides: BTreeMap<String, MetaOverride>,
    pub layout: Option<LayoutState>,
    pub labels: Option<LabelState>,
    pub sort: Option<SortState>,
    pub filters: Vec<FilterState>,
    pub views: Vec<View>,
    pub primary_panel: Option<String>,
}

impl BuildOptions {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_inference(mut self, inference: InferenceOptions) -> Self {
        self.inference = inference;
        self
    }

    pub fn with_panel_column(mut self, column: impl Into<String>) -> Self {
        self.inference.panel_columns.push(column.into());
        self
    }

    pub fn with_key_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.inference.key_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.metas.push(meta);
        self
    }

    pub fn with_meta_override(mut self, varname: impl Into<String>, value: MetaOverride) -> Self {
        self.meta_overrides.insert(varname.into(), value);
        self
    }

    pub fn with_layout(mut self, layout: LayoutState) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_labels(mut self, labels: LabelState) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_sort(mut self, sort: SortState) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_filter(mut self, filter: FilterState) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_view(mut self, view: View) -> Self {
        self.views.push(view);
        self
    }

    pub fn with_primary_panel(mut self, column: impl Into<String>) -> Self {
        self.primary_panel = Some(column.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Display {
    name: String,
    description: String,
    tags: Vec<String>,
    dataset: Dataset,
    metas: MetaSet,
    key_columns: Vec<String>,
    state: DisplayState,
    views: Vec<View>,
    primary_panel: Option<String>,
    diagnostics: Vec<Diagnostic>,
    written: bool,
}

impl Display {
    /// Infer metas and key columns, apply caller overrides, and synthesize
    /// any missing default state.
    pub fn build(dataset: Dataset, name: impl Into<String>, options: BuildOptions) -> Result<Self> {
        let name = name.into();
        let span = info_span!("build", display = %name);
        let _guard = span.enter();

        if name.trim().is_empty() {
            return Err(DisplayError::InvalidDataset {
                message: "display name is empty".to_string(),
            });
        }

        let mut inference_options = options.inference.clone();
        for (varname, value) in &options.meta_overrides {
            if let Some(meta_type) = value.meta_type {
                inference_options
                    .type_overrides
                    .insert(varname.clone(), meta_type);
            }
        }
        let inference = infer(&dataset, &inference_options)?;
        let mut metas = inference.metas;

        for meta in options.metas {
            meta.check_with_data(&dataset)?;
            if let Some(previous) = metas.insert(meta) {
                debug!(varname = previous.varname(), "replacing inferred meta");
            }
        }
        for (varname, value) in &options.meta_overrides {
            apply_override(&mut metas, varname, value)?;
        }
        finalize_labels(&mut metas);

        let key_columns = inference.key_columns;
        if let Some(key) = key_columns
            .iter()
            .find(|key| metas.get(key).is_some_and(Meta::is_panel))
        {
            return Err(DisplayError::InvalidMeta {
                varname: key.clone(),
                message: "key columns cannot be panels".to_string(),
            });
        }

        let layout = options.layout.unwrap_or_else(|| {
            LayoutState::for_panel_count(dataset.height(), inference_options.max_ncol)
        });
        let labels = options
            .labels
            .unwrap_or_else(|| default_labels(&metas, inference_options.label_count));
        let sort = options
            .sort
            .unwrap_or_else(|| default_sort(&metas, &key_columns));
        let state = DisplayState::new(layout, labels, sort);
        state.validate(&metas)?;

        let mut built = Display {
            name,
            description: options.description.unwrap_or_default(),
            tags: options.tags,
            dataset,
            metas,
            key_columns,
            state,
            views: Vec::new(),
            primary_panel: None,
            diagnostics: inference.diagnostics,
            written: false,
        };
        for filter in options.filters {
            built.set_filter(filter)?;
        }
        for view in options.views {
            built.add_view(view)?;
        }
        if let Some(column) = options.primary_panel {
            built.set_primary_panel(column)?;
        }

        info!(
            rows = built.dataset.height(),
            metas = built.metas.len(),
            keys = ?built.key_columns,
            "display built"
        );
        Ok(built)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn metas(&self) -> &MetaSet {
        &self.metas
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn panel_columns(&self) -> Vec<&str> {
        self.metas.panels().map(Meta::varname).collect()
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    /// The explicitly chosen primary panel; the first panel column is used
    /// otherwise.
    pub fn primary_panel(&self) -> Option<&str> {
        self.primary_panel.as_deref()
    }

    /// Non-fatal findings from inference.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_written(&self) -> bool {
        self.written
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.written {
            return Err(DisplayError::AlreadyWritten {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Check that the current state and views still hold under `metas`.
    fn validate_against(&self, metas: &MetaSet) -> Result<()> {
        self.state.validate(metas)?;
        for view in &self.views {
            view.validate(metas)?;
        }
        Ok(())
    }

    /// Add a meta or replace the one with the same name.
    pub fn set_meta(&mut self, meta: Meta) -> Result<&mut Self> {
        self.ensure_mutable()?;
        meta.check_with_data(&self.dataset)?;
        if meta.is_panel() && self.key_columns.iter().any(|k| k == meta.varname()) {
            return Err(DisplayError::InvalidMeta {
                varname: meta.varname().to_string(),
                message: "key columns cannot be panels".to_string(),
            });
        }
        let mut candidate = self.metas.clone();
        let mut meta = meta;
        if !meta.has_label() {
            let label = meta.varname().to_string();
            meta.set_label(label);
        }
        candidate.insert(meta);
        self.validate_against(&candidate)?;
        if let Some(primary) = &self.primary_panel
            && !candidate.get(primary).is_some_and(Meta::is_panel)
        {
            return Err(DisplayError::InvalidMeta {
                varname: primary.clone(),
                message: "primary panel must stay a panel meta".to_string(),
            });
        }
        self.metas = candidate;
        Ok(self)
    }

    /// Remove a meta that no key column, state, or view depends on.
    pub fn remove_meta(&mut self, varname: &str) -> Result<&mut Self> {
        self.ensure_mutable()?;
        if !self.metas.contains(varname) {
            return Err(DisplayError::InvalidMeta {
                varname: varname.to_string(),
                message: "no such meta".to_string(),
            });
        }
        let in_use = |reason: String| DisplayError::InvalidMeta {
            varname: varname.to_string(),
            message: format!("cannot remove a meta used by {reason}"),
        };
        if self.key_columns.iter().any(|k| k == varname) {
            return Err(in_use("the key columns".to_string()));
        }
        if self.primary_panel.as_deref() == Some(varname) {
            return Err(in_use("the primary panel".to_string()));
        }
        if let Some(kind) = self.state.references(varname) {
            return Err(in_use(format!("the {kind} state")));
        }
        if let Some(view) = self.views.iter().find(|v| v.state.references(varname).is_some()) {
            return Err(in_use(format!("view `{}`", view.name)));
        }
        self.metas.remove(varname);
        Ok(self)
    }

    pub fn set_layout(&mut self, layout: LayoutState) -> Result<&mut Self> {
        self.ensure_mutable()?;
        layout.validate()?;
        self.state.set_layout(layout);
        Ok(self)
    }

    pub fn set_labels(&mut self, labels: LabelState) -> Result<&mut Self> {
        self.ensure_mutable()?;
        labels.validate(&self.metas)?;
        self.state.set_labels(labels);
        Ok(self)
    }

    /// Replace the whole sort specification.
    pub fn set_sort(&mut self, sort: SortState) -> Result<&mut Self> {
        self.ensure_mutable()?;
        sort.validate(&self.metas)?;
        self.state.set_sort(sort);
        Ok(self)
    }

    /// Add a filter, replacing any existing filter on the same variable.
    pub fn set_filter(&mut self, filter: FilterState) -> Result<&mut Self> {
        self.ensure_mutable()?;
        filter.validate(&self.metas)?;
        self.state.set_filter(filter);
        Ok(self)
    }

    pub fn remove_filter(&mut self, varname: &str) -> Result<&mut Self> {
        self.ensure_mutable()?;
        if self.state.remove_filter(varname).is_none() {
            debug!(varname, "no filter to remove");
        }
        Ok(self)
    }

    pub fn clear_filters(&mut self) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.state.clear_filters();
        Ok(self)
    }

    /// Add a view, replacing one with the same name.
    pub fn add_view(&mut self, view: View) -> Result<&mut Self> {
        self.ensure_mutable()?;
        view.validate(&self.metas)?;
        match self.views.iter_mut().find(|v| v.name == view.name) {
            Some(existing) => {
                info!(view = %view.name, "replacing existing view");
                *existing = view;
            }
            None => self.views.push(view),
        }
        Ok(self)
    }

    pub fn set_primary_panel(&mut self, column: impl Into<String>) -> Result<&mut Self> {
        self.ensure_mutable()?;
        let column = column.into();
        if !self.metas.get(&column).is_some_and(Meta::is_panel) {
            return Err(DisplayError::InvalidMeta {
                varname: column,
                message: "primary panel must be a panel meta".to_string(),
            });
        }
        self.primary_panel = Some(column);
        Ok(self)
    }

    /// Write the display under `root`. Can be repeated; setters are rejected
    /// afterwards.
    pub fn write(&mut self, root: &Path, options: &WriteOptions) -> Result<WrittenDisplayHandle> {
        let content = DisplayContent {
            name: &self.name,
            description: &self.description,
            tags: &self.tags,
            dataset: &self.dataset,
            metas: &self.metas,
            key_columns: &self.key_columns,
            state: &self.state,
            views: &self.views,
            primary_panel: self.primary_panel.as_deref(),
        };
        let mut handle = write_display(&content, root, options)?;
        self.written = true;
        let mut diagnostics = self.diagnostics.clone();
        diagnostics.append(&mut handle.diagnostics);
        handle.diagnostics = diagnostics;
        Ok(handle)
    }
}

fn apply_override(metas: &mut MetaSet, varname: &str, value: &MetaOverride) -> Result<()> {
    let meta = metas
        .get_mut(varname)
        .ok_or_else(|| DisplayError::InvalidMeta {
            varname: varname.to_string(),
            message: "override targets a column without a meta".to_string(),
        })?;
    if let Some(label) = &value.label {
        meta.set_label(label.clone());
    }
    if let Some(tags) = &value.tags {
        meta.set_tags(tags.clone());
    }
    if let Some(aspect) = value.aspect {
        let Some(spec) = meta.panel_spec() else {
            return Err(DisplayError::InvalidMeta {
                varname: varname.to_string(),
                message: "aspect applies to panel columns only".to_string(),
            });
        };
        let updated = Meta::panel(varname, spec.clone().with_aspect(aspect))
            .with_label(meta.label().to_string())
            .with_tags(meta.tags().to_vec());
        updated.check_definition()?;
        *meta = updated;
    }
    Ok(())
}

fn finalize_labels(metas: &mut MetaSet) {
    for meta in metas.iter_mut() {
        if !meta.has_label() {
            let label = meta.varname().to_string();
            meta.set_label(label);
        }
    }
}

/// The first `count` labelable metas.
fn default_labels(metas: &MetaSet, count: usize) -> LabelState {
    LabelState::new(
        metas
            .iter()
            .filter(|meta| meta.check_compatible(StateKind::Labels))
            .take(count)
            .map(Meta::varname),
    )
}

/// Ascending by every sortable key column.
fn default_sort(metas: &MetaSet, key_columns: &[String]) -> SortState {
    SortState::new(
        key_columns
            .iter()
            .filter(|key| metas.get(key).is_some_and(Meta::is_sortable))
            .map(SortEntry::asc)
            .collect(),
    )
}
