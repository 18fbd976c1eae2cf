use std::collections::BTreeMap;

use trellis_model::MetaType;

/// File extensions recognized as panel images.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "apng", "avif", "gif", "jpg", "jpeg", "jfif", "pjpeg", "pjp", "png", "svg", "webp",
];

/// File extensions embedded as iframes when a column is forced to be a panel.
pub const IFRAME_EXTENSIONS: &[&str] = &["html", "htm"];

/// Parameters and caller hints for meta inference.
#[derive(Debug, Clone)]
pub struct InferenceOptions {
    /// A text column is a factor when its distinct count is below this
    /// fraction of its non-missing rows.
    /// Defaults to 0.8.
    pub factor_ratio: f64,

    /// Upper bound on the number of factor levels.
    /// Defaults to 1000.
    pub max_factor_levels: usize,

    /// Number of metas used as default labels.
    /// Defaults to 3.
    pub label_count: usize,

    /// Widest default grid.
    /// Defaults to 5.
    pub max_ncol: u32,

    /// Column names (or `_`-separated suffixes) read as latitude.
    pub latitude_names: Vec<String>,

    /// Column names (or `_`-separated suffixes) read as longitude.
    pub longitude_names: Vec<String>,

    /// Columns forced to be panels, in addition to detected ones.
    pub panel_columns: Vec<String>,

    /// Explicit key columns; inferred when `None`.
    pub key_columns: Option<Vec<String>>,

    /// Per-column type overrides; take precedence over every inference rule.
    pub type_overrides: BTreeMap<String, MetaType>,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            factor_ratio: 0.8,
            max_factor_levels: 1000,
            label_count: 3,
            max_ncol: 5,
            latitude_names: vec!["lat".into(), "latitude".into()],
            longitude_names: vec![
                "lon".into(),
                "lng".into(),
                "long".into(),
                "longitude".into(),
            ],
            panel_columns: Vec::new(),
            key_columns: None,
            type_overrides: BTreeMap::new(),
        }
    }
}

impl InferenceOptions {
    pub fn with_factor_ratio(mut self, ratio: f64) -> Self {
        self.factor_ratio = ratio;
        self
    }

    pub fn with_max_factor_levels(mut self, levels: usize) -> Self {
        self.max_factor_levels = levels;
        self
    }

    pub fn with_label_count(mut self, count: usize) -> Self {
        self.label_count = count;
        self
    }

    pub fn with_max_ncol(mut self, ncol: u32) -> Self {
        self.max_ncol = ncol;
        self
    }

    pub fn with_panel_column(mut self, column: impl Into<String>) -> Self {
        self.panel_columns.push(column.into());
        self
    }

    pub fn with_key_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.key_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_type_override(mut self, column: impl Into<String>, meta_type: MetaType) -> Self {
        self.type_overrides.insert(column.into(), meta_type);
        self
    }

    /// Whether `distinct` values over `rows` non-missing rows qualify as a
    /// factor.
    pub fn is_factor_cardinality(&self, distinct: usize, rows: usize) -> bool {
        distinct > 0
            && distinct <= self.max_factor_levels
            && (distinct as f64) < self.factor_ratio * rows as f64
    }
}
