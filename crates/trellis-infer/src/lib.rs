//! Meta inference for trellis displays.
//!
//! [`infer`] partitions a dataset into panel and variable columns, infers a
//! [`Meta`] for every column, adds geo metas for coordinate pairs, and
//! searches for the key columns that identify each row.

pub mod classify;
pub mod keys;
pub mod options;
pub mod panels;

use tracing::{info, info_span, warn};
use trellis_model::{ColumnData, Dataset, Diagnostic, DisplayError, Meta, MetaSet, MetaType, Result};

pub use classify::{classify, detect_geo, infer_meta};
pub use keys::{KeySearch, check_keys, infer_keys};
pub use options::{IMAGE_EXTENSIONS, InferenceOptions};

/// Everything inferred from a dataset.
#[derive(Debug, Clone)]
pub struct Inference {
    /// One meta per column in dataset order, followed by detected geo metas.
    pub metas: MetaSet,
    pub key_columns: Vec<String>,
    pub panel_columns: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

fn require_column(dataset: &Dataset, name: &str) -> Result<()> {
    if dataset.has_column(name) {
        Ok(())
    } else {
        Err(DisplayError::MissingColumn {
            varname: name.to_string(),
        })
    }
}

/// Infer metas, panel columns, and key columns for `dataset`.
pub fn infer(dataset: &Dataset, options: &InferenceOptions) -> Result<Inference> {
    let span = info_span!("infer", rows = dataset.height(), columns = dataset.width());
    let _guard = span.enter();

    if dataset.width() == 0 {
        return Err(DisplayError::EmptyDataset {
            message: "no columns".to_string(),
        });
    }
    if dataset.height() == 0 {
        return Err(DisplayError::EmptyDataset {
            message: "no rows".to_string(),
        });
    }
    for name in options
        .panel_columns
        .iter()
        .chain(options.type_overrides.keys())
        .chain(options.key_columns.iter().flatten())
    {
        require_column(dataset, name)?;
    }

    let mut metas = MetaSet::new();
    let mut panel_columns = Vec::new();
    let mut variables = Vec::new();
    for name in dataset.column_names() {
        let Some(column) = dataset.column(name) else {
            continue;
        };
        let forced = options.type_overrides.get(name).copied();
        let declared = options.panel_columns.iter().any(|c| c == name);

        let panel = if declared || forced == Some(MetaType::Panel) {
            Some(panels::spec_for_column(column))
        } else if forced.is_some() {
            None
        } else {
            panels::detect(column)
        };

        match (panel, column) {
            (Some(spec), _) => {
                metas.insert(Meta::panel(name, spec));
                panel_columns.push(name.to_string());
            }
            (None, ColumnData::Values(values)) => {
                let meta = infer_meta(name, values, forced, options)?;
                if forced.is_some() {
                    meta.check_with_data(dataset)?;
                }
                metas.insert(meta);
                variables.push(name);
            }
            (None, ColumnData::Figures(_)) => {
                return Err(DisplayError::InvalidMeta {
                    varname: name.to_string(),
                    message: "figure columns can only be panels".to_string(),
                });
            }
        }
    }

    for geo in detect_geo(dataset, &metas, options) {
        metas.insert(geo);
    }

    let search = match &options.key_columns {
        Some(columns) => {
            if let Some(panel) = columns.iter().find(|c| panel_columns.contains(c)) {
                return Err(DisplayError::InvalidMeta {
                    varname: panel.clone(),
                    message: "panel columns cannot be key columns".to_string(),
                });
            }
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            check_keys(dataset, &columns)?
        }
        None => infer_keys(dataset, &variables)?,
    };

    let mut diagnostics = Vec::new();
    if let Some(diagnostic) = search.diagnostic {
        warn!(%diagnostic, "key columns do not identify every row");
        diagnostics.push(diagnostic);
    }

    info!(
        metas = metas.len(),
        panels = panel_columns.len(),
        keys = ?search.columns,
        "inferred display schema"
    );
    Ok(Inference {
        metas,
        key_columns: search.columns,
        panel_columns,
        diagnostics,
    })
}
