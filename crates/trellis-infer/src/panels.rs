//! Panel column detection.

use trellis_common::extension_of;
use trellis_model::{ColumnData, PanelKind, PanelSpec, PanelType, Value, is_url};

use crate::options::{IFRAME_EXTENSIONS, IMAGE_EXTENSIONS};

fn has_extension(reference: &str, extensions: &[&str]) -> bool {
    extension_of(reference).is_some_and(|ext| extensions.contains(&ext.as_str()))
}

fn references(values: &[Value]) -> Option<Vec<&str>> {
    let mut found = Vec::new();
    for value in values.iter().filter(|v| !v.is_null()) {
        found.push(value.as_str()?);
    }
    Some(found)
}

/// Panel spec of a column when its contents identify it as a panel column:
/// figures, or text that is entirely image paths or image URLs.
pub fn detect(column: &ColumnData) -> Option<PanelSpec> {
    match column {
        ColumnData::Figures(_) => Some(PanelSpec::new(PanelKind::Figure)),
        ColumnData::Values(values) => {
            let refs = references(values)?;
            if refs.is_empty() || !refs.iter().all(|r| has_extension(r, IMAGE_EXTENSIONS)) {
                return None;
            }
            Some(PanelSpec::new(kind_of(&refs)))
        }
    }
}

/// Panel spec for a column the caller declared as a panel.
pub fn spec_for_column(column: &ColumnData) -> PanelSpec {
    match column {
        ColumnData::Figures(_) => PanelSpec::new(PanelKind::Figure),
        ColumnData::Values(values) => spec_for_values(values),
    }
}

/// Panel spec for text references: remote when every reference is a URL,
/// embedded as an iframe when every reference is an HTML page.
pub fn spec_for_values(values: &[Value]) -> PanelSpec {
    let refs: Vec<&str> = values.iter().filter_map(Value::as_str).collect();
    let spec = PanelSpec::new(kind_of(&refs));
    if !refs.is_empty() && refs.iter().all(|r| has_extension(r, IFRAME_EXTENSIONS)) {
        spec.with_paneltype(PanelType::Iframe)
    } else {
        spec
    }
}

fn kind_of(refs: &[&str]) -> PanelKind {
    if !refs.is_empty() && refs.iter().all(|r| is_url(r)) {
        PanelKind::Remote
    } else {
        PanelKind::File
    }
}
