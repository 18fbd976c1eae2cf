//! Data model for trellis displays.
//!
//! - [`Dataset`]: the tabular input, one row per panel
//! - [`Meta`] / [`MetaSet`]: typed column descriptors and their capabilities
//! - [`DisplayState`] / [`View`]: layout, labels, sort, and filter defaults
//! - [`DisplayError`] / [`Diagnostic`]: fatal errors and non-fatal findings

pub mod currency;
pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod meta;
pub mod state;
pub mod temporal;

pub use currency::{DEFAULT_CURRENCY, is_valid_currency};
pub use dataset::{ColumnData, Dataset, Figure, Group, Row, Value};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{DisplayError, Result};
pub use meta::{
    Meta, MetaKind, MetaSet, MetaType, PanelKind, PanelSource, PanelSpec, PanelType, SourceType,
    is_url,
};
pub use state::{
    DisplayState, FilterKind, FilterState, LabelState, LayoutState, SortDirection, SortEntry,
    SortState, StateKind, View, ViewType,
};
