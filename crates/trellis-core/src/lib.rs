//! Build, configure, and write trellis displays.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use trellis_core::{BuildOptions, ColumnData, Dataset, Display, Value, WriteOptions};
//!
//! # fn main() -> trellis_core::Result<()> {
//! let dataset = Dataset::new(vec![
//!     ("country", ColumnData::Values(vec![Value::from("Belgium"), Value::from("Chile")])),
//!     ("plot", ColumnData::Values(vec![Value::from("a.png"), Value::from("b.png")])),
//! ])?;
//! let mut display = Display::build(dataset, "life expectancy", BuildOptions::default())?;
//! display.write(Path::new("trellis_out"), &WriteOptions::default())?;
//! # Ok(())
//! # }
//! ```

pub mod display;
pub mod facet;

pub use display::{BuildOptions, Display, MetaOverride};
pub use facet::facet_panels;
pub use trellis_infer::InferenceOptions;
pub use trellis_model::{
    ColumnData, Dataset, Diagnostic, DiagnosticKind, DisplayError, DisplayState, Figure,
    FilterState, LabelState, LayoutState, Meta, MetaKind, MetaSet, MetaType, PanelKind, PanelSpec,
    PanelType, Result, SortDirection, SortEntry, SortState, StateKind, Value, View, ViewType,
};
pub use trellis_output::{OutputFormat, ViewerLauncher, WriteOptions, WrittenDisplayHandle};
