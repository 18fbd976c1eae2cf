//! CSV input.
//!
//! Files are read through the polars CSV reader, which infers column types
//! from the leading rows. Empty cells are missing values.

use std::path::Path;

use anyhow::{Context, Result, bail};
use polars::prelude::{CsvReadOptions, DataFrame, SerReader};
use tracing::{debug, warn};
use trellis_core::Dataset;

/// Rows scanned when inferring column types.
const INFER_SCHEMA_ROWS: usize = 100;

/// Read a CSV file with a header row into a [`Dataset`].
pub fn read_csv_dataset(path: &Path) -> Result<Dataset> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("open {}", path.display()))?
        .finish()
        .with_context(|| format!("parse {}", path.display()))?;
    check_shape(&df, path)?;
    debug!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "read csv"
    );
    Dataset::from_frame(&df).with_context(|| format!("build dataset from {}", path.display()))
}

fn check_shape(df: &DataFrame, path: &Path) -> Result<()> {
    if df.width() > 500 {
        warn!(
            path = %path.display(),
            columns = df.width(),
            "wide input, inference may be slow"
        );
    }
    if df.get_column_names().iter().any(|name| name.trim().is_empty()) {
        bail!("{} has an empty column name", path.display());
    }
    Ok(())
}
