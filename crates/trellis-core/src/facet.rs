//! Build one figure per group of a dataset.

use std::sync::Arc;

use tracing::debug;
use trellis_model::{ColumnData, Dataset, DisplayError, Figure, Result};

/// Group `dataset` by `facet_columns` and call `plot` on each group.
///
/// The result has one row per group, in order of first appearance: the
/// facet columns followed by `panel_column` holding the figures. A group for
/// which `plot` returns `None` gets no figure and is written as a placeholder
/// panel.
pub fn facet_panels<F>(
    dataset: &Dataset,
    facet_columns: &[&str],
    panel_column: &str,
    mut plot: F,
) -> Result<Dataset>
where
    F: FnMut(&Dataset) -> Option<Arc<dyn Figure>>,
{
    if facet_columns.contains(&panel_column) {
        return Err(DisplayError::InvalidDataset {
            message: format!("panel column `{panel_column}` is also a facet column"),
        });
    }

    let groups = dataset.group_by(facet_columns)?;
    let mut keys: Vec<Vec<_>> = vec![Vec::with_capacity(groups.len()); facet_columns.len()];
    let mut figures = Vec::with_capacity(groups.len());
    for group in &groups {
        let subset = dataset.take(&group.rows)?;
        figures.push(plot(&subset));
        for (column, value) in keys.iter_mut().zip(&group.keys) {
            column.push(value.clone());
        }
    }
    debug!(groups = groups.len(), panel_column, "faceted dataset");

    let mut columns: Vec<(String, ColumnData)> = facet_columns
        .iter()
        .zip(keys)
        .map(|(name, values)| ((*name).to_string(), ColumnData::Values(values)))
        .collect();
    columns.push((panel_column.to_string(), ColumnData::Figures(figures)));
    Dataset::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::Path;
    use trellis_model::Value;

    struct Rows(usize);

    impl Figure for Rows {
        fn render_to_file(&self, path: &Path) -> io::Result<()> {
            std::fs::write(path, self.0.to_string())
        }
    }

    fn population() -> Dataset {
        let country = ["Belgium", "Belgium", "Singapore", "Belgium", "Singapore"];
        let year = [1977, 1982, 1977, 1987, 1982];
        Dataset::new(vec![
            (
                "Country",
                ColumnData::Values(country.iter().map(|c| Value::from(*c)).collect()),
            ),
            (
                "Year",
                ColumnData::Values(year.iter().map(|y| Value::Int(*y)).collect()),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_one_row_per_group() {
        let mut sizes = Vec::new();
        let faceted = facet_panels(&population(), &["Country"], "panel", |group| {
            sizes.push(group.height());
            Some(Arc::new(Rows(group.height())) as Arc<dyn Figure>)
        })
        .unwrap();
        assert_eq!(sizes, vec![3, 2]);
        assert_eq!(faceted.height(), 2);
        assert_eq!(faceted.column_names(), vec!["Country", "panel"]);
        assert_eq!(faceted.value("Country", 1), Some(&Value::from("Singapore")));
        assert!(faceted.column("panel").and_then(ColumnData::figures).is_some());
    }

    #[test]
    fn test_panel_name_must_differ() {
        let result = facet_panels(&population(), &["Country"], "Country", |_| None);
        assert!(result.is_err());
    }
}
