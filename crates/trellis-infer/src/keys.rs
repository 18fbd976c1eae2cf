//! Key-column search.
//!
//! # Algorithm
//!
//! 1. A single unique column, trying text columns before numeric ones and
//!    otherwise keeping column order.
//! 2. Greedy growth: repeatedly add the candidate that maximizes the number
//!    of distinct row combinations until every row is distinct.
//! 3. Fallback: all candidate columns, with an ambiguous-key diagnostic.

use tracing::debug;
use trellis_model::{Dataset, Diagnostic, Result, Value};

/// Result of a key search.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySearch {
    pub columns: Vec<String>,
    pub diagnostic: Option<Diagnostic>,
}

fn is_textual(dataset: &Dataset, column: &str) -> bool {
    dataset
        .column(column)
        .and_then(|data| data.values())
        .is_some_and(|values| values.iter().any(|v| matches!(v, Value::Str(_))))
}

/// Search `candidates` for the smallest column set identifying every row.
pub fn infer_keys(dataset: &Dataset, candidates: &[&str]) -> Result<KeySearch> {
    let rows = dataset.height();
    let mut ranked: Vec<&str> = candidates.to_vec();
    ranked.sort_by_key(|column| !is_textual(dataset, column));

    for column in &ranked {
        if dataset.distinct_count(&[*column])? == rows {
            debug!(column, "single key column");
            return Ok(KeySearch {
                columns: vec![(*column).to_string()],
                diagnostic: None,
            });
        }
    }

    let mut chosen: Vec<&str> = Vec::new();
    let mut remaining = ranked;
    while !remaining.is_empty() {
        let mut best: Option<(usize, usize)> = None;
        for (index, column) in remaining.iter().enumerate() {
            let mut trial = chosen.clone();
            trial.push(*column);
            let distinct = dataset.distinct_count(&trial)?;
            if best.is_none_or(|(_, count)| distinct > count) {
                best = Some((index, distinct));
            }
        }
        let Some((index, distinct)) = best else {
            break;
        };
        chosen.push(remaining.remove(index));
        if distinct == rows {
            debug!(columns = ?chosen, "composite key columns");
            return Ok(KeySearch {
                columns: chosen.into_iter().map(str::to_string).collect(),
                diagnostic: None,
            });
        }
    }

    let columns: Vec<String> = candidates.iter().map(|c| (*c).to_string()).collect();
    let distinct = if candidates.is_empty() {
        usize::from(rows > 0)
    } else {
        dataset.distinct_count(candidates)?
    };
    Ok(KeySearch {
        diagnostic: Some(Diagnostic::ambiguous_key(&columns, rows - distinct)),
        columns,
    })
}

/// Check caller-supplied key columns; duplicates yield a diagnostic.
pub fn check_keys(dataset: &Dataset, columns: &[&str]) -> Result<KeySearch> {
    let rows = dataset.height();
    let distinct = dataset.distinct_count(columns)?;
    let columns: Vec<String> = columns.iter().map(|c| (*c).to_string()).collect();
    let diagnostic = (distinct < rows).then(|| Diagnostic::ambiguous_key(&columns, rows - distinct));
    Ok(KeySearch {
        columns,
        diagnostic,
    })
}
