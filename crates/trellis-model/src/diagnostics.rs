//! Non-fatal findings surfaced alongside successful results.

use std::fmt;

use serde::Serialize;

/// Category of a non-fatal finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// No column subset uniquely identifies the rows; a fallback key is used.
    AmbiguousKey,
    /// A panel could not be resolved and a placeholder was substituted.
    PanelRender,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::AmbiguousKey => "ambiguous key",
            DiagnosticKind::PanelRender => "panel render",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Column the finding is about, when it concerns a single column.
    pub column: Option<String>,
    /// Zero-based row index, when it concerns a single row.
    pub row: Option<usize>,
}

impl Diagnostic {
    pub fn ambiguous_key(columns: &[String], duplicate_rows: usize) -> Self {
        Self {
            kind: DiagnosticKind::AmbiguousKey,
            message: format!(
                "key columns [{}] leave {duplicate_rows} duplicate row(s)",
                columns.join(", ")
            ),
            column: None,
            row: None,
        }
    }

    pub fn panel_render(column: &str, row: usize, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::PanelRender,
            message: message.into(),
            column: Some(column.to_string()),
            row: Some(row),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(column) = &self.column {
            write!(f, " [{column}")?;
            if let Some(row) = self.row {
                write!(f, ", row {row}")?;
            }
            write!(f, "]")?;
        }
        write!(f, ": {}", self.message)
    }
}
