use std::path::PathBuf;

use thiserror::Error;

use crate::meta::MetaType;
use crate::state::StateKind;

/// Fatal errors raised while building, configuring, or writing a display.
///
/// Every variant aborts the operation that raised it before any state or
/// filesystem mutation takes place. Recoverable conditions are reported as
/// [`Diagnostic`](crate::Diagnostic) values instead.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// The dataset has no rows or no columns.
    #[error("dataset is empty: {message}")]
    EmptyDataset { message: String },

    /// The dataset itself is malformed (ragged columns, duplicate names).
    #[error("invalid dataset: {message}")]
    InvalidDataset { message: String },

    /// A column referenced by name does not exist.
    #[error("column `{varname}` not found in the dataset")]
    MissingColumn { varname: String },

    /// A state binds to a meta whose type does not support that state.
    #[error("{state} state cannot use `{varname}`: {meta_type} metas do not support it")]
    IncompatibleState {
        varname: String,
        state: StateKind,
        meta_type: MetaType,
    },

    /// A state references a variable that has no meta.
    #[error("{state} state references `{varname}`, which has no meta")]
    UnknownVariable { varname: String, state: StateKind },

    /// A state is malformed independent of the metas it references.
    #[error("invalid {state} state: {message}")]
    InvalidState { state: StateKind, message: String },

    /// A meta definition does not fit the data or the display.
    #[error("invalid meta for `{varname}`: {message}")]
    InvalidMeta { varname: String, message: String },

    /// Two rows of a panel column would be written to the same asset path.
    #[error("panel column `{column}`: rows {first} and {second} both map to `{path}`")]
    PanelNameCollision {
        column: String,
        path: String,
        first: usize,
        second: usize,
    },

    /// Two panel columns would share one asset directory.
    #[error("panel columns `{first}` and `{second}` both map to `{path}`")]
    PanelDirectoryCollision {
        first: String,
        second: String,
        path: String,
    },

    /// The output location cannot hold this display.
    #[error("cannot write to {path}: {message}")]
    WriteTargetConflict { path: PathBuf, message: String },

    /// The display was mutated after it had been written.
    #[error("display `{name}` has already been written and can no longer be changed")]
    AlreadyWritten { name: String },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode or decode {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl DisplayError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_meta(varname: &str, message: impl Into<String>) -> Self {
        Self::InvalidMeta {
            varname: varname.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_state(state: StateKind, message: impl Into<String>) -> Self {
        Self::InvalidState {
            state,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DisplayError>;
