//! Configuration documents read by the viewer.
//!
//! Documents are JSON, or JSONP when the viewer loads them through script
//! tags. A JSONP document wraps the JSON body in a callback named after the
//! document and its owner, e.g. `__loadDisplayInfo__<id>(...)`.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use trellis_model::{DisplayError, DisplayState, MetaSet, Result, View};

/// Version of the `displayInfo` layout written by this crate.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Jsonp,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Json, OutputFormat::Jsonp];

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Jsonp => "jsonp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Per-display configuration: schema, state defaults, and summary fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub keycols: Vec<String>,
    pub keysig: String,
    pub n: usize,
    pub metas: MetaSet,
    pub state: DisplayState,
    pub views: Vec<View>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primarypanel: Option<String>,
    pub thumbnailurl: Option<String>,
}

/// One entry of the root `displayList` registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayListEntry {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub keysig: String,
    pub thumbnailurl: Option<String>,
}

/// Root `config` document shared by every display under the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub datatype: OutputFormat,
    pub id: String,
}

/// Lower-case hex SHA-256 of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// First 16 hex digits of the SHA-256 of `bytes`.
pub fn short_digest(bytes: &[u8]) -> String {
    let mut full = digest(bytes);
    full.truncate(16);
    full
}

/// Serialize `value` as a JSON body.
pub fn to_json<T: Serialize>(value: &T, pretty: bool, path: &Path) -> Result<Vec<u8>> {
    let encoded = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    encoded.map_err(|err| DisplayError::json(path, err))
}

/// Wrap a JSON body for `format`; `callback` names the JSONP loader.
pub fn wrap(body: Vec<u8>, format: OutputFormat, callback: &str) -> Vec<u8> {
    match format {
        OutputFormat::Json => body,
        OutputFormat::Jsonp => {
            let mut wrapped = Vec::with_capacity(body.len() + callback.len() + 2);
            wrapped.extend_from_slice(callback.as_bytes());
            wrapped.push(b'(');
            wrapped.extend(body);
            wrapped.push(b')');
            wrapped
        }
    }
}

/// Parse a JSON or JSONP document.
pub fn decode<T: DeserializeOwned>(bytes: &[u8], path: &Path) -> Result<T> {
    let text = std::str::from_utf8(bytes).map_err(|err| DisplayError::WriteTargetConflict {
        path: path.to_path_buf(),
        message: format!("not UTF-8: {err}"),
    })?;
    let trimmed = text.trim();
    let body = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        trimmed
    } else {
        match (trimmed.find('('), trimmed.rfind(')')) {
            (Some(open), Some(close)) if open < close => &trimmed[open + 1..close],
            _ => trimmed,
        }
    };
    serde_json::from_str(body).map_err(|err| DisplayError::json(path, err))
}

/// Read and parse a JSON or JSONP document from disk.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|err| DisplayError::io(path, err))?;
    decode(&bytes, path)
}

/// Find and parse the `displayInfo` document of a display directory, in
/// either format.
pub fn read_display_info(display_dir: &Path) -> Result<DisplayInfo> {
    let path = find_document(display_dir, "displayInfo").ok_or_else(|| {
        DisplayError::io(
            display_dir.join("displayInfo.json"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "no displayInfo document"),
        )
    })?;
    read_document(&path)
}

/// Path of `<dir>/<stem>.json` or `<dir>/<stem>.jsonp`, whichever exists.
pub fn find_document(dir: &Path, stem: &str) -> Option<std::path::PathBuf> {
    OutputFormat::ALL
        .iter()
        .map(|format| dir.join(format!("{stem}.{}", format.extension())))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonp_round_trip() {
        let config = AppConfig {
            name: "app".to_string(),
            datatype: OutputFormat::Jsonp,
            id: "abc".to_string(),
        };
        let path = Path::new("config.jsonp");
        let body = to_json(&config, false, path).unwrap();
        let wrapped = wrap(body, OutputFormat::Jsonp, "__loadAppConfig__abc");
        let text = String::from_utf8(wrapped.clone()).unwrap();
        assert_eq!(
            text,
            r#"__loadAppConfig__abc({"name":"app","datatype":"jsonp","id":"abc"})"#
        );
        let decoded: AppConfig = decode(&wrapped, path).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn test_short_digest_is_stable() {
        assert_eq!(short_digest(b"abc"), "ba7816bf8f01cfea");
        assert_eq!(digest(b"abc").len(), 64);
    }
}
