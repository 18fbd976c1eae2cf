//! Display writer.
//!
//! Layout under the output root:
//!
//! ```text
//! <root>/
//!   config.<fmt>
//!   displayList.<fmt>
//!   displays/<display>/
//!     displayInfo.<fmt>
//!     metaData.<fmt>
//!     panels/<column>/<key>.<ext>
//! ```
//!
//! Every fatal check runs before the first filesystem change. Rewriting a
//! display replaces its own directory only; sibling displays are kept and
//! the display list is rebuilt from all of them.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};
use trellis_common::{sanitize, sanitize_key};
use trellis_model::{
    Dataset, Diagnostic, DisplayError, DisplayState, Meta, MetaKind, MetaSet, Result, Value, View,
    is_url,
};

use crate::documents::{
    AppConfig, DisplayInfo, DisplayListEntry, OutputFormat, SCHEMA_VERSION, digest, find_document,
    read_document, short_digest, to_json, wrap,
};
use crate::materialize::{self, MaterializedColumn};

/// Name of the directory holding every display under the root.
pub const DISPLAYS_DIR: &str = "displays";

const DEFAULT_APP_NAME: &str = "trellis";

/// Options controlling how a display is written.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Document format; an existing root config overrides it.
    pub format: OutputFormat,

    /// Maximum number of threads rendering or copying panels.
    /// Defaults to the available parallelism.
    pub concurrency: usize,

    /// Copy local image panels into the display directory.
    /// Defaults to true.
    pub copy_local: bool,

    /// Pretty-print the `metaData` document.
    /// Defaults to false.
    pub pretty_metadata: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Json,
            concurrency: std::thread::available_parallelism().map_or(1, usize::from),
            copy_local: true,
            pretty_metadata: false,
        }
    }
}

impl WriteOptions {
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_copy_local(mut self, copy_local: bool) -> Self {
        self.copy_local = copy_local;
        self
    }

    pub fn with_pretty_metadata(mut self, pretty: bool) -> Self {
        self.pretty_metadata = pretty;
        self
    }
}

/// Borrowed view of everything a display writes.
#[derive(Debug, Clone, Copy)]
pub struct DisplayContent<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub tags: &'a [String],
    pub dataset: &'a Dataset,
    pub metas: &'a MetaSet,
    pub key_columns: &'a [String],
    pub state: &'a DisplayState,
    pub views: &'a [View],
    pub primary_panel: Option<&'a str>,
}

/// Hands a written display to an external viewer.
pub trait ViewerLauncher {
    fn launch(&self, handle: &WrittenDisplayHandle) -> io::Result<()>;
}

/// Outcome of a successful write.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenDisplayHandle {
    /// The output root.
    pub output_path: PathBuf,
    /// The display's own directory under the root.
    pub display_path: PathBuf,
    /// Content-addressed display identifier.
    pub id: String,
    pub row_count: usize,
    /// Non-fatal findings, e.g. placeholder panels.
    pub diagnostics: Vec<Diagnostic>,
}

impl WrittenDisplayHandle {
    /// Open the display with `launcher`.
    pub fn view(&self, launcher: &dyn ViewerLauncher) -> Result<()> {
        info!(display = %self.display_path.display(), "launching viewer");
        launcher
            .launch(self)
            .map_err(|err| DisplayError::io(&self.output_path, err))
    }
}

/// Directory name of a display under `displays/`.
pub fn display_dir_name(name: &str) -> String {
    sanitize(name)
}

/// Validate `content` against its dataset, then write it under `root`.
pub fn write_display(
    content: &DisplayContent<'_>,
    root: &Path,
    options: &WriteOptions,
) -> Result<WrittenDisplayHandle> {
    let span = info_span!("write", display = %content.name, root = %root.display());
    let _guard = span.enter();

    validate_content(content)?;
    let row_keys = row_keys(content)?;
    let keysig = digest(row_keys.join("\n").as_bytes());

    let mut plans = Vec::new();
    let mut dirs: HashMap<String, String> = HashMap::new();
    for meta in content.metas.panels() {
        let plan =
            materialize::plan_column(content.dataset, meta, &row_keys, options.copy_local)?;
        if let Some(first) = dirs.insert(plan.dir().to_string(), plan.column().to_string()) {
            return Err(DisplayError::PanelDirectoryCollision {
                first,
                second: plan.column().to_string(),
                path: plan.dir().to_string(),
            });
        }
        plans.push(plan);
    }

    let dir_name = display_dir_name(content.name);
    let display_path = root.join(DISPLAYS_DIR).join(&dir_name);
    check_target(root, &display_path, content.name)?;
    let config = resolve_config(root, options.format)?;
    let format = config.datatype;

    // Filesystem changes start here.
    create_dir(&root.join(DISPLAYS_DIR))?;
    if display_path.exists() {
        debug!(path = %display_path.display(), "replacing existing display");
        fs::remove_dir_all(&display_path).map_err(|err| DisplayError::io(&display_path, err))?;
    }
    create_dir(&display_path)?;

    let (panels, diagnostics) =
        materialize::execute(plans, &display_path, options.concurrency)?;

    let meta_path = display_path.join(format!("metaData.{}", format.extension()));
    let rows = MetaDataRows {
        content,
        panels: &panels,
    };
    let meta_body = to_json(&rows, options.pretty_metadata, &meta_path)?;

    let primary = content
        .primary_panel
        .map(str::to_string)
        .or_else(|| content.metas.panels().next().map(|m| m.varname().to_string()));
    let thumbnail = primary.as_deref().and_then(|column| {
        panels
            .iter()
            .find(|p| p.column == column)
            .and_then(|p| p.references.first().cloned())
    });
    let info_doc = DisplayInfo {
        schema_version: SCHEMA_VERSION,
        name: content.name.to_string(),
        description: content.description.to_string(),
        tags: content.tags.to_vec(),
        keycols: content.key_columns.to_vec(),
        keysig,
        n: content.dataset.height(),
        metas: content.metas.clone(),
        state: content.state.clone(),
        views: content.views.to_vec(),
        primarypanel: primary,
        thumbnailurl: thumbnail,
    };
    let info_path = display_path.join(format!("displayInfo.{}", format.extension()));
    let info_body = to_json(&info_doc, true, &info_path)?;
    let id = short_digest(&info_body);

    write_file(
        &meta_path,
        &wrap(meta_body, format, &format!("__loadMetaData__{id}")),
    )?;
    write_file(
        &info_path,
        &wrap(info_body, format, &format!("__loadDisplayInfo__{id}")),
    )?;

    write_display_list(root, &config)?;
    let config_path = root.join(format!("config.{}", format.extension()));
    let config_body = to_json(&config, true, &config_path)?;
    write_file(
        &config_path,
        &wrap(config_body, format, &format!("__loadAppConfig__{}", config.id)),
    )?;

    info!(
        id = %id,
        rows = content.dataset.height(),
        diagnostics = diagnostics.len(),
        path = %display_path.display(),
        "display written"
    );
    Ok(WrittenDisplayHandle {
        output_path: root.to_path_buf(),
        display_path,
        id,
        row_count: content.dataset.height(),
        diagnostics,
    })
}

fn validate_content(content: &DisplayContent<'_>) -> Result<()> {
    if content.name.trim().is_empty() {
        return Err(DisplayError::InvalidDataset {
            message: "display name is empty".to_string(),
        });
    }
    if content.dataset.is_empty() {
        return Err(DisplayError::EmptyDataset {
            message: "nothing to write".to_string(),
        });
    }
    for meta in content.metas {
        meta.check_with_data(content.dataset)?;
    }
    if let Some(panel) = content.primary_panel
        && !content.metas.get(panel).is_some_and(Meta::is_panel)
    {
        return Err(DisplayError::InvalidMeta {
            varname: panel.to_string(),
            message: "primary panel is not a panel meta".to_string(),
        });
    }
    content.state.validate(content.metas)?;
    for view in content.views {
        view.validate(content.metas)?;
    }
    Ok(())
}

/// Sanitized key stem of every row.
fn row_keys(content: &DisplayContent<'_>) -> Result<Vec<String>> {
    let mut columns = Vec::with_capacity(content.key_columns.len());
    for name in content.key_columns {
        let values = content
            .dataset
            .column(name)
            .and_then(|data| data.values())
            .ok_or_else(|| DisplayError::MissingColumn {
                varname: name.clone(),
            })?;
        columns.push(values);
    }
    let tuples: Vec<Vec<String>> = (0..content.dataset.height())
        .map(|row| columns.iter().map(|values| values[row].key_text()).collect())
        .collect();

    // Keys that leave duplicate rows get the row index appended to every stem.
    let mut seen = HashSet::with_capacity(tuples.len());
    let distinct = tuples.iter().all(|tuple| seen.insert(tuple));
    if !distinct {
        debug!("key columns are not unique, suffixing asset names with the row index");
    }
    Ok(tuples
        .iter()
        .enumerate()
        .map(|(row, parts)| {
            let stem = sanitize_key(parts);
            if distinct { stem } else { format!("{stem}_{row}") }
        })
        .collect())
}

fn check_target(root: &Path, display_path: &Path, name: &str) -> Result<()> {
    for path in [root.to_path_buf(), root.join(DISPLAYS_DIR), display_path.to_path_buf()] {
        if path.exists() && !path.is_dir() {
            return Err(DisplayError::WriteTargetConflict {
                path,
                message: "exists and is not a directory".to_string(),
            });
        }
    }
    let Some(existing) = find_document(display_path, "displayInfo") else {
        return Ok(());
    };
    let document: serde_json::Value = read_document(&existing).map_err(|err| {
        DisplayError::WriteTargetConflict {
            path: existing.clone(),
            message: format!("unreadable display: {err}"),
        }
    })?;
    let version = document.get("schemaVersion").and_then(serde_json::Value::as_u64);
    if version != Some(u64::from(SCHEMA_VERSION)) {
        return Err(DisplayError::WriteTargetConflict {
            path: existing,
            message: format!(
                "existing display has schema version {}, expected {SCHEMA_VERSION}",
                version.map_or_else(|| "none".to_string(), |v| v.to_string())
            ),
        });
    }
    let existing_name = document.get("name").and_then(serde_json::Value::as_str);
    if existing_name != Some(name) {
        return Err(DisplayError::WriteTargetConflict {
            path: existing,
            message: format!(
                "directory holds display `{}`",
                existing_name.unwrap_or_default()
            ),
        });
    }
    Ok(())
}

/// The root config, reusing an existing one so every display under a root
/// shares one format and app id.
fn resolve_config(root: &Path, requested: OutputFormat) -> Result<AppConfig> {
    if let Some(path) = find_document(root, "config") {
        let config: AppConfig =
            read_document(&path).map_err(|err| DisplayError::WriteTargetConflict {
                path: path.clone(),
                message: format!("unreadable app config: {err}"),
            })?;
        if config.datatype != requested {
            info!(
                existing = %config.datatype,
                requested = %requested,
                "adopting output format of existing app"
            );
        }
        return Ok(config);
    }
    let absolute = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
    let name = root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_APP_NAME)
        .to_string();
    Ok(AppConfig {
        name,
        datatype: requested,
        id: short_digest(absolute.to_string_lossy().as_bytes()),
    })
}

/// Rebuild `displayList` from every display directory under `root`.
fn write_display_list(root: &Path, config: &AppConfig) -> Result<()> {
    let displays = root.join(DISPLAYS_DIR);
    let mut entries = Vec::new();
    let listing = fs::read_dir(&displays).map_err(|err| DisplayError::io(&displays, err))?;
    for entry in listing {
        let entry = entry.map_err(|err| DisplayError::io(&displays, err))?;
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let Some(path) = find_document(&dir, "displayInfo") else {
            continue;
        };
        let info: DisplayInfo = match read_document(&path) {
            Ok(info) => info,
            Err(err) => {
                warn!(path = %path.display(), %err, "skipping unreadable display");
                continue;
            }
        };
        let dir_name = entry.file_name().to_string_lossy().into_owned();
        entries.push(DisplayListEntry {
            thumbnailurl: info
                .thumbnailurl
                .map(|thumb| root_relative(&dir_name, thumb)),
            name: info.name,
            description: info.description,
            tags: info.tags,
            keysig: info.keysig,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let path = root.join(format!("displayList.{}", config.datatype.extension()));
    let body = to_json(&entries, true, &path)?;
    write_file(
        &path,
        &wrap(body, config.datatype, &format!("__loadDisplayList__{}", config.id)),
    )
}

fn root_relative(dir_name: &str, reference: String) -> String {
    if is_url(&reference) {
        reference
    } else {
        format!("{DISPLAYS_DIR}/{dir_name}/{reference}")
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|err| DisplayError::io(path, err))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).map_err(|err| DisplayError::io(path, err))
}

static MISSING: Value = Value::Null;

/// The `metaData` document: one object per row.
struct MetaDataRows<'a> {
    content: &'a DisplayContent<'a>,
    panels: &'a [MaterializedColumn],
}

struct MetaDataRow<'a> {
    rows: &'a MetaDataRows<'a>,
    row: usize,
}

impl Serialize for MetaDataRows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq((0..self.content.dataset.height()).map(|row| MetaDataRow {
            rows: self,
            row,
        }))
    }
}

impl Serialize for MetaDataRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let content = self.rows.content;
        let dataset = content.dataset;
        let row = self.row;
        let cell = |column: &str| dataset.value(column, row).unwrap_or(&MISSING);

        let mut map = serializer.serialize_map(None)?;
        for key in content.key_columns {
            if !content.metas.contains(key) {
                map.serialize_entry(key, cell(key))?;
            }
        }
        for meta in content.metas {
            let name = meta.varname();
            match meta.kind() {
                MetaKind::Panel(_) => {
                    let reference = self
                        .rows
                        .panels
                        .iter()
                        .find(|p| p.column == name)
                        .and_then(|p| p.references.get(row));
                    map.serialize_entry(name, &reference)?;
                }
                MetaKind::Geo { latvar, longvar } => {
                    let lat = cell(latvar).as_f64();
                    let long = cell(longvar).as_f64();
                    let pair = lat.zip(long).map(|(lat, long)| [lat, long]);
                    map.serialize_entry(name, &pair)?;
                }
                MetaKind::Factor { levels } => {
                    let value = cell(name);
                    let code = if value.is_null() {
                        None
                    } else {
                        let text = value.to_string();
                        levels.iter().position(|level| *level == text).map(|i| i + 1)
                    };
                    map.serialize_entry(name, &code)?;
                }
                _ => map.serialize_entry(name, cell(name))?,
            }
        }
        map.end()
    }
}
