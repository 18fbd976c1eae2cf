//! Panel materialization.
//!
//! Planning resolves every row of every panel column to a final reference
//! and detects path collisions without touching the filesystem. Execution
//! then renders figures and copies local images on a bounded pool of scoped
//! threads. A failed row is replaced by the column's placeholder asset and
//! reported as a diagnostic; it never cancels its siblings.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info_span, warn};
use trellis_common::{extension_of, sanitize};
use trellis_model::{
    ColumnData, Dataset, Diagnostic, DisplayError, Figure, Meta, PanelKind, Result, Value,
};

/// File stem of the per-column placeholder asset. `sanitize` never emits
/// `-`, so no row key can produce this stem.
pub const PLACEHOLDER_STEM: &str = "missing-panel";

const PLACEHOLDER_SVG: &str = concat!(
    r##"<svg xmlns="http://www.w3.org/2000/svg" width="300" height="300" viewBox="0 0 300 300">"##,
    r##"<rect width="300" height="300" fill="#f2f2f2"/>"##,
    r##"<text x="150" y="155" font-family="sans-serif" font-size="18" fill="#999" text-anchor="middle">panel unavailable</text>"##,
    "</svg>\n"
);

enum Task {
    Render(Arc<dyn Figure>),
    Copy(PathBuf),
}

struct Job {
    row: usize,
    task: Task,
    relative: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Resolution {
    /// Asset written under the display directory at this relative path.
    Asset(String),
    /// Reference used as given.
    Passthrough(String),
    /// No usable panel; the reason is reported as a diagnostic.
    Missing(String),
}

/// Resolved plan for one panel column.
pub struct ColumnPlan {
    column: String,
    dir: String,
    resolutions: Vec<Resolution>,
    jobs: Vec<Job>,
}

impl ColumnPlan {
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Directory of the column's assets, relative to the display.
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Number of assets that will be rendered or copied.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    fn placeholder(&self) -> String {
        format!("{}/{PLACEHOLDER_STEM}.svg", self.dir)
    }
}

/// Plan the assets of one panel column. `row_keys` holds the sanitized key
/// stem of every row.
///
/// Fails with [`DisplayError::PanelNameCollision`] when two rows would write
/// to the same path.
pub fn plan_column(
    dataset: &Dataset,
    meta: &Meta,
    row_keys: &[String],
    copy_local: bool,
) -> Result<ColumnPlan> {
    let column = meta.varname();
    let spec = meta.panel_spec().ok_or_else(|| DisplayError::InvalidMeta {
        varname: column.to_string(),
        message: "not a panel meta".to_string(),
    })?;
    let data = dataset
        .column(column)
        .ok_or_else(|| DisplayError::MissingColumn {
            varname: column.to_string(),
        })?;
    let dir = format!("panels/{}", sanitize(column));

    let mut plan = ColumnPlan {
        column: column.to_string(),
        dir,
        resolutions: Vec::with_capacity(row_keys.len()),
        jobs: Vec::new(),
    };
    let mut claimed: HashMap<String, usize> = HashMap::new();

    for (row, stem) in row_keys.iter().enumerate() {
        let target = match data {
            ColumnData::Figures(figures) => match figures.get(row).and_then(Option::as_ref) {
                Some(figure) => Some((
                    Task::Render(Arc::clone(figure)),
                    figure.extension().to_string(),
                )),
                None => {
                    plan.resolutions
                        .push(Resolution::Missing("no figure for this row".to_string()));
                    continue;
                }
            },
            ColumnData::Values(values) => {
                let reference = match values.get(row) {
                    Some(Value::Str(reference)) if !reference.trim().is_empty() => reference,
                    _ => {
                        plan.resolutions
                            .push(Resolution::Missing("no panel reference".to_string()));
                        continue;
                    }
                };
                if spec.panelkind == PanelKind::File && copy_local {
                    let extension = extension_of(reference).unwrap_or_else(|| "png".to_string());
                    Some((Task::Copy(PathBuf::from(reference)), extension))
                } else {
                    plan.resolutions
                        .push(Resolution::Passthrough(reference.clone()));
                    None
                }
            }
        };

        if let Some((task, extension)) = target {
            let relative = format!("{}/{stem}.{extension}", plan.dir);
            if let Some(&first) = claimed.get(&relative) {
                return Err(DisplayError::PanelNameCollision {
                    column: column.to_string(),
                    path: relative,
                    first,
                    second: row,
                });
            }
            claimed.insert(relative.clone(), row);
            plan.resolutions.push(Resolution::Asset(relative.clone()));
            plan.jobs.push(Job {
                row,
                task,
                relative,
            });
        }
    }
    Ok(plan)
}

fn run_job(job: &Job, display_dir: &Path) -> std::result::Result<(), String> {
    let target = display_dir.join(&job.relative);
    match &job.task {
        Task::Render(figure) => {
            figure
                .render_to_file(&target)
                .map_err(|err| format!("render failed: {err}"))?;
            if !target.is_file() {
                return Err("renderer produced no file".to_string());
            }
            Ok(())
        }
        Task::Copy(source) => fs::copy(source, &target)
            .map(|_| ())
            .map_err(|err| format!("cannot copy {}: {err}", source.display())),
    }
}

/// Run `jobs` on at most `concurrency` scoped threads. Returns one outcome
/// per job, in job order.
fn run_jobs(
    jobs: &[&Job],
    display_dir: &Path,
    concurrency: usize,
) -> Vec<std::result::Result<(), String>> {
    let workers = concurrency.max(1).min(jobs.len());
    if workers <= 1 {
        return jobs.iter().map(|job| run_job(job, display_dir)).collect();
    }

    let counter = AtomicUsize::new(0);
    let next = &counter;
    let mut outcomes: Vec<Option<std::result::Result<(), String>>> = vec![None; jobs.len()];
    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(job) = jobs.get(index) else {
                            break;
                        };
                        done.push((index, run_job(job, display_dir)));
                    }
                    done
                })
            })
            .collect();
        for handle in handles {
            match handle.join() {
                Ok(done) => {
                    for (index, outcome) in done {
                        outcomes[index] = Some(outcome);
                    }
                }
                Err(_) => warn!("panel worker panicked"),
            }
        }
    });
    outcomes
        .into_iter()
        .map(|outcome| outcome.unwrap_or_else(|| Err("panel task did not complete".to_string())))
        .collect()
}

/// Final per-row references of a materialized column, relative to the
/// display directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedColumn {
    pub column: String,
    pub references: Vec<String>,
}

/// Write every planned asset under `display_dir`.
pub fn execute(
    plans: Vec<ColumnPlan>,
    display_dir: &Path,
    concurrency: usize,
) -> Result<(Vec<MaterializedColumn>, Vec<Diagnostic>)> {
    let span = info_span!("materialize", columns = plans.len());
    let _guard = span.enter();

    for plan in &plans {
        let needs_dir = !plan.jobs.is_empty()
            || plan
                .resolutions
                .iter()
                .any(|r| matches!(r, Resolution::Missing(_)));
        if needs_dir {
            let dir = display_dir.join(&plan.dir);
            fs::create_dir_all(&dir).map_err(|err| DisplayError::io(&dir, err))?;
        }
    }

    let jobs: Vec<(usize, &Job)> = plans
        .iter()
        .enumerate()
        .flat_map(|(index, plan)| plan.jobs.iter().map(move |job| (index, job)))
        .collect();
    let job_refs: Vec<&Job> = jobs.iter().map(|(_, job)| *job).collect();
    let outcomes = run_jobs(&job_refs, display_dir, concurrency);

    let mut failures: Vec<(usize, usize, String)> = Vec::new();
    for ((plan_index, job), outcome) in jobs.iter().zip(outcomes) {
        if let Err(message) = outcome {
            failures.push((*plan_index, job.row, message));
        }
    }

    let mut plans = plans;
    for (plan_index, row, message) in failures {
        plans[plan_index].resolutions[row] = Resolution::Missing(message);
    }

    let mut diagnostics = Vec::new();
    let mut columns = Vec::with_capacity(plans.len());
    for plan in plans {
        let placeholder = plan.placeholder();
        let mut wrote_placeholder = false;
        let mut references = Vec::with_capacity(plan.resolutions.len());
        for (row, resolution) in plan.resolutions.into_iter().enumerate() {
            match resolution {
                Resolution::Asset(path) | Resolution::Passthrough(path) => references.push(path),
                Resolution::Missing(message) => {
                    if !wrote_placeholder {
                        let path = display_dir.join(&placeholder);
                        fs::write(&path, PLACEHOLDER_SVG)
                            .map_err(|err| DisplayError::io(&path, err))?;
                        wrote_placeholder = true;
                    }
                    warn!(column = %plan.column, row, %message, "using placeholder panel");
                    diagnostics.push(Diagnostic::panel_render(&plan.column, row, message));
                    references.push(placeholder.clone());
                }
            }
        }
        debug!(column = %plan.column, rows = references.len(), "materialized panel column");
        columns.push(MaterializedColumn {
            column: plan.column,
            references,
        });
    }
    Ok((columns, diagnostics))
}
