//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "trellis",
    version,
    about = "Build trellis displays from tabular data",
    long_about = "Build trellis displays from tabular data.\n\n\
                  Infers column metadata, key columns, and default viewer state from a CSV file,\n\
                  then writes the display configuration consumed by the trelliscope viewer."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a display from a CSV file and write it.
    Build(BuildArgs),

    /// Show the metas and key columns inferred for a CSV file.
    Inspect(InspectArgs),
}

/// Inputs shared by `build` and `inspect`.
#[derive(Args)]
pub struct InputArgs {
    /// CSV file with one row per panel.
    #[arg(value_name = "CSV")]
    pub csv: PathBuf,

    /// Treat this column as a panel column (repeatable).
    #[arg(long = "panel-column", value_name = "COLUMN")]
    pub panel_columns: Vec<String>,

    /// Use these key columns instead of inferring them (repeatable).
    #[arg(long = "key", value_name = "COLUMN")]
    pub keys: Vec<String>,

    /// Number of variables shown as panel labels by default.
    #[arg(long = "label-count", value_name = "N", default_value_t = 3)]
    pub label_count: usize,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Display name (default: the CSV file stem).
    #[arg(long = "name")]
    pub name: Option<String>,

    /// Display description.
    #[arg(long = "description")]
    pub description: Option<String>,

    /// Display tag (repeatable).
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Output root shared by every display of the app.
    #[arg(long = "output", value_name = "DIR", default_value = "trellis_out")]
    pub output: PathBuf,

    /// Write JSONP documents instead of JSON.
    #[arg(long = "jsonp")]
    pub jsonp: bool,

    /// Maximum number of figures rendered at once (default: available cores).
    #[arg(long = "concurrency", value_name = "N")]
    pub concurrency: Option<usize>,

    /// Reference local panel files in place instead of copying them.
    #[arg(long = "no-copy")]
    pub no_copy: bool,
}

#[derive(Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
