use anyhow::{Context, Result};
use tracing::{info, info_span};

use trellis_cli::input::read_csv_dataset;
use trellis_core::{
    BuildOptions, Display, InferenceOptions, OutputFormat, WriteOptions, WrittenDisplayHandle,
};

use crate::cli::{BuildArgs, InputArgs, InspectArgs};

pub fn run_build(args: &BuildArgs) -> Result<(Display, WrittenDisplayHandle)> {
    let name = args
        .name
        .clone()
        .or_else(|| {
            args.input
                .csv
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .context("cannot derive a display name; pass --name")?;
    let span = info_span!("cli_build", display = %name);
    let _guard = span.enter();

    let mut options = build_options(&args.input);
    if let Some(description) = &args.description {
        options = options.with_description(description.clone());
    }
    options = options.with_tags(args.tags.iter().cloned());
    let mut display = load_display(&args.input, &name, options)?;

    let mut write_options = WriteOptions::default()
        .with_format(if args.jsonp {
            OutputFormat::Jsonp
        } else {
            OutputFormat::Json
        })
        .with_copy_local(!args.no_copy);
    if let Some(concurrency) = args.concurrency {
        write_options = write_options.with_concurrency(concurrency);
    }
    let handle = display
        .write(&args.output, &write_options)
        .with_context(|| format!("write display to {}", args.output.display()))?;
    info!(id = %handle.id, path = %handle.display_path.display(), "display written");
    Ok((display, handle))
}

pub fn run_inspect(args: &InspectArgs) -> Result<Display> {
    let name = args
        .input
        .csv
        .file_stem()
        .map_or_else(|| "display".to_string(), |stem| stem.to_string_lossy().into_owned());
    load_display(&args.input, &name, build_options(&args.input))
}

fn build_options(input: &InputArgs) -> BuildOptions {
    let mut inference = InferenceOptions::default().with_label_count(input.label_count);
    for column in &input.panel_columns {
        inference = inference.with_panel_column(column.clone());
    }
    if !input.keys.is_empty() {
        inference = inference.with_key_columns(input.keys.iter().cloned());
    }
    BuildOptions::default().with_inference(inference)
}

fn load_display(input: &InputArgs, name: &str, options: BuildOptions) -> Result<Display> {
    let dataset = read_csv_dataset(&input.csv)?;
    info!(
        rows = dataset.height(),
        columns = dataset.width(),
        path = %input.csv.display(),
        "read csv"
    );
    Display::build(dataset, name, options)
        .with_context(|| format!("build display from {}", input.csv.display()))
}
