use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use trellis_core::{Diagnostic, DiagnosticKind, Display, Meta, MetaKind, WrittenDisplayHandle};

/// Metas, key columns, and default state of a built display.
pub fn print_display(display: &Display) {
    println!("Display: {}", display.name());
    println!("Rows: {}", display.dataset().height());
    println!("Key columns: {}", display.key_columns().join(", "));

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Variable"),
        header_cell("Type"),
        header_cell("Label"),
        header_cell("Filter"),
        header_cell("Sort"),
        header_cell("Details"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Center);
    align_column(&mut table, 4, CellAlignment::Center);
    for meta in display.metas() {
        let is_key = display.key_columns().iter().any(|k| k == meta.varname());
        let name = Cell::new(meta.varname());
        table.add_row(vec![
            if is_key {
                name.add_attribute(Attribute::Bold)
            } else {
                name
            },
            Cell::new(meta.meta_type()).fg(Color::Cyan),
            Cell::new(meta.label()),
            flag_cell(meta.is_filterable()),
            flag_cell(meta.is_sortable()),
            details_cell(meta),
        ]);
    }
    println!("{table}");

    let state = display.state();
    let layout = state.layout();
    println!(
        "Layout: {} column(s){}",
        layout.ncol,
        layout
            .nrow
            .map(|nrow| format!(" x {nrow} row(s)"))
            .unwrap_or_default()
    );
    println!("Labels: {}", state.labels().varnames.join(", "));
    print_diagnostics(display.diagnostics());
}

pub fn print_written(handle: &WrittenDisplayHandle) {
    println!();
    println!("Written: {}", handle.display_path.display());
    println!("Display id: {}", handle.id);
    println!("Rows: {}", handle.row_count);
}

pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Kind"),
        header_cell("Column"),
        header_cell("Row"),
        header_cell("Message"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    for diagnostic in diagnostics {
        table.add_row(vec![
            kind_cell(diagnostic.kind),
            diagnostic
                .column
                .as_deref()
                .map_or_else(|| dim_cell("-"), Cell::new),
            diagnostic.row.map_or_else(|| dim_cell("-"), Cell::new),
            Cell::new(&diagnostic.message),
        ]);
    }
    println!();
    println!("Diagnostics:");
    println!("{table}");
}

fn details_cell(meta: &Meta) -> Cell {
    match meta.kind() {
        MetaKind::Factor { levels } => Cell::new(format!("{} levels", levels.len())),
        MetaKind::Geo { latvar, longvar } => Cell::new(format!("{latvar}, {longvar}")),
        MetaKind::Panel(spec) => Cell::new(format!(
            "{} (aspect {})",
            spec.panelkind.as_str(),
            spec.aspect
        )),
        MetaKind::Currency { code, .. } => Cell::new(code),
        MetaKind::Date { format, .. } | MetaKind::Datetime { format, .. } => Cell::new(format),
        _ => dim_cell("-"),
    }
}

fn kind_cell(kind: DiagnosticKind) -> Cell {
    let color = match kind {
        DiagnosticKind::AmbiguousKey => Color::Yellow,
        DiagnosticKind::PanelRender => Color::Red,
    };
    Cell::new(kind.as_str())
        .fg(color)
        .add_attribute(Attribute::Bold)
}

fn flag_cell(enabled: bool) -> Cell {
    if enabled {
        Cell::new("✓")
            .fg(Color::Green)
            .add_attribute(Attribute::Bold)
    } else {
        dim_cell("-")
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
