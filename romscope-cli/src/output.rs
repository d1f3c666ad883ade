//! Text rendering of reports.

use std::path::Path;

use owo_colors::OwoColorize;
use owo_colors::Stream::{Stderr, Stdout};

use romscope_lib::{Field, FieldValue, RomReport, Table};

/// Lines for one field: `label: value`, or a header line followed by one
/// indented line per row for tables.
pub(crate) fn field_lines(field: &Field, width: usize) -> Vec<String> {
    match &field.value {
        Some(FieldValue::Table(table)) => {
            let mut lines = vec![format!("{}:", field.label)];
            lines.extend(table_lines(table).into_iter().map(|l| format!("    {l}")));
            lines
        }
        _ => vec![format!("{:<width$} {}", format!("{}:", field.label), field.display_value())],
    }
}

/// Column-aligned table rows, header first.
fn table_lines(table: &Table) -> Vec<String> {
    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }
    let render = |cells: &[String]| {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<w$}", c, w = widths.get(i).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let mut lines = vec![render(table.columns.as_slice())];
    if table.rows.is_empty() {
        lines.push("(empty)".to_string());
    }
    lines.extend(table.rows.iter().map(|r| render(r.as_slice())));
    lines
}

pub(crate) fn print_report(path: &Path, report: &RomReport) {
    println!("{}", path.display().if_supports_color(Stdout, |t| t.bold()));
    let system = match (report.system, report.system_short) {
        (Some(long), Some(short)) if long != short => format!("{long} ({short})"),
        (Some(name), _) | (None, Some(name)) => name.to_string(),
        (None, None) => "Unknown".to_string(),
    };
    let width = report
        .fields
        .iter()
        .map(|f| f.label.chars().count() + 1)
        .chain([10])
        .max()
        .unwrap_or(10);
    println!(
        "  {:<width$} {}",
        "System:",
        system.if_supports_color(Stdout, |t| t.cyan())
    );
    println!("  {:<width$} {}", "File type:", report.file_type);
    for field in report.fields.iter() {
        for line in field_lines(field, width) {
            println!("  {line}");
        }
    }
    if !report.images.is_empty() {
        let names: Vec<&str> = report.images.iter().map(|k| k.name()).collect();
        println!("  {:<width$} {}", "Images:", names.join(", "));
    }
    for ext in &report.ext_images {
        for url in &ext.urls {
            println!(
                "  {:<width$} {}",
                format!("{}:", ext.kind.name()),
                url.url.if_supports_color(Stdout, |t| t.dimmed())
            );
        }
    }
    println!();
}

pub(crate) fn print_unsupported(path: &Path, reason: &str) {
    eprintln!(
        "{}: {}",
        path.display().if_supports_color(Stderr, |t| t.bold()),
        reason.if_supports_color(Stderr, |t| t.red())
    );
}
