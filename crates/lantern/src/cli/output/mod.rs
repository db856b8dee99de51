//! Rendering and JSON serialization for CLI output.

use std::process::ExitCode;

use comfy_table::{Cell, Table, presets::UTF8_FULL_CONDENSED};
use lantern_index::{FacetCounts, IndexError, SearchResults};
use serde::Serialize;
use serde_json::Value;

/// Prints `value` as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to serialize JSON: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Reports an index error on stderr and returns the failure exit code.
pub fn index_failure(context: &str, e: &IndexError) -> ExitCode {
    eprintln!("error: {context}: {e}");
    if e.is_retryable() {
        eprintln!("The index was busy; try again.");
    }
    ExitCode::FAILURE
}

/// Builds a table with the house style and the given header.
pub fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header.iter().map(Cell::new).collect::<Vec<_>>());
    table
}

/// Renders a stored value compactly for a table cell.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Prints search results as a table of id, score, stored fields and sort
/// order. The order column is what `--after` takes to fetch the next page.
pub fn print_hits(results: &SearchResults) {
    if results.hits.is_empty() {
        println!("No matches.");
        return;
    }

    let mut table = table(&["id", "score", "fields", "order"]);
    for hit in &results.hits {
        let fields = hit
            .fields
            .iter()
            .map(|(name, value)| format!("{name}={}", cell_text(value)))
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![
            Cell::new(&hit.id),
            Cell::new(format!("{:.3}", hit.score)),
            Cell::new(fields),
            Cell::new(serde_json::to_string(&hit.order).unwrap_or_default()),
        ]);
    }
    println!("{table}");
    println!("{} of {} matches", results.hits.len(), results.total_hits);
}

/// Prints one table per faceted field, largest count first.
pub fn print_facets(kind: &str, facets: &FacetCounts) {
    for (field, counts) in facets {
        let mut rows: Vec<(&String, &u64)> = counts.iter().collect();
        rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        let mut table = table(&[field.as_str(), kind]);
        for (label, count) in rows {
            table.add_row(vec![Cell::new(label), Cell::new(count)]);
        }
        println!("{table}");
    }
}
