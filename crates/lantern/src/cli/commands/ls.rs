//! Implementation of `lantern ls`.

use std::process::ExitCode;

use comfy_table::Cell;
use lantern_index::IndexError;
use serde::Serialize;

use super::shared::with_manager;
use crate::cli::{
    args::LsCommand,
    context::{CommandContext, Manager},
    output::{index_failure, print_json, table},
};

/// One listed index.
#[derive(Serialize)]
struct IndexRow {
    /// Index name.
    name: String,
    /// Default analyzer from the definition.
    analyzer: String,
    /// Update sequence, when opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    update_seq: Option<u64>,
    /// Document count, when opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    num_docs: Option<u64>,
}

/// Reads the row for `name`, opening the index when `long` is set.
fn row(manager: &Manager, name: String, long: bool) -> Result<IndexRow, IndexError> {
    let definition = manager.definition(&name)?;
    let info = if long {
        Some(manager.acquire(&name)?.info()?)
    } else {
        None
    };
    Ok(IndexRow {
        analyzer: definition.default_analyzer,
        update_seq: info.map(|i| i.update_seq),
        num_docs: info.map(|i| i.num_docs),
        name,
    })
}

/// Lists indexes under a prefix.
pub fn run(ctx: &CommandContext, cmd: &LsCommand) -> ExitCode {
    with_manager(ctx, |manager| {
        let names = match manager.list(&cmd.prefix) {
            Ok(names) => names,
            Err(e) => return index_failure("failed to list indexes", &e),
        };

        let mut rows = Vec::with_capacity(names.len());
        for name in names {
            match row(manager, name, cmd.long) {
                Ok(row) => rows.push(row),
                Err(e) => return index_failure("failed to read index", &e),
            }
        }

        if cmd.output.json {
            return print_json(&rows);
        }
        if rows.is_empty() {
            println!("No indexes.");
            return ExitCode::SUCCESS;
        }

        let header: &[&str] = if cmd.long {
            &["name", "analyzer", "update_seq", "documents"]
        } else {
            &["name", "analyzer"]
        };
        let mut table = table(header);
        for row in &rows {
            let mut cells = vec![Cell::new(&row.name), Cell::new(&row.analyzer)];
            if let (Some(seq), Some(docs)) = (row.update_seq, row.num_docs) {
                cells.push(Cell::new(seq));
                cells.push(Cell::new(docs));
            }
            table.add_row(cells);
        }
        println!("{table}");
        ExitCode::SUCCESS
    })
}
