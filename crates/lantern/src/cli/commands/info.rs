//! Implementation of `lantern info`.

use std::process::ExitCode;

use serde::Serialize;

use super::shared::with_manager;
use crate::cli::{
    args::InfoCommand,
    context::CommandContext,
    output::{index_failure, print_json},
};

/// JSON output for `lantern info`.
#[derive(Serialize)]
struct JsonInfo<'a> {
    /// Index name.
    name: &'a str,
    /// Most recently applied update sequence.
    update_seq: u64,
    /// Number of searchable documents.
    num_docs: u64,
}

/// Shows an index's update sequence and document count.
pub fn run(ctx: &CommandContext, cmd: &InfoCommand) -> ExitCode {
    with_manager(ctx, |manager| {
        let info = match manager.acquire(&cmd.name).and_then(|lease| lease.info()) {
            Ok(info) => info,
            Err(e) => return index_failure("failed to read index", &e),
        };

        if cmd.output.json {
            return print_json(&JsonInfo {
                name: &cmd.name,
                update_seq: info.update_seq,
                num_docs: info.num_docs,
            });
        }
        println!("{}", cmd.name);
        println!("  update_seq: {}", info.update_seq);
        println!("  documents:  {}", info.num_docs);
        ExitCode::SUCCESS
    })
}
