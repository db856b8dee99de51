//! Implementation of `lantern delete`.

use std::process::ExitCode;

use lantern_index::DocumentDeleteRequest;

use super::shared::with_manager;
use crate::cli::{args::DeleteCommand, context::CommandContext, output::index_failure};

/// Deletes one document.
pub fn run(ctx: &CommandContext, cmd: &DeleteCommand) -> ExitCode {
    let request = DocumentDeleteRequest { seq: cmd.seq };

    with_manager(ctx, |manager| {
        let deleted = manager
            .acquire(&cmd.name)
            .and_then(|lease| lease.delete(&cmd.doc_id, &request));
        match deleted {
            Ok(()) => {
                println!("Deleted {} from {} at seq {}", cmd.doc_id, cmd.name, cmd.seq);
                ExitCode::SUCCESS
            }
            Err(e) => index_failure("failed to delete document", &e),
        }
    })
}
