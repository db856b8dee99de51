//! Implementation of `lantern update`.

use std::process::ExitCode;

use lantern_index::{DocField, DocumentUpdateRequest};

use super::shared::with_manager;
use crate::cli::{args::UpdateCommand, context::CommandContext, output::index_failure};

/// Inserts or replaces one document.
pub fn run(ctx: &CommandContext, cmd: &UpdateCommand) -> ExitCode {
    let fields: Vec<DocField> = match serde_json::from_str(&cmd.fields) {
        Ok(fields) => fields,
        Err(e) => {
            eprintln!("error: invalid document fields: {e}");
            return ExitCode::FAILURE;
        }
    };
    let request = DocumentUpdateRequest {
        seq: cmd.seq,
        partition: cmd.partition.clone(),
        fields,
    };

    with_manager(ctx, |manager| {
        let updated = manager
            .acquire(&cmd.name)
            .and_then(|lease| lease.update(&cmd.doc_id, &request));
        match updated {
            Ok(()) => {
                println!("Updated {} in {} at seq {}", cmd.doc_id, cmd.name, cmd.seq);
                ExitCode::SUCCESS
            }
            Err(e) => index_failure("failed to update document", &e),
        }
    })
}
