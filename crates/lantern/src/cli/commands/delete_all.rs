//! Implementation of `lantern delete-all`.

use std::process::ExitCode;

use super::shared::with_manager;
use crate::cli::{args::DeleteAllCommand, context::CommandContext, output::index_failure};

/// Deletes every index under a prefix.
pub fn run(ctx: &CommandContext, cmd: &DeleteAllCommand) -> ExitCode {
    with_manager(ctx, |manager| match manager.delete_all(&cmd.prefix) {
        Ok(deleted) if deleted.is_empty() => {
            println!("No indexes under '{}'.", cmd.prefix);
            ExitCode::SUCCESS
        }
        Ok(deleted) => {
            for name in &deleted {
                println!("Deleted {name}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => index_failure("failed to delete indexes", &e),
    })
}
