//! Implementation of `lantern create`.

use std::process::ExitCode;

use lantern_index::IndexDefinition;

use super::shared::with_manager;
use crate::cli::{args::CreateCommand, context::CommandContext, output::index_failure};

/// Persists the definition of a new index.
pub fn run(ctx: &CommandContext, cmd: &CreateCommand) -> ExitCode {
    let definition = cmd
        .fields
        .iter()
        .fold(IndexDefinition::new(&cmd.analyzer), |definition, (field, analyzer)| {
            definition.with_field_analyzer(field, analyzer)
        });

    with_manager(ctx, |manager| match manager.create(&cmd.name, &definition) {
        Ok(()) => {
            println!("Created {}", cmd.name);
            ExitCode::SUCCESS
        }
        Err(e) => index_failure("failed to create index", &e),
    })
}
