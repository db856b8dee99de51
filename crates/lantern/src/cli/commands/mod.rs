//! Command implementations and dispatch.

pub mod analyze;
pub mod config;
pub mod create;
pub mod delete;
pub mod delete_all;
pub mod info;
pub mod ls;
pub mod search;
mod shared;
pub mod update;

use std::process::ExitCode;

use super::{args::Commands, context::CommandContext};

/// Dispatches to the selected subcommand.
pub fn run(command: Commands, ctx: &CommandContext) -> ExitCode {
    match command {
        Commands::Create(cmd) => create::run(ctx, &cmd),
        Commands::Info(cmd) => info::run(ctx, &cmd),
        Commands::Update(cmd) => update::run(ctx, &cmd),
        Commands::Delete(cmd) => delete::run(ctx, &cmd),
        Commands::Search(cmd) => search::run(ctx, &cmd),
        Commands::Ls(cmd) => ls::run(ctx, &cmd),
        Commands::DeleteAll(cmd) => delete_all::run(ctx, &cmd),
        Commands::Analyze(cmd) => analyze::run(&cmd),
        Commands::Config => config::run(ctx),
    }
}
