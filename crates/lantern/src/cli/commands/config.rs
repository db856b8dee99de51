//! Implementation of `lantern config`.

use std::process::ExitCode;

use crate::cli::context::CommandContext;

/// Shows effective configuration settings and validates them.
pub fn run(ctx: &CommandContext) -> ExitCode {
    let config = &ctx.config;
    match &config.source {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no configuration file found, using defaults"),
    }
    print!("{}", config.to_toml());

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
