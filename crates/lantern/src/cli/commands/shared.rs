//! Shared helpers for command implementations.

use std::process::ExitCode;

use crate::cli::context::{CommandContext, Manager};

/// Opens the index manager, runs `f`, then shuts the manager down so every
/// open index is committed and closed before the process exits.
pub fn with_manager(ctx: &CommandContext, f: impl FnOnce(&Manager) -> ExitCode) -> ExitCode {
    let manager = match ctx.manager() {
        Ok(manager) => manager,
        Err(code) => return code,
    };
    let code = f(&manager);
    manager.shutdown();
    code
}
