//! Implementation of `lantern analyze`.

use std::process::ExitCode;

use lantern_index::analyzer;

use crate::cli::{
    args::AnalyzeCommand,
    output::{index_failure, print_json},
};

/// Prints the tokens an analyzer produces for some text.
pub fn run(cmd: &AnalyzeCommand) -> ExitCode {
    let tokens = match analyzer::analyze(&cmd.analyzer, &cmd.text) {
        Ok(tokens) => tokens,
        Err(e) => return index_failure("analysis failed", &e),
    };

    if cmd.output.json {
        return print_json(&tokens);
    }
    for token in &tokens {
        println!("{token}");
    }
    ExitCode::SUCCESS
}
