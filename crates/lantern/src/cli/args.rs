//! Clap argument definitions for the `lantern` CLI.

use std::{collections::BTreeMap, path::PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use lantern_index::{DoubleRange, SortField, SortValue};

/// Parses a `FIELD=ANALYZER` pair.
fn parse_field_analyzer(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((field, analyzer)) if !field.is_empty() && !analyzer.is_empty() => {
            Ok((field.to_string(), analyzer.to_string()))
        }
        _ => Err(format!("expected FIELD=ANALYZER, got '{s}'")),
    }
}

/// A resume cursor; an alias so clap parses it as one value.
type Cursor = Vec<SortValue>;

/// Parses an `--after` cursor: the JSON array a previous hit reported as its
/// `order`.
fn parse_after(s: &str) -> Result<Cursor, String> {
    serde_json::from_str(s).map_err(|e| format!("expected a JSON array of sort values: {e}"))
}

/// Parses `--ranges`: a JSON object of field name to ranges.
fn parse_ranges(s: &str) -> Result<BTreeMap<String, Vec<DoubleRange>>, String> {
    serde_json::from_str(s).map_err(|e| format!("expected a JSON object of ranges: {e}"))
}

/// Top-level CLI options.
#[derive(Parser)]
#[command(name = "lantern")]
#[command(about = "Lantern - manage a directory of full-text search indexes")]
pub struct Cli {
    /// Configuration file (skips discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Index root directory (overrides root_dir)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Log verbosity (-v for info, -vv for debug)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Shared output mode flag.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct OutputArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `lantern create`.
#[derive(Args, Debug, Clone)]
pub struct CreateCommand {
    /// Index name
    pub name: String,

    /// Default analyzer for text fields
    #[arg(short = 'a', long, default_value = "standard")]
    pub analyzer: String,

    /// Per-field analyzer override (FIELD=ANALYZER, repeatable)
    #[arg(long = "field", value_parser = parse_field_analyzer)]
    pub fields: Vec<(String, String)>,
}

/// Arguments for `lantern info`.
#[derive(Args, Debug, Clone)]
pub struct InfoCommand {
    /// Index name
    pub name: String,

    #[command(flatten)]
    /// Output formatting flags.
    pub output: OutputArgs,
}

/// Arguments for `lantern update`.
#[derive(Args, Debug, Clone)]
pub struct UpdateCommand {
    /// Index name
    pub name: String,

    /// Document id
    pub doc_id: String,

    /// Update sequence; must exceed the index's current sequence
    #[arg(long)]
    pub seq: u64,

    /// Partition the document belongs to
    #[arg(long)]
    pub partition: Option<String>,

    /// Document fields as a JSON array
    pub fields: String,
}

/// Arguments for `lantern delete`.
#[derive(Args, Debug, Clone)]
pub struct DeleteCommand {
    /// Index name
    pub name: String,

    /// Document id
    pub doc_id: String,

    /// Update sequence; must exceed the index's current sequence
    #[arg(long)]
    pub seq: u64,
}

/// Arguments for `lantern search`.
#[derive(Args, Debug, Clone)]
pub struct SearchCommand {
    /// Index name
    pub name: String,

    /// Query string
    pub query: String,

    /// Maximum hits to return [default: 25]
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Restrict hits to one partition
    #[arg(long)]
    pub partition: Option<String>,

    /// Sort by FIELD, written [-]FIELD[<double|string>]; repeat to add tie-breaks
    #[arg(long, allow_hyphen_values = true)]
    pub sort: Vec<SortField>,

    /// Resume after a hit, given its order as JSON (e.g. '[9.5,"doc-1"]')
    #[arg(long, value_parser = parse_after)]
    pub after: Option<Cursor>,

    /// Count the distinct values of a string field over all matches
    #[arg(long = "count")]
    pub counts: Vec<String>,

    /// Count matches in double ranges, as JSON: '{"price":[{"label":"low","min":0,"max":10}]}'
    #[arg(long, value_parser = parse_ranges)]
    pub ranges: Option<BTreeMap<String, Vec<DoubleRange>>>,

    /// Labels kept per counted field [default: 10]
    #[arg(long)]
    pub top_n: Option<usize>,

    #[command(flatten)]
    /// Output formatting flags.
    pub output: OutputArgs,
}

/// Arguments for `lantern ls`.
#[derive(Args, Debug, Clone)]
pub struct LsCommand {
    /// Only list indexes under this prefix
    #[arg(default_value = "")]
    pub prefix: String,

    /// Open each index and show its sequence and document count
    #[arg(short = 'l', long)]
    pub long: bool,

    #[command(flatten)]
    /// Output formatting flags.
    pub output: OutputArgs,
}

/// Arguments for `lantern delete-all`.
#[derive(Args, Debug, Clone)]
pub struct DeleteAllCommand {
    /// Delete every index at or below this prefix
    pub prefix: String,
}

/// Arguments for `lantern analyze`.
#[derive(Args, Debug, Clone)]
pub struct AnalyzeCommand {
    /// Analyzer name
    pub analyzer: String,

    /// Text to analyze
    pub text: String,

    #[command(flatten)]
    /// Output formatting flags.
    pub output: OutputArgs,
}

/// Supported `lantern` subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Create an index
    Create(CreateCommand),

    /// Show an index's update sequence and document count
    Info(InfoCommand),

    /// Insert or replace a document
    Update(UpdateCommand),

    /// Delete a document
    Delete(DeleteCommand),

    /// Search an index
    Search(SearchCommand),

    /// List indexes
    Ls(LsCommand),

    /// Delete every index under a prefix
    DeleteAll(DeleteAllCommand),

    /// Show the tokens an analyzer produces
    Analyze(AnalyzeCommand),

    /// Show effective configuration settings
    Config,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use lantern_index::DEFAULT_SEARCH_LIMIT;

    use super::*;

    /// Gets help text for a subcommand's argument.
    fn get_arg_help(cmd: &clap::Command, subcmd: &str, arg: &str) -> String {
        cmd.get_subcommands()
            .find(|c| c.get_name() == subcmd)
            .and_then(|c| c.get_arguments().find(|a| a.get_id() == arg))
            .and_then(|a| a.get_help().map(|h| h.to_string()))
            .unwrap_or_default()
    }

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn search_limit_help_matches_default() {
        let help = get_arg_help(&Cli::command(), "search", "limit");
        assert!(
            help.contains(&format!("[default: {DEFAULT_SEARCH_LIMIT}]")),
            "search --limit help should contain default {DEFAULT_SEARCH_LIMIT}: {help}"
        );
    }

    #[test]
    fn field_analyzer_pairs() {
        assert_eq!(
            parse_field_analyzer("title=english"),
            Ok(("title".to_string(), "english".to_string()))
        );
        assert!(parse_field_analyzer("title").is_err());
        assert!(parse_field_analyzer("=english").is_err());
    }

    #[test]
    fn search_sort_and_facet_flags() {
        let cli = Cli::try_parse_from([
            "lantern",
            "search",
            "books",
            "rust",
            "--sort",
            "-price<double>",
            "--sort",
            "title<string>",
            "--after",
            r#"[9.5, null, "b"]"#,
            "--count",
            "lang",
            "--ranges",
            r#"{"price": [{"label": "low", "min": 0, "max": 10}]}"#,
            "--top-n",
            "3",
        ])
        .unwrap();
        let Commands::Search(cmd) = cli.command else {
            panic!("not a search command");
        };
        assert_eq!(cmd.sort.len(), 2);
        assert!(cmd.sort[0].descending);
        assert_eq!(cmd.sort[1].to_string(), "title<string>");
        assert_eq!(
            cmd.after,
            Some(vec![
                SortValue::Number(9.5),
                SortValue::Missing,
                SortValue::Text("b".into())
            ])
        );
        assert_eq!(cmd.counts, vec!["lang"]);
        assert_eq!(cmd.ranges.unwrap()["price"][0].label, "low");
        assert_eq!(cmd.top_n, Some(3));
    }

    #[test]
    fn search_rejects_bad_sort_and_cursor() {
        for args in [
            ["--sort", "price<int>"],
            ["--after", "not json"],
            ["--ranges", "[1, 2]"],
        ] {
            let mut argv = vec!["lantern", "search", "books", "rust"];
            argv.extend(args);
            assert!(Cli::try_parse_from(argv).is_err(), "{args:?} parsed");
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["lantern", "ls", "--root", "/tmp/x", "-vv", "--json"]).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/x")));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Ls(LsCommand { output, .. }) if output.json));
    }
}
