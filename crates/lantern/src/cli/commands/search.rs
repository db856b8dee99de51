//! Implementation of `lantern search`.

use std::process::ExitCode;

use lantern_index::{DEFAULT_SEARCH_LIMIT, DEFAULT_TOP_N, SearchRequest};

use super::shared::with_manager;
use crate::cli::{
    args::SearchCommand,
    context::CommandContext,
    output::{index_failure, print_facets, print_hits, print_json},
};

/// Searches one index.
pub fn run(ctx: &CommandContext, cmd: &SearchCommand) -> ExitCode {
    let request = SearchRequest {
        query: cmd.query.clone(),
        limit: cmd.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
        partition: cmd.partition.clone(),
        sort: cmd.sort.clone(),
        after: cmd.after.clone(),
        counts: cmd.counts.clone(),
        ranges: cmd.ranges.clone().unwrap_or_default(),
        top_n: cmd.top_n.unwrap_or(DEFAULT_TOP_N),
    };

    with_manager(ctx, |manager| {
        let results = match manager
            .acquire(&cmd.name)
            .and_then(|lease| lease.search(&request))
        {
            Ok(results) => results,
            Err(e) => return index_failure("search failed", &e),
        };

        if cmd.output.json {
            return print_json(&results);
        }
        print_hits(&results);
        print_facets("count", &results.counts);
        print_facets("matches", &results.ranges);
        ExitCode::SUCCESS
    })
}
