//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::models::{SearchRequest, SearchResponse};
use crate::orchestrator::PerformanceSearch;
use crate::service;
use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;

/// Run the search command.
///
/// All performers are searched concurrently, each with its own time budget.
pub async fn run_search(
    names: &[String],
    timeout: Option<u64>,
    json: bool,
    settings: Settings,
) -> Result<()> {
    preflight::check(Operation::Search, &settings)?;

    let search = service::build(&settings)?;
    let timeout = timeout.unwrap_or(settings.search.default_timeout_seconds);

    let spinner = Output::spinner(&format!(
        "Searching for {} (up to {}s)...",
        names.join(", "),
        timeout
    ));
    let results = search_all(search, names, timeout).await;
    spinner.finish_and_clear();

    let mut responses = Vec::new();
    let mut failures = 0;
    for (name, result) in names.iter().zip(results) {
        match result {
            Ok(response) => {
                if !response.success {
                    failures += 1;
                }
                responses.push(response);
            }
            Err(e) => {
                failures += 1;
                Output::error(&format!("{}: {}", name, e));
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&responses)?);
    } else {
        for response in &responses {
            Output::search_response(response);
        }
        println!();
    }

    if failures > 0 {
        anyhow::bail!("{} of {} searches failed", failures, names.len());
    }
    Ok(())
}

/// Search every name concurrently; results follow the order of `names`.
async fn search_all(
    search: Arc<dyn PerformanceSearch>,
    names: &[String],
    timeout: u64,
) -> Vec<crate::Result<SearchResponse>> {
    let requests: Vec<SearchRequest> = names
        .iter()
        .map(|name| SearchRequest::new(name.as_str(), timeout))
        .collect();

    join_all(requests.iter().map(|request| search.search(request))).await
}
