//! Search command implementation.
//!
//! The store is in-memory, so the command loads the configured documents
//! directory before searching.

use crate::cli::Output;
use crate::config::Settings;
use crate::search::SearchQuery;
use crate::service::Service;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Run the search command.
pub async fn run_search(
    query: &str,
    limit: usize,
    episode: Option<i64>,
    topic: Option<String>,
    intent: bool,
    settings: Settings,
) -> Result<()> {
    let service = Service::new(settings)?;
    let cancel = CancellationToken::new();

    let spinner = Output::spinner("Loading documents...");
    let documents_dir = service.settings().documents_dir();
    let reports = service
        .pipeline()
        .ingest_directory(&documents_dir, &cancel)
        .await?;
    spinner.finish_and_clear();

    if reports.is_empty() {
        Output::warning(&format!(
            "No transcript documents in {}. Nothing to search.",
            documents_dir.display()
        ));
        return Ok(());
    }

    let spinner = Output::spinner("Searching...");
    let outcome = if intent {
        service.search_with_intent(query).await
    } else {
        service
            .search(&SearchQuery {
                query_text: query.to_string(),
                max_results: Some(limit),
                episode_number: episode,
                topic,
                ..Default::default()
            })
            .await
    };
    spinner.finish_and_clear();

    if !outcome.success {
        let message = outcome
            .error_message
            .unwrap_or_else(|| "unknown error".to_string());
        Output::error(&format!("Search failed: {}", message));
        return Err(anyhow::anyhow!("{}", message));
    }

    let response = outcome.response.expect("successful outcome has a response");
    if response.results.is_empty() {
        Output::warning("No results found matching your query.");
        return Ok(());
    }

    Output::success(&format!(
        "Found {} results ({} total matches)",
        response.results.len(),
        response.total_results
    ));

    for record in &response.results {
        let timestamp = format_timestamp(record.start_seconds);
        let label = if record.episode_title.is_empty() {
            format!("Episode {}", record.episode_number)
        } else {
            format!("Episode {} - {}", record.episode_number, record.episode_title)
        };
        Output::search_result(&label, &timestamp, record.relevance_score, &record.text);
    }

    Ok(())
}

fn format_timestamp(start_seconds: f64) -> String {
    let total_seconds = start_seconds as u32;
    let minutes = total_seconds / 60;
    let secs = total_seconds % 60;
    format!("{:02}:{:02}", minutes, secs)
}
