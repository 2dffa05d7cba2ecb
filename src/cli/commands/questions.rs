//! Questions command implementation.
//!
//! Loads the documents directory, then suggests question sets (generating
//! on shortage, exactly like the HTTP surface does).

use crate::cli::Output;
use crate::config::Settings;
use crate::service::Service;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Run the questions command.
pub async fn run_questions(count: usize, topic: Option<String>, settings: Settings) -> Result<()> {
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
            "No transcript documents in {}. Nothing to generate from.",
            documents_dir.display()
        ));
        return Ok(());
    }

    let spinner = Output::spinner("Generating questions...");
    let sets = service.generator().suggest(count, topic.as_deref()).await;
    spinner.finish_and_clear();

    if sets.is_empty() {
        Output::warning("No questions available.");
        return Ok(());
    }

    for set in &sets {
        Output::header(&format!("Episode {}", set.source_episode_number));
        if !set.topics.is_empty() {
            Output::kv("Topics", &set.topics.join(", "));
        }
        for question in &set.questions {
            Output::list_item(question);
        }
    }

    Ok(())
}
