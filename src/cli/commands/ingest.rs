//! Ingest command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::ingestion::IngestionReport;
use crate::service::Service;
use anyhow::Result;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Run the ingest command.
pub async fn run_ingest(path: &str, settings: Settings) -> Result<()> {
    let service = Service::new(settings)?;
    let cancel = CancellationToken::new();
    let path = Path::new(path);

    let spinner = Output::spinner("Ingesting...");

    if path.is_dir() {
        let reports = service.pipeline().ingest_directory(path, &cancel).await;
        spinner.finish_and_clear();

        let reports = reports?;
        if reports.is_empty() {
            Output::warning("No transcript documents found.");
            return Ok(());
        }
        for (file_name, report) in &reports {
            print_report(file_name, report);
        }
    } else {
        let report = service.pipeline().ingest_file(path, &cancel).await;
        spinner.finish_and_clear();

        match report {
            Ok(report) => {
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("document.json");
                print_report(file_name, &report);
            }
            Err(e) => {
                Output::error(&format!("Ingestion failed: {}", e));
                return Err(anyhow::anyhow!("{}", e));
            }
        }
    }

    Ok(())
}

fn print_report(file_name: &str, report: &IngestionReport) {
    if report.successful_count == report.total_processed {
        Output::success(&format!(
            "{}: {}/{} chunks stored",
            file_name, report.successful_count, report.total_processed
        ));
    } else {
        Output::warning(&format!(
            "{}: {}/{} chunks stored",
            file_name, report.successful_count, report.total_processed
        ));
        for outcome in report.outcomes.iter().filter(|o| !o.success) {
            let detail = outcome.error.as_deref().unwrap_or("unknown error");
            match outcome.chunk_id {
                Some(id) => Output::list_item(&format!("{}: {}", id, detail)),
                None => Output::list_item(detail),
            }
        }
    }
}
