// src/pipeline/run.rs

//! Run entry points used by the CLI.

use std::path::Path;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{Config, SeenLedger};
use crate::pipeline::retention::{RetentionEnforcer, RetentionReport};
use crate::pipeline::sync::{RunSummary, SyncOrchestrator};
use crate::services::{HttpInventoryService, HttpSourceAdapter};
use crate::storage::LedgerStore;
use crate::utils::{console, http};

/// Run one full sync cycle against the configured source and backend.
///
/// Fatal configuration problems are returned before any network activity.
/// Everything else ends up in the summary; the ledger is saved even when the
/// overall `timeout` cut the run short.
pub async fn run_sync(config: &Config, base: &Path, timeout: Option<Duration>) -> Result<RunSummary> {
    config.ensure_runnable()?;

    let source_client = http::create_client_with_cookie(&config.http, config.source.cookie.as_deref())?;
    let source = HttpSourceAdapter::new(&config.source, source_client)?;
    let inventory = HttpInventoryService::new(&config.backend, http::create_client(&config.http)?);
    let orchestrator = SyncOrchestrator::new(config, &source, &inventory)?;

    console::header("Schedule sync");

    console::step(1, 3, "Loading ledger");
    let store = LedgerStore::new(config.ledger_path(base));
    let mut ledger = store.load_or_empty().await;
    log::info!(
        "Ledger {} holds {} reference(s)",
        store.path().display(),
        ledger.len()
    );

    console::step(2, 3, "Syncing announcements");
    let summary = execute(&orchestrator, &mut ledger, timeout).await;

    console::step(3, 3, "Saving ledger");
    if let Err(e) = store.save(&ledger).await {
        log::error!("Failed to save ledger to {}: {}", store.path().display(), e);
    }

    if config.logging.show_summary {
        console::summary("Run complete", &summary.items());
    }
    for publication in &summary.published {
        console::success(&format!("Published \"{}\"", publication.title));
    }

    Ok(summary)
}

/// Run the orchestrator under an optional overall time limit.
///
/// On timeout the ledger keeps whatever was recorded before cancellation.
pub async fn execute(
    orchestrator: &SyncOrchestrator<'_>,
    ledger: &mut SeenLedger,
    timeout: Option<Duration>,
) -> RunSummary {
    let Some(limit) = timeout else {
        return orchestrator.run(ledger).await;
    };

    match tokio::time::timeout(limit, orchestrator.run(ledger)).await {
        Ok(summary) => summary,
        Err(_) => {
            let err = AppError::timeout("sync run", limit.as_secs());
            log::error!("{}", err);
            RunSummary {
                aborted: Some(err.to_string()),
                ..RunSummary::default()
            }
        }
    }
}

/// Enforce retention on the backend without syncing.
pub async fn run_prune(config: &Config) -> Result<RetentionReport> {
    config.ensure_runnable()?;

    let inventory = HttpInventoryService::new(&config.backend, http::create_client(&config.http)?);
    let report = RetentionEnforcer::new(config.sync.retention_count)
        .enforce(&inventory)
        .await;

    if config.logging.show_summary {
        let listed = report.listed.map_or_else(|| "unknown".to_string(), |n| n.to_string());
        console::summary(
            "Retention complete",
            &[
                ("Listed", listed),
                ("Kept", report.kept.to_string()),
                ("Deleted", report.deleted.to_string()),
                ("Failed", report.failed.to_string()),
            ],
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::models::ItemDetail;
    use crate::services::{MemoryInventory, SourceAdapter};

    #[tokio::test]
    async fn test_missing_backend_is_fatal_before_any_io() {
        let tmp = TempDir::new().unwrap();
        let config = Config::default();

        let err = run_sync(&config, tmp.path(), None).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(!config.ledger_path(tmp.path()).exists());

        assert!(run_prune(&config).await.unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.backend.base_url = "http://127.0.0.1:9".to_string();
        config.backend.password = "secret".to_string();
        config.sync.exclusion_pattern = "[".to_string();

        let err = run_sync(&config, tmp.path(), None).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(!config.ledger_path(tmp.path()).exists());
    }

    struct StallingSource;

    #[async_trait]
    impl SourceAdapter for StallingSource {
        async fn discover(&self) -> Result<Vec<String>> {
            Ok(vec!["first".to_string(), "second".to_string()])
        }

        async fn fetch_detail(&self, source_ref: &str) -> Result<ItemDetail> {
            if source_ref == "second" {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(ItemDetail {
                raw_title: "Расписание звонков".to_string(),
                attachment_ref: None,
            })
        }

        async fn fetch_attachment(&self, _attachment_ref: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_overall_timeout_keeps_recorded_refs() {
        let inventory = MemoryInventory::new();
        let orchestrator = SyncOrchestrator::new(&Config::default(), &StallingSource, &inventory).unwrap();
        let mut ledger = SeenLedger::new();

        let summary = execute(&orchestrator, &mut ledger, Some(Duration::from_millis(100))).await;

        assert!(summary.aborted.is_some());
        assert!(ledger.contains("first"));
        assert!(!ledger.contains("second"));
    }
}
