// src/pipeline/sync.rs

//! One synchronization run.
//!
//! Items are processed strictly one after another. The inventory is listed
//! once at the start and that snapshot, extended with whatever this run
//! registers, drives the remote dedup checks. Notification, retention and the
//! final inventory check run no matter how the sync phase ended.

use std::fmt;
use std::time::Duration;

use chrono::{Local, NaiveDate};

use crate::error::{AppError, Result};
use crate::models::{CandidateItem, Config, DedupStrategy, NotifyConfig, SeenLedger};
use crate::pipeline::classify::ItemClassifier;
use crate::pipeline::dedup::{DedupDecision, DedupGate, DedupReason};
use crate::pipeline::notify::NotificationDispatcher;
use crate::pipeline::publish::{Publication, PublishClient, PublishOutcome};
use crate::pipeline::retention::{RetentionEnforcer, RetentionReport};
use crate::pipeline::validate::{AttachmentValidator, InvalidAttachment};
use crate::services::{InventoryService, SourceAdapter};

/// Why a classified item was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Not a schedule change, or an exam/session/contest notice
    Irrelevant,
    /// Dated outside the freshness window
    Stale,
}

/// Where a transient failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Detail,
    Attachment,
    Publish,
    Timeout,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureStage::Detail => "detail fetch",
            FailureStage::Attachment => "attachment fetch",
            FailureStage::Publish => "publish",
            FailureStage::Timeout => "item timeout",
        };
        f.write_str(s)
    }
}

/// Terminal state of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Excluded(Exclusion),
    Duplicate(DedupReason),
    Invalid(InvalidAttachment),
    Published(Publication),
    /// Backend answered `added: false`
    Skipped { url: String },
    Failed { stage: FailureStage, reason: String },
}

impl ItemOutcome {
    /// Definitive outcomes are not retried in later runs.
    pub fn is_definitive(&self) -> bool {
        !matches!(self, ItemOutcome::Failed { .. })
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemOutcome::Excluded(Exclusion::Irrelevant) => f.write_str("excluded: not relevant"),
            ItemOutcome::Excluded(Exclusion::Stale) => f.write_str("excluded: stale"),
            ItemOutcome::Duplicate(reason) => write!(f, "duplicate: {reason}"),
            ItemOutcome::Invalid(reason) => write!(f, "invalid attachment: {reason}"),
            ItemOutcome::Published(p) => write!(f, "published \"{}\" at {}", p.title, p.url),
            ItemOutcome::Skipped { url } => write!(f, "skipped, backend already has {url}"),
            ItemOutcome::Failed { stage, reason } => write!(f, "failed at {stage}: {reason}"),
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    /// Refs dropped by the ledger before any fetch
    pub already_seen: usize,
    /// Refs processed this run
    pub considered: usize,
    pub excluded: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub published: Vec<Publication>,
    pub skipped: usize,
    pub failed: usize,
    pub notified: bool,
    pub pruned: RetentionReport,
    /// Record count after retention; `None` when the final listing failed
    pub final_inventory: Option<usize>,
    /// Set when the sync phase stopped early
    pub aborted: Option<String>,
}

impl RunSummary {
    fn tally(&mut self, outcome: &ItemOutcome) {
        self.considered += 1;
        match outcome {
            ItemOutcome::Excluded(_) => self.excluded += 1,
            ItemOutcome::Duplicate(_) => self.duplicates += 1,
            ItemOutcome::Invalid(_) => self.invalid += 1,
            ItemOutcome::Published(p) => self.published.push(p.clone()),
            ItemOutcome::Skipped { .. } => self.skipped += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Key/value lines for the console summary.
    pub fn items(&self) -> Vec<(&'static str, String)> {
        let optional = |value: Option<usize>| value.map_or_else(|| "unknown".to_string(), |v| v.to_string());
        let mut items = vec![
            ("Discovered", self.discovered.to_string()),
            ("Already seen", self.already_seen.to_string()),
            ("Considered", self.considered.to_string()),
            ("Excluded", self.excluded.to_string()),
            ("Duplicates", self.duplicates.to_string()),
            ("Invalid", self.invalid.to_string()),
            ("Published", self.published.len().to_string()),
            ("Skipped", self.skipped.to_string()),
            ("Failed", self.failed.to_string()),
            ("Notified", if self.notified { "yes" } else { "no" }.to_string()),
            ("Pruned", self.pruned.deleted.to_string()),
            ("Inventory", optional(self.final_inventory)),
        ];
        if let Some(reason) = &self.aborted {
            items.push(("Aborted", reason.clone()));
        }
        items
    }
}

/// Per-run mutable state threaded through item processing.
struct RunState<'r> {
    ledger: &'r mut SeenLedger,
    gate: DedupGate,
    dispatcher: &'r mut NotificationDispatcher,
}

/// Sequences discovery, classification, dedup, publish, notify and retention.
pub struct SyncOrchestrator<'a> {
    classifier: ItemClassifier,
    validator: AttachmentValidator,
    retention: RetentionEnforcer,
    strategy: DedupStrategy,
    notify: NotifyConfig,
    max_items: usize,
    item_timeout: Duration,
    today: NaiveDate,
    source: &'a dyn SourceAdapter,
    inventory: &'a dyn InventoryService,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        config: &Config,
        source: &'a dyn SourceAdapter,
        inventory: &'a dyn InventoryService,
    ) -> Result<Self> {
        Ok(Self {
            classifier: ItemClassifier::new(&config.sync, config.calendar.clone())?,
            validator: AttachmentValidator::new(&config.attachment),
            retention: RetentionEnforcer::new(config.sync.retention_count),
            strategy: config.sync.dedup,
            notify: config.notify.clone(),
            max_items: config.sync.max_items_per_run,
            item_timeout: Duration::from_secs(config.sync.item_timeout_secs),
            today: Local::now().date_naive(),
            source,
            inventory,
        })
    }

    /// Classify against a fixed date instead of the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = timeout;
        self
    }

    /// Run one cycle. Refs that reached a definitive outcome, or whose
    /// publish was attempted, are recorded in `ledger` as they happen.
    pub async fn run(&self, ledger: &mut SeenLedger) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut dispatcher = NotificationDispatcher::new(&self.notify);

        match self.inventory.list().await {
            Ok(snapshot) => {
                log::info!("Inventory holds {} record(s)", snapshot.len());
                let mut state = RunState {
                    ledger,
                    gate: DedupGate::new(self.strategy, &snapshot),
                    dispatcher: &mut dispatcher,
                };
                if let Err(e) = self.sync(&mut state, &mut summary).await {
                    log::error!("Sync phase aborted: {}", e);
                    summary.aborted = Some(e.to_string());
                }
            }
            Err(e) => {
                log::error!("Inventory listing failed, publishing skipped: {}", e);
                summary.aborted = Some(e.to_string());
            }
        }

        summary.notified = dispatcher.dispatch(self.inventory).await;
        summary.pruned = self.retention.enforce(self.inventory).await;
        summary.final_inventory = match self.inventory.list().await {
            Ok(records) => Some(records.len()),
            Err(e) => {
                log::warn!("Final inventory check failed: {}", e);
                None
            }
        };

        summary
    }

    async fn sync(&self, state: &mut RunState<'_>, summary: &mut RunSummary) -> Result<()> {
        let refs = self.source.discover().await?;
        summary.discovered = refs.len();

        let mut pending = Vec::new();
        for source_ref in refs {
            match state.gate.check_ref(state.ledger, &source_ref) {
                DedupDecision::New => pending.push(source_ref),
                DedupDecision::Duplicate(_) => summary.already_seen += 1,
            }
        }
        if pending.len() > self.max_items {
            log::info!(
                "{} unseen item(s), processing the first {}",
                pending.len(),
                self.max_items
            );
            pending.truncate(self.max_items);
        }

        for source_ref in pending {
            let outcome =
                match tokio::time::timeout(self.item_timeout, self.process(state, &source_ref)).await {
                    Ok(outcome) => outcome,
                    Err(_) => ItemOutcome::Failed {
                        stage: FailureStage::Timeout,
                        reason: AppError::timeout(&source_ref, self.item_timeout.as_secs()).to_string(),
                    },
                };

            if outcome.is_definitive() {
                log::info!("{}: {}", source_ref, outcome);
            } else {
                log::warn!("{}: {}", source_ref, outcome);
            }
            summary.tally(&outcome);
        }

        Ok(())
    }

    async fn process(&self, state: &mut RunState<'_>, source_ref: &str) -> ItemOutcome {
        let detail = match self.source.fetch_detail(source_ref).await {
            Ok(detail) => detail,
            Err(e) => {
                return ItemOutcome::Failed {
                    stage: FailureStage::Detail,
                    reason: e.to_string(),
                };
            }
        };

        let candidate = CandidateItem {
            source_ref: source_ref.to_string(),
            raw_title: detail.raw_title,
        };
        let item = self.classifier.classify(candidate, self.today);
        log::debug!("{} classified as \"{}\"", source_ref, item.normalized_title);

        let outcome = if !item.is_relevant {
            Some(ItemOutcome::Excluded(Exclusion::Irrelevant))
        } else if !item.is_fresh {
            Some(ItemOutcome::Excluded(Exclusion::Stale))
        } else if let DedupDecision::Duplicate(reason) =
            state.gate.check_item(&item, detail.attachment_ref.as_deref())
        {
            Some(ItemOutcome::Duplicate(reason))
        } else {
            None
        };
        if let Some(outcome) = outcome {
            state.ledger.record(source_ref);
            return outcome;
        }

        let Some(attachment_ref) = detail.attachment_ref else {
            state.ledger.record(source_ref);
            return ItemOutcome::Invalid(InvalidAttachment::Missing);
        };

        let bytes = match self.source.fetch_attachment(&attachment_ref).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return ItemOutcome::Failed {
                    stage: FailureStage::Attachment,
                    reason: e.to_string(),
                };
            }
        };

        let attachment = match self.validator.validate(bytes) {
            Ok(attachment) => attachment,
            Err(reason) => {
                state.ledger.record(source_ref);
                return ItemOutcome::Invalid(reason);
            }
        };

        // Counts as attempted even if publishing fails or times out
        state.ledger.record(source_ref);

        match PublishClient::new(self.inventory)
            .publish(&item, &attachment, &state.gate)
            .await
        {
            Ok(PublishOutcome::Published(publication)) => {
                state.gate.remember(&publication.title, &publication.url);
                state.dispatcher.record(&publication.title);
                ItemOutcome::Published(publication)
            }
            Ok(PublishOutcome::Skipped { url }) => {
                state.gate.remember(&item.normalized_title, &url);
                ItemOutcome::Skipped { url }
            }
            Ok(PublishOutcome::Duplicate { .. }) => ItemOutcome::Duplicate(DedupReason::RemoteUrl),
            Err(e) => ItemOutcome::Failed {
                stage: FailureStage::Publish,
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::models::ItemDetail;
    use crate::services::memory::Operation;
    use crate::services::{MemoryInventory, MemorySource};

    const RELEVANT: &str = "Изменения в расписании на 17 октября";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn pdf(tag: &str) -> Vec<u8> {
        let mut bytes = format!("%PDF-1.7\n% {tag}\n").into_bytes();
        bytes.resize(2048, b' ');
        bytes
    }

    fn orchestrator<'a>(
        source: &'a dyn SourceAdapter,
        inventory: &'a dyn InventoryService,
    ) -> SyncOrchestrator<'a> {
        SyncOrchestrator::new(&Config::default(), source, inventory)
            .unwrap()
            .with_today(today())
    }

    async fn seed_three(inventory: &MemoryInventory) {
        for id in 1..=3 {
            inventory
                .seed(id, &format!("old {id}"), &format!("memory://files/old_{id}.pdf"))
                .await;
        }
    }

    #[tokio::test]
    async fn test_two_ref_scenario() {
        let source = MemorySource::new()
            .with_item(
                "ref-a",
                "Изменения в расписании экзамена",
                "att-a",
                pdf("a"),
            )
            .with_item("ref-b", RELEVANT, "att-b", pdf("b"));
        let inventory = MemoryInventory::new();
        seed_three(&inventory).await;
        let mut ledger = SeenLedger::new();

        let summary = orchestrator(&source, &inventory).run(&mut ledger).await;

        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.excluded, 1);
        assert_eq!(summary.published.len(), 1);
        assert!(summary.notified);

        let notifications = inventory.notifications().await;
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].contains("Суббота - 17 октября"));

        let records = inventory.records().await;
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.id.0 != 1));
        assert!(records.iter().any(|r| r.title == "Суббота - 17 октября"));
        assert_eq!(summary.pruned.deleted, 1);
        assert_eq!(summary.final_inventory, Some(3));

        assert!(ledger.contains("ref-a"));
        assert!(ledger.contains("ref-b"));
        // The excluded item never had its attachment fetched or uploaded
        assert_eq!(inventory.upload_count().await, 1);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let source = MemorySource::new().with_item("ref-b", RELEVANT, "att-b", pdf("b"));
        let inventory = MemoryInventory::new();
        let mut ledger = SeenLedger::new();

        let first = orchestrator(&source, &inventory).run(&mut ledger).await;
        let second = orchestrator(&source, &inventory).run(&mut ledger).await;

        assert_eq!(first.published.len(), 1);
        assert!(second.published.is_empty());
        assert_eq!(second.already_seen, 1);
        assert!(!second.notified);
        assert_eq!(inventory.records().await.len(), 1);
        assert_eq!(inventory.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_lost_ledger_does_not_republish() {
        let source = MemorySource::new().with_item("ref-b", RELEVANT, "att-b", pdf("b"));
        let inventory = MemoryInventory::new();

        orchestrator(&source, &inventory).run(&mut SeenLedger::new()).await;
        let summary = orchestrator(&source, &inventory).run(&mut SeenLedger::new()).await;

        assert_eq!(summary.duplicates, 1);
        assert!(summary.published.is_empty());
        assert_eq!(inventory.records().await.len(), 1);
        assert_eq!(inventory.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remote_url_dedup_with_empty_ledger() {
        let bytes = pdf("same");
        let url = MemoryInventory::url_for(&PublishClient::upload_name(&bytes));
        let source = MemorySource::new().with_item("ref-x", "Изменения в расписании", "att-x", bytes);
        let inventory = MemoryInventory::new();
        inventory.seed(1, "published earlier", &url).await;
        let mut ledger = SeenLedger::new();

        let summary = orchestrator(&source, &inventory).run(&mut ledger).await;

        assert_eq!(summary.duplicates, 1);
        assert!(summary.published.is_empty());
        assert!(!summary.notified);
        let records = inventory.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "published earlier");
        assert!(ledger.contains("ref-x"));
    }

    #[tokio::test]
    async fn test_freshness_and_validation_outcomes() {
        let source = MemorySource::new()
            .with_item("stale", "Изменения в расписании на 6 октября", "att-1", pdf("1"))
            .with_item("tiny", "Изменения в расписании на 18 октября", "att-2", b"%PDF-".to_vec())
            .with_bare_item("bare", "Изменения в расписании на 19 октября");
        let inventory = MemoryInventory::new();
        let mut ledger = SeenLedger::new();

        let summary = orchestrator(&source, &inventory).run(&mut ledger).await;

        assert_eq!(summary.excluded, 1);
        assert_eq!(summary.invalid, 2);
        assert_eq!(inventory.upload_count().await, 0);
        assert_eq!(ledger.len(), 3);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_and_retried() {
        let source = MemorySource::new()
            .with_item("broken", "Изменения в расписании на 17 октября", "att-1", pdf("1"))
            .with_item("fine", "Изменения в расписании на 18 октября", "att-2", pdf("2"))
            .failing("broken");
        let inventory = MemoryInventory::new();
        let mut ledger = SeenLedger::new();

        let summary = orchestrator(&source, &inventory).run(&mut ledger).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.published.len(), 1);
        assert!(!ledger.contains("broken"));
        assert!(ledger.contains("fine"));
    }

    #[tokio::test]
    async fn test_publish_failure_is_recorded_as_attempted() {
        let source = MemorySource::new().with_item("ref-b", RELEVANT, "att-b", pdf("b"));
        let inventory = MemoryInventory::new();
        inventory.fail(Operation::Register).await;
        let mut ledger = SeenLedger::new();

        let summary = orchestrator(&source, &inventory).run(&mut ledger).await;

        assert_eq!(summary.failed, 1);
        assert!(ledger.contains("ref-b"));
        assert!(inventory.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_retention_runs_after_discovery_failure() {
        let source = MemorySource::new().failing_discovery();
        let inventory = MemoryInventory::new();
        for id in 1..=5 {
            inventory.seed(id, &format!("t{id}"), &format!("u{id}")).await;
        }
        let mut ledger = SeenLedger::new();

        let summary = orchestrator(&source, &inventory).run(&mut ledger).await;

        assert!(summary.aborted.is_some());
        assert_eq!(summary.pruned.deleted, 2);
        assert_eq!(summary.final_inventory, Some(3));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_inventory_listing_failure_publishes_nothing() {
        let source = MemorySource::new().with_item("ref-b", RELEVANT, "att-b", pdf("b"));
        let inventory = MemoryInventory::new();
        inventory.fail(Operation::List).await;
        let mut ledger = SeenLedger::new();

        let summary = orchestrator(&source, &inventory).run(&mut ledger).await;

        assert!(summary.aborted.is_some());
        assert_eq!(summary.final_inventory, None);
        assert_eq!(inventory.upload_count().await, 0);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_items_per_run_are_bounded() {
        let mut source = MemorySource::new();
        for n in 0..7 {
            source = source.with_bare_item(&format!("ref-{n}"), "Расписание звонков");
        }
        let inventory = MemoryInventory::new();
        let mut ledger = SeenLedger::new();

        let summary = orchestrator(&source, &inventory).run(&mut ledger).await;

        assert_eq!(summary.discovered, 7);
        assert_eq!(summary.considered, 5);
        assert_eq!(summary.excluded, 5);
    }

    struct SlowSource;

    #[async_trait]
    impl SourceAdapter for SlowSource {
        async fn discover(&self) -> Result<Vec<String>> {
            Ok(vec!["slow".to_string()])
        }

        async fn fetch_detail(&self, _source_ref: &str) -> Result<ItemDetail> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(ItemDetail {
                raw_title: RELEVANT.to_string(),
                attachment_ref: None,
            })
        }

        async fn fetch_attachment(&self, _attachment_ref: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_item_timeout_aborts_only_that_item() {
        let inventory = MemoryInventory::new();
        let mut ledger = SeenLedger::new();

        let summary = orchestrator(&SlowSource, &inventory)
            .with_item_timeout(Duration::from_millis(20))
            .run(&mut ledger)
            .await;

        assert_eq!(summary.failed, 1);
        assert!(summary.aborted.is_none());
        assert_eq!(summary.final_inventory, Some(0));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_only_failures_are_retried() {
        assert!(ItemOutcome::Excluded(Exclusion::Stale).is_definitive());
        assert!(ItemOutcome::Invalid(InvalidAttachment::Missing).is_definitive());
        assert!(
            !ItemOutcome::Failed {
                stage: FailureStage::Timeout,
                reason: String::new(),
            }
            .is_definitive()
        );
    }
}
