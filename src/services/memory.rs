//! In-memory source and inventory used by the pipeline tests.
//!
//! Semantics mirror the admin API closely enough for the pipeline: uploads
//! resolve to a URL derived from the upload name, registering an existing URL
//! answers `added: false`, and ids grow monotonically.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::inventory::InventoryService;
use super::source::SourceAdapter;
use crate::error::{AppError, Result};
use crate::models::{ItemDetail, PublishedRecord, RecordId, RegisterReceipt, UploadReceipt};

const FIRST_ID: u64 = 1_760_000_000_000;

/// Source backed by fixed announcements.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    refs: Vec<String>,
    details: HashMap<String, ItemDetail>,
    attachments: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    discovery_fails: bool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an announcement with an attachment.
    pub fn with_item(
        mut self,
        source_ref: &str,
        title: &str,
        attachment_ref: &str,
        bytes: Vec<u8>,
    ) -> Self {
        self.refs.push(source_ref.to_string());
        self.details.insert(
            source_ref.to_string(),
            ItemDetail {
                raw_title: title.to_string(),
                attachment_ref: Some(attachment_ref.to_string()),
            },
        );
        self.attachments.insert(attachment_ref.to_string(), bytes);
        self
    }

    /// Add an announcement whose page has no attachment.
    pub fn with_bare_item(mut self, source_ref: &str, title: &str) -> Self {
        self.refs.push(source_ref.to_string());
        self.details.insert(
            source_ref.to_string(),
            ItemDetail {
                raw_title: title.to_string(),
                attachment_ref: None,
            },
        );
        self
    }

    /// Make every fetch of this reference (detail or attachment) fail.
    pub fn failing(mut self, reference: &str) -> Self {
        self.failing.insert(reference.to_string());
        self
    }

    /// Make discovery itself fail.
    pub fn failing_discovery(mut self) -> Self {
        self.discovery_fails = true;
        self
    }

    fn check(&self, reference: &str) -> Result<()> {
        if self.failing.contains(reference) {
            Err(AppError::source(reference, "simulated failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SourceAdapter for MemorySource {
    async fn discover(&self) -> Result<Vec<String>> {
        if self.discovery_fails {
            return Err(AppError::source("listing", "simulated failure"));
        }
        Ok(self.refs.clone())
    }

    async fn fetch_detail(&self, source_ref: &str) -> Result<ItemDetail> {
        self.check(source_ref)?;
        self.details
            .get(source_ref)
            .cloned()
            .ok_or_else(|| AppError::source(source_ref, "unknown reference"))
    }

    async fn fetch_attachment(&self, attachment_ref: &str) -> Result<Vec<u8>> {
        self.check(attachment_ref)?;
        self.attachments
            .get(attachment_ref)
            .cloned()
            .ok_or_else(|| AppError::source(attachment_ref, "unknown attachment"))
    }
}

/// Operations that can be made to fail on [`MemoryInventory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Upload,
    Register,
    Delete,
    Notify,
}

#[derive(Debug, Default)]
struct InventoryState {
    records: Vec<PublishedRecord>,
    uploads: HashMap<String, usize>,
    notifications: Vec<String>,
    failing: HashSet<Operation>,
    next_id: u64,
}

/// Inventory held in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryInventory {
    state: Arc<Mutex<InventoryState>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// URL an upload with this name resolves to.
    pub fn url_for(name: &str) -> String {
        format!("memory://files/{name}.pdf")
    }

    /// Insert a record directly, as if published in an earlier run.
    pub async fn seed(&self, id: u64, title: &str, url: &str) {
        let mut state = self.state.lock().await;
        state.records.push(PublishedRecord {
            id: RecordId(id),
            title: title.to_string(),
            url: url.to_string(),
            source: None,
        });
        state.next_id = state.next_id.max(id);
    }

    pub async fn fail(&self, operation: Operation) {
        self.state.lock().await.failing.insert(operation);
    }

    /// Snapshot of the records.
    pub async fn records(&self) -> Vec<PublishedRecord> {
        self.state.lock().await.records.clone()
    }

    /// Messages broadcast so far.
    pub async fn notifications(&self) -> Vec<String> {
        self.state.lock().await.notifications.clone()
    }

    /// Total upload calls that succeeded.
    pub async fn upload_count(&self) -> usize {
        self.state.lock().await.uploads.values().sum()
    }

    fn check(state: &InventoryState, operation: Operation) -> Result<()> {
        if state.failing.contains(&operation) {
            Err(AppError::backend(format!("{operation:?}"), "simulated failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl InventoryService for MemoryInventory {
    async fn list(&self) -> Result<Vec<PublishedRecord>> {
        let state = self.state.lock().await;
        Self::check(&state, Operation::List)?;
        Ok(state.records.clone())
    }

    async fn upload_attachment(&self, _bytes: &[u8], name: &str) -> Result<UploadReceipt> {
        let mut state = self.state.lock().await;
        Self::check(&state, Operation::Upload)?;
        *state.uploads.entry(name.to_string()).or_default() += 1;
        Ok(UploadReceipt {
            url: Self::url_for(name),
        })
    }

    async fn register_record(
        &self,
        title: &str,
        url: &str,
        source_ref: &str,
    ) -> Result<RegisterReceipt> {
        let mut state = self.state.lock().await;
        Self::check(&state, Operation::Register)?;
        if state.records.iter().any(|r| r.url == url) {
            return Ok(RegisterReceipt { added: false });
        }

        state.next_id = state.next_id.max(FIRST_ID) + 1;
        let id = RecordId(state.next_id);
        state.records.push(PublishedRecord {
            id,
            title: title.to_string(),
            url: url.to_string(),
            source: Some(source_ref.to_string()),
        });
        Ok(RegisterReceipt { added: true })
    }

    async fn delete_record(&self, id: RecordId) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::check(&state, Operation::Delete)?;
        state.records.retain(|r| r.id != id);
        Ok(())
    }

    async fn notify(&self, text: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::check(&state, Operation::Notify)?;
        state.notifications.push(text.to_string());
        Ok(())
    }
}
