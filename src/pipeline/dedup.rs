// src/pipeline/dedup.rs

//! Deduplication against the local ledger and the remote inventory.
//!
//! The ledger is the cheap first line and may be lost at any time. The
//! inventory snapshot is authoritative: with an empty ledger, anything
//! already published is still recognised by title or by URL.

use std::collections::HashSet;
use std::fmt;

use crate::models::{ClassifiedItem, DedupStrategy, PublishedRecord, SeenLedger};

/// Why an item was rejected as a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupReason {
    /// Source reference already attempted in an earlier run
    Ledger,
    /// A record with the same title is published
    RemoteTitle,
    /// A record with the same attachment URL is published
    RemoteUrl,
}

impl fmt::Display for DedupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DedupReason::Ledger => "already in ledger",
            DedupReason::RemoteTitle => "title already published",
            DedupReason::RemoteUrl => "attachment already published",
        };
        f.write_str(s)
    }
}

/// Gate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    New,
    Duplicate(DedupReason),
}

impl DedupDecision {
    pub fn is_new(&self) -> bool {
        matches!(self, DedupDecision::New)
    }
}

/// Filters items already processed or already published.
#[derive(Debug, Clone)]
pub struct DedupGate {
    strategy: DedupStrategy,
    titles: HashSet<String>,
    urls: HashSet<String>,
}

impl DedupGate {
    /// Build the gate from the inventory snapshot taken at run start.
    pub fn new(strategy: DedupStrategy, inventory: &[PublishedRecord]) -> Self {
        let mut gate = Self {
            strategy,
            titles: HashSet::new(),
            urls: HashSet::new(),
        };
        for record in inventory {
            gate.remember(&record.title, &record.url);
        }
        gate
    }

    /// Check a source reference against the ledger, before any fetch.
    pub fn check_ref(&self, ledger: &SeenLedger, source_ref: &str) -> DedupDecision {
        if self.strategy.by_ledger && ledger.contains(source_ref) {
            DedupDecision::Duplicate(DedupReason::Ledger)
        } else {
            DedupDecision::New
        }
    }

    /// Check a classified item against the inventory, before its attachment
    /// is fetched. `attachment_ref` is the attachment's source locator.
    pub fn check_item(&self, item: &ClassifiedItem, attachment_ref: Option<&str>) -> DedupDecision {
        if self.strategy.by_remote_title && self.titles.contains(&item.normalized_title) {
            return DedupDecision::Duplicate(DedupReason::RemoteTitle);
        }
        match attachment_ref {
            Some(url) => self.check_url(url),
            None => DedupDecision::New,
        }
    }

    /// Check an attachment URL against the inventory. Runs after upload and
    /// before the record is registered.
    pub fn check_url(&self, url: &str) -> DedupDecision {
        if self.strategy.by_remote_url && self.urls.contains(url) {
            DedupDecision::Duplicate(DedupReason::RemoteUrl)
        } else {
            DedupDecision::New
        }
    }

    /// Track a record published during this run.
    pub fn remember(&mut self, title: &str, url: &str) {
        if !title.is_empty() {
            self.titles.insert(title.to_string());
        }
        if !url.is_empty() {
            self.urls.insert(url.to_string());
        }
    }
}
