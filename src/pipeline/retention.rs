// src/pipeline/retention.rs

//! Retention of the newest published records.
//!
//! Ids grow monotonically with publication time, so "newest" means highest
//! id. Deletion failures are logged and leave the record for the next run.

use crate::models::PublishedRecord;
use crate::services::InventoryService;

/// Records split into those kept and those to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPlan {
    pub keep: Vec<PublishedRecord>,
    pub evict: Vec<PublishedRecord>,
}

/// What one enforcement pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionReport {
    /// Records listed; `None` when the listing failed
    pub listed: Option<usize>,
    pub kept: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Keeps at most `keep` records in the inventory.
#[derive(Debug, Clone, Copy)]
pub struct RetentionEnforcer {
    keep: usize,
}

impl RetentionEnforcer {
    pub fn new(keep: usize) -> Self {
        Self { keep }
    }

    /// Newest `keep` records stay. Equal ids keep their listing order.
    pub fn plan(&self, mut records: Vec<PublishedRecord>) -> RetentionPlan {
        records.sort_by(|a, b| b.id.cmp(&a.id));
        let evict = if records.len() > self.keep {
            records.split_off(self.keep)
        } else {
            Vec::new()
        };
        RetentionPlan {
            keep: records,
            evict,
        }
    }

    /// List the inventory and delete everything past the newest `keep`.
    ///
    /// Never fails: a listing error skips the pass, a deletion error skips
    /// that record.
    pub async fn enforce(&self, inventory: &dyn InventoryService) -> RetentionReport {
        let records = match inventory.list().await {
            Ok(records) => records,
            Err(e) => {
                log::warn!("Retention skipped, inventory listing failed: {}", e);
                return RetentionReport::default();
            }
        };

        let listed = records.len();
        let plan = self.plan(records);
        let mut report = RetentionReport {
            listed: Some(listed),
            kept: plan.keep.len(),
            ..RetentionReport::default()
        };

        for record in plan.evict {
            match inventory.delete_record(record.id).await {
                Ok(()) => {
                    log::info!("Deleted old record {} ({})", record.id, record.title);
                    report.deleted += 1;
                }
                Err(e) => {
                    log::warn!("Failed to delete record {}: {}", record.id, e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}
