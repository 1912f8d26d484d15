// src/pipeline/publish.rs

//! Two-phase publish: upload the attachment, then register the record.
//!
//! The two calls are not transactional. When registration fails or is
//! skipped after a successful upload, the uploaded file stays behind as an
//! orphan. Upload names derive from the content hash, so a retry of the same
//! document overwrites the same file instead of adding another one.

use crate::error::{AppError, Result};
use crate::models::{ClassifiedItem, FetchedAttachment};
use crate::pipeline::dedup::{DedupDecision, DedupGate};
use crate::services::InventoryService;
use crate::utils::content_digest;

/// Hex characters of the content hash used in upload names.
const NAME_DIGEST_LEN: usize = 16;

/// A record registered during this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub title: String,
    pub url: String,
    pub source_ref: String,
}

/// Result of a publish attempt that reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Registered with `added: true`
    Published(Publication),
    /// The backend reported the record as already present
    Skipped { url: String },
    /// The uploaded URL is already in the inventory; nothing registered
    Duplicate { url: String },
}

/// Performs uploads and registrations against the inventory service.
pub struct PublishClient<'a> {
    inventory: &'a dyn InventoryService,
}

impl<'a> PublishClient<'a> {
    pub fn new(inventory: &'a dyn InventoryService) -> Self {
        Self { inventory }
    }

    /// Backend file name for a document.
    pub fn upload_name(bytes: &[u8]) -> String {
        format!("change_{}", content_digest(bytes, NAME_DIGEST_LEN))
    }

    /// Upload, check the URL against the gate, register.
    ///
    /// Errors from either backend call are returned as-is; the caller treats
    /// them as a failure of this item only.
    pub async fn publish(
        &self,
        item: &ClassifiedItem,
        attachment: &FetchedAttachment,
        gate: &DedupGate,
    ) -> Result<PublishOutcome> {
        if !attachment.is_valid {
            return Err(AppError::validation(
                "refusing to publish an attachment that failed validation",
            ));
        }

        let name = Self::upload_name(&attachment.bytes);
        let upload = self
            .inventory
            .upload_attachment(&attachment.bytes, &name)
            .await?;
        log::debug!("Uploaded {} as {}", name, upload.url);

        if let DedupDecision::Duplicate(reason) = gate.check_url(&upload.url) {
            log::info!("Not registering {}: {}", upload.url, reason);
            return Ok(PublishOutcome::Duplicate { url: upload.url });
        }

        let receipt = self
            .inventory
            .register_record(&item.normalized_title, &upload.url, item.source_ref())
            .await?;

        if receipt.added {
            Ok(PublishOutcome::Published(Publication {
                title: item.normalized_title.clone(),
                url: upload.url,
                source_ref: item.source_ref().to_string(),
            }))
        } else {
            Ok(PublishOutcome::Skipped { url: upload.url })
        }
    }
}
