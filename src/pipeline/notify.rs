// src/pipeline/notify.rs

//! Subscriber notification after a run that published something.

use crate::models::NotifyConfig;
use crate::services::InventoryService;

/// Placeholder in the template replaced by the published title.
const TITLE_PLACEHOLDER: &str = "{title}";

/// Collects titles published during a run and sends one message at the end.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    enabled: bool,
    template: String,
    pending: Vec<String>,
    sent: bool,
}

impl NotificationDispatcher {
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            enabled: config.enabled,
            template: config.template.clone(),
            pending: Vec::new(),
            sent: false,
        }
    }

    /// Note a successful publication.
    pub fn record(&mut self, title: &str) {
        self.pending.push(title.to_string());
    }

    /// Message for the titles recorded so far, naming the latest one.
    pub fn message(&self) -> Option<String> {
        let latest = self.pending.last()?;
        Some(self.template.replace(TITLE_PLACEHOLDER, latest))
    }

    /// Broadcast once if anything was published. Returns whether a message
    /// was delivered. Failures are logged and never retried within a run.
    pub async fn dispatch(&mut self, inventory: &dyn InventoryService) -> bool {
        if self.sent || !self.enabled {
            return false;
        }
        let Some(message) = self.message() else {
            return false;
        };
        self.sent = true;

        match inventory.notify(&message).await {
            Ok(()) => {
                log::info!("Notified subscribers about {} publication(s)", self.pending.len());
                true
            }
            Err(e) => {
                log::warn!("Notification failed: {}", e);
                false
            }
        }
    }
}
