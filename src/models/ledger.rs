//! Ledger of source references already attempted.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source references already attempted or definitively resolved.
///
/// The ledger only grows. It is owned by the caller of a run and handed to
/// the orchestrator by mutable reference, so whatever was recorded before a
/// cancellation is still there to persist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenLedger {
    #[serde(default)]
    ids: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl SeenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, source_ref: &str) -> bool {
        self.ids.contains(source_ref)
    }

    /// Record a reference. Returns `true` if it was not already present.
    pub fn record(&mut self, source_ref: impl Into<String>) -> bool {
        let inserted = self.ids.insert(source_ref.into());
        if inserted {
            self.updated_at = Some(Utc::now());
        }
        inserted
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl<S: Into<String>> FromIterator<S> for SeenLedger {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
            updated_at: None,
        }
    }
}
