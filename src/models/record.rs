//! Backend record types and call receipts.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Time-derived, monotonically increasing record identifier.
///
/// The admin API emits it either as a JSON number or as a numeric string;
/// anything else (including a missing id) reads as 0 and sorts last.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let id = match value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .unwrap_or(0),
            serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        };
        Ok(RecordId(id))
    }
}

/// A record in the backend inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedRecord {
    #[serde(default)]
    pub id: RecordId,

    #[serde(default)]
    pub title: String,

    /// Locator of the uploaded attachment
    #[serde(default)]
    pub url: String,

    /// Source reference the record was published from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub url: String,
}

/// Result of a register call. `added == false` means the backend already
/// had the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterReceipt {
    pub added: bool,
}
