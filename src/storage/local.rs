//! Local filesystem ledger storage.
//!
//! The ledger is a single JSON file:
//!
//! ```text
//! {
//!   "ids": ["https://.../news/show/12", ...],
//!   "updated_at": "2026-10-16T06:00:00Z"
//! }
//! ```
//!
//! Writes go to a temp file first and are renamed into place, so a crash
//! mid-write leaves the previous ledger intact.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::SeenLedger;

/// Ledger persisted as a JSON file.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Load the ledger. A missing file is an empty ledger.
    pub async fn load(&self) -> Result<SeenLedger> {
        match self.read_bytes().await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => {
                log::info!("No ledger at {}, starting empty", self.path.display());
                Ok(SeenLedger::new())
            }
        }
    }

    /// Load the ledger, starting empty when the file is unreadable.
    ///
    /// Losing the ledger only costs extra detail fetches: the remote
    /// inventory check still prevents republishing.
    pub async fn load_or_empty(&self) -> SeenLedger {
        self.load().await.unwrap_or_else(|e| {
            log::warn!(
                "Ledger at {} unreadable ({}), starting empty",
                self.path.display(),
                e
            );
            SeenLedger::new()
        })
    }

    pub async fn save(&self, ledger: &SeenLedger) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(ledger)?;
        self.write_bytes(&bytes).await?;
        log::debug!(
            "Saved ledger with {} reference(s) to {}",
            ledger.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = LedgerStore::new(tmp.path().join("seen.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let store = LedgerStore::new(tmp.path().join("state/seen.json"));

        let mut ledger = SeenLedger::new();
        ledger.record("https://college.example/news/show/1");
        ledger.record("https://college.example/news/show/2");
        store.save(&ledger).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, ledger);
        assert!(!tmp.path().join("state/seen.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_falls_back_to_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seen.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let store = LedgerStore::new(&path);
        assert!(store.load().await.is_err());
        assert!(store.load_or_empty().await.is_empty());
    }

    #[tokio::test]
    async fn test_reads_original_format() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seen.json");
        tokio::fs::write(&path, br#"{ "ids": ["a", "b"] }"#).await.unwrap();

        let ledger = LedgerStore::new(&path).load().await.unwrap();
        assert!(ledger.contains("a"));
        assert!(ledger.contains("b"));
    }
}
