// src/models/mod.rs

//! Domain models for the sync application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod calendar;
mod config;
mod item;
mod ledger;
mod record;

// Re-export all public types
pub use calendar::{CalendarLocale, MonthNames};
pub use config::{
    AttachmentConfig, BackendConfig, Config, DedupStrategy, HttpConfig, LoggingConfig,
    MissingDatePolicy, NotifyConfig, PathsConfig, SourceConfig, SyncConfig, ENV_BASE_URL,
    ENV_PASSWORD, ENV_SOURCE_COOKIE,
};
pub use item::{CandidateItem, ClassifiedItem, FetchedAttachment, ItemDetail};
pub use ledger::SeenLedger;
pub use record::{PublishedRecord, RecordId, RegisterReceipt, UploadReceipt};
