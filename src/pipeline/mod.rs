//! The synchronization pipeline.
//!
//! - `classify`: relevance, freshness and canonical titles
//! - `dedup`: ledger and remote inventory checks
//! - `validate` / `publish`: attachment checks and the two-phase publish
//! - `notify` / `retention`: end-of-run side effects
//! - `sync`: the orchestrator tying one run together
//! - `run`: entry points used by the CLI

pub mod classify;
pub mod dedup;
pub mod notify;
pub mod publish;
pub mod retention;
pub mod run;
pub mod sync;
pub mod validate;

pub use run::{execute, run_prune, run_sync};
pub use sync::{ItemOutcome, RunSummary, SyncOrchestrator};
