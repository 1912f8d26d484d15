//! Persistence for state the sync owns locally.
//!
//! The only locally owned state is the ledger of attempted source
//! references; everything published lives in the backend inventory.

pub mod local;

pub use local::LedgerStore;
