//! Service layer for the sync application.
//!
//! This module contains the collaborators the pipeline talks to:
//! - Publication source (`SourceAdapter`, `HttpSourceAdapter`)
//! - Backend inventory (`InventoryService`, `HttpInventoryService`)
//! - In-memory test doubles for both (`MemorySource`, `MemoryInventory`)

mod inventory;
pub mod memory;
mod source;

pub use inventory::{HttpInventoryService, InventoryService};
pub use memory::{MemoryInventory, MemorySource};
pub use source::{HttpSourceAdapter, SourceAdapter, extract_item_links};
