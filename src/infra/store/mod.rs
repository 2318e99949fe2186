//! Store backends.

pub mod memory;

pub use memory::{InMemoryStore, TagSummary};
