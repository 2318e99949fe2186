//! Configuration models for the synchronizers and their runtime.

pub mod sync;

pub use sync::{SyncConfig, TagSummaryScope, ENV_PREFIX};
