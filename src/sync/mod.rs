//! Synchronizers built on the reconciling scheduler.
//!
//! - [`MessageContentsProfile`]: personal-mention and reaction acknowledgements,
//!   plus refresh of the matching unseen-count summaries.
//! - [`TagSummaryProfile`]: thread summaries and saved reaction tags of one
//!   peer/thread scope.

pub mod message_contents;
pub mod saved_tags;
pub mod tag_summaries;
pub mod unseen_summaries;

use std::sync::Arc;

pub use message_contents::{ContentKind, MessageContentsProfile};
pub use saved_tags::synchronize_saved_tags;
pub use tag_summaries::{collapse_custom_tags, TagSummaryProfile};

use crate::core::{AccountState, Network, Store};

/// Collaborators shared by every synchronizer body.
pub struct SyncContext<S> {
    /// Store the bodies read from and commit to.
    pub store: Arc<S>,
    /// Remote request executor.
    pub network: Arc<dyn Network>,
    /// Account-wide state.
    pub account: Arc<dyn AccountState>,
}

impl<S: Store> SyncContext<S> {
    /// Bundle collaborators.
    pub fn new(store: Arc<S>, network: Arc<dyn Network>, account: Arc<dyn AccountState>) -> Self {
        Self {
            store,
            network,
            account,
        }
    }
}

impl<S> Clone for SyncContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            network: Arc::clone(&self.network),
            account: Arc::clone(&self.account),
        }
    }
}
