//! Domain bodies plugged into the scheduler.
//!
//! A `SyncProfile` tells the scheduler which views to watch, how to turn a
//! snapshot into desired entries, and which bodies run for admitted keys. The
//! bodies only contain the remote-call-and-commit logic; re-fetching the
//! pending action and removing the originating entry are done by the runner.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::entries::{
    DesiredEntry, InvalidationEntry, MessageId, PendingAction, PendingActionType,
};
use crate::core::store::{Snapshot, Transaction, ViewKey};
use crate::core::SchedulerError;

/// Desired state extracted from one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    /// Pending action entries, in feed order.
    pub entries: Vec<DesiredEntry>,
    /// Pending invalidation entries.
    pub invalidations: Vec<InvalidationEntry>,
}

/// Body run for an admitted pending action.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use pending_sync::core::{
///     ActionBody, MessageId, PendingAction, PendingActionType, SchedulerError,
/// };
///
/// struct Noop;
///
/// #[async_trait]
/// impl ActionBody for Noop {
///     fn action_type(&self) -> PendingActionType {
///         PendingActionType::ReadReaction
///     }
///
///     async fn execute(
///         &self,
///         _id: MessageId,
///         _action: PendingAction,
///     ) -> Result<(), SchedulerError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ActionBody: Send + Sync + 'static {
    /// Action type this body consumes. The runner re-fetches under this type
    /// and clears it afterwards.
    fn action_type(&self) -> PendingActionType;

    /// Perform the remote call and commit its result.
    ///
    /// Remote failures must be absorbed here; an `Err` is reserved for
    /// invariant violations and store failures.
    async fn execute(&self, id: MessageId, action: PendingAction) -> Result<(), SchedulerError>;
}

/// Body run for an admitted invalidation entry.
#[async_trait]
pub trait ValidationBody: Send + Sync + 'static {
    /// Refresh the summary the entry invalidates.
    async fn execute(&self, entry: &InvalidationEntry) -> Result<(), SchedulerError>;

    /// Remove the originating marker. Runs inside the follow-up transaction
    /// whether or not `execute` succeeded.
    fn clear(&self, transaction: &mut dyn Transaction, entry: &InvalidationEntry) {
        transaction.remove_invalidation_entry(entry);
    }
}

/// One scheduler's view keys, extraction rule and bodies.
pub trait SyncProfile: Send + Sync + 'static {
    /// Name used in logs and audit events.
    fn name(&self) -> &str;

    /// Views the scheduler subscribes to.
    fn view_keys(&self) -> Vec<ViewKey>;

    /// Extract desired entries from a snapshot, applying any merge rule.
    fn desired_state(&self, snapshot: &Snapshot) -> DesiredState;

    /// Body for action entries; `None` when the profile has no action view.
    fn action_body(&self) -> Option<Arc<dyn ActionBody>>;

    /// Body for invalidation entries.
    fn validation_body(&self) -> Arc<dyn ValidationBody>;
}
