//! Core scheduling abstractions: keys, handles, the reconciler and the loop.

pub mod audit;
pub mod entries;
pub mod error;
pub mod executor;
pub mod handle;
pub mod network;
pub mod reconciler;
pub mod runner;
pub mod scheduler;
pub mod store;

pub use audit::{
    build_audit_event, AuditEvent, AuditSink, InMemoryAuditSink, SchedulerStats, TaskAction,
};
pub use entries::{
    DesiredEntry, InvalidationEntry, InvalidationKey, MessageId, Partitioned, PeerId,
    PeerNamespace, PendingAction, PendingActionType, SummaryKey, TagMask, CLOUD_NAMESPACE,
};
pub use error::{AppResult, NetworkError, SchedulerError};
pub use executor::{ActionBody, DesiredState, SyncProfile, ValidationBody};
pub use handle::{CancellationHandle, HandleState};
pub use network::{
    AccountState, ApiCall, ApiResponse, Dialog, InputChannel, InputPeer, Network, Reaction,
    SavedReactionTag,
};
pub use reconciler::{ReconcileOutcome, RunningTaskSet};
pub use runner::{run_action, run_validation, PipelineFuture, Spawn};
pub use scheduler::{ReconcilingScheduler, SchedulerHandle};
pub use store::{Peer, Snapshot, Store, Transaction, View, ViewKey};
