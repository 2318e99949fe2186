//! Cancellation handles for staged and running pipelines.
//!
//! A handle is minted by the reconciler when a key is admitted, before any work
//! exists. The scheduler later connects it to the spawned pipeline. Disposing
//! a handle is idempotent and works in every state: a handle disposed while
//! still staged never connects, and disposing a completed one does nothing.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Lifecycle of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleState {
    /// Registered in the running set; no pipeline attached yet.
    Staged,
    /// Pipeline attached and running.
    Running,
    /// Pipeline ran to completion.
    Completed,
    /// Disposed before completion.
    Cancelled,
}

#[derive(Debug)]
struct HandleInner {
    id: Uuid,
    label: String,
    token: CancellationToken,
    state: Mutex<HandleState>,
}

/// Cancellation handle shared between the running set and its pipeline.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    inner: Arc<HandleInner>,
}

impl CancellationHandle {
    /// Mint a staged handle. `label` names the key it guards in logs.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: Uuid::new_v4(),
                label: label.into(),
                token: CancellationToken::new(),
                state: Mutex::new(HandleState::Staged),
            }),
        }
    }

    /// Unique handle id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Label of the guarded key.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> HandleState {
        *self.inner.state.lock()
    }

    /// True once the handle was disposed before its pipeline finished.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state() == HandleState::Cancelled
    }

    /// True once the pipeline completed or the handle was disposed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state(), HandleState::Completed | HandleState::Cancelled)
    }

    /// Attach a pipeline. Returns the token the pipeline must race against,
    /// or `None` when the handle is no longer staged.
    #[must_use]
    pub fn connect(&self) -> Option<CancellationToken> {
        let mut state = self.inner.state.lock();
        match *state {
            HandleState::Staged => {
                *state = HandleState::Running;
                Some(self.inner.token.clone())
            }
            HandleState::Running | HandleState::Completed => {
                tracing::warn!(handle = %self.inner.label, "handle connected twice");
                None
            }
            HandleState::Cancelled => None,
        }
    }

    /// Mark the attached pipeline finished. Later disposal is a no-op.
    pub fn complete(&self) {
        let mut state = self.inner.state.lock();
        if *state == HandleState::Running {
            *state = HandleState::Completed;
        }
    }

    /// Stop the pipeline. Returns `true` only for the call that actually
    /// cancelled it.
    pub fn dispose(&self) -> bool {
        let mut state = self.inner.state.lock();
        match *state {
            HandleState::Staged | HandleState::Running => {
                *state = HandleState::Cancelled;
                drop(state);
                self.inner.token.cancel();
                true
            }
            HandleState::Completed | HandleState::Cancelled => false,
        }
    }
}

impl PartialEq for CancellationHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for CancellationHandle {}

impl fmt::Display for CancellationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.inner.label, self.inner.id)
    }
}
