//! Task pipelines and their binding to cancellation handles.
//!
//! An action pipeline re-fetches the pending action in a fresh transaction
//! (the snapshot it was admitted from may be stale), runs the body if the
//! action is still there, then always clears the action. A validation
//! pipeline runs its body and then always clears the marker. Either pipeline
//! races its handle's token and stops at the next suspension point once the
//! handle is disposed; already committed transactions stay committed.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::core::audit::LifecycleRecorder;
use crate::core::entries::{DesiredEntry, InvalidationEntry};
use crate::core::executor::{ActionBody, ValidationBody};
use crate::core::handle::CancellationHandle;
use crate::core::store::Store;
use crate::core::SchedulerError;

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Boxed pipeline future.
pub type PipelineFuture = BoxFuture<'static, Result<(), SchedulerError>>;

/// Re-fetch, execute and clear one pending action.
///
/// # Errors
///
/// `InvariantViolation` when the stored payload is of another kind than the
/// body consumes; store errors from either transaction; errors from the body.
pub async fn run_action<S: Store>(
    store: Arc<S>,
    body: Arc<dyn ActionBody>,
    entry: DesiredEntry,
) -> Result<(), SchedulerError> {
    let action_type = body.action_type();
    let id = entry.key;

    let taken = store
        .transaction(move |tx| tx.get_pending_action(action_type, id))
        .await?;

    let result = match taken {
        Some(action) if action.action_type() == action_type => body.execute(id, action).await,
        Some(action) => Err(SchedulerError::InvariantViolation(format!(
            "pending action for {id} is {action:?}, expected {action_type:?}"
        ))),
        None => {
            tracing::debug!(task = %id, "pending action already consumed");
            Ok(())
        }
    };

    store
        .transaction(move |tx| tx.set_pending_action(action_type, id, None))
        .await?;
    result
}

/// Refresh one invalidated summary and clear its marker.
///
/// # Errors
///
/// Errors from the body or from the clearing transaction.
pub async fn run_validation<S: Store>(
    store: Arc<S>,
    body: Arc<dyn ValidationBody>,
    entry: InvalidationEntry,
) -> Result<(), SchedulerError> {
    let result = body.execute(&entry).await;
    store
        .transaction(move |tx| body.clear(tx, &entry))
        .await?;
    result
}

/// Binds pipelines to handles and spawns them.
pub(crate) struct TaskRunner<S, Sp> {
    store: Arc<S>,
    spawner: Sp,
    recorder: LifecycleRecorder,
}

impl<S, Sp> TaskRunner<S, Sp>
where
    S: Store,
    Sp: Spawn,
{
    pub const fn new(store: Arc<S>, spawner: Sp, recorder: LifecycleRecorder) -> Self {
        Self {
            store,
            spawner,
            recorder,
        }
    }

    pub fn start_action(
        &self,
        entry: DesiredEntry,
        handle: CancellationHandle,
        body: Option<Arc<dyn ActionBody>>,
    ) {
        let pipeline = match body {
            Some(body) => run_action(Arc::clone(&self.store), body, entry).boxed(),
            None => {
                let key = entry.key;
                async move {
                    Err(SchedulerError::InvariantViolation(format!(
                        "action {key} admitted by a profile without an action body"
                    )))
                }
                .boxed()
            }
        };
        self.launch(handle, pipeline);
    }

    pub fn start_validation(
        &self,
        entry: InvalidationEntry,
        handle: CancellationHandle,
        body: Arc<dyn ValidationBody>,
    ) {
        let pipeline = run_validation(Arc::clone(&self.store), body, entry).boxed();
        self.launch(handle, pipeline);
    }

    /// Connect `pipeline` to `handle` and spawn it. A handle disposed while
    /// staged is left alone and the pipeline is dropped unstarted.
    fn launch(&self, handle: CancellationHandle, pipeline: PipelineFuture) {
        let Some(token) = handle.connect() else {
            tracing::debug!(
                scheduler = %self.recorder.scheduler(),
                task = %handle.label(),
                "handle disposed before start"
            );
            return;
        };
        self.recorder.started(&handle);

        let recorder = self.recorder.clone();
        self.spawner.spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::debug!(task = %handle.label(), "pipeline interrupted");
                }
                result = pipeline => {
                    handle.complete();
                    match result {
                        Ok(()) => recorder.completed(&handle),
                        Err(err) => recorder.fault(&handle, &err),
                    }
                }
            }
        });
    }
}
