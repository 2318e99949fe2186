//! Scheduler loop and lifecycle controller.
//!
//! The loop consumes the profile's feed. Each snapshot is diffed against the
//! shared `RunningTaskSet` inside one critical section; cancellations and
//! starts are then carried out outside the lock, cancellations first.
//! Disposing the returned `SchedulerHandle` stops the feed, drains the set
//! under the same lock and lets the loop release its subscription.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::audit::{AuditSink, LifecycleRecorder, SchedulerStats};
use crate::core::entries::{InvalidationKey, MessageId};
use crate::core::executor::SyncProfile;
use crate::core::reconciler::RunningTaskSet;
use crate::core::runner::{Spawn, TaskRunner};
use crate::core::store::{Snapshot, Store};

/// State shared between the loop and the top-level handle.
struct Shared {
    running: Mutex<RunningTaskSet>,
    recorder: LifecycleRecorder,
    shutdown: CancellationToken,
    disposed: AtomicBool,
    subscription_released: AtomicBool,
}

/// Reconciling scheduler bound to a store and a spawner.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use pending_sync::core::ReconcilingScheduler;
/// use pending_sync::runtime::TokioSpawner;
///
/// let scheduler = ReconcilingScheduler::new(store, TokioSpawner::current());
/// let handle = scheduler.start(Arc::new(profile));
/// // ...
/// handle.dispose();
/// ```
pub struct ReconcilingScheduler<S, Sp> {
    store: Arc<S>,
    spawner: Sp,
    audit: Option<Arc<dyn AuditSink>>,
}

impl<S, Sp> ReconcilingScheduler<S, Sp>
where
    S: Store,
    Sp: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a scheduler from components.
    pub const fn new(store: Arc<S>, spawner: Sp) -> Self {
        Self {
            store,
            spawner,
            audit: None,
        }
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Subscribe to the profile's views and start reconciling.
    ///
    /// Must be called from within the spawner's runtime context when the
    /// spawner requires one.
    pub fn start(&self, profile: Arc<dyn SyncProfile>) -> SchedulerHandle {
        let recorder = LifecycleRecorder::new(profile.name(), self.audit.clone());
        let shared = Arc::new(Shared {
            running: Mutex::new(RunningTaskSet::new()),
            recorder: recorder.clone(),
            shutdown: CancellationToken::new(),
            disposed: AtomicBool::new(false),
            subscription_released: AtomicBool::new(false),
        });
        let runner = TaskRunner::new(Arc::clone(&self.store), self.spawner.clone(), recorder);
        let mut feed = self.store.subscribe(profile.view_keys());

        tracing::info!(scheduler = %profile.name(), "scheduler started");

        let loop_shared = Arc::clone(&shared);
        self.spawner.spawn(async move {
            loop {
                let snapshot = tokio::select! {
                    biased;
                    () = loop_shared.shutdown.cancelled() => break,
                    next = feed.next() => match next {
                        Some(snapshot) => snapshot,
                        None => {
                            tracing::warn!(scheduler = %profile.name(), "desired-state feed ended");
                            break;
                        }
                    },
                };
                apply_snapshot(&loop_shared, &runner, profile.as_ref(), &snapshot);
            }
            drop(feed);
            loop_shared.subscription_released.store(true, Ordering::Release);
            tracing::debug!(scheduler = %profile.name(), "subscription released");
        });

        SchedulerHandle { shared }
    }
}

/// Diff one snapshot and carry out the outcome.
fn apply_snapshot<S, Sp>(
    shared: &Shared,
    runner: &TaskRunner<S, Sp>,
    profile: &dyn SyncProfile,
    snapshot: &Snapshot,
) where
    S: Store,
    Sp: Spawn,
{
    let desired = profile.desired_state(snapshot);
    let outcome = {
        let mut running = shared.running.lock();
        running.update(&desired.entries, &desired.invalidations)
    };
    shared.recorder.snapshot_diffed();

    if outcome.is_empty() {
        return;
    }
    tracing::debug!(
        scheduler = %profile.name(),
        cancel = outcome.to_cancel.len(),
        actions = outcome.begin_actions.len(),
        validations = outcome.begin_validations.len(),
        "reconciled snapshot"
    );

    for handle in &outcome.to_cancel {
        shared.recorder.cancel(handle);
    }

    if !outcome.begin_actions.is_empty() {
        let body = profile.action_body();
        for (entry, handle) in outcome.begin_actions {
            shared.recorder.staged_action(&handle);
            runner.start_action(entry, handle, body.clone());
        }
    }

    if !outcome.begin_validations.is_empty() {
        let body = profile.validation_body();
        for (entry, handle) in outcome.begin_validations {
            shared.recorder.staged_validation(&handle);
            runner.start_validation(entry, handle, Arc::clone(&body));
        }
    }
}

/// Top-level cancellation handle of a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    /// Scheduler name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.shared.recorder.scheduler()
    }

    /// Stop the scheduler and cancel every outstanding task exactly once.
    ///
    /// Stops snapshot delivery first, then drains the running set under the
    /// diff lock, then lets the loop release the subscription. Later calls
    /// are no-ops.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.shutdown.cancel();

        let handles = self.shared.running.lock().reset();
        let mut cancelled = 0usize;
        for handle in &handles {
            if self.shared.recorder.cancel(handle) {
                cancelled += 1;
            }
        }
        tracing::info!(
            scheduler = %self.name(),
            drained = handles.len(),
            cancelled,
            "scheduler disposed"
        );
    }

    /// True once `dispose` has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    /// True once the loop has dropped its feed subscription.
    #[must_use]
    pub fn is_subscription_released(&self) -> bool {
        self.shared.subscription_released.load(Ordering::Acquire)
    }

    /// Keys with a registered action handle.
    #[must_use]
    pub fn running_action_keys(&self) -> Vec<MessageId> {
        self.shared.running.lock().action_keys()
    }

    /// Keys with a registered validation handle.
    #[must_use]
    pub fn running_validation_keys(&self) -> Vec<InvalidationKey> {
        self.shared.running.lock().validation_keys()
    }

    /// Scheduler statistics.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.shared.recorder.stats()
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("name", &self.name())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
