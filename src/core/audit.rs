//! Audit trail of task lifecycle transitions.
//!
//! Every transition a scheduler makes on a handle is recorded once: counted in
//! `SchedulerCounters`, logged through `tracing`, and optionally forwarded to
//! an `AuditSink`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::core::handle::CancellationHandle;
use crate::util::clock::now_ms;

/// Transition recorded for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    /// Key admitted and handle registered.
    Staged,
    /// Pipeline connected and spawned.
    Started,
    /// Handle disposed before the pipeline finished.
    Cancelled,
    /// Pipeline finished cleanly.
    Completed,
    /// Pipeline ended with an error.
    Fault,
}

/// Audit event structure.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Scheduler that made the transition.
    pub scheduler: String,
    /// Key the task guards.
    pub task: String,
    /// Handle identifier.
    pub handle_id: Uuid,
    /// Transition.
    pub action: TaskAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev. Clones share one buffer.
#[derive(Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(4096)))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Events recorded for one handle.
    #[must_use]
    pub fn events_for(&self, handle_id: Uuid) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.handle_id == handle_id)
            .cloned()
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    scheduler: impl Into<String>,
    handle: &CancellationHandle,
    action: TaskAction,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: Uuid::new_v4().to_string(),
        scheduler: scheduler.into(),
        task: handle.label().to_string(),
        handle_id: handle.id(),
        action,
        created_at_ms: now_ms(),
        detail,
    }
}

/// Statistics about one scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Snapshots diffed.
    pub snapshots: u64,
    /// Action tasks staged.
    pub actions_staged: u64,
    /// Validation tasks staged.
    pub validations_staged: u64,
    /// Pipelines spawned.
    pub started: u64,
    /// Handles cancelled.
    pub cancelled: u64,
    /// Pipelines that finished cleanly.
    pub completed: u64,
    /// Pipelines that ended with an error.
    pub faults: u64,
}

/// Internal counters for scheduler statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct SchedulerCounters {
    pub snapshots: AtomicU64,
    pub actions_staged: AtomicU64,
    pub validations_staged: AtomicU64,
    pub started: AtomicU64,
    pub cancelled: AtomicU64,
    pub completed: AtomicU64,
    pub faults: AtomicU64,
}

impl SchedulerCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            snapshots: self.snapshots.load(Ordering::Relaxed),
            actions_staged: self.actions_staged.load(Ordering::Relaxed),
            validations_staged: self.validations_staged.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }
}

/// Records lifecycle transitions for one scheduler.
#[derive(Clone)]
pub(crate) struct LifecycleRecorder {
    scheduler: Arc<str>,
    counters: Arc<SchedulerCounters>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl LifecycleRecorder {
    pub fn new(scheduler: &str, audit: Option<Arc<dyn AuditSink>>) -> Self {
        Self {
            scheduler: Arc::from(scheduler),
            counters: Arc::new(SchedulerCounters::default()),
            audit,
        }
    }

    pub fn scheduler(&self) -> &str {
        &self.scheduler
    }

    pub fn stats(&self) -> SchedulerStats {
        self.counters.snapshot()
    }

    pub fn snapshot_diffed(&self) {
        self.counters.snapshots.fetch_add(1, Ordering::Relaxed);
    }

    pub fn staged_action(&self, handle: &CancellationHandle) {
        self.counters.actions_staged.fetch_add(1, Ordering::Relaxed);
        self.emit(handle, TaskAction::Staged, None);
    }

    pub fn staged_validation(&self, handle: &CancellationHandle) {
        self.counters.validations_staged.fetch_add(1, Ordering::Relaxed);
        self.emit(handle, TaskAction::Staged, None);
    }

    pub fn started(&self, handle: &CancellationHandle) {
        self.counters.started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(scheduler = %self.scheduler, task = %handle.label(), "pipeline started");
        self.emit(handle, TaskAction::Started, None);
    }

    /// Dispose `handle` and record it if this call cancelled it.
    pub fn cancel(&self, handle: &CancellationHandle) -> bool {
        if !handle.dispose() {
            return false;
        }
        self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(scheduler = %self.scheduler, task = %handle.label(), "task cancelled");
        self.emit(handle, TaskAction::Cancelled, None);
        true
    }

    pub fn completed(&self, handle: &CancellationHandle) {
        self.counters.completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(scheduler = %self.scheduler, task = %handle.label(), "pipeline completed");
        self.emit(handle, TaskAction::Completed, None);
    }

    pub fn fault(&self, handle: &CancellationHandle, error: &crate::core::SchedulerError) {
        self.counters.faults.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            scheduler = %self.scheduler,
            task = %handle.label(),
            error = %error,
            "pipeline failed"
        );
        self.emit(handle, TaskAction::Fault, Some(error.to_string()));
    }

    fn emit(&self, handle: &CancellationHandle, action: TaskAction, detail: Option<String>) {
        if let Some(sink) = &self.audit {
            sink.record(build_audit_event(&*self.scheduler, handle, action, detail));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_audit_sink_overflow() {
        let sink = InMemoryAuditSink::new(2);
        let handle = CancellationHandle::new("k");
        sink.record(build_audit_event("s", &handle, TaskAction::Staged, None));
        sink.record(build_audit_event("s", &handle, TaskAction::Started, None));
        sink.record(build_audit_event("s", &handle, TaskAction::Completed, None));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, TaskAction::Started);
        assert_eq!(events[1].action, TaskAction::Completed);
    }

    #[test]
    fn test_recorder_counts_cancel_once() {
        let sink = InMemoryAuditSink::new(16);
        let recorder = LifecycleRecorder::new("s", Some(Arc::new(sink.clone())));
        let handle = CancellationHandle::new("k");

        assert!(recorder.cancel(&handle));
        assert!(!recorder.cancel(&handle));
        assert_eq!(recorder.stats().cancelled, 1);
        assert_eq!(sink.events_for(handle.id()).len(), 1);
    }

    #[test]
    fn test_build_audit_event() {
        let handle = CancellationHandle::new("peer/0/1");
        let event = build_audit_event("sched", &handle, TaskAction::Fault, Some("boom".into()));
        assert_eq!(event.scheduler, "sched");
        assert_eq!(event.task, "peer/0/1");
        assert_eq!(event.handle_id, handle.id());
        assert_eq!(event.detail.as_deref(), Some("boom"));
        assert!(event.created_at_ms > 0);
    }
}
