//! Tests for audit sink

use pending_sync::core::{
    build_audit_event, AuditSink, CancellationHandle, InMemoryAuditSink, TaskAction,
};

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);
    let handle = CancellationHandle::new("cloud_user:1:0:5");

    let event = build_audit_event("read-reactions", &handle, TaskAction::Staged, None);
    sink.record(event);

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].scheduler, "read-reactions");
    assert_eq!(events[0].task, "cloud_user:1:0:5");
    assert_eq!(events[0].handle_id, handle.id());
    assert_eq!(events[0].action, TaskAction::Staged);
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);
    let handle = CancellationHandle::new("k");

    sink.record(build_audit_event("s", &handle, TaskAction::Staged, None));
    sink.record(build_audit_event("s", &handle, TaskAction::Started, None));
    sink.record(build_audit_event("s", &handle, TaskAction::Completed, None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].action, TaskAction::Started); // First one popped
    assert_eq!(events[1].action, TaskAction::Completed);
}

#[test]
fn test_events_for_filters_by_handle() {
    let sink = InMemoryAuditSink::new(10);
    let first = CancellationHandle::new("a");
    let second = CancellationHandle::new("b");

    sink.record(build_audit_event("s", &first, TaskAction::Staged, None));
    sink.record(build_audit_event("s", &second, TaskAction::Staged, None));
    sink.record(build_audit_event("s", &first, TaskAction::Cancelled, None));

    let events = sink.events_for(first.id());
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| event.task == "a"));
}

#[test]
fn test_build_audit_event() {
    let handle = CancellationHandle::new("task1");
    let event = build_audit_event(
        "scheduler1",
        &handle,
        TaskAction::Fault,
        Some("invariant violation: boom".to_string()),
    );

    assert!(!event.event_id.is_empty());
    assert_eq!(event.detail.as_deref(), Some("invariant violation: boom"));
    assert!(event.created_at_ms > 0);
}
