//! Tests for error types

use pending_sync::core::{NetworkError, SchedulerError};

#[test]
fn test_invariant_violation_error() {
    let err = SchedulerError::InvariantViolation("folder dialog".to_string());
    assert_eq!(format!("{err}"), "invariant violation: folder dialog");
}

#[test]
fn test_store_error() {
    let err = SchedulerError::Store("poisoned".to_string());
    assert_eq!(format!("{err}"), "store error: poisoned");
}

#[test]
fn test_config_error() {
    let err = SchedulerError::Config("worker_threads must be > 0".to_string());
    assert_eq!(format!("{err}"), "config error: worker_threads must be > 0");
}

#[test]
fn test_network_error_converts() {
    let err: SchedulerError = NetworkError::Rpc {
        code: 420,
        description: "FLOOD_WAIT_3".to_string(),
    }
    .into();
    assert_eq!(format!("{err}"), "network error: rpc error 420: FLOOD_WAIT_3");
    assert!(matches!(err, SchedulerError::Network(NetworkError::Rpc { code: 420, .. })));
}

#[test]
fn test_transport_error() {
    let err = NetworkError::Transport("connection reset".to_string());
    assert_eq!(format!("{err}"), "transport failure: connection reset");
}
