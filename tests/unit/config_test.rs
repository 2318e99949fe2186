//! Tests for configuration validation

use std::collections::HashMap;

use pending_sync::config::{SyncConfig, TagSummaryScope};
use pending_sync::core::{PeerId, PeerNamespace};

fn scope(id: i64, thread_id: Option<i64>) -> TagSummaryScope {
    TagSummaryScope {
        peer_id: PeerId::new(PeerNamespace::CloudChannel, id),
        thread_id,
    }
}

#[test]
fn test_default_config_is_valid() {
    let config = SyncConfig::default();
    assert!(config.validate().is_ok());
    assert!(config.consume_personal_mentions);
    assert!(config.read_reactions);
    assert!(config.worker_threads > 0);
}

#[test]
fn test_config_invalid_worker_threads() {
    let config = SyncConfig {
        worker_threads: 0,
        ..SyncConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_config_invalid_audit_capacity() {
    let config = SyncConfig {
        audit_capacity: 0,
        ..SyncConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_config_duplicate_scopes() {
    let config = SyncConfig {
        tag_summary_scopes: vec![scope(5, Some(1)), scope(5, Some(2)), scope(5, Some(1))],
        ..SyncConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "account_peer_id": { "namespace": "cloud_user", "id": 42 },
        "read_reactions": false,
        "tag_summary_scopes": [
            { "peer_id": { "namespace": "cloud_channel", "id": 5 }, "thread_id": 9 }
        ],
        "worker_threads": 2
    }"#;

    let config = SyncConfig::from_json_str(json).unwrap();
    assert!(config.consume_personal_mentions);
    assert!(!config.read_reactions);
    assert_eq!(config.worker_threads, 2);
    assert_eq!(config.audit_capacity, 1024);
    assert_eq!(
        config.effective_tag_scopes(),
        vec![
            scope(5, Some(9)),
            TagSummaryScope {
                peer_id: PeerId::new(PeerNamespace::CloudUser, 42),
                thread_id: None,
            },
        ]
    );
}

#[test]
fn test_config_from_json_rejects_invalid() {
    assert!(SyncConfig::from_json_str(r#"{ "worker_threads": 0 }"#).is_err());
    assert!(SyncConfig::from_json_str("not json").is_err());
}

#[test]
fn test_config_from_lookup() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("PENDING_SYNC_ACCOUNT_PEER_ID", "cloud_user:7"),
        ("PENDING_SYNC_CONSUME_PERSONAL_MENTIONS", "off"),
        ("PENDING_SYNC_TAG_SUMMARY_SCOPES", "cloud_channel:5/9, cloud_channel:6"),
        ("PENDING_SYNC_WORKER_THREADS", "3"),
    ]);

    let config = SyncConfig::from_lookup(|name| vars.get(name).map(ToString::to_string)).unwrap();
    assert_eq!(
        config.account_peer_id,
        Some(PeerId::new(PeerNamespace::CloudUser, 7))
    );
    assert!(!config.consume_personal_mentions);
    assert!(config.read_reactions);
    assert_eq!(config.tag_summary_scopes, vec![scope(5, Some(9)), scope(6, None)]);
    assert_eq!(config.worker_threads, 3);
}

#[test]
fn test_config_from_lookup_reports_bad_variable() {
    let err = SyncConfig::from_lookup(|name| {
        (name == "PENDING_SYNC_WORKER_THREADS").then(|| "many".to_string())
    })
    .unwrap_err();
    assert!(format!("{err:#}").contains("PENDING_SYNC_WORKER_THREADS"));
}
