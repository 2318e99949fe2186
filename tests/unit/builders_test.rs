//! Tests for builder modules

use std::sync::Arc;

use async_trait::async_trait;
use pending_sync::builders::{build_audit_sink, build_schedulers};
use pending_sync::config::{SyncConfig, TagSummaryScope};
use pending_sync::core::{
    AccountState, ApiCall, ApiResponse, AuditSink, Network, NetworkError, PeerId, PeerNamespace,
    SchedulerError,
};
use pending_sync::infra::InMemoryStore;
use pending_sync::runtime::TokioSpawner;
use pending_sync::sync::SyncContext;

struct OfflineNetwork;

#[async_trait]
impl Network for OfflineNetwork {
    async fn request(&self, _call: ApiCall) -> Result<ApiResponse, NetworkError> {
        Err(NetworkError::Transport("offline".to_string()))
    }
}

struct FixedAccount(PeerId);

impl AccountState for FixedAccount {
    fn account_peer_id(&self) -> PeerId {
        self.0
    }

    fn add_pts_update(&self, _pts: i32, _pts_count: i32) {}
}

fn ctx() -> SyncContext<InMemoryStore> {
    SyncContext::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(OfflineNetwork),
        Arc::new(FixedAccount(PeerId::new(PeerNamespace::CloudUser, 1))),
    )
}

#[tokio::test]
async fn test_build_schedulers_starts_every_profile() {
    let config = SyncConfig {
        account_peer_id: Some(PeerId::new(PeerNamespace::CloudUser, 1)),
        tag_summary_scopes: vec![TagSummaryScope {
            peer_id: PeerId::new(PeerNamespace::CloudChannel, 5),
            thread_id: Some(3),
        }],
        ..SyncConfig::default()
    };
    let audit: Arc<dyn AuditSink> = Arc::new(build_audit_sink(&config));

    let handles = build_schedulers(&config, &ctx(), TokioSpawner::current(), Some(audit)).unwrap();
    let names: Vec<_> = handles.iter().map(|handle| handle.name().to_string()).collect();
    assert_eq!(
        names,
        vec![
            "consume-personal-mentions",
            "read-reactions",
            "tag-summaries:cloud_channel:5/3",
            "tag-summaries:cloud_user:1",
        ]
    );

    for handle in &handles {
        handle.dispose();
        assert!(handle.is_disposed());
    }
}

#[tokio::test]
async fn test_build_schedulers_respects_disabled_profiles() {
    let config = SyncConfig {
        consume_personal_mentions: false,
        read_reactions: false,
        saved_tags: false,
        ..SyncConfig::default()
    };

    let handles = build_schedulers(&config, &ctx(), TokioSpawner::current(), None).unwrap();
    assert!(handles.is_empty());
}

#[tokio::test]
async fn test_build_schedulers_rejects_invalid_config() {
    let config = SyncConfig {
        worker_threads: 0,
        ..SyncConfig::default()
    };

    let err = build_schedulers(&config, &ctx(), TokioSpawner::current(), None).unwrap_err();
    assert!(matches!(err, SchedulerError::Config(_)));
}
