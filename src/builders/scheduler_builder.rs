//! Start every configured synchronizer.

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::core::{
    AuditSink, InMemoryAuditSink, ReconcilingScheduler, SchedulerError, SchedulerHandle, Spawn,
    Store, SyncProfile,
};
use crate::sync::{MessageContentsProfile, SyncContext, TagSummaryProfile};

/// Bounded in-memory audit sink sized from configuration.
#[must_use]
pub fn build_audit_sink(cfg: &SyncConfig) -> InMemoryAuditSink {
    InMemoryAuditSink::new(cfg.audit_capacity)
}

/// Validate `cfg` and start one scheduler per enabled profile and tag scope.
///
/// Handles come back in start order: personal mentions, reactions, then tag
/// scopes in configuration order.
///
/// # Errors
///
/// `SchedulerError::Config` when the configuration is invalid.
pub fn build_schedulers<S, Sp>(
    cfg: &SyncConfig,
    ctx: &SyncContext<S>,
    spawner: Sp,
    audit: Option<Arc<dyn AuditSink>>,
) -> Result<Vec<SchedulerHandle>, SchedulerError>
where
    S: Store,
    Sp: Spawn + Clone + Send + Sync + 'static,
{
    cfg.validate()
        .map_err(|e| SchedulerError::Config(format!("config invalid: {e}")))?;

    let mut scheduler = ReconcilingScheduler::new(Arc::clone(&ctx.store), spawner);
    if let Some(audit) = audit {
        scheduler = scheduler.with_audit(audit);
    }

    let mut profiles: Vec<Arc<dyn SyncProfile>> = Vec::new();
    if cfg.consume_personal_mentions {
        profiles.push(Arc::new(MessageContentsProfile::consume_personal_mentions(
            ctx.clone(),
        )));
    }
    if cfg.read_reactions {
        profiles.push(Arc::new(MessageContentsProfile::read_reactions(ctx.clone())));
    }
    for scope in cfg.effective_tag_scopes() {
        profiles.push(Arc::new(TagSummaryProfile::new(
            ctx.clone(),
            scope.peer_id,
            scope.thread_id,
        )));
    }

    let handles: Vec<_> = profiles
        .into_iter()
        .map(|profile| scheduler.start(profile))
        .collect();
    tracing::info!(schedulers = handles.len(), "synchronizers started");
    Ok(handles)
}
