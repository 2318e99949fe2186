//! Acknowledge personal mentions and reactions as seen.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{
    ActionBody, ApiCall, ApiResponse, DesiredState, MessageId, PeerNamespace, PendingAction,
    PendingActionType, SchedulerError, Snapshot, Store, SyncProfile, TagMask, ValidationBody,
    ViewKey, CLOUD_NAMESPACE,
};
use crate::sync::unseen_summaries::UnseenSummaryBody;
use crate::sync::SyncContext;

/// Which unseen marker a message-contents synchronizer acknowledges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Personal mentions.
    PersonalMention,
    /// Reactions.
    Reaction,
}

impl ContentKind {
    /// Pending action type consumed.
    #[must_use]
    pub const fn action_type(self) -> PendingActionType {
        match self {
            Self::PersonalMention => PendingActionType::ConsumeUnseenPersonalMessage,
            Self::Reaction => PendingActionType::ReadReaction,
        }
    }

    /// Message tag cleared on commit and summary tag refreshed.
    #[must_use]
    pub const fn unseen_tag(self) -> TagMask {
        match self {
            Self::PersonalMention => TagMask::UNSEEN_PERSONAL_MESSAGE,
            Self::Reaction => TagMask::UNSEEN_REACTION,
        }
    }

    const fn profile_name(self) -> &'static str {
        match self {
            Self::PersonalMention => "consume-personal-mentions",
            Self::Reaction => "read-reactions",
        }
    }
}

/// Scheduler profile for one `ContentKind`.
pub struct MessageContentsProfile<S> {
    kind: ContentKind,
    actions: Arc<MessageContentsBody<S>>,
    validations: Arc<UnseenSummaryBody<S>>,
}

impl<S: Store> MessageContentsProfile<S> {
    /// Profile for a content kind.
    pub fn new(kind: ContentKind, ctx: SyncContext<S>) -> Self {
        Self {
            kind,
            actions: Arc::new(MessageContentsBody {
                kind,
                ctx: ctx.clone(),
            }),
            validations: Arc::new(UnseenSummaryBody::new(kind, ctx)),
        }
    }

    /// Consume personal mentions.
    pub fn consume_personal_mentions(ctx: SyncContext<S>) -> Self {
        Self::new(ContentKind::PersonalMention, ctx)
    }

    /// Read reactions.
    pub fn read_reactions(ctx: SyncContext<S>) -> Self {
        Self::new(ContentKind::Reaction, ctx)
    }

    fn actions_key(&self) -> ViewKey {
        ViewKey::PendingActions(self.kind.action_type())
    }

    fn invalidations_key(&self) -> ViewKey {
        ViewKey::InvalidatedSummaries {
            peer_id: None,
            thread_id: None,
            tag_mask: self.kind.unseen_tag(),
            namespace: CLOUD_NAMESPACE,
        }
    }
}

impl<S: Store> SyncProfile for MessageContentsProfile<S> {
    fn name(&self) -> &str {
        self.kind.profile_name()
    }

    fn view_keys(&self) -> Vec<ViewKey> {
        vec![self.actions_key(), self.invalidations_key()]
    }

    fn desired_state(&self, snapshot: &Snapshot) -> DesiredState {
        DesiredState {
            entries: snapshot.pending_actions(&self.actions_key()),
            invalidations: snapshot.invalidations(&self.invalidations_key()),
        }
    }

    fn action_body(&self) -> Option<Arc<dyn ActionBody>> {
        Some(Arc::clone(&self.actions) as Arc<dyn ActionBody>)
    }

    fn validation_body(&self) -> Arc<dyn ValidationBody> {
        Arc::clone(&self.validations) as Arc<dyn ValidationBody>
    }
}

struct MessageContentsBody<S> {
    kind: ContentKind,
    ctx: SyncContext<S>,
}

impl<S: Store> MessageContentsBody<S> {
    /// Clear the pending action and the unseen tag on the message.
    async fn commit(&self, id: MessageId) -> Result<(), SchedulerError> {
        let action_type = self.kind.action_type();
        let tag = self.kind.unseen_tag();
        self.ctx
            .store
            .transaction(move |tx| {
                tx.set_pending_action(action_type, id, None);
                if !tx.remove_message_tag(id, tag) {
                    tracing::debug!(message = %id, "acknowledged message is not stored locally");
                }
            })
            .await
    }
}

#[async_trait]
impl<S: Store> ActionBody for MessageContentsBody<S> {
    fn action_type(&self) -> PendingActionType {
        self.kind.action_type()
    }

    async fn execute(&self, id: MessageId, _action: PendingAction) -> Result<(), SchedulerError> {
        match id.peer_id.namespace {
            PeerNamespace::CloudUser | PeerNamespace::CloudGroup => {
                let call = ApiCall::ReadMessageContents { ids: vec![id.id] };
                let unexpected = match self.ctx.network.request(call).await {
                    Ok(ApiResponse::AffectedMessages { pts, pts_count }) => {
                        self.ctx.account.add_pts_update(pts, pts_count);
                        None
                    }
                    Ok(other) => Some(other),
                    Err(err) => {
                        tracing::warn!(message = %id, error = %err, "read message contents failed");
                        None
                    }
                };
                self.commit(id).await?;
                match unexpected {
                    Some(other) => Err(SchedulerError::InvariantViolation(format!(
                        "messages.readMessageContents answered {other:?}"
                    ))),
                    None => Ok(()),
                }
            }
            PeerNamespace::CloudChannel => {
                let peer_id = id.peer_id;
                let peer = self.ctx.store.transaction(move |tx| tx.get_peer(peer_id)).await?;
                let Some(channel) = peer.as_ref().and_then(|peer| peer.input_channel()) else {
                    tracing::debug!(message = %id, "channel not addressable, skipping");
                    return Ok(());
                };
                let call = ApiCall::ReadChannelMessageContents {
                    channel,
                    ids: vec![id.id],
                };
                match self.ctx.network.request(call).await {
                    Ok(ApiResponse::Bool(acknowledged)) => {
                        tracing::debug!(message = %id, acknowledged, "channel contents read");
                    }
                    Ok(other) => {
                        self.commit(id).await?;
                        return Err(SchedulerError::InvariantViolation(format!(
                            "channels.readMessageContents answered {other:?}"
                        )));
                    }
                    Err(err) => {
                        tracing::warn!(message = %id, error = %err, "read channel contents failed");
                    }
                }
                self.commit(id).await
            }
            PeerNamespace::SecretChat => Ok(()),
        }
    }
}
