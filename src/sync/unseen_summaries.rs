//! Refresh unseen mention and reaction counts from the dialog list.

use async_trait::async_trait;

use crate::core::{
    ApiCall, ApiResponse, Dialog, InvalidationEntry, SchedulerError, Store, ValidationBody,
};
use crate::sync::message_contents::ContentKind;
use crate::sync::SyncContext;

pub(crate) struct UnseenSummaryBody<S> {
    kind: ContentKind,
    ctx: SyncContext<S>,
}

impl<S: Store> UnseenSummaryBody<S> {
    pub(crate) const fn new(kind: ContentKind, ctx: SyncContext<S>) -> Self {
        Self { kind, ctx }
    }

    const fn unseen_count(&self, dialog: &Dialog) -> Option<(i32, i32)> {
        match dialog {
            Dialog::Dialog {
                top_message,
                unread_mentions_count,
                unread_reactions_count,
                ..
            } => Some(match self.kind {
                ContentKind::PersonalMention => (*unread_mentions_count, *top_message),
                ContentKind::Reaction => (*unread_reactions_count, *top_message),
            }),
            Dialog::Folder { .. } => None,
        }
    }
}

#[async_trait]
impl<S: Store> ValidationBody for UnseenSummaryBody<S> {
    async fn execute(&self, entry: &InvalidationEntry) -> Result<(), SchedulerError> {
        let peer_id = entry.key.peer_id;
        let peer = self.ctx.store.transaction(move |tx| tx.get_peer(peer_id)).await?;
        let Some(input_peer) = peer.as_ref().and_then(|peer| peer.input_peer()) else {
            tracing::debug!(peer = %peer_id, "peer not addressable, skipping summary refresh");
            return Ok(());
        };

        let call = ApiCall::GetPeerDialogs {
            peers: vec![input_peer],
        };
        let dialogs = match self.ctx.network.request(call).await {
            Ok(ApiResponse::PeerDialogs(dialogs)) => dialogs,
            Ok(other) => {
                return Err(SchedulerError::InvariantViolation(format!(
                    "messages.getPeerDialogs answered {other:?}"
                )));
            }
            Err(err) => {
                tracing::warn!(peer = %peer_id, error = %err, "fetching peer dialogs failed");
                return Ok(());
            }
        };

        let Some(dialog) = dialogs.iter().find(|dialog| dialog.peer_id() == peer_id) else {
            tracing::debug!(peer = %peer_id, "peer missing from dialog reply");
            return Ok(());
        };
        let Some((count, max_id)) = self.unseen_count(dialog) else {
            return Err(SchedulerError::InvariantViolation(format!(
                "folder dialog returned for {peer_id}"
            )));
        };

        let key = entry.key.clone().with_thread(None).with_custom_tag(None);
        self.ctx
            .store
            .transaction(move |tx| tx.replace_summary(&key, count, max_id))
            .await
    }
}
