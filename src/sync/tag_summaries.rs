//! Tag summary synchronization for one peer/thread scope.
//!
//! Custom-tag markers (saved reaction tags) are refreshed all at once, so every
//! pending one is collapsed into a single synthetic entry before diffing.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{
    ActionBody, ApiCall, ApiResponse, DesiredState, InvalidationEntry, InvalidationKey,
    PeerId, PeerNamespace, SchedulerError, Snapshot, Store, SyncProfile, TagMask, Transaction,
    ValidationBody, ViewKey, CLOUD_NAMESPACE,
};
use crate::sync::saved_tags::synchronize_saved_tags;
use crate::sync::SyncContext;

/// Replace every custom-tag entry by one "refresh all custom tags" entry for
/// the scope. Entries without a custom tag pass through untouched.
#[must_use]
pub fn collapse_custom_tags(
    entries: Vec<InvalidationEntry>,
    peer_id: PeerId,
    thread_id: Option<i64>,
) -> Vec<InvalidationEntry> {
    if !entries.iter().any(|entry| entry.key.custom_tag.is_some()) {
        return entries;
    }
    let mut collapsed: Vec<_> = entries
        .into_iter()
        .filter(|entry| entry.key.custom_tag.is_none())
        .collect();
    let all_custom = InvalidationKey::for_tag(peer_id, TagMask::EMPTY)
        .with_thread(thread_id)
        .with_custom_tag(Some(Vec::new()));
    collapsed.push(InvalidationEntry::new(all_custom, 0));
    collapsed
}

/// Thread ids are 64-bit; message ids on the wire saturate at the `i32` range.
#[allow(clippy::cast_possible_truncation)]
fn clamp_message_id(thread_id: i64) -> i32 {
    thread_id.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Scheduler profile for the tag summaries of one peer/thread.
pub struct TagSummaryProfile<S> {
    name: String,
    peer_id: PeerId,
    thread_id: Option<i64>,
    body: Arc<TagSummaryBody<S>>,
}

impl<S: Store> TagSummaryProfile<S> {
    /// Profile for `peer_id`, optionally narrowed to a thread.
    pub fn new(ctx: SyncContext<S>, peer_id: PeerId, thread_id: Option<i64>) -> Self {
        let name = match thread_id {
            Some(thread_id) => format!("tag-summaries:{peer_id}/{thread_id}"),
            None => format!("tag-summaries:{peer_id}"),
        };
        Self {
            name,
            peer_id,
            thread_id,
            body: Arc::new(TagSummaryBody { ctx, peer_id }),
        }
    }

    fn invalidations_key(&self) -> ViewKey {
        ViewKey::InvalidatedSummaries {
            peer_id: Some(self.peer_id),
            thread_id: self.thread_id,
            tag_mask: TagMask::EMPTY,
            namespace: CLOUD_NAMESPACE,
        }
    }
}

impl<S: Store> SyncProfile for TagSummaryProfile<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn view_keys(&self) -> Vec<ViewKey> {
        vec![self.invalidations_key()]
    }

    fn desired_state(&self, snapshot: &Snapshot) -> DesiredState {
        let invalidations = snapshot.invalidations(&self.invalidations_key());
        DesiredState {
            entries: Vec::new(),
            invalidations: collapse_custom_tags(invalidations, self.peer_id, self.thread_id),
        }
    }

    fn action_body(&self) -> Option<Arc<dyn ActionBody>> {
        None
    }

    fn validation_body(&self) -> Arc<dyn ValidationBody> {
        Arc::clone(&self.body) as Arc<dyn ValidationBody>
    }
}

struct TagSummaryBody<S> {
    ctx: SyncContext<S>,
    peer_id: PeerId,
}

impl<S: Store> TagSummaryBody<S> {
    /// Refresh a forum topic's summary from the newest reply.
    async fn refresh_thread(&self, entry: &InvalidationEntry) -> Result<(), SchedulerError> {
        let Some(thread_id) = entry.key.thread_id else {
            return Ok(());
        };
        let peer_id = entry.key.peer_id;
        let peer = self.ctx.store.transaction(move |tx| tx.get_peer(peer_id)).await?;
        let input_peer = peer
            .filter(|peer| peer.id.namespace == PeerNamespace::CloudChannel && peer.is_forum)
            .and_then(|peer| peer.input_peer());
        let Some(input_peer) = input_peer else {
            tracing::debug!(peer = %peer_id, "not a reachable forum, skipping thread refresh");
            return Ok(());
        };

        let call = ApiCall::GetReplies {
            peer: input_peer,
            msg_id: clamp_message_id(thread_id),
            limit: 1,
        };
        match self.ctx.network.request(call).await {
            Ok(ApiResponse::ChannelMessages {
                count,
                top_message_id,
            }) => {
                let key = entry.key.clone().with_thread(Some(thread_id)).with_custom_tag(None);
                let max_id = top_message_id.unwrap_or(1);
                self.ctx
                    .store
                    .transaction(move |tx| tx.replace_summary(&key, count, max_id))
                    .await
            }
            Ok(other) => {
                tracing::debug!(
                    peer = %peer_id,
                    thread_id,
                    reply = ?other,
                    "ignoring non-channel replies page"
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    peer = %peer_id,
                    thread_id,
                    error = %err,
                    "fetching thread replies failed"
                );
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<S: Store> ValidationBody for TagSummaryBody<S> {
    async fn execute(&self, entry: &InvalidationEntry) -> Result<(), SchedulerError> {
        if entry.key.custom_tag.is_none() {
            return self.refresh_thread(entry).await;
        }
        if self.peer_id == self.ctx.account.account_peer_id() {
            synchronize_saved_tags(&self.ctx, self.peer_id).await
        } else {
            Err(SchedulerError::InvariantViolation(format!(
                "custom tag summaries invalidated for {}, which is not the account peer",
                self.peer_id
            )))
        }
    }

    fn clear(&self, transaction: &mut dyn Transaction, entry: &InvalidationEntry) {
        if entry.key.custom_tag.is_some() {
            transaction.remove_invalidation_entries_with_custom_tags(
                entry.key.peer_id,
                entry.key.thread_id,
                CLOUD_NAMESPACE,
                TagMask::EMPTY,
            );
        } else {
            transaction.remove_invalidation_entry(entry);
        }
    }
}
