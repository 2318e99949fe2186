//! Refresh per-tag summaries of the account's saved reaction tags.

use std::collections::HashSet;

use crate::core::{
    ApiCall, ApiResponse, InvalidationKey, PeerId, SchedulerError, Store, TagMask,
    CLOUD_NAMESPACE,
};
use crate::sync::SyncContext;

/// Fetch saved reaction tags and rewrite the peer-wide custom-tag summaries
/// of `peer_id`.
///
/// Tags present in the reply get their count at the peer's newest message id
/// (1 when nothing is stored). Previously known tags missing from the reply are
/// zeroed. A failed request or a not-modified reply leaves summaries as they are.
///
/// # Errors
///
/// Store failures.
pub async fn synchronize_saved_tags<S: Store>(
    ctx: &SyncContext<S>,
    peer_id: PeerId,
) -> Result<(), SchedulerError> {
    let call = ApiCall::GetSavedReactionTags { hash: 0 };
    let tags = match ctx.network.request(call).await {
        Ok(ApiResponse::SavedReactionTags(tags)) => tags,
        Ok(ApiResponse::SavedReactionTagsNotModified) => return Ok(()),
        Ok(other) => {
            return Err(SchedulerError::InvariantViolation(format!(
                "messages.getSavedReactionTags answered {other:?}"
            )));
        }
        Err(err) => {
            tracing::warn!(peer = %peer_id, error = %err, "fetching saved reaction tags failed");
            return Ok(());
        }
    };

    let refreshed = tags.len();
    let zeroed = ctx
        .store
        .transaction(move |tx| {
            let previous = tx.summary_custom_tags(peer_id, None, TagMask::EMPTY, CLOUD_NAMESPACE);
            let max_id = tx
                .top_message_id(peer_id, CLOUD_NAMESPACE)
                .map_or(1, |top| top.id);
            let key_for = |tag: Vec<u8>| {
                InvalidationKey::for_tag(peer_id, TagMask::EMPTY).with_custom_tag(Some(tag))
            };

            let mut seen = HashSet::with_capacity(tags.len());
            for tag in &tags {
                let custom = tag.reaction.message_tag();
                seen.insert(custom.clone());
                tx.replace_summary(&key_for(custom), tag.count, max_id);
            }

            let mut zeroed = 0usize;
            for stale in previous.into_iter().filter(|tag| !seen.contains(tag)) {
                tx.replace_summary(&key_for(stale), 0, max_id);
                zeroed += 1;
            }
            zeroed
        })
        .await?;

    tracing::debug!(peer = %peer_id, refreshed, zeroed, "saved reaction tags synchronized");
    Ok(())
}
