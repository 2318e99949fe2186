//! In-memory store backend with live views.
//!
//! Transactions run under one `parking_lot::Mutex`, so they are serializable.
//! A transaction that changed anything bumps a `tokio::sync::watch` revision;
//! each subscription re-reads its views after a bump. Bursts of commits may
//! coalesce into one snapshot, which is all a reconciler needs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::core::entries::{
    DesiredEntry, InvalidationEntry, InvalidationKey, MessageId, PeerId, PendingAction,
    PendingActionType, SummaryKey, TagMask,
};
use crate::core::store::{Peer, Snapshot, Store, Transaction, View, ViewKey};
use crate::core::SchedulerError;

/// Stored tag summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSummary {
    /// Unseen count.
    pub count: i32,
    /// Newest message id covered by the count.
    pub max_id: i32,
}

#[derive(Debug, Default)]
struct StoreState {
    pending_actions: BTreeMap<(PendingActionType, MessageId), PendingAction>,
    invalidations: BTreeMap<InvalidationKey, i32>,
    summaries: BTreeMap<SummaryKey, TagSummary>,
    peers: HashMap<PeerId, Peer>,
    messages: BTreeMap<MessageId, TagMask>,
    next_version: i32,
}

impl StoreState {
    fn view(&self, key: &ViewKey) -> View {
        match key {
            ViewKey::PendingActions(action_type) => View::PendingActions(
                self.pending_actions
                    .iter()
                    .filter(|((kind, _), _)| kind == action_type)
                    .map(|((_, id), action)| DesiredEntry::new(*id, action.clone()))
                    .collect(),
            ),
            ViewKey::InvalidatedSummaries {
                peer_id,
                thread_id,
                tag_mask,
                namespace,
            } => View::InvalidatedSummaries(
                self.invalidations
                    .iter()
                    .filter(|(entry, _)| {
                        entry.namespace == *namespace
                            && (tag_mask.is_empty() || entry.tag_mask.intersects(*tag_mask))
                            && peer_id.map_or(true, |peer_id| {
                                entry.peer_id == peer_id && entry.thread_id == *thread_id
                            })
                    })
                    .map(|(key, version)| InvalidationEntry::new(key.clone(), *version))
                    .collect(),
            ),
        }
    }

    fn snapshot(&self, keys: &[ViewKey]) -> Snapshot {
        Snapshot {
            views: keys.iter().map(|key| (key.clone(), self.view(key))).collect(),
        }
    }
}

/// `Transaction` over the locked state; remembers whether anything changed.
struct MemoryTransaction<'a> {
    state: &'a mut StoreState,
    dirty: bool,
}

impl Transaction for MemoryTransaction<'_> {
    fn get_pending_action(
        &self,
        action_type: PendingActionType,
        id: MessageId,
    ) -> Option<PendingAction> {
        self.state.pending_actions.get(&(action_type, id)).cloned()
    }

    fn set_pending_action(
        &mut self,
        action_type: PendingActionType,
        id: MessageId,
        action: Option<PendingAction>,
    ) {
        let changed = match action {
            Some(action) => {
                let previous = self.state.pending_actions.insert((action_type, id), action.clone());
                previous != Some(action)
            }
            None => self.state.pending_actions.remove(&(action_type, id)).is_some(),
        };
        self.dirty |= changed;
    }

    fn remove_invalidation_entry(&mut self, entry: &InvalidationEntry) -> bool {
        if self.state.invalidations.get(&entry.key) != Some(&entry.version) {
            return false;
        }
        self.state.invalidations.remove(&entry.key);
        self.dirty = true;
        true
    }

    fn remove_invalidation_entries_with_custom_tags(
        &mut self,
        peer_id: PeerId,
        thread_id: Option<i64>,
        namespace: i32,
        tag_mask: TagMask,
    ) -> usize {
        let before = self.state.invalidations.len();
        self.state.invalidations.retain(|key, _| {
            !(key.custom_tag.is_some()
                && key.peer_id == peer_id
                && key.thread_id == thread_id
                && key.namespace == namespace
                && key.tag_mask == tag_mask)
        });
        let removed = before - self.state.invalidations.len();
        self.dirty |= removed > 0;
        removed
    }

    fn replace_summary(&mut self, key: &SummaryKey, count: i32, max_id: i32) {
        let summary = TagSummary { count, max_id };
        if self.state.summaries.insert(key.clone(), summary) != Some(summary) {
            self.dirty = true;
        }
    }

    fn summary_custom_tags(
        &self,
        peer_id: PeerId,
        thread_id: Option<i64>,
        tag_mask: TagMask,
        namespace: i32,
    ) -> Vec<Vec<u8>> {
        self.state
            .summaries
            .keys()
            .filter(|key| {
                key.peer_id == peer_id
                    && key.thread_id == thread_id
                    && key.tag_mask == tag_mask
                    && key.namespace == namespace
            })
            .filter_map(|key| key.custom_tag.clone())
            .collect()
    }

    fn get_peer(&self, peer_id: PeerId) -> Option<Peer> {
        self.state.peers.get(&peer_id).cloned()
    }

    fn top_message_id(&self, peer_id: PeerId, namespace: i32) -> Option<MessageId> {
        self.state
            .messages
            .keys()
            .filter(|id| id.peer_id == peer_id && id.namespace == namespace)
            .max_by_key(|id| id.id)
            .copied()
    }

    fn remove_message_tag(&mut self, id: MessageId, tag: TagMask) -> bool {
        let Some(tags) = self.state.messages.get_mut(&id) else {
            return false;
        };
        let updated = tags.difference(tag);
        if updated != *tags {
            *tags = updated;
            self.dirty = true;
        }
        true
    }
}

struct StoreInner {
    state: Mutex<StoreState>,
    revision: watch::Sender<u64>,
}

/// In-memory `Store` for development and testing. Clones share state.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<StoreInner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState::default()),
                revision,
            }),
        }
    }

    /// Run `f` against the locked state and publish if it changed anything.
    fn write<R>(&self, f: impl FnOnce(&mut MemoryTransaction<'_>) -> R) -> R {
        let (result, dirty) = {
            let mut state = self.inner.state.lock();
            let mut tx = MemoryTransaction {
                state: &mut *state,
                dirty: false,
            };
            let result = f(&mut tx);
            (result, tx.dirty)
        };
        if dirty {
            self.inner.revision.send_modify(|revision| *revision += 1);
        }
        result
    }

    /// Insert or replace a peer record.
    pub fn insert_peer(&self, peer: Peer) {
        self.inner.state.lock().peers.insert(peer.id, peer);
    }

    /// Insert or replace a stored message with its tags.
    pub fn insert_message(&self, id: MessageId, tags: TagMask) {
        self.write(|tx| {
            tx.state.messages.insert(id, tags);
            tx.dirty = true;
        });
    }

    /// Record or clear a pending action outside of a scheduler.
    pub fn set_pending_action(
        &self,
        action_type: PendingActionType,
        id: MessageId,
        action: Option<PendingAction>,
    ) {
        self.write(|tx| tx.set_pending_action(action_type, id, action));
    }

    /// Mark a summary stale. Returns the new marker version.
    pub fn invalidate_summary(&self, key: InvalidationKey) -> i32 {
        self.write(|tx| {
            tx.state.next_version += 1;
            let version = tx.state.next_version;
            tx.state.invalidations.insert(key, version);
            tx.dirty = true;
            version
        })
    }

    /// Seed a summary outside of a scheduler.
    pub fn replace_summary(&self, key: &SummaryKey, count: i32, max_id: i32) {
        self.write(|tx| tx.replace_summary(key, count, max_id));
    }

    /// Stored summary for `key`.
    #[must_use]
    pub fn summary(&self, key: &SummaryKey) -> Option<TagSummary> {
        self.inner.state.lock().summaries.get(key).copied()
    }

    /// Keys of pending actions of one type.
    #[must_use]
    pub fn pending_actions(&self, action_type: PendingActionType) -> Vec<MessageId> {
        self.inner
            .state
            .lock()
            .pending_actions
            .keys()
            .filter(|(kind, _)| *kind == action_type)
            .map(|(_, id)| *id)
            .collect()
    }

    /// Every invalidation marker.
    #[must_use]
    pub fn invalidation_entries(&self) -> Vec<InvalidationEntry> {
        self.inner
            .state
            .lock()
            .invalidations
            .iter()
            .map(|(key, version)| InvalidationEntry::new(key.clone(), *version))
            .collect()
    }

    /// Tags of a stored message.
    #[must_use]
    pub fn message_tags(&self, id: MessageId) -> Option<TagMask> {
        self.inner.state.lock().messages.get(&id).copied()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.revision.receiver_count()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn subscribe(&self, keys: Vec<ViewKey>) -> BoxStream<'static, Snapshot> {
        let rx = self.inner.revision.subscribe();
        let inner = Arc::clone(&self.inner);
        stream::unfold((inner, rx, keys, true), |(inner, mut rx, keys, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            drop(rx.borrow_and_update());
            let snapshot = inner.state.lock().snapshot(&keys);
            Some((snapshot, (inner, rx, keys, false)))
        })
        .boxed()
    }

    async fn transaction<R, F>(&self, body: F) -> Result<R, SchedulerError>
    where
        F: FnOnce(&mut dyn Transaction) -> R + Send + 'static,
        R: Send + 'static,
    {
        tokio::task::yield_now().await;
        Ok(self.write(|tx| {
            let tx: &mut dyn Transaction = tx;
            body(tx)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entries::{PeerNamespace, CLOUD_NAMESPACE};

    fn peer(id: i64) -> PeerId {
        PeerId::new(PeerNamespace::CloudUser, id)
    }

    fn mentions_view(peer_id: Option<PeerId>) -> ViewKey {
        ViewKey::InvalidatedSummaries {
            peer_id,
            thread_id: None,
            tag_mask: TagMask::UNSEEN_PERSONAL_MESSAGE,
            namespace: CLOUD_NAMESPACE,
        }
    }

    #[tokio::test]
    async fn test_subscribe_yields_initial_then_changes() {
        let store = InMemoryStore::new();
        let key = ViewKey::PendingActions(PendingActionType::ReadReaction);
        let mut feed = store.subscribe(vec![key.clone()]);

        let first = feed.next().await.unwrap();
        assert!(first.pending_actions(&key).is_empty());

        let id = MessageId::cloud(peer(1), 5);
        store.set_pending_action(
            PendingActionType::ReadReaction,
            id,
            Some(PendingAction::ReadReaction),
        );
        let second = feed.next().await.unwrap();
        assert_eq!(
            second.pending_actions(&key),
            vec![DesiredEntry::new(id, PendingAction::ReadReaction)]
        );
        assert_eq!(store.subscriber_count(), 1);
        drop(feed);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_view_is_ordered_and_typed() {
        let store = InMemoryStore::new();
        let consume = PendingActionType::ConsumeUnseenPersonalMessage;
        store.set_pending_action(
            consume,
            MessageId::cloud(peer(2), 1),
            Some(PendingAction::ConsumePersonalMessage),
        );
        store.set_pending_action(
            consume,
            MessageId::cloud(peer(1), 9),
            Some(PendingAction::ConsumePersonalMessage),
        );
        store.set_pending_action(
            PendingActionType::ReadReaction,
            MessageId::cloud(peer(1), 3),
            Some(PendingAction::ReadReaction),
        );

        let key = ViewKey::PendingActions(consume);
        let snapshot = store.subscribe(vec![key.clone()]).next().await.unwrap();
        let ids: Vec<_> = snapshot.pending_actions(&key).into_iter().map(|e| e.key).collect();
        assert_eq!(ids, vec![MessageId::cloud(peer(1), 9), MessageId::cloud(peer(2), 1)]);
    }

    #[tokio::test]
    async fn test_invalidation_view_filters() {
        let store = InMemoryStore::new();
        store.invalidate_summary(InvalidationKey::for_tag(
            peer(1),
            TagMask::UNSEEN_PERSONAL_MESSAGE,
        ));
        store.invalidate_summary(InvalidationKey::for_tag(
            peer(2),
            TagMask::UNSEEN_PERSONAL_MESSAGE,
        ));
        store.invalidate_summary(InvalidationKey::for_tag(peer(1), TagMask::UNSEEN_REACTION));
        store.invalidate_summary(
            InvalidationKey::for_tag(peer(1), TagMask::UNSEEN_PERSONAL_MESSAGE)
                .with_thread(Some(4)),
        );

        let all = mentions_view(None);
        let one = mentions_view(Some(peer(1)));
        let snapshot = store.subscribe(vec![all.clone(), one.clone()]).next().await.unwrap();
        assert_eq!(snapshot.invalidations(&all).len(), 3);
        let scoped = snapshot.invalidations(&one);
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].key.thread_id, None);
    }

    #[tokio::test]
    async fn test_stale_version_is_not_removed() {
        let store = InMemoryStore::new();
        let key = InvalidationKey::for_tag(peer(1), TagMask::UNSEEN_REACTION);
        let v1 = store.invalidate_summary(key.clone());
        let v2 = store.invalidate_summary(key.clone());
        assert!(v2 > v1);

        let stale = InvalidationEntry::new(key.clone(), v1);
        let removed = store
            .transaction(move |tx| tx.remove_invalidation_entry(&stale))
            .await
            .unwrap();
        assert!(!removed);

        let fresh = InvalidationEntry::new(key, v2);
        let removed = store
            .transaction(move |tx| tx.remove_invalidation_entry(&fresh))
            .await
            .unwrap();
        assert!(removed);
        assert!(store.invalidation_entries().is_empty());
    }

    #[tokio::test]
    async fn test_remove_custom_tag_entries_only() {
        let store = InMemoryStore::new();
        let base = InvalidationKey::for_tag(peer(1), TagMask::EMPTY);
        store.invalidate_summary(base.clone().with_custom_tag(Some(vec![1])));
        store.invalidate_summary(base.clone().with_custom_tag(Some(vec![2])));
        store.invalidate_summary(base);

        let removed = store
            .transaction(|tx| {
                tx.remove_invalidation_entries_with_custom_tags(
                    peer(1),
                    None,
                    CLOUD_NAMESPACE,
                    TagMask::EMPTY,
                )
            })
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.invalidation_entries().len(), 1);
    }

    #[tokio::test]
    async fn test_message_tags_and_top_message() {
        let store = InMemoryStore::new();
        let low = MessageId::cloud(peer(1), 3);
        let high = MessageId::cloud(peer(1), 8);
        store.insert_message(low, TagMask::UNSEEN_REACTION);
        store.insert_message(
            high,
            TagMask::UNSEEN_PERSONAL_MESSAGE.union(TagMask::UNSEEN_REACTION),
        );

        let (top, found) = store
            .transaction(move |tx| {
                let top = tx.top_message_id(peer(1), CLOUD_NAMESPACE);
                let found = tx.remove_message_tag(high, TagMask::UNSEEN_PERSONAL_MESSAGE);
                (top, found)
            })
            .await
            .unwrap();
        assert_eq!(top, Some(high));
        assert!(found);
        assert_eq!(store.message_tags(high), Some(TagMask::UNSEEN_REACTION));
    }
}
