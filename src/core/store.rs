//! Store collaborator contract: live views and serializable transactions.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::core::entries::{
    DesiredEntry, InvalidationEntry, MessageId, PeerId, PeerNamespace, PendingAction,
    PendingActionType, SummaryKey, TagMask,
};
use crate::core::network::{InputChannel, InputPeer};
use crate::core::SchedulerError;

/// Selects one live view of the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKey {
    /// Pending actions of one type, ordered by key.
    PendingActions(PendingActionType),
    /// Invalidated tag summaries.
    InvalidatedSummaries {
        /// Restrict to one peer; `None` covers every peer.
        peer_id: Option<PeerId>,
        /// Thread scope; only applied when `peer_id` is set.
        thread_id: Option<i64>,
        /// Tag selector; `TagMask::EMPTY` selects every tag.
        tag_mask: TagMask,
        /// Message namespace.
        namespace: i32,
    },
}

/// Current contents of one view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Entries of a `ViewKey::PendingActions` view.
    PendingActions(Vec<DesiredEntry>),
    /// Entries of a `ViewKey::InvalidatedSummaries` view.
    InvalidatedSummaries(Vec<InvalidationEntry>),
}

/// One delivery of the desired-state feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Contents per requested view key.
    pub views: HashMap<ViewKey, View>,
}

impl Snapshot {
    /// Pending action entries for `key`; empty when absent.
    #[must_use]
    pub fn pending_actions(&self, key: &ViewKey) -> Vec<DesiredEntry> {
        match self.views.get(key) {
            Some(View::PendingActions(entries)) => entries.clone(),
            _ => Vec::new(),
        }
    }

    /// Invalidation entries for `key`; empty when absent.
    #[must_use]
    pub fn invalidations(&self, key: &ViewKey) -> Vec<InvalidationEntry> {
        match self.views.get(key) {
            Some(View::InvalidatedSummaries(entries)) => entries.clone(),
            _ => Vec::new(),
        }
    }
}

/// Peer record as far as request addressing is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Peer id.
    pub id: PeerId,
    /// Access hash, required for users and channels.
    pub access_hash: Option<i64>,
    /// Channel with forum topics enabled.
    pub is_forum: bool,
}

impl Peer {
    /// Peer without access hash or flags.
    #[must_use]
    pub const fn new(id: PeerId) -> Self {
        Self {
            id,
            access_hash: None,
            is_forum: false,
        }
    }

    /// Same peer with an access hash.
    #[must_use]
    pub const fn with_access_hash(mut self, access_hash: i64) -> Self {
        self.access_hash = Some(access_hash);
        self
    }

    /// Same peer flagged as a forum.
    #[must_use]
    pub const fn forum(mut self) -> Self {
        self.is_forum = true;
        self
    }

    /// Request-capable representation, if the peer can be addressed.
    #[must_use]
    pub const fn input_peer(&self) -> Option<InputPeer> {
        match (self.id.namespace, self.access_hash) {
            (PeerNamespace::CloudUser, Some(access_hash)) => Some(InputPeer::User {
                user_id: self.id.id,
                access_hash,
            }),
            (PeerNamespace::CloudGroup, _) => Some(InputPeer::Chat { chat_id: self.id.id }),
            (PeerNamespace::CloudChannel, Some(access_hash)) => Some(InputPeer::Channel {
                channel_id: self.id.id,
                access_hash,
            }),
            _ => None,
        }
    }

    /// Channel addressing, if the peer is a reachable channel.
    #[must_use]
    pub const fn input_channel(&self) -> Option<InputChannel> {
        match (self.id.namespace, self.access_hash) {
            (PeerNamespace::CloudChannel, Some(access_hash)) => Some(InputChannel {
                channel_id: self.id.id,
                access_hash,
            }),
            _ => None,
        }
    }
}

/// Point operations available inside a transaction.
pub trait Transaction {
    /// Pending action recorded under `action_type` for `id`.
    fn get_pending_action(
        &self,
        action_type: PendingActionType,
        id: MessageId,
    ) -> Option<PendingAction>;

    /// Record or clear a pending action.
    fn set_pending_action(
        &mut self,
        action_type: PendingActionType,
        id: MessageId,
        action: Option<PendingAction>,
    );

    /// Remove an invalidation marker if its version still matches. Returns
    /// whether it was removed.
    fn remove_invalidation_entry(&mut self, entry: &InvalidationEntry) -> bool;

    /// Remove every custom-tag marker in a scope. Returns how many were removed.
    fn remove_invalidation_entries_with_custom_tags(
        &mut self,
        peer_id: PeerId,
        thread_id: Option<i64>,
        namespace: i32,
        tag_mask: TagMask,
    ) -> usize;

    /// Overwrite a tag summary.
    fn replace_summary(&mut self, key: &SummaryKey, count: i32, max_id: i32);

    /// Custom tags that currently have a summary in a scope.
    fn summary_custom_tags(
        &self,
        peer_id: PeerId,
        thread_id: Option<i64>,
        tag_mask: TagMask,
        namespace: i32,
    ) -> Vec<Vec<u8>>;

    /// Peer record.
    fn get_peer(&self, peer_id: PeerId) -> Option<Peer>;

    /// Newest stored message of a peer.
    fn top_message_id(&self, peer_id: PeerId, namespace: i32) -> Option<MessageId>;

    /// Clear tag bits on a stored message. Returns whether the message exists.
    fn remove_message_tag(&mut self, id: MessageId, tag: TagMask) -> bool;
}

/// Transactional store that also publishes live views.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Subscribe to a set of views. The stream yields the current state first
    /// and then a fresh snapshot after every committed change.
    fn subscribe(&self, keys: Vec<ViewKey>) -> BoxStream<'static, Snapshot>;

    /// Run `body` as one atomic, serializable transaction.
    async fn transaction<R, F>(&self, body: F) -> Result<R, SchedulerError>
    where
        F: FnOnce(&mut dyn Transaction) -> R + Send + 'static,
        R: Send + 'static;
}
