//! Partition keys and the pending entries observed in desired-state snapshots.
//!
//! Every entry belongs to exactly one owning peer. The reconciler uses that
//! owner as the exclusivity scope: at most one action task per peer, and no
//! summary refresh for a peer while one of its actions is running.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;

/// Message namespace for server-side (cloud) messages.
pub const CLOUD_NAMESPACE: i32 = 0;

/// Peer namespaces understood by the synchronizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerNamespace {
    /// One-to-one conversation with a user.
    CloudUser,
    /// Basic group.
    CloudGroup,
    /// Channel or supergroup.
    CloudChannel,
    /// End-to-end encrypted chat; never synchronized with the server.
    SecretChat,
}

impl PeerNamespace {
    /// Stable textual form used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CloudUser => "cloud_user",
            Self::CloudGroup => "cloud_group",
            Self::CloudChannel => "cloud_channel",
            Self::SecretChat => "secret_chat",
        }
    }
}

impl FromStr for PeerNamespace {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cloud_user" => Ok(Self::CloudUser),
            "cloud_group" => Ok(Self::CloudGroup),
            "cloud_channel" => Ok(Self::CloudChannel),
            "secret_chat" => Ok(Self::SecretChat),
            other => Err(SchedulerError::Config(format!("unknown peer namespace `{other}`"))),
        }
    }
}

/// Identifier of the entity that owns pending work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId {
    /// Peer namespace.
    pub namespace: PeerNamespace,
    /// Numeric id within the namespace.
    pub id: i64,
}

impl PeerId {
    /// Create a peer id.
    #[must_use]
    pub const fn new(namespace: PeerNamespace, id: i64) -> Self {
        Self { namespace, id }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace.as_str(), self.id)
    }
}

impl FromStr for PeerId {
    type Err = SchedulerError;

    /// Parses the `namespace:id` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, id) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| SchedulerError::Config(format!("peer id `{s}` must be namespace:id")))?;
        let id = id
            .parse::<i64>()
            .map_err(|e| SchedulerError::Config(format!("peer id `{s}`: {e}")))?;
        Ok(Self::new(namespace.parse()?, id))
    }
}

/// Key of a pending message action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId {
    /// Owning peer.
    pub peer_id: PeerId,
    /// Message namespace.
    pub namespace: i32,
    /// Message id within the peer and namespace.
    pub id: i32,
}

impl MessageId {
    /// Create a message id.
    #[must_use]
    pub const fn new(peer_id: PeerId, namespace: i32, id: i32) -> Self {
        Self {
            peer_id,
            namespace,
            id,
        }
    }

    /// Shorthand for a cloud message.
    #[must_use]
    pub const fn cloud(peer_id: PeerId, id: i32) -> Self {
        Self::new(peer_id, CLOUD_NAMESPACE, id)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.peer_id, self.namespace, self.id)
    }
}

/// Bitmask of message history tags.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TagMask(pub u32);

impl TagMask {
    /// No tags. In a view key this selects every tag.
    pub const EMPTY: Self = Self(0);
    /// Message mentions the account and has not been seen.
    pub const UNSEEN_PERSONAL_MESSAGE: Self = Self(1 << 4);
    /// Message carries a reaction to the account that has not been seen.
    pub const UNSEEN_REACTION: Self = Self(1 << 7);

    /// True when no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when at least one bit is shared.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True when every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of both masks.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Bits of `self` not in `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

/// Kinds of pending message actions, each with its own view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingActionType {
    /// Acknowledge a personal mention as seen.
    ConsumeUnseenPersonalMessage,
    /// Acknowledge reactions on a message as seen.
    ReadReaction,
}

/// Payload recorded by the store for a pending action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingAction {
    /// Mark a personal mention consumed.
    ConsumePersonalMessage,
    /// Mark message reactions seen.
    ReadReaction,
}

impl PendingAction {
    /// The action type this payload is recorded under.
    #[must_use]
    pub const fn action_type(&self) -> PendingActionType {
        match self {
            Self::ConsumePersonalMessage => PendingActionType::ConsumeUnseenPersonalMessage,
            Self::ReadReaction => PendingActionType::ReadReaction,
        }
    }
}

/// A pending unit of work observed in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredEntry {
    /// Entry key; unique within one action type.
    pub key: MessageId,
    /// Action payload as seen by the snapshot.
    pub action: PendingAction,
}

impl DesiredEntry {
    /// Create an entry.
    #[must_use]
    pub const fn new(key: MessageId, action: PendingAction) -> Self {
        Self { key, action }
    }
}

/// Key of a tag summary invalidation marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InvalidationKey {
    /// Owning peer.
    pub peer_id: PeerId,
    /// Message namespace.
    pub namespace: i32,
    /// Tag selector.
    pub tag_mask: TagMask,
    /// Thread (forum topic) scope, if any.
    pub thread_id: Option<i64>,
    /// Custom tag (saved reaction tag), if any.
    pub custom_tag: Option<Vec<u8>>,
}

impl InvalidationKey {
    /// Peer-wide cloud key for a tag selector.
    #[must_use]
    pub const fn for_tag(peer_id: PeerId, tag_mask: TagMask) -> Self {
        Self {
            peer_id,
            namespace: CLOUD_NAMESPACE,
            tag_mask,
            thread_id: None,
            custom_tag: None,
        }
    }

    /// Same key narrowed to a thread.
    #[must_use]
    pub const fn with_thread(mut self, thread_id: Option<i64>) -> Self {
        self.thread_id = thread_id;
        self
    }

    /// Same key narrowed to a custom tag.
    #[must_use]
    pub fn with_custom_tag(mut self, custom_tag: Option<Vec<u8>>) -> Self {
        self.custom_tag = custom_tag;
        self
    }
}

impl fmt::Display for InvalidationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/tags={:#x}", self.peer_id, self.namespace, self.tag_mask.0)?;
        if let Some(thread_id) = self.thread_id {
            write!(f, "/thread={thread_id}")?;
        }
        if let Some(tag) = &self.custom_tag {
            write!(f, "/custom={}b", tag.len())?;
        }
        Ok(())
    }
}

/// Summaries are addressed by the same composite key as their invalidation markers.
pub type SummaryKey = InvalidationKey;

/// A pending "needs refresh" marker for a tag summary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InvalidationEntry {
    /// Summary being invalidated.
    pub key: InvalidationKey,
    /// Monotonic version bumped on every re-invalidation.
    pub version: i32,
}

impl InvalidationEntry {
    /// Create an entry.
    #[must_use]
    pub const fn new(key: InvalidationKey, version: i32) -> Self {
        Self { key, version }
    }
}

/// Exclusivity scope of an entry.
pub trait Partitioned {
    /// Peer that owns the entry.
    fn owner(&self) -> PeerId;
}

impl Partitioned for MessageId {
    fn owner(&self) -> PeerId {
        self.peer_id
    }
}

impl Partitioned for DesiredEntry {
    fn owner(&self) -> PeerId {
        self.key.peer_id
    }
}

impl Partitioned for InvalidationKey {
    fn owner(&self) -> PeerId {
        self.peer_id
    }
}

impl Partitioned for InvalidationEntry {
    fn owner(&self) -> PeerId {
        self.key.peer_id
    }
}
