//! Network and account-state collaborator contracts.

use async_trait::async_trait;

use crate::core::entries::PeerId;
use crate::core::NetworkError;

/// Addressable peer for remote calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPeer {
    /// A user.
    User {
        /// User id.
        user_id: i64,
        /// Access hash.
        access_hash: i64,
    },
    /// A basic group.
    Chat {
        /// Group id.
        chat_id: i64,
    },
    /// A channel or supergroup.
    Channel {
        /// Channel id.
        channel_id: i64,
        /// Access hash.
        access_hash: i64,
    },
}

/// Addressable channel for channel-only calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputChannel {
    /// Channel id.
    pub channel_id: i64,
    /// Access hash.
    pub access_hash: i64,
}

/// Remote calls issued by the synchronizers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    /// Mark message contents read in private chats and basic groups.
    ReadMessageContents {
        /// Message ids.
        ids: Vec<i32>,
    },
    /// Mark message contents read in a channel.
    ReadChannelMessageContents {
        /// Target channel.
        channel: InputChannel,
        /// Message ids.
        ids: Vec<i32>,
    },
    /// Fetch dialog state for peers.
    GetPeerDialogs {
        /// Peers to fetch.
        peers: Vec<InputPeer>,
    },
    /// Fetch replies of a forum topic.
    GetReplies {
        /// Forum peer.
        peer: InputPeer,
        /// Topic root message id.
        msg_id: i32,
        /// Page size.
        limit: i32,
    },
    /// Fetch saved reaction tags of the account.
    GetSavedReactionTags {
        /// Cache hash; zero forces a full reply.
        hash: i64,
    },
}

impl ApiCall {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ReadMessageContents { .. } => "messages.readMessageContents",
            Self::ReadChannelMessageContents { .. } => "channels.readMessageContents",
            Self::GetPeerDialogs { .. } => "messages.getPeerDialogs",
            Self::GetReplies { .. } => "messages.getReplies",
            Self::GetSavedReactionTags { .. } => "messages.getSavedReactionTags",
        }
    }
}

/// Dialog entry returned by `GetPeerDialogs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    /// Regular dialog.
    Dialog {
        /// Dialog peer.
        peer_id: PeerId,
        /// Newest message id.
        top_message: i32,
        /// Unread mentions.
        unread_mentions_count: i32,
        /// Unread reactions.
        unread_reactions_count: i32,
    },
    /// Folder pseudo-dialog.
    Folder {
        /// Folder peer.
        peer_id: PeerId,
        /// Folder id.
        folder_id: i32,
    },
}

impl Dialog {
    /// Peer the dialog describes.
    #[must_use]
    pub const fn peer_id(&self) -> PeerId {
        match self {
            Self::Dialog { peer_id, .. } | Self::Folder { peer_id, .. } => *peer_id,
        }
    }
}

/// Reaction identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reaction {
    /// Standard emoji reaction.
    Emoji(String),
    /// Custom emoji reaction by document id.
    Custom(i64),
}

impl Reaction {
    /// Custom tag bytes that key this reaction's summary.
    #[must_use]
    pub fn message_tag(&self) -> Vec<u8> {
        match self {
            Self::Emoji(emoji) => {
                let mut tag = Vec::with_capacity(1 + emoji.len());
                tag.push(0);
                tag.extend_from_slice(emoji.as_bytes());
                tag
            }
            Self::Custom(file_id) => {
                let mut tag = Vec::with_capacity(9);
                tag.push(1);
                tag.extend_from_slice(&file_id.to_le_bytes());
                tag
            }
        }
    }
}

/// One saved reaction tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedReactionTag {
    /// Reaction used as the tag.
    pub reaction: Reaction,
    /// Optional user-given title.
    pub title: Option<String>,
    /// Tagged message count.
    pub count: i32,
}

/// Replies to `ApiCall`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponse {
    /// Update sequence advanced.
    AffectedMessages {
        /// New pts.
        pts: i32,
        /// Number of pts consumed.
        pts_count: i32,
    },
    /// Boolean acknowledgement.
    Bool(bool),
    /// Dialogs for `GetPeerDialogs`.
    PeerDialogs(Vec<Dialog>),
    /// Channel message page.
    ChannelMessages {
        /// Total message count in the slice.
        count: i32,
        /// Newest message id in the page.
        top_message_id: Option<i32>,
    },
    /// Non-channel message page.
    Messages {
        /// Newest message id in the page.
        top_message_id: Option<i32>,
    },
    /// Saved reaction tags.
    SavedReactionTags(Vec<SavedReactionTag>),
    /// Saved reaction tags unchanged since `hash`.
    SavedReactionTagsNotModified,
}

/// Remote request executor.
#[async_trait]
pub trait Network: Send + Sync + 'static {
    /// Perform one call.
    async fn request(&self, call: ApiCall) -> Result<ApiResponse, NetworkError>;
}

/// Account-wide state the synchronizers report to.
pub trait AccountState: Send + Sync + 'static {
    /// Peer id of the logged-in account.
    fn account_peer_id(&self) -> PeerId;

    /// Forward a pts advance to the update machinery.
    fn add_pts_update(&self, pts: i32, pts_count: i32);
}
