//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pending_sync::core::{
    AccountState, ApiCall, ApiResponse, Dialog, InputPeer, Network, NetworkError, PeerId,
    PeerNamespace,
};
use pending_sync::infra::InMemoryStore;
use pending_sync::sync::SyncContext;
use tokio::sync::Semaphore;

type Responder = dyn Fn(&ApiCall) -> Result<ApiResponse, NetworkError> + Send + Sync;

/// Scripted network: records every call, optionally holds replies behind a gate.
pub struct FakeNetwork {
    responder: Box<Responder>,
    calls: Mutex<Vec<ApiCall>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeNetwork {
    /// Answer immediately.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ApiCall) -> Result<ApiResponse, NetworkError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Hold every reply until `open` is called.
    pub fn gated<F>(responder: F) -> Self
    where
        F: Fn(&ApiCall) -> Result<ApiResponse, NetworkError> + Send + Sync + 'static,
    {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new(responder)
        }
    }

    /// Release every held and future reply.
    pub fn open(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1 << 20);
        }
    }

    /// Calls issued so far, in order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().clone()
    }

    /// Calls with the given method name.
    pub fn calls_named(&self, name: &str) -> Vec<ApiCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.name() == name)
            .collect()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn request(&self, call: ApiCall) -> Result<ApiResponse, NetworkError> {
        self.calls.lock().push(call.clone());
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| NetworkError::Transport(e.to_string()))?;
            permit.forget();
        }
        (self.responder)(&call)
    }
}

/// Replies the synchronizers expect from a healthy server.
pub fn healthy_server(call: &ApiCall) -> Result<ApiResponse, NetworkError> {
    match call {
        ApiCall::ReadMessageContents { ids } => Ok(ApiResponse::AffectedMessages {
            pts: 100 + ids[0],
            pts_count: 1,
        }),
        ApiCall::ReadChannelMessageContents { .. } => Ok(ApiResponse::Bool(true)),
        ApiCall::GetPeerDialogs { peers } => Ok(ApiResponse::PeerDialogs(
            peers
                .iter()
                .map(|peer| Dialog::Dialog {
                    peer_id: peer_of(peer),
                    top_message: 500,
                    unread_mentions_count: 2,
                    unread_reactions_count: 3,
                })
                .collect(),
        )),
        ApiCall::GetReplies { .. } => Ok(ApiResponse::ChannelMessages {
            count: 7,
            top_message_id: Some(42),
        }),
        ApiCall::GetSavedReactionTags { .. } => Ok(ApiResponse::SavedReactionTags(Vec::new())),
    }
}

/// Peer id an input peer addresses.
pub fn peer_of(peer: &InputPeer) -> PeerId {
    match peer {
        InputPeer::User { user_id, .. } => PeerId::new(PeerNamespace::CloudUser, *user_id),
        InputPeer::Chat { chat_id } => PeerId::new(PeerNamespace::CloudGroup, *chat_id),
        InputPeer::Channel { channel_id, .. } => {
            PeerId::new(PeerNamespace::CloudChannel, *channel_id)
        }
    }
}

/// Account state that records pts updates.
pub struct RecordingAccount {
    peer_id: PeerId,
    updates: Mutex<Vec<(i32, i32)>>,
}

impl RecordingAccount {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn updates(&self) -> Vec<(i32, i32)> {
        self.updates.lock().clone()
    }
}

impl AccountState for RecordingAccount {
    fn account_peer_id(&self) -> PeerId {
        self.peer_id
    }

    fn add_pts_update(&self, pts: i32, pts_count: i32) {
        self.updates.lock().push((pts, pts_count));
    }
}

/// Account peer used throughout the tests.
pub fn account_peer() -> PeerId {
    PeerId::new(PeerNamespace::CloudUser, 1)
}

pub fn group(id: i64) -> PeerId {
    PeerId::new(PeerNamespace::CloudGroup, id)
}

/// Test fixture bundling the collaborators.
pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub network: Arc<FakeNetwork>,
    pub account: Arc<RecordingAccount>,
}

impl Fixture {
    pub fn new(network: FakeNetwork) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            network: Arc::new(network),
            account: Arc::new(RecordingAccount::new(account_peer())),
        }
    }

    pub fn ctx(&self) -> SyncContext<InMemoryStore> {
        SyncContext::new(
            Arc::clone(&self.store),
            Arc::clone(&self.network) as Arc<dyn Network>,
            Arc::clone(&self.account) as Arc<dyn AccountState>,
        )
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually<F>(condition: F) -> bool
where
    F: Fn() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
