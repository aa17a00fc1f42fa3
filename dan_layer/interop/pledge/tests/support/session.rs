//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use log::*;
use tari_dan_interop_pledge::{
    models::Identity,
    session::{Session, SessionError, SessionInfo, SessionMessage, SessionOpener},
    signature::{EndpointBinder, EndpointBinderError},
};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

const LOG_TARGET: &str = "tari::dan::interop::pledge::tests::session";

#[derive(Default)]
struct HubState {
    listeners: HashMap<Identity, mpsc::UnboundedSender<MemorySession>>,
    /// ephemeral -> long-term
    bindings: HashMap<Identity, Identity>,
    next_session_id: u64,
}

/// Connects nodes living in the same process. Each node listens under its node identity, and any identity bound to
/// it through [EndpointBinder] is routed there too.
#[derive(Clone, Default)]
pub struct MemorySessionHub {
    state: Arc<Mutex<HubState>>,
}

impl MemorySessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(&self, node: Identity) -> Result<MemorySessionListener, SessionError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.lock()?;
        state.listeners.insert(node.clone(), sender);
        Ok(MemorySessionListener { node, receiver })
    }

    pub fn opener(&self, local: Identity) -> MemorySessionOpener {
        MemorySessionOpener {
            hub: self.clone(),
            local,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HubState>, SessionError> {
        self.state
            .lock()
            .map_err(|_| SessionError::Transport(anyhow::anyhow!("session hub lock poisoned")))
    }

    fn connect(&self, caller: &Identity, remote: &Identity) -> Result<MemorySession, SessionError> {
        let mut state = self.lock()?;
        let node = state.bindings.get(remote).cloned().unwrap_or_else(|| remote.clone());
        let listener = state
            .listeners
            .get(&node)
            .cloned()
            .ok_or_else(|| SessionError::UnknownEndpoint {
                identity: remote.clone(),
            })?;
        state.next_session_id += 1;
        let id = format!("memory-{}", state.next_session_id);
        drop(state);

        let (to_remote, from_caller) = mpsc::unbounded_channel();
        let (to_caller, from_remote) = mpsc::unbounded_channel();
        let remote_end = MemorySession {
            info: SessionInfo {
                id: id.clone(),
                caller: caller.clone(),
                local: node.clone(),
                remote: caller.clone(),
            },
            sender: to_caller,
            receiver: AsyncMutex::new(from_caller),
        };
        listener.send(remote_end).map_err(|_| SessionError::Closed)?;
        debug!(target: LOG_TARGET, "Session {} opened from {} to {}", id, caller, node);

        Ok(MemorySession {
            info: SessionInfo {
                id,
                caller: caller.clone(),
                local: caller.clone(),
                remote: node,
            },
            sender: to_remote,
            receiver: AsyncMutex::new(from_remote),
        })
    }
}

impl EndpointBinder for MemorySessionHub {
    fn bind(&self, long_term: &Identity, ephemeral: &Identity) -> Result<(), EndpointBinderError> {
        let mut state = self.state.lock().map_err(|e| EndpointBinderError::BindFailed {
            long_term: long_term.clone(),
            ephemeral: ephemeral.clone(),
            details: e.to_string(),
        })?;
        // Resolve chains so that every binding points straight at a node
        let node = state
            .bindings
            .get(long_term)
            .cloned()
            .unwrap_or_else(|| long_term.clone());
        if node != *ephemeral {
            state.bindings.insert(ephemeral.clone(), node);
        }
        Ok(())
    }
}

pub struct MemorySessionListener {
    node: Identity,
    receiver: mpsc::UnboundedReceiver<MemorySession>,
}

impl MemorySessionListener {
    pub fn node(&self) -> &Identity {
        &self.node
    }

    /// Waits for the next incoming session. Returns None once the hub is gone.
    pub async fn accept(&mut self) -> Option<MemorySession> {
        self.receiver.recv().await
    }
}

#[derive(Clone)]
pub struct MemorySessionOpener {
    hub: MemorySessionHub,
    local: Identity,
}

#[async_trait]
impl SessionOpener for MemorySessionOpener {
    type Session = MemorySession;

    async fn open_session(&self, remote: &Identity) -> Result<Self::Session, SessionError> {
        self.hub.connect(&self.local, remote)
    }
}

#[derive(Debug)]
pub struct MemorySession {
    info: SessionInfo,
    sender: mpsc::UnboundedSender<SessionMessage>,
    receiver: AsyncMutex<mpsc::UnboundedReceiver<SessionMessage>>,
}

#[async_trait]
impl Session for MemorySession {
    fn info(&self) -> &SessionInfo {
        &self.info
    }

    async fn send(&self, payload: Vec<u8>) -> Result<(), SessionError> {
        self.sender
            .send(SessionMessage::Payload(payload))
            .map_err(|_| SessionError::Closed)
    }

    async fn send_error(&self, reason: String) -> Result<(), SessionError> {
        self.sender
            .send(SessionMessage::Error(reason))
            .map_err(|_| SessionError::Closed)
    }

    async fn receive(&self) -> Result<SessionMessage, SessionError> {
        self.receiver.lock().await.recv().await.ok_or(SessionError::Closed)
    }
}
