//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{CategorizedError, ErrorCategory},
    models::Identity,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: String,
    /// The node that opened the session
    pub caller: Identity,
    /// This end of the session
    pub local: Identity,
    /// The other end of the session
    pub remote: Identity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMessage {
    Payload(Vec<u8>),
    /// The remote end aborted with the given reason
    Error(String),
}

/// An ordered point-to-point channel between two nodes.
#[async_trait]
pub trait Session: Send + Sync {
    fn info(&self) -> &SessionInfo;

    async fn send(&self, payload: Vec<u8>) -> Result<(), SessionError>;

    async fn send_error(&self, reason: String) -> Result<(), SessionError>;

    /// Waits for the next message without a bound. Protocol code uses [receive_within] instead.
    async fn receive(&self) -> Result<SessionMessage, SessionError>;
}

#[async_trait]
pub trait SessionOpener: Send + Sync {
    type Session: Session;

    /// Opens a session to the node answering for `remote`.
    async fn open_session(&self, remote: &Identity) -> Result<Self::Session, SessionError>;
}

/// Receives the next payload, failing if `timeout` elapses or `cancel` fires first.
pub async fn receive_within<S: Session + ?Sized>(
    session: &S,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, SessionError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(SessionError::Cancelled),
        result = tokio::time::timeout(timeout, session.receive()) => match result {
            Ok(Ok(SessionMessage::Payload(payload))) => Ok(payload),
            Ok(Ok(SessionMessage::Error(reason))) => Err(SessionError::Remote(reason)),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(SessionError::Timeout(timeout)),
        },
    }
}

pub async fn receive_json<S, T>(session: &S, timeout: Duration, cancel: &CancellationToken) -> Result<T, SessionError>
where
    S: Session + ?Sized,
    T: DeserializeOwned,
{
    let payload = receive_within(session, timeout, cancel).await?;
    serde_json::from_slice(&payload).map_err(|e| SessionError::InvalidMessage { details: e.to_string() })
}

pub async fn send_json<S, T>(session: &S, value: &T) -> Result<(), SessionError>
where
    S: Session + ?Sized,
    T: Serialize + Sync,
{
    let payload = serde_json::to_vec(value).map_err(|e| SessionError::InvalidMessage { details: e.to_string() })?;
    session.send(payload).await
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Timed out after {0:.2?} waiting for the remote")]
    Timeout(Duration),
    #[error("Receive cancelled")]
    Cancelled,
    #[error("Session closed by the remote")]
    Closed,
    #[error("Remote aborted: {0}")]
    Remote(String),
    #[error("No endpoint known for {identity}")]
    UnknownEndpoint { identity: Identity },
    #[error("Invalid message: {details}")]
    InvalidMessage { details: String },
    #[error("Transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

impl CategorizedError for SessionError {
    fn category(&self) -> ErrorCategory {
        match self {
            SessionError::Timeout(_) | SessionError::Cancelled => ErrorCategory::Timing,
            SessionError::InvalidMessage { .. } => ErrorCategory::MalformedInput,
            SessionError::Closed |
            SessionError::Remote(_) |
            SessionError::UnknownEndpoint { .. } |
            SessionError::Transport(_) => ErrorCategory::Collaborator,
        }
    }
}
