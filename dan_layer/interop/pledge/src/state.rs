//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    errors::{CategorizedError, ErrorCategory},
    models::{TokenId, UnspentToken},
};

/// Produces state proofs about a remote network.
#[async_trait]
pub trait StateQueryExecutor: Send + Sync {
    /// Proof that the pledged token `token_id` exists on the queried network
    async fn exist(&self, token_id: &TokenId) -> Result<Vec<u8>, StateError>;

    /// Proof that no token claimed from `token_id` on `origin_url` exists on the queried network
    async fn does_not_exist(
        &self,
        token_id: &TokenId,
        origin_url: &str,
        deadline: DateTime<Utc>,
    ) -> Result<Vec<u8>, StateError>;

    /// Proof that a token claimed from `token_id` on `origin_url` exists on the queried network
    async fn exists_with_metadata(&self, token_id: &TokenId, origin_url: &str) -> Result<Vec<u8>, StateError>;
}

/// Checks state proofs produced for a remote network.
pub trait StateProofVerifier: Send + Sync {
    /// Returns the pledged token `token_id` as the proof shows it on the proven network.
    fn verify_proof_existence(
        &self,
        proof: &[u8],
        token_id: &TokenId,
        metadata: &[u8],
    ) -> Result<UnspentToken, StateError>;

    fn verify_proof_non_existence(
        &self,
        proof: &[u8],
        token_id: &TokenId,
        origin_url: &str,
        deadline: DateTime<Utc>,
    ) -> Result<(), StateError>;

    fn verify_proof_token_with_metadata_existence(
        &self,
        proof: &[u8],
        token_id: &TokenId,
        origin_url: &str,
    ) -> Result<(), StateError>;
}

/// Resolves the query executor and proof verifier for a network interop URL.
pub trait StateServiceProvider: Send + Sync {
    type QueryExecutor: StateQueryExecutor;
    type Verifier: StateProofVerifier;

    fn query_executor(&self, url: &str) -> Result<Self::QueryExecutor, StateError>;

    fn verifier(&self, url: &str) -> Result<Self::Verifier, StateError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Token {token_id} exists")]
    TokenExists { token_id: TokenId },
    #[error("Token {token_id} does not exist")]
    TokenDoesNotExist { token_id: TokenId },
    #[error("Invalid proof: {details}")]
    InvalidProof { details: String },
    #[error("No state service for network {url}")]
    UnknownNetwork { url: String },
    #[error("State service error: {0}")]
    Upstream(#[from] anyhow::Error),
}

impl StateError {
    pub fn invalid_proof<T: Into<String>>(details: T) -> Self {
        Self::InvalidProof {
            details: details.into(),
        }
    }
}

impl CategorizedError for StateError {
    fn category(&self) -> ErrorCategory {
        match self {
            StateError::InvalidProof { .. } => ErrorCategory::Authorization,
            StateError::TokenExists { .. } | StateError::TokenDoesNotExist { .. } => ErrorCategory::StateConsistency,
            StateError::UnknownNetwork { .. } | StateError::Upstream(_) => ErrorCategory::Collaborator,
        }
    }
}
