//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    errors::{CategorizedError, ErrorCategory},
    models::{TokenId, UnspentToken},
    state::{StateError, StateProofVerifier, StateQueryExecutor, StateServiceProvider},
};

const LOG_TARGET: &str = "tari::dan::interop::pledge::apis::proofs";

/// Requests state proofs from remote networks. Every proof is verified locally before it is handed out, so a
/// misbehaving relay cannot get a bad proof past this point.
pub struct ProofsApi<'a, TStateServices> {
    state_services: &'a TStateServices,
}

impl<'a, TStateServices: StateServiceProvider> ProofsApi<'a, TStateServices> {
    pub fn new(state_services: &'a TStateServices) -> Self {
        Self { state_services }
    }

    /// Proof that the pledged token exists on `origin_url`
    pub async fn request_existence_proof(
        &self,
        origin_url: &str,
        token_id: &TokenId,
    ) -> Result<Vec<u8>, ProofsApiError> {
        let executor = self.executor(origin_url)?;
        let proof = executor
            .exist(token_id)
            .await
            .map_err(|e| ProofsApiError::query(origin_url, e))?;
        self.verify_existence(origin_url, &proof, token_id, &[])?;
        debug!(target: LOG_TARGET, "Obtained existence proof for {} from {}", token_id, origin_url);
        Ok(proof)
    }

    /// Proof that nothing was claimed from `token_id` on `destination_url`
    pub async fn request_non_existence_proof(
        &self,
        destination_url: &str,
        token_id: &TokenId,
        origin_url: &str,
        deadline: DateTime<Utc>,
    ) -> Result<Vec<u8>, ProofsApiError> {
        let executor = self.executor(destination_url)?;
        let proof = executor
            .does_not_exist(token_id, origin_url, deadline)
            .await
            .map_err(|e| ProofsApiError::query(destination_url, e))?;
        self.verify_non_existence(destination_url, &proof, token_id, origin_url, deadline)?;
        debug!(
            target: LOG_TARGET,
            "Obtained non-existence proof for {} from {}", token_id, destination_url
        );
        Ok(proof)
    }

    /// Proof that a token claimed from `token_id` exists on `destination_url`
    pub async fn request_existence_with_metadata_proof(
        &self,
        destination_url: &str,
        token_id: &TokenId,
        origin_url: &str,
    ) -> Result<Vec<u8>, ProofsApiError> {
        let executor = self.executor(destination_url)?;
        let proof = executor
            .exists_with_metadata(token_id, origin_url)
            .await
            .map_err(|e| ProofsApiError::query(destination_url, e))?;
        self.verify_existence_with_metadata(destination_url, &proof, token_id, origin_url)?;
        debug!(
            target: LOG_TARGET,
            "Obtained existence-with-metadata proof for {} from {}", token_id, destination_url
        );
        Ok(proof)
    }

    pub fn verify_existence(
        &self,
        network_url: &str,
        proof: &[u8],
        token_id: &TokenId,
        metadata: &[u8],
    ) -> Result<UnspentToken, ProofsApiError> {
        self.verifier(network_url)?
            .verify_proof_existence(proof, token_id, metadata)
            .map_err(|e| ProofsApiError::rejected(network_url, e))
    }

    pub fn verify_non_existence(
        &self,
        network_url: &str,
        proof: &[u8],
        token_id: &TokenId,
        origin_url: &str,
        deadline: DateTime<Utc>,
    ) -> Result<(), ProofsApiError> {
        self.verifier(network_url)?
            .verify_proof_non_existence(proof, token_id, origin_url, deadline)
            .map_err(|e| ProofsApiError::rejected(network_url, e))
    }

    pub fn verify_existence_with_metadata(
        &self,
        network_url: &str,
        proof: &[u8],
        token_id: &TokenId,
        origin_url: &str,
    ) -> Result<(), ProofsApiError> {
        self.verifier(network_url)?
            .verify_proof_token_with_metadata_existence(proof, token_id, origin_url)
            .map_err(|e| ProofsApiError::rejected(network_url, e))
    }

    fn executor(&self, url: &str) -> Result<TStateServices::QueryExecutor, ProofsApiError> {
        self.state_services
            .query_executor(url)
            .map_err(|e| ProofsApiError::query(url, e))
    }

    fn verifier(&self, url: &str) -> Result<TStateServices::Verifier, ProofsApiError> {
        self.state_services
            .verifier(url)
            .map_err(|e| ProofsApiError::query(url, e))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProofsApiError {
    #[error("State query on {network} failed: {source}")]
    QueryFailed { network: String, source: StateError },
    #[error("Proof from {network} rejected: {source}")]
    Rejected { network: String, source: StateError },
}

impl ProofsApiError {
    fn query(network: &str, source: StateError) -> Self {
        warn!(target: LOG_TARGET, "State query on {} failed: {}", network, source);
        Self::QueryFailed {
            network: network.to_string(),
            source,
        }
    }

    fn rejected(network: &str, source: StateError) -> Self {
        warn!(target: LOG_TARGET, "Proof from {} rejected: {}", network, source);
        Self::Rejected {
            network: network.to_string(),
            source,
        }
    }

    pub fn state_error(&self) -> &StateError {
        match self {
            ProofsApiError::QueryFailed { source, .. } | ProofsApiError::Rejected { source, .. } => source,
        }
    }
}

impl CategorizedError for ProofsApiError {
    fn category(&self) -> ErrorCategory {
        match self {
            ProofsApiError::QueryFailed { source, .. } => source.category(),
            ProofsApiError::Rejected { .. } => ErrorCategory::Authorization,
        }
    }
}
