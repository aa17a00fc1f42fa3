//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tari_dan_interop_pledge::{
    models::{TokenId, UnspentToken},
    owner::TypedOwner,
    state::{StateError, StateProofVerifier, StateQueryExecutor, StateServiceProvider},
};

use super::TestLedgers;

/// Proofs are plain statements about a ledger. The verifier only checks that a statement matches the question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestProof {
    Existence {
        network: String,
        token: UnspentToken,
    },
    NonExistence {
        network: String,
        token_id: TokenId,
        origin_url: String,
        deadline: DateTime<Utc>,
    },
    WithMetadata {
        network: String,
        token_id: TokenId,
        origin_url: String,
    },
}

impl TestProof {
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, StateError> {
        serde_json::from_slice(bytes).map_err(|e| StateError::invalid_proof(format!("undecodable proof: {}", e)))
    }
}

#[derive(Clone)]
pub struct TestStateServiceProvider {
    ledgers: TestLedgers,
}

impl TestStateServiceProvider {
    pub fn new(ledgers: TestLedgers) -> Self {
        Self { ledgers }
    }

    fn check_network(&self, url: &str) -> Result<(), StateError> {
        if self.ledgers.has_network(url) {
            Ok(())
        } else {
            Err(StateError::UnknownNetwork { url: url.to_string() })
        }
    }
}

impl StateServiceProvider for TestStateServiceProvider {
    type QueryExecutor = TestQueryExecutor;
    type Verifier = TestProofVerifier;

    fn query_executor(&self, url: &str) -> Result<TestQueryExecutor, StateError> {
        self.check_network(url)?;
        Ok(TestQueryExecutor {
            ledgers: self.ledgers.clone(),
            network: url.to_string(),
        })
    }

    fn verifier(&self, url: &str) -> Result<TestProofVerifier, StateError> {
        self.check_network(url)?;
        Ok(TestProofVerifier {
            network: url.to_string(),
        })
    }
}

pub struct TestQueryExecutor {
    ledgers: TestLedgers,
    network: String,
}

#[async_trait]
impl StateQueryExecutor for TestQueryExecutor {
    async fn exist(&self, token_id: &TokenId) -> Result<Vec<u8>, StateError> {
        let token = self
            .ledgers
            .get_unspent(&self.network, token_id)
            .filter(|token| matches!(TypedOwner::decode(&token.owner), Ok(TypedOwner::Pledge(_))))
            .map(|token| UnspentToken {
                id: token_id.clone(),
                owner: token.owner,
                token_type: token.token_type,
                quantity: token.quantity,
            })
            .ok_or_else(|| StateError::TokenDoesNotExist {
                token_id: token_id.clone(),
            })?;
        Ok(TestProof::Existence {
            network: self.network.clone(),
            token,
        }
        .to_bytes())
    }

    async fn does_not_exist(
        &self,
        token_id: &TokenId,
        origin_url: &str,
        deadline: DateTime<Utc>,
    ) -> Result<Vec<u8>, StateError> {
        if self.ledgers.claimed_as(&self.network, origin_url, token_id).is_some() {
            return Err(StateError::TokenExists {
                token_id: token_id.clone(),
            });
        }
        Ok(TestProof::NonExistence {
            network: self.network.clone(),
            token_id: token_id.clone(),
            origin_url: origin_url.to_string(),
            deadline,
        }
        .to_bytes())
    }

    async fn exists_with_metadata(&self, token_id: &TokenId, origin_url: &str) -> Result<Vec<u8>, StateError> {
        if self.ledgers.claimed_as(&self.network, origin_url, token_id).is_none() {
            return Err(StateError::TokenDoesNotExist {
                token_id: token_id.clone(),
            });
        }
        Ok(TestProof::WithMetadata {
            network: self.network.clone(),
            token_id: token_id.clone(),
            origin_url: origin_url.to_string(),
        }
        .to_bytes())
    }
}

pub struct TestProofVerifier {
    network: String,
}

impl TestProofVerifier {
    fn expect(&self, proof: &[u8], expected: TestProof) -> Result<(), StateError> {
        let proof = TestProof::from_bytes(proof)?;
        if proof != expected {
            return Err(StateError::invalid_proof(format!(
                "proof {:?} does not match {:?}",
                proof, expected
            )));
        }
        Ok(())
    }
}

impl StateProofVerifier for TestProofVerifier {
    fn verify_proof_existence(
        &self,
        proof: &[u8],
        token_id: &TokenId,
        _metadata: &[u8],
    ) -> Result<UnspentToken, StateError> {
        match TestProof::from_bytes(proof)? {
            TestProof::Existence { network, token } if network == self.network && token.id == *token_id => Ok(token),
            other => Err(StateError::invalid_proof(format!(
                "proof {:?} does not show token {} on {}",
                other, token_id, self.network
            ))),
        }
    }

    fn verify_proof_non_existence(
        &self,
        proof: &[u8],
        token_id: &TokenId,
        origin_url: &str,
        deadline: DateTime<Utc>,
    ) -> Result<(), StateError> {
        self.expect(proof, TestProof::NonExistence {
            network: self.network.clone(),
            token_id: token_id.clone(),
            origin_url: origin_url.to_string(),
            deadline,
        })
    }

    fn verify_proof_token_with_metadata_existence(
        &self,
        proof: &[u8],
        token_id: &TokenId,
        origin_url: &str,
    ) -> Result<(), StateError> {
        self.expect(proof, TestProof::WithMetadata {
            network: self.network.clone(),
            token_id: token_id.clone(),
            origin_url: origin_url.to_string(),
        })
    }
}
