//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::signature::{SignatureError, Signer, Verifier};

/// Authorization to spend a pledge-owned output. `reclaim` selects which of the two verification rules applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PledgeSignature {
    pub reclaim: bool,
    #[serde(with = "crate::serde_with::base64")]
    pub sender_signature: Vec<u8>,
    #[serde(with = "crate::serde_with::base64")]
    pub issuer_signature: Vec<u8>,
}

impl PledgeSignature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        serde_json::from_slice(bytes).map_err(|e| SignatureError::Decode { details: e.to_string() })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SignatureError> {
        serde_json::to_vec(self).map_err(|e| SignatureError::Encode { details: e.to_string() })
    }
}

/// Signs spends of a pledge-owned output.
///
/// In redeem mode only the issuer signs. In reclaim mode the sender signs the message followed by the issuer's
/// attestation over the pledge ID, and the attestation travels with the signature.
#[derive(Clone, Default)]
pub struct PledgeSigner {
    issuer: Option<Arc<dyn Signer>>,
    sender: Option<Arc<dyn Signer>>,
    issuer_signature: Vec<u8>,
}

impl PledgeSigner {
    pub fn redeem(issuer: Arc<dyn Signer>) -> Self {
        Self {
            issuer: Some(issuer),
            sender: None,
            issuer_signature: Vec::new(),
        }
    }

    pub fn reclaim(sender: Arc<dyn Signer>, issuer_attestation: Vec<u8>) -> Self {
        Self {
            issuer: None,
            sender: Some(sender),
            issuer_signature: issuer_attestation,
        }
    }
}

impl Signer for PledgeSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let signature = match (&self.issuer, &self.sender) {
            (Some(issuer), _) => PledgeSignature {
                reclaim: false,
                sender_signature: Vec::new(),
                issuer_signature: issuer.sign(message)?,
            },
            (None, Some(sender)) => {
                let mut reclaim_message = Vec::with_capacity(message.len() + self.issuer_signature.len());
                reclaim_message.extend_from_slice(message);
                reclaim_message.extend_from_slice(&self.issuer_signature);
                PledgeSignature {
                    reclaim: true,
                    sender_signature: sender.sign(&reclaim_message)?,
                    issuer_signature: self.issuer_signature.clone(),
                }
            },
            (None, None) => return Err(SignatureError::Configuration),
        };
        signature.to_bytes()
    }
}

/// Verifies spends of a pledge-owned output for the pledge identified by `pledge_id`.
#[derive(Clone)]
pub struct PledgeVerifier {
    pub sender: Option<Arc<dyn Verifier>>,
    pub issuer: Arc<dyn Verifier>,
    pub pledge_id: String,
}

impl Verifier for PledgeVerifier {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
        let signature = PledgeSignature::from_bytes(signature)?;

        if !signature.reclaim {
            return self
                .issuer
                .verify(message, &signature.issuer_signature)
                .map_err(|e| SignatureError::invalid("issuer", e));
        }

        let sender = self.sender.as_ref().ok_or(SignatureError::MissingSenderVerifier)?;
        let mut reclaim_message = Vec::with_capacity(message.len() + signature.issuer_signature.len());
        reclaim_message.extend_from_slice(message);
        reclaim_message.extend_from_slice(&signature.issuer_signature);
        sender
            .verify(&reclaim_message, &signature.sender_signature)
            .map_err(|e| SignatureError::invalid("sender", e))?;
        // The attestation covers the pledge ID, not the message, so it cannot be lifted from another pledge
        self.issuer
            .verify(self.pledge_id.as_bytes(), &signature.issuer_signature)
            .map_err(|e| SignatureError::invalid("issuer attestation", e))
    }
}
