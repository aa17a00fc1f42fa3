//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Identity, TokenId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClaimRequest {
    pub token_type: String,
    pub quantity: u64,
    pub recipient: Identity,
    #[serde(with = "crate::serde_with::base64")]
    pub recipient_audit_info: Vec<u8>,
    pub claim_deadline: DateTime<Utc>,
    #[serde(rename = "OriginTokenID")]
    pub origin_token_id: TokenId,
    pub origin_network: String,
    #[serde(with = "crate::serde_with::base64")]
    pub pledge_proof: Vec<u8>,
    #[serde(with = "crate::serde_with::base64")]
    pub requestor_signature: Vec<u8>,
}

impl ClaimRequest {
    /// The bytes covered by `requestor_signature`: the request without its signature, followed by the identity of
    /// the node that sends it.
    pub fn signing_message(&self, requestor: &Identity) -> Result<Vec<u8>, serde_json::Error> {
        let unsigned = Self {
            requestor_signature: Vec::new(),
            ..self.clone()
        };
        let mut message = serde_json::to_vec(&unsigned)?;
        message.extend_from_slice(requestor.as_bytes());
        Ok(message)
    }
}

/// The recipient's acceptance of the claim transaction assembled by the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClaimAcceptance {
    #[serde(rename = "TxID")]
    pub tx_id: String,
    /// The recipient's signature over the transaction bytes it received
    #[serde(with = "crate::serde_with::base64")]
    pub signature: Vec<u8>,
}
