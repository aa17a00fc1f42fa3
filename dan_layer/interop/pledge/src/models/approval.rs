//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use serde::{Deserialize, Serialize};

use crate::models::{Identity, TmsId, TokenId};

/// Sent by the sender of a pledge to the origin issuer to obtain its approval to reclaim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IssuerApprovalRequest {
    #[serde(rename = "OriginTMSID")]
    pub origin_tms_id: TmsId,
    #[serde(rename = "TokenID")]
    pub token_id: TokenId,
    /// Proof that the pledged token was never claimed on the destination network
    #[serde(with = "crate::serde_with::base64")]
    pub proof: Vec<u8>,
    pub destination: String,
    #[serde(with = "crate::serde_with::base64")]
    pub requestor_signature: Vec<u8>,
}

impl IssuerApprovalRequest {
    pub fn signing_message(&self, sender: &Identity) -> Result<Vec<u8>, serde_json::Error> {
        let unsigned = Self {
            requestor_signature: Vec::new(),
            ..self.clone()
        };
        let mut message = serde_json::to_vec(&unsigned)?;
        message.extend_from_slice(sender.as_bytes());
        Ok(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IssuerApprovalResponse {
    /// The issuer's signature over the pledge ID
    #[serde(with = "crate::serde_with::base64")]
    pub signature: Vec<u8>,
}
