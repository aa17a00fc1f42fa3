//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

//! Transfer and issue metadata keys written by the pledge protocols.

use std::collections::BTreeMap;

use crate::models::TokenId;

pub const PLEDGE_METADATA_PREFIX: &str = "metadata.pledge";
pub const RECLAIM_METADATA_PREFIX: &str = "metadata.reclaim.";
pub const REDEEM_PLEDGE_METADATA_PREFIX: &str = "metadata.redeemPledge.";

pub const CLAIM_TOKEN_ID_KEY: &str = "metadata.claim.tokenID";
pub const CLAIM_NETWORK_KEY: &str = "metadata.claim.network";
pub const CLAIM_PROOF_KEY: &str = "metadata.claim.proof";

/// Marks the locking transfer of a pledge. The ledger scan looks for this key.
pub fn pledge_key(pledge_id: &str) -> String {
    format!("{}{}", PLEDGE_METADATA_PREFIX, pledge_id)
}

/// Holds the proof of non-existence attached to a reclaim.
pub fn reclaim_key(token_id: &TokenId) -> String {
    format!("{}{}.{}", RECLAIM_METADATA_PREFIX, token_id.index, token_id.tx_id)
}

/// Holds the proof of existence-with-metadata attached to a redeem.
pub fn redeem_pledge_key(token_id: &TokenId) -> String {
    format!("{}{}.{}", REDEEM_PLEDGE_METADATA_PREFIX, token_id.index, token_id.tx_id)
}

/// The claim action carried by an issuance that mints the destination-side token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimMetadata {
    pub origin_token_id: TokenId,
    pub origin_network: String,
    pub proof: Vec<u8>,
}

impl ClaimMetadata {
    pub fn to_metadata(&self) -> Result<BTreeMap<String, Vec<u8>>, serde_json::Error> {
        let mut metadata = BTreeMap::new();
        metadata.insert(CLAIM_TOKEN_ID_KEY.to_string(), serde_json::to_vec(&self.origin_token_id)?);
        metadata.insert(CLAIM_NETWORK_KEY.to_string(), self.origin_network.as_bytes().to_vec());
        metadata.insert(CLAIM_PROOF_KEY.to_string(), self.proof.clone());
        Ok(metadata)
    }

    /// Returns None if the metadata does not describe a claim
    pub fn from_metadata(metadata: &BTreeMap<String, Vec<u8>>) -> Option<Self> {
        let origin_token_id = serde_json::from_slice(metadata.get(CLAIM_TOKEN_ID_KEY)?).ok()?;
        let origin_network = String::from_utf8(metadata.get(CLAIM_NETWORK_KEY)?.clone()).ok()?;
        let proof = metadata.get(CLAIM_PROOF_KEY)?.clone();
        Some(Self {
            origin_token_id,
            origin_network,
            proof,
        })
    }
}
