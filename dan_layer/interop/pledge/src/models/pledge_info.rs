//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use serde::{Deserialize, Serialize};

use crate::models::{PledgeScript, TokenId};

/// Off-chain descriptor of a pledge. The sender sends it to the recipient, and each party keeps its own copy in its
/// pledge vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PledgeInfo {
    /// Interop URL of the network holding the pledged token
    pub source: String,
    pub token_type: String,
    pub amount: u64,
    #[serde(rename = "TokenID")]
    pub token_id: TokenId,
    #[serde(with = "crate::serde_with::base64")]
    pub token_metadata: Vec<u8>,
    pub script: PledgeScript,
}

/// Sent back by the recipient once it has processed a [PledgeInfo].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PledgeInfoAck {
    #[serde(rename = "TokenID")]
    pub token_id: TokenId,
    /// False if an identical record was already held
    pub stored: bool,
}
