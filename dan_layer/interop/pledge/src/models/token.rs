//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Identifies a token output by the transaction that created it and the output's position within it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId {
    pub tx_id: String,
    pub index: u64,
}

impl TokenId {
    pub fn new<T: Into<String>>(tx_id: T, index: u64) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
        }
    }
}

impl Display for TokenId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}]", self.tx_id, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentToken {
    pub id: TokenId,
    /// Typed owner bytes, see [crate::owner::TypedOwner]
    #[serde(with = "crate::serde_with::base64")]
    pub owner: Vec<u8>,
    pub token_type: String,
    pub quantity: u64,
}
