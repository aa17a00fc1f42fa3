//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::models::Identity;

const PLEDGE_NONCE_SIZE: usize = 24;

/// The locking condition of a pledged token. It is carried, encoded, in the owner field of the pledged output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PledgeScript {
    pub sender: Identity,
    pub recipient: Identity,
    pub issuer: Identity,
    pub destination_network: String,
    pub deadline: DateTime<Utc>,
    #[serde(rename = "ID")]
    pub id: String,
}

impl PledgeScript {
    /// Checks that all fields are set and that the deadline lies after `now`.
    pub fn well_formedness(&self, now: DateTime<Utc>) -> Result<(), ScriptError> {
        self.check_fields()?;
        if self.deadline <= now {
            return Err(ScriptError::DeadlineNotInFuture {
                deadline: self.deadline,
                now,
            });
        }
        Ok(())
    }

    pub fn check_fields(&self) -> Result<(), ScriptError> {
        let empty = if self.sender.is_none() {
            Some("sender")
        } else if self.recipient.is_none() {
            Some("recipient")
        } else if self.issuer.is_none() {
            Some("issuer")
        } else if self.destination_network.is_empty() {
            Some("destination network")
        } else if self.id.is_empty() {
            Some("ID")
        } else {
            None
        };
        match empty {
            Some(field) => Err(ScriptError::EmptyField { field }),
            None => Ok(()),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

/// Generates a fresh pledge identifier from a random 24-byte nonce.
pub fn new_pledge_id() -> String {
    let mut nonce = [0u8; PLEDGE_NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    hex::encode(nonce)
}

/// Owner audit information for a pledge script. The issuer stands in for the recipient because it lives on the
/// same network as the pledged token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptInfo {
    #[serde(with = "crate::serde_with::base64")]
    pub sender: Vec<u8>,
    #[serde(with = "crate::serde_with::base64")]
    pub recipient: Vec<u8>,
}

impl ScriptInfo {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Pledge script {field} is empty")]
    EmptyField { field: &'static str },
    #[error("Pledge script deadline {deadline} is not after {now}")]
    DeadlineNotInFuture { deadline: DateTime<Utc>, now: DateTime<Utc> },
}
