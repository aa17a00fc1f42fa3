//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use serde::{Deserialize, Serialize};

use crate::models::{Identity, PledgeScript};

pub const IDENTITY_OWNER_TYPE: &str = "identity";
pub const PLEDGE_OWNER_TYPE: &str = "pledge";
pub const HTLC_OWNER_TYPE: &str = "htlc";

#[derive(Serialize, Deserialize)]
struct OwnerEnvelope {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Identity", with = "crate::serde_with::base64")]
    identity: Vec<u8>,
}

/// The decoded content of a token's owner field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedOwner {
    /// Owned by a plain identity
    Identity(Identity),
    /// Locked by a pledge script
    Pledge(PledgeScript),
    /// Locked by some other script kind (e.g. an HTLC) that this crate does not interpret
    Other { kind: String, raw: Vec<u8> },
}

impl TypedOwner {
    pub fn kind(&self) -> &str {
        match self {
            TypedOwner::Identity(_) => IDENTITY_OWNER_TYPE,
            TypedOwner::Pledge(_) => PLEDGE_OWNER_TYPE,
            TypedOwner::Other { kind, .. } => kind,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, OwnerCodecError> {
        let identity = match self {
            TypedOwner::Identity(identity) => identity.as_bytes().to_vec(),
            TypedOwner::Pledge(script) => serde_json::to_vec(script).map_err(OwnerCodecError::EncodingFailed)?,
            TypedOwner::Other { raw, .. } => raw.clone(),
        };
        let envelope = OwnerEnvelope {
            kind: self.kind().to_string(),
            identity,
        };
        serde_json::to_vec(&envelope).map_err(OwnerCodecError::EncodingFailed)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, OwnerCodecError> {
        let envelope = serde_json::from_slice::<OwnerEnvelope>(bytes).map_err(|e| OwnerCodecError::MalformedOwner {
            details: format!("unreadable owner envelope: {}", e),
        })?;
        if envelope.kind.is_empty() {
            return Err(OwnerCodecError::MalformedOwner {
                details: "owner type discriminator is empty".to_string(),
            });
        }
        if envelope.identity.is_empty() {
            return Err(OwnerCodecError::MalformedOwner {
                details: format!("owner of type '{}' has no content", envelope.kind),
            });
        }

        match envelope.kind.as_str() {
            IDENTITY_OWNER_TYPE => Ok(TypedOwner::Identity(Identity::from(envelope.identity))),
            PLEDGE_OWNER_TYPE => {
                let script = serde_json::from_slice(&envelope.identity).map_err(|e| OwnerCodecError::MalformedOwner {
                    details: format!("invalid pledge script: {}", e),
                })?;
                Ok(TypedOwner::Pledge(script))
            },
            _ => Ok(TypedOwner::Other {
                kind: envelope.kind,
                raw: envelope.identity,
            }),
        }
    }

    /// Reads the type discriminator of an encoded owner without interpreting its content.
    pub fn kind_of(bytes: &[u8]) -> Result<String, OwnerCodecError> {
        let envelope = serde_json::from_slice::<OwnerEnvelope>(bytes).map_err(|e| OwnerCodecError::MalformedOwner {
            details: format!("unreadable owner envelope: {}", e),
        })?;
        if envelope.kind.is_empty() {
            return Err(OwnerCodecError::MalformedOwner {
                details: "owner type discriminator is empty".to_string(),
            });
        }
        Ok(envelope.kind)
    }

    pub fn as_pledge(&self) -> Option<&PledgeScript> {
        match self {
            TypedOwner::Pledge(script) => Some(script),
            _ => None,
        }
    }

    pub fn into_pledge(self) -> Result<PledgeScript, OwnerCodecError> {
        match self {
            TypedOwner::Pledge(script) => Ok(script),
            other => Err(OwnerCodecError::UnexpectedOwnerType {
                kind: other.kind().to_string(),
                expected: PLEDGE_OWNER_TYPE,
            }),
        }
    }

    pub fn as_identity(&self) -> Option<&Identity> {
        match self {
            TypedOwner::Identity(identity) => Some(identity),
            _ => None,
        }
    }
}

pub fn encode_pledge_owner(script: &PledgeScript) -> Result<Vec<u8>, OwnerCodecError> {
    TypedOwner::Pledge(script.clone()).encode()
}

pub fn decode_pledge_owner(bytes: &[u8]) -> Result<PledgeScript, OwnerCodecError> {
    TypedOwner::decode(bytes)?.into_pledge()
}

pub fn encode_identity_owner(identity: &Identity) -> Result<Vec<u8>, OwnerCodecError> {
    TypedOwner::Identity(identity.clone()).encode()
}

#[derive(Debug, thiserror::Error)]
pub enum OwnerCodecError {
    #[error("Malformed owner: {details}")]
    MalformedOwner { details: String },
    #[error("Owner is of type '{kind}', expected '{expected}'")]
    UnexpectedOwnerType { kind: String, expected: &'static str },
    #[error("Failed to encode owner: {0}")]
    EncodingFailed(serde_json::Error),
}
