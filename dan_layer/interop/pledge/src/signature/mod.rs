//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

mod pledge;
pub use pledge::*;

mod script;
pub use script::*;

mod service;
pub use service::*;

use std::sync::Arc;

use crate::{
    errors::{CategorizedError, ErrorCategory},
    models::Identity,
};

pub trait Signer: Send + Sync {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignatureError>;
}

pub trait Verifier: Send + Sync {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SignatureError>;
}

impl<T: Signer + ?Sized> Signer for Arc<T> {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignatureError> {
        (**self).sign(message)
    }
}

impl<T: Verifier + ?Sized> Verifier for Arc<T> {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
        (**self).verify(message, signature)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Pledge signer has neither an issuer nor a sender signer")]
    Configuration,
    #[error("Reclaim signature cannot be checked without a sender verifier")]
    MissingSenderVerifier,
    #[error("Failed to decode pledge signature: {details}")]
    Decode { details: String },
    #[error("Failed to encode pledge signature: {details}")]
    Encode { details: String },
    #[error("Invalid {role} signature: {details}")]
    InvalidSignature { role: &'static str, details: String },
    #[error("Signing failed: {details}")]
    SigningFailed { details: String },
    #[error("No key material for identity {identity}")]
    UnknownIdentity { identity: Identity },
    #[error("Identity service error: {0}")]
    Upstream(#[from] anyhow::Error),
}

impl SignatureError {
    pub fn invalid<E: std::fmt::Display>(role: &'static str, e: E) -> Self {
        Self::InvalidSignature {
            role,
            details: e.to_string(),
        }
    }
}

impl CategorizedError for SignatureError {
    fn category(&self) -> ErrorCategory {
        match self {
            SignatureError::Decode { .. } | SignatureError::Encode { .. } => ErrorCategory::MalformedInput,
            SignatureError::InvalidSignature { .. } | SignatureError::MissingSenderVerifier => {
                ErrorCategory::Authorization
            },
            SignatureError::Configuration |
            SignatureError::SigningFailed { .. } |
            SignatureError::UnknownIdentity { .. } |
            SignatureError::Upstream(_) => ErrorCategory::Collaborator,
        }
    }
}
