//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use crate::{
    models::Identity,
    signature::{SignatureError, Signer, Verifier},
};

/// Access to key material and verifiers, provided by the identity subsystem.
pub trait SignatureService: Send + Sync {
    fn get_signer(&self, identity: &Identity) -> Result<Arc<dyn Signer>, SignatureError>;

    fn owner_verifier(&self, identity: &Identity) -> Result<Arc<dyn Verifier>, SignatureError>;

    /// Registers the signer and verifier to use when spending an output owned by `owner`.
    fn register_signer(
        &self,
        owner: &[u8],
        signer: Arc<dyn Signer>,
        verifier: Arc<dyn Verifier>,
    ) -> Result<(), SignatureError>;

    fn register_recipient_identity(&self, identity: &Identity, audit_info: &[u8]) -> Result<(), SignatureError>;

    /// Audit info previously registered or owned for `identity`, if any.
    fn audit_info(&self, identity: &Identity) -> Result<Option<Vec<u8>>, SignatureError>;
}

/// Associates an ephemeral identity with the long-term identity that answers for it.
pub trait EndpointBinder: Send + Sync {
    fn bind(&self, long_term: &Identity, ephemeral: &Identity) -> Result<(), EndpointBinderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointBinderError {
    #[error("Failed to bind {ephemeral} to {long_term}: {details}")]
    BindFailed {
        long_term: Identity,
        ephemeral: Identity,
        details: String,
    },
}
