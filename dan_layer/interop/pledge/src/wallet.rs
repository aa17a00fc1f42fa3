//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use log::*;

use crate::{
    errors::{CategorizedError, ErrorCategory},
    models::{Identity, UnspentToken},
    owner::TypedOwner,
};

const LOG_TARGET: &str = "tari::dan::interop::pledge::wallet";

/// An owner wallet handle. Protocol entry points receive these explicitly.
pub trait Wallet: Send + Sync {
    fn id(&self) -> &str;

    /// A fresh or long-term identity under which this wallet receives tokens
    fn recipient_identity(&self) -> Result<Identity, WalletError>;

    fn audit_info(&self, identity: &Identity) -> Result<Vec<u8>, WalletError>;

    fn contains_identity(&self, identity: &Identity) -> bool;

    fn list_unspent_tokens(&self) -> Result<Vec<UnspentToken>, WalletError>;
}

pub trait IssuerWallet: Wallet {
    fn issuer_identity(&self) -> Result<Identity, WalletError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptRole {
    Sender,
    Recipient,
    Issuer,
}

impl ScriptRole {
    pub fn prefix(&self) -> &'static str {
        match self {
            ScriptRole::Sender => "pledge.sender",
            ScriptRole::Recipient => "pledge.recipient",
            ScriptRole::Issuer => "pledge.issuer",
        }
    }
}

/// Classifies a pledge-owned output against a set of wallets. Returns one ID per (role, wallet) pair where the
/// wallet holds the identity of that script role, formed as the role prefix followed by the wallet ID. Outputs that
/// are not pledge-owned, or whose script is incomplete, belong to nobody here.
pub fn is_mine(owner: &[u8], wallets: &[&dyn Wallet]) -> Vec<String> {
    let script = match TypedOwner::decode(owner) {
        Ok(TypedOwner::Pledge(script)) => script,
        Ok(_) => return Vec::new(),
        Err(err) => {
            debug!(target: LOG_TARGET, "Is mine? No, failed to decode owner: {}", err);
            return Vec::new();
        },
    };
    if let Err(err) = script.check_fields() {
        debug!(target: LOG_TARGET, "Is mine? No, invalid script {}: {}", script.id, err);
        return Vec::new();
    }

    let mut ids = Vec::new();
    for (role, identity) in [
        (ScriptRole::Sender, &script.sender),
        (ScriptRole::Recipient, &script.recipient),
        (ScriptRole::Issuer, &script.issuer),
    ] {
        for wallet in wallets {
            if wallet.contains_identity(identity) {
                ids.push(format!("{}{}", role.prefix(), wallet.id()));
            }
        }
    }
    debug!(target: LOG_TARGET, "Is mine [{}]? {:?}", script.id, ids);
    ids
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Wallet {wallet_id} has no identity {identity}")]
    UnknownIdentity { wallet_id: String, identity: Identity },
    #[error("Wallet {wallet_id} is not an issuer wallet")]
    NotAnIssuer { wallet_id: String },
    #[error("Wallet error: {0}")]
    Upstream(#[from] anyhow::Error),
}

impl CategorizedError for WalletError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Collaborator
    }
}
