//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use tari_dan_interop_pledge::{
    models::{Identity, TmsId, UnspentToken},
    owner::TypedOwner,
    signature::script_recipients,
    wallet::{IssuerWallet, Wallet, WalletError},
};

use super::{audit_info_of, interop_url, KeyStore, TestLedgers};

/// A wallet with a single long-term identity on one ledger. It sees the tokens its identity owns, and the pledged
/// tokens where it is the sender or can spend the pledge on the pledge's own network.
pub struct TestWallet {
    id: String,
    identity: Identity,
    is_issuer: bool,
    ledgers: TestLedgers,
    network: String,
}

impl TestWallet {
    pub fn new(id: &str, keys: &KeyStore, ledgers: TestLedgers, tms_id: &TmsId) -> Self {
        Self {
            id: id.to_string(),
            identity: keys.generate(),
            is_issuer: false,
            ledgers,
            network: interop_url(tms_id),
        }
    }

    pub fn issuer(id: &str, keys: &KeyStore, ledgers: TestLedgers, tms_id: &TmsId) -> Self {
        Self {
            is_issuer: true,
            ..Self::new(id, keys, ledgers, tms_id)
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn balance(&self, token_type: &str) -> u64 {
        self.ledgers.balance(&self.network, &self.identity, token_type)
    }
}

impl Wallet for TestWallet {
    fn id(&self) -> &str {
        &self.id
    }

    fn recipient_identity(&self) -> Result<Identity, WalletError> {
        Ok(self.identity.clone())
    }

    fn audit_info(&self, identity: &Identity) -> Result<Vec<u8>, WalletError> {
        if !self.contains_identity(identity) {
            return Err(WalletError::UnknownIdentity {
                wallet_id: self.id.clone(),
                identity: identity.clone(),
            });
        }
        Ok(audit_info_of(identity))
    }

    fn contains_identity(&self, identity: &Identity) -> bool {
        self.identity == *identity
    }

    fn list_unspent_tokens(&self) -> Result<Vec<UnspentToken>, WalletError> {
        Ok(self
            .ledgers
            .unspent(&self.network)
            .into_iter()
            .filter(|token| match TypedOwner::decode(&token.owner) {
                Ok(TypedOwner::Identity(owner)) => self.contains_identity(&owner),
                Ok(TypedOwner::Pledge(script)) => {
                    self.contains_identity(&script.sender) ||
                        script_recipients(&script).iter().any(|id| self.contains_identity(id))
                },
                _ => false,
            })
            .collect())
    }
}

impl IssuerWallet for TestWallet {
    fn issuer_identity(&self) -> Result<Identity, WalletError> {
        if !self.is_issuer {
            return Err(WalletError::NotAnIssuer {
                wallet_id: self.id.clone(),
            });
        }
        Ok(self.identity.clone())
    }
}
