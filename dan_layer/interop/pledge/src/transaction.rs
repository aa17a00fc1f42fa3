//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;

use crate::{
    errors::{CategorizedError, ErrorCategory},
    models::{Identity, PledgeScript, TmsId, TokenId},
    owner::{OwnerCodecError, TypedOwner},
    wallet::{IssuerWallet, Wallet},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOutput {
    pub index: u64,
    /// Typed owner bytes
    pub owner: Vec<u8>,
    pub token_type: String,
    pub quantity: u64,
}

impl TokenOutput {
    pub fn typed_owner(&self) -> Result<TypedOwner, OwnerCodecError> {
        TypedOwner::decode(&self.owner)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInput {
    pub id: TokenId,
    pub owner: Vec<u8>,
    pub token_type: String,
    pub quantity: u64,
}

/// The outputs of a token request, in order.
#[derive(Debug, Clone, Default)]
pub struct OutputStream {
    outputs: Vec<TokenOutput>,
}

impl OutputStream {
    pub fn new(outputs: Vec<TokenOutput>) -> Self {
        Self { outputs }
    }

    pub fn count(&self) -> usize {
        self.outputs.len()
    }

    pub fn at(&self, i: usize) -> Option<&TokenOutput> {
        self.outputs.get(i)
    }

    /// The outputs locked by a pledge script
    pub fn by_script(&self) -> Self {
        self.filter(|owner| matches!(owner, TypedOwner::Pledge(_)))
    }

    /// The outputs owned by the plain identity `recipient`
    pub fn by_recipient(&self, recipient: &Identity) -> Self {
        self.filter(|owner| owner.as_identity() == Some(recipient))
    }

    pub fn script_at(&self, i: usize) -> Result<PledgeScript, TransactionError> {
        let output = self.at(i).ok_or(TransactionError::OutputOutOfRange {
            index: i,
            count: self.count(),
        })?;
        Ok(output.typed_owner()?.into_pledge()?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenOutput> {
        self.outputs.iter()
    }

    fn filter<F: Fn(&TypedOwner) -> bool>(&self, predicate: F) -> Self {
        let outputs = self
            .outputs
            .iter()
            .filter(|output| output.typed_owner().map(|owner| predicate(&owner)).unwrap_or(false))
            .cloned()
            .collect();
        Self { outputs }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Spend exactly these tokens instead of letting the wallet select inputs
    pub token_ids: Vec<TokenId>,
    pub metadata: BTreeMap<String, Vec<u8>>,
    /// Audit info for each output owner, in output order
    pub owner_audit_info: Vec<Vec<u8>>,
}

impl TransferOptions {
    pub fn with_token_ids(mut self, token_ids: Vec<TokenId>) -> Self {
        self.token_ids = token_ids;
        self
    }

    pub fn with_metadata<K: Into<String>>(mut self, key: K, value: Vec<u8>) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_owner_audit_info(mut self, audit_info: Vec<u8>) -> Self {
        self.owner_audit_info.push(audit_info);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct IssueOptions {
    pub metadata: BTreeMap<String, Vec<u8>>,
}

/// A token transaction under construction. Implemented by the zero-knowledge token layer.
pub trait TokenRequest: Send + Sync + Sized {
    fn id(&self) -> &str;

    fn issue<W: IssuerWallet + ?Sized>(
        &mut self,
        wallet: &W,
        owner: Vec<u8>,
        token_type: &str,
        quantity: u64,
        options: IssueOptions,
    ) -> Result<(), TransactionError>;

    fn transfer<W: Wallet + ?Sized>(
        &mut self,
        wallet: &W,
        token_type: &str,
        values: Vec<u64>,
        owners: Vec<Vec<u8>>,
        options: TransferOptions,
    ) -> Result<(), TransactionError>;

    fn redeem<W: Wallet + ?Sized>(
        &mut self,
        wallet: &W,
        token_type: &str,
        quantity: u64,
        options: TransferOptions,
    ) -> Result<(), TransactionError>;

    fn outputs(&self) -> Result<OutputStream, TransactionError>;

    fn inputs(&self) -> Result<Vec<TokenInput>, TransactionError>;

    fn to_bytes(&self) -> Result<Vec<u8>, TransactionError>;

    fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError>;
}

/// Transaction assembly, endorsement and ordering.
#[async_trait]
pub trait TransactionService: Send + Sync {
    type Transaction: TokenRequest;

    fn new_anonymous_transaction(&self, tms_id: &TmsId) -> Result<Self::Transaction, TransactionError>;

    async fn collect_endorsements(&self, transaction: &mut Self::Transaction) -> Result<(), TransactionError>;

    async fn order_and_await_finality(&self, transaction: &Self::Transaction) -> Result<(), TransactionError>;

    /// Waits for a transaction assembled by another party to be committed.
    async fn await_finality(&self, tx_id: &str, timeout: Duration) -> Result<(), TransactionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("Insufficient funds: requested {requested} of type {token_type}, available {available}")]
    InsufficientFunds {
        token_type: String,
        requested: u64,
        available: u64,
    },
    #[error("Output {index} out of range, transaction has {count} outputs")]
    OutputOutOfRange { index: usize, count: usize },
    #[error("Owner codec error: {0}")]
    OwnerCodec(#[from] OwnerCodecError),
    #[error("Invalid transaction: {details}")]
    InvalidTransaction { details: String },
    #[error("Transaction {tx_id} was not finalized: {details}")]
    NotFinalized { tx_id: String, details: String },
    #[error("Token layer error: {0}")]
    Upstream(#[from] anyhow::Error),
}

impl CategorizedError for TransactionError {
    fn category(&self) -> ErrorCategory {
        match self {
            TransactionError::OwnerCodec(_) | TransactionError::OutputOutOfRange { .. } => {
                ErrorCategory::MalformedInput
            },
            TransactionError::InsufficientFunds { .. } |
            TransactionError::InvalidTransaction { .. } |
            TransactionError::NotFinalized { .. } |
            TransactionError::Upstream(_) => ErrorCategory::Collaborator,
        }
    }
}
