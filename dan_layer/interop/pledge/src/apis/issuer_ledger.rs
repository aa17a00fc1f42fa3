//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{CategorizedError, ErrorCategory},
    models::TokenId,
    optional::{IsNotFoundError, Optional},
    storage::{create_composite_key, KeyValueStore, KeyValueStoreReader, KeyValueStoreWriter, StorageError},
};

const LOG_TARGET: &str = "tari::dan::interop::pledge::apis::issuer_ledger";

const ISSUER_LEDGER_KEY_TYPE: &str = "pledge.issuer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssuerDecision {
    /// A destination token was issued for the pledge
    Claimed,
    /// The issuer attested that the sender may take the pledge back
    ReclaimApproved,
    /// The pledged token was retired on the origin network
    Redeemed,
}

impl Display for IssuerDecision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IssuerDecision::Claimed => write!(f, "Claimed"),
            IssuerDecision::ReclaimApproved => write!(f, "ReclaimApproved"),
            IssuerDecision::Redeemed => write!(f, "Redeemed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IssuerLedgerEntry {
    pub decision: IssuerDecision,
    /// Unknown to the destination-side issuer when it records a claim
    #[serde(rename = "PledgeID")]
    pub pledge_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A durable record, kept by an issuer, of the decision it took for each pledged token. A pledged token is either
/// claimed or reclaimed, never both, and the issuer checks this record before every decision.
pub struct IssuerLedgerApi<'a, TStore> {
    store: &'a TStore,
}

impl<'a, TStore: KeyValueStore> IssuerLedgerApi<'a, TStore> {
    pub fn new(store: &'a TStore) -> Self {
        Self { store }
    }

    pub fn get(&self, origin_network: &str, token_id: &TokenId) -> Result<IssuerLedgerEntry, IssuerLedgerError> {
        let key = entry_key(origin_network, token_id)?;
        self.store.with_read_tx(|tx| {
            let value = tx.get(&key)?;
            serde_json::from_slice(&value)
                .map_err(|e| StorageError::decoding("issuer_ledger_get", "IssuerLedgerEntry", e).into())
        })
    }

    /// Atomically records `decision` for the token, failing if it conflicts with the decision already recorded.
    ///
    /// `Claimed` conflicts with every other decision. `ReclaimApproved` conflicts with `Claimed` and `Redeemed`, and
    /// `Redeemed` conflicts with `ReclaimApproved`. Recording the same decision for the same pledge again succeeds,
    /// except for `Claimed`, which may only ever be recorded once.
    pub fn record(
        &self,
        origin_network: &str,
        token_id: &TokenId,
        pledge_id: Option<&str>,
        decision: IssuerDecision,
        now: DateTime<Utc>,
    ) -> Result<(), IssuerLedgerError> {
        let key = entry_key(origin_network, token_id)?;
        self.store.with_write_tx(|tx| {
            let existing = tx
                .get(&key)
                .optional()?
                .map(|value| {
                    serde_json::from_slice::<IssuerLedgerEntry>(&value)
                        .map_err(|e| StorageError::decoding("issuer_ledger_record", "IssuerLedgerEntry", e))
                })
                .transpose()?;

            if let Some(existing) = existing {
                let allowed = match (existing.decision, decision) {
                    (IssuerDecision::ReclaimApproved, IssuerDecision::ReclaimApproved) |
                    (IssuerDecision::Redeemed, IssuerDecision::Redeemed) => {
                        existing.pledge_id.as_deref() == pledge_id
                    },
                    // Redeem follows a successful claim
                    (IssuerDecision::Claimed, IssuerDecision::Redeemed) => true,
                    _ => false,
                };
                if !allowed {
                    warn!(
                        target: LOG_TARGET,
                        "Refusing {} for pledge {} on token {}: already {}",
                        decision,
                        pledge_id.unwrap_or("<unknown>"),
                        token_id,
                        existing.decision
                    );
                    return Err(IssuerLedgerError::Conflict {
                        token_id: token_id.clone(),
                        existing: existing.decision,
                        requested: decision,
                    });
                }
            }

            let entry = IssuerLedgerEntry {
                decision,
                pledge_id: pledge_id.map(ToString::to_string),
                timestamp: now,
            };
            let value = serde_json::to_vec(&entry)
                .map_err(|e| StorageError::encoding("issuer_ledger_record", "IssuerLedgerEntry", e))?;
            tx.put(&key, &value)?;
            info!(
                target: LOG_TARGET,
                "Recorded {} for pledge {} on token {}",
                decision,
                pledge_id.unwrap_or("<unknown>"),
                token_id
            );
            Ok(())
        })
    }

    /// Removes a `Claimed` reservation whose issuance never reached the ledger.
    pub fn release_claim(&self, origin_network: &str, token_id: &TokenId) -> Result<(), IssuerLedgerError> {
        let key = entry_key(origin_network, token_id)?;
        self.store.with_write_tx(|tx| {
            let existing = tx.get(&key).optional()?;
            let Some(value) = existing else {
                return Ok(());
            };
            let entry = serde_json::from_slice::<IssuerLedgerEntry>(&value)
                .map_err(|e| StorageError::decoding("issuer_ledger_release", "IssuerLedgerEntry", e))?;
            if entry.decision == IssuerDecision::Claimed {
                tx.delete(&key)?;
                info!(target: LOG_TARGET, "Released claim reservation on token {}", token_id);
            }
            Ok(())
        })
    }
}

fn entry_key(origin_network: &str, token_id: &TokenId) -> Result<String, StorageError> {
    create_composite_key(ISSUER_LEDGER_KEY_TYPE, &[
        origin_network,
        &token_id.tx_id,
        &token_id.index.to_string(),
    ])
}

#[derive(Debug, thiserror::Error)]
pub enum IssuerLedgerError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
    #[error("Token {token_id} is already {existing}, cannot record {requested}")]
    Conflict {
        token_id: TokenId,
        existing: IssuerDecision,
        requested: IssuerDecision,
    },
}

impl IsNotFoundError for IssuerLedgerError {
    fn is_not_found_error(&self) -> bool {
        matches!(self, Self::StorageError(e) if e.is_not_found_error())
    }
}

impl CategorizedError for IssuerLedgerError {
    fn category(&self) -> ErrorCategory {
        match self {
            IssuerLedgerError::StorageError(_) => ErrorCategory::Collaborator,
            IssuerLedgerError::Conflict { .. } => ErrorCategory::StateConsistency,
        }
    }
}
