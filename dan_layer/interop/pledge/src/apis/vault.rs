//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use blake2::{digest::consts::U32, Blake2b};
use log::*;
use tari_crypto::{hash_domain, hashing::DomainSeparatedHasher};

use crate::{
    errors::{CategorizedError, ErrorCategory},
    models::{PledgeInfo, TokenId},
    storage::{create_composite_key, KeyValueStore, KeyValueStoreReader, KeyValueStoreWriter, StorageError},
};

const LOG_TARGET: &str = "tari::dan::interop::pledge::apis::vault";

const PLEDGE_KEY_TYPE: &str = "pledge";

hash_domain!(PledgeVaultHashDomain, "com.tari.dan.interop.pledge.vault", 0);

type PledgeRecordHasher = DomainSeparatedHasher<Blake2b<U32>, PledgeVaultHashDomain>;

/// Local store of the open pledges this node takes part in.
pub struct PledgeVaultApi<'a, TStore> {
    store: &'a TStore,
}

impl<'a, TStore: KeyValueStore> PledgeVaultApi<'a, TStore> {
    pub fn new(store: &'a TStore) -> Self {
        Self { store }
    }

    /// Stores `info`. An identical record that is already stored is kept, and this one is stored next to it.
    pub fn store_pledge(&self, info: &PledgeInfo) -> Result<(), PledgeVaultError> {
        let (record_hash, value) = encode_record(info)?;
        self.store.with_write_tx(|tx| {
            let copies = tx.iter_prefix(&create_composite_key(PLEDGE_KEY_TYPE, &[&record_hash])?)?;
            let key = create_composite_key(PLEDGE_KEY_TYPE, &[&record_hash, &format!("{:010}", copies.len())])?;
            tx.put(&key, &value)?;
            debug!(
                target: LOG_TARGET,
                "Stored pledge {} for token {} ({} existing copies)",
                info.script.id,
                info.token_id,
                copies.len()
            );
            Ok::<_, PledgeVaultError>(())
        })
    }

    /// Stores `info` unless an identical record is already held. Returns true if it was stored.
    pub fn store_pledge_once(&self, info: &PledgeInfo) -> Result<bool, PledgeVaultError> {
        let (record_hash, value) = encode_record(info)?;
        self.store.with_write_tx(|tx| {
            let copies = tx.iter_prefix(&create_composite_key(PLEDGE_KEY_TYPE, &[&record_hash])?)?;
            if !copies.is_empty() {
                return Ok(false);
            }
            let key = create_composite_key(PLEDGE_KEY_TYPE, &[&record_hash, &format!("{:010}", 0)])?;
            tx.put(&key, &value)?;
            Ok::<_, PledgeVaultError>(true)
        })
    }

    /// All stored records for `token_id`. Callers treat more than one as a duplicate pledge.
    pub fn pledge_by_token_id(&self, token_id: &TokenId) -> Result<Vec<PledgeInfo>, PledgeVaultError> {
        let records = self.all()?;
        Ok(records.into_iter().filter(|info| info.token_id == *token_id).collect())
    }

    /// The single record for `token_id`.
    pub fn single_pledge_by_token_id(&self, token_id: &TokenId) -> Result<PledgeInfo, PledgeVaultError> {
        let mut records = self.pledge_by_token_id(token_id)?;
        match records.len() {
            0 => Err(PledgeVaultError::NoPledgeFound {
                token_id: token_id.clone(),
            }),
            1 => Ok(records.remove(0)),
            n => Err(PledgeVaultError::DuplicatePledge {
                token_id: token_id.clone(),
                count: n,
            }),
        }
    }

    pub fn all(&self) -> Result<Vec<PledgeInfo>, PledgeVaultError> {
        self.store.with_read_tx(|tx| {
            let entries = tx.iter_prefix(&create_composite_key(PLEDGE_KEY_TYPE, &[])?)?;
            entries
                .iter()
                .map(|(_, value)| {
                    serde_json::from_slice(value)
                        .map_err(|e| StorageError::decoding("pledge_vault_all", "PledgeInfo", e).into())
                })
                .collect::<Result<Vec<_>, PledgeVaultError>>()
        })
    }

    pub fn contains(&self, info: &PledgeInfo) -> Result<bool, PledgeVaultError> {
        let (record_hash, _) = encode_record(info)?;
        self.store.with_read_tx(|tx| {
            let copies = tx.iter_prefix(&create_composite_key(PLEDGE_KEY_TYPE, &[&record_hash])?)?;
            Ok(!copies.is_empty())
        })
    }

    /// Deletes every stored copy of each record in `infos`.
    pub fn delete(&self, infos: &[PledgeInfo]) -> Result<(), PledgeVaultError> {
        let hashes = infos
            .iter()
            .map(|info| encode_record(info).map(|(hash, _)| hash))
            .collect::<Result<Vec<_>, _>>()?;
        self.store.with_write_tx(|tx| {
            for (info, record_hash) in infos.iter().zip(&hashes) {
                let copies = tx.iter_prefix(&create_composite_key(PLEDGE_KEY_TYPE, &[record_hash])?)?;
                for (key, _) in &copies {
                    tx.delete(key)?;
                }
                debug!(
                    target: LOG_TARGET,
                    "Deleted {} copies of pledge {} for token {}",
                    copies.len(),
                    info.script.id,
                    info.token_id
                );
            }
            Ok::<_, PledgeVaultError>(())
        })
    }
}

fn encode_record(info: &PledgeInfo) -> Result<(String, Vec<u8>), PledgeVaultError> {
    let value = serde_json::to_vec(info).map_err(|e| StorageError::encoding("pledge_vault", "PledgeInfo", e))?;
    let hash = PledgeRecordHasher::new_with_label("record").chain(&value).finalize();
    Ok((hex::encode(hash.as_ref()), value))
}

#[derive(Debug, thiserror::Error)]
pub enum PledgeVaultError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
    #[error("No pledge found for token {token_id}")]
    NoPledgeFound { token_id: TokenId },
    #[error("Found {count} pledges for token {token_id}, expected one")]
    DuplicatePledge { token_id: TokenId, count: usize },
}

impl CategorizedError for PledgeVaultError {
    fn category(&self) -> ErrorCategory {
        match self {
            PledgeVaultError::StorageError(_) => ErrorCategory::Collaborator,
            PledgeVaultError::NoPledgeFound { .. } | PledgeVaultError::DuplicatePledge { .. } => {
                ErrorCategory::StateConsistency
            },
        }
    }
}
