//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

mod composite_key;
pub use composite_key::*;

mod memory;
pub use memory::*;

use crate::optional::IsNotFoundError;

/// An ordered key/value store with transactional reads and writes.
pub trait KeyValueStore {
    type ReadTransaction<'a>: KeyValueStoreReader
    where Self: 'a;
    type WriteTransaction<'a>: KeyValueStoreReader + KeyValueStoreWriter
    where Self: 'a;

    fn create_read_tx(&self) -> Result<Self::ReadTransaction<'_>, StorageError>;
    fn create_write_tx(&self) -> Result<Self::WriteTransaction<'_>, StorageError>;

    fn with_write_tx<F: FnOnce(&mut Self::WriteTransaction<'_>) -> Result<R, E>, R, E>(&self, f: F) -> Result<R, E>
    where E: From<StorageError> {
        let mut tx = self.create_write_tx()?;
        match f(&mut tx) {
            Ok(r) => {
                tx.commit()?;
                Ok(r)
            },
            Err(e) => {
                if let Err(err) = tx.rollback() {
                    log::error!("Failed to rollback transaction: {}", err);
                }
                Err(e)
            },
        }
    }

    fn with_read_tx<F: FnOnce(&mut Self::ReadTransaction<'_>) -> Result<R, E>, R, E>(&self, f: F) -> Result<R, E>
    where E: From<StorageError> {
        let mut tx = self.create_read_tx()?;
        let ret = f(&mut tx)?;
        Ok(ret)
    }
}

pub trait KeyValueStoreReader {
    fn get(&mut self, key: &str) -> Result<Vec<u8>, StorageError>;
    /// Returns all entries whose key starts with `prefix`, in key order.
    fn iter_prefix(&mut self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError>;
}

pub trait KeyValueStoreWriter {
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError>;
    fn delete(&mut self, key: &str) -> Result<(), StorageError>;
    fn commit(self) -> Result<(), StorageError>;
    fn rollback(self) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("General database failure for operation {operation}: {details}")]
    GeneralFailure { operation: &'static str, details: String },
    #[error("Failed to decode for operation {operation} on {item}: {details}")]
    DecodingError {
        operation: &'static str,
        item: &'static str,
        details: String,
    },
    #[error("Failed to encode for operation {operation} on {item}: {details}")]
    EncodingError {
        operation: &'static str,
        item: &'static str,
        details: String,
    },
    #[error("[{operation}] {entity} not found with key {key}")]
    NotFound {
        operation: &'static str,
        entity: String,
        key: String,
    },
    #[error("Invalid key: {details}")]
    InvalidKey { details: String },
}

impl IsNotFoundError for StorageError {
    fn is_not_found_error(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl StorageError {
    pub fn general<E: std::fmt::Display>(operation: &'static str, e: E) -> Self {
        Self::GeneralFailure {
            operation,
            details: e.to_string(),
        }
    }

    pub fn not_found(operation: &'static str, entity: String, key: String) -> Self {
        Self::NotFound { operation, entity, key }
    }

    pub fn encoding<E: std::fmt::Display>(operation: &'static str, item: &'static str, e: E) -> Self {
        Self::EncodingError {
            operation,
            item,
            details: e.to_string(),
        }
    }

    pub fn decoding<E: std::fmt::Display>(operation: &'static str, item: &'static str, e: E) -> Self {
        Self::DecodingError {
            operation,
            item,
            details: e.to_string(),
        }
    }
}
