//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::storage::{KeyValueStore, KeyValueStoreReader, KeyValueStoreWriter, StorageError};

type Entries = BTreeMap<String, Vec<u8>>;

/// Thread-safe in-memory store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<RwLock<Entries>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    type ReadTransaction<'a> = MemoryReadTransaction<'a>;
    type WriteTransaction<'a> = MemoryWriteTransaction<'a>;

    fn create_read_tx(&self) -> Result<Self::ReadTransaction<'_>, StorageError> {
        let guard = self
            .entries
            .read()
            .map_err(|e| StorageError::general("create_read_tx", e))?;
        Ok(MemoryReadTransaction { guard })
    }

    fn create_write_tx(&self) -> Result<Self::WriteTransaction<'_>, StorageError> {
        let guard = self
            .entries
            .write()
            .map_err(|e| StorageError::general("create_write_tx", e))?;
        Ok(MemoryWriteTransaction {
            guard,
            staged: BTreeMap::new(),
        })
    }
}

pub struct MemoryReadTransaction<'a> {
    guard: RwLockReadGuard<'a, Entries>,
}

impl KeyValueStoreReader for MemoryReadTransaction<'_> {
    fn get(&mut self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.guard
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found("get", "entry".to_string(), key.escape_debug().to_string()))
    }

    fn iter_prefix(&mut self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        Ok(range_prefix(&self.guard, prefix)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Holds the write lock for its lifetime. Changes are staged and only applied on commit.
pub struct MemoryWriteTransaction<'a> {
    guard: RwLockWriteGuard<'a, Entries>,
    staged: BTreeMap<String, Option<Vec<u8>>>,
}

impl KeyValueStoreReader for MemoryWriteTransaction<'_> {
    fn get(&mut self, key: &str) -> Result<Vec<u8>, StorageError> {
        let value = match self.staged.get(key) {
            Some(staged) => staged.clone(),
            None => self.guard.get(key).cloned(),
        };
        value.ok_or_else(|| StorageError::not_found("get", "entry".to_string(), key.escape_debug().to_string()))
    }

    fn iter_prefix(&mut self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let mut merged = range_prefix(&self.guard, prefix)
            .map(|(k, v)| (k.clone(), Some(v.clone())))
            .collect::<BTreeMap<_, _>>();
        for (k, v) in self.staged.range(prefix.to_string()..) {
            if !k.starts_with(prefix) {
                break;
            }
            merged.insert(k.clone(), v.clone());
        }
        Ok(merged.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))).collect())
    }
}

impl KeyValueStoreWriter for MemoryWriteTransaction<'_> {
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.staged.insert(key.to_string(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        self.staged.insert(key.to_string(), None);
        Ok(())
    }

    fn commit(mut self) -> Result<(), StorageError> {
        let staged = std::mem::take(&mut self.staged);
        for (key, value) in staged {
            match value {
                Some(value) => {
                    self.guard.insert(key, value);
                },
                None => {
                    self.guard.remove(&key);
                },
            }
        }
        Ok(())
    }

    fn rollback(self) -> Result<(), StorageError> {
        Ok(())
    }
}

fn range_prefix<'a>(entries: &'a Entries, prefix: &'a str) -> impl Iterator<Item = (&'a String, &'a Vec<u8>)> + 'a {
    entries
        .range(prefix.to_string()..)
        .take_while(move |(k, _)| k.starts_with(prefix))
}
