//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use crate::storage::StorageError;

const KEY_SEPARATOR: char = '\u{0}';

/// Builds a key of the form `\0type\0attr_1\0...attr_n\0`. A key built with a prefix of the attributes is a prefix
/// of the full key, so it can be used with [super::KeyValueStoreReader::iter_prefix].
pub fn create_composite_key(object_type: &str, attributes: &[&str]) -> Result<String, StorageError> {
    validate_key_part(object_type)?;
    let mut key = String::with_capacity(
        object_type.len() + attributes.iter().map(|a| a.len() + 1).sum::<usize>() + 2,
    );
    key.push(KEY_SEPARATOR);
    key.push_str(object_type);
    key.push(KEY_SEPARATOR);
    for attribute in attributes {
        validate_key_part(attribute)?;
        key.push_str(attribute);
        key.push(KEY_SEPARATOR);
    }
    Ok(key)
}

/// Splits a composite key back into its object type and attributes.
pub fn split_composite_key(key: &str) -> Result<(String, Vec<String>), StorageError> {
    let rest = key
        .strip_prefix(KEY_SEPARATOR)
        .and_then(|k| k.strip_suffix(KEY_SEPARATOR))
        .ok_or_else(|| StorageError::InvalidKey {
            details: format!("'{}' is not a composite key", key.escape_debug()),
        })?;
    let mut parts = rest.split(KEY_SEPARATOR).map(ToString::to_string);
    let object_type = parts.next().unwrap_or_default();
    Ok((object_type, parts.collect()))
}

fn validate_key_part(part: &str) -> Result<(), StorageError> {
    if part.contains(KEY_SEPARATOR) {
        return Err(StorageError::InvalidKey {
            details: format!("key part '{}' contains the separator", part.escape_debug()),
        });
    }
    Ok(())
}
