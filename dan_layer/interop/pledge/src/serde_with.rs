//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

/// Standard base64 encoding for byte fields. A JSON `null` decodes to an empty byte vector.
pub mod base64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(v: &T, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        s.serialize_str(&::base64::encode(v.as_ref()))
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Vec<u8>, D::Error>
    where D: Deserializer<'de> {
        let encoded = Option::<String>::deserialize(d)?.unwrap_or_default();
        ::base64::decode(encoded).map_err(serde::de::Error::custom)
    }
}
