//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Identifies a token management service instance: the network, channel and namespace it lives in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TmsId {
    #[serde(rename = "Network", alias = "network")]
    pub network: String,
    #[serde(rename = "Channel", alias = "channel")]
    pub channel: String,
    #[serde(rename = "Namespace", alias = "namespace")]
    pub namespace: String,
}

impl TmsId {
    pub fn new<A: Into<String>, B: Into<String>, C: Into<String>>(network: A, channel: B, namespace: C) -> Self {
        Self {
            network: network.into(),
            channel: channel.into(),
            namespace: namespace.into(),
        }
    }

    /// The canonical URL used to name this TMS in pledge records and proofs.
    pub fn interop_url(&self, scheme: &str) -> String {
        format!("{}://{}.{}.{}", scheme, self.network, self.channel, self.namespace)
    }

    /// Parses a URL produced by [TmsId::interop_url], returning the scheme and the TMS ID.
    pub fn from_interop_url(url: &str) -> Option<(String, Self)> {
        let (scheme, rest) = url.split_once("://")?;
        let mut parts = rest.splitn(3, '.');
        let network = parts.next()?;
        let channel = parts.next()?;
        let namespace = parts.next()?;
        if scheme.is_empty() || network.is_empty() || channel.is_empty() || namespace.is_empty() {
            return None;
        }
        Some((scheme.to_string(), Self::new(network, channel, namespace)))
    }
}

impl Display for TmsId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{}", self.network, self.channel, self.namespace)
    }
}
