//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use async_trait::async_trait;

use crate::{config::PledgeConfig, models::TmsId};

/// Maps the token management services known to this node to their interop URLs.
pub trait NetworkDirectory: Send + Sync {
    fn interop_url(&self, tms_id: &TmsId) -> Result<String, NetworkError>;

    /// True if one of the local TMSs is reachable under `url`
    fn serves(&self, url: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct StaticNetworkDirectory {
    scheme: String,
    tms_ids: Vec<TmsId>,
}

impl StaticNetworkDirectory {
    pub fn new<T: Into<String>>(scheme: T, tms_ids: Vec<TmsId>) -> Self {
        Self {
            scheme: scheme.into(),
            tms_ids,
        }
    }

    pub fn from_config(config: &PledgeConfig) -> Self {
        Self::new(config.interop_url_scheme.clone(), config.local_tms.clone())
    }
}

impl NetworkDirectory for StaticNetworkDirectory {
    fn interop_url(&self, tms_id: &TmsId) -> Result<String, NetworkError> {
        if !self.tms_ids.contains(tms_id) {
            return Err(NetworkError::UnknownTms { tms_id: tms_id.clone() });
        }
        Ok(tms_id.interop_url(&self.scheme))
    }

    fn serves(&self, url: &str) -> bool {
        self.tms_ids.iter().any(|tms| tms.interop_url(&self.scheme) == url)
    }
}

/// Read access to the transfer metadata committed on the local ledger.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the value of the first committed transfer metadata entry under `key`. If `starting_tx_id` is given,
    /// transactions committed before it are not considered.
    async fn lookup_transfer_metadata_key(
        &self,
        key: &str,
        starting_tx_id: Option<&str>,
    ) -> Result<Option<Vec<u8>>, Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Unknown TMS {tms_id}")]
    UnknownTms { tms_id: TmsId },
}
