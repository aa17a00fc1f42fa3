//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::time::Duration;

use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};

use crate::models::TmsId;

const CONFIG_SECTION: &str = "pledge";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PledgeConfig {
    /// Deadline used when a pledge is created with a zero deadline
    #[serde(with = "humantime_serde")]
    pub default_deadline: Duration,
    /// How long a protocol step waits for the counterparty's next message
    #[serde(with = "humantime_serde")]
    pub receive_timeout: Duration,
    /// How long the claim recipient waits for the issuance to be finalized
    #[serde(with = "humantime_serde")]
    pub finality_timeout: Duration,
    /// Interval between ledger lookups while scanning for a pledge
    #[serde(with = "humantime_serde")]
    pub scan_poll_interval: Duration,
    pub interop_url_scheme: String,
    /// The token management services served by this node
    pub local_tms: Vec<TmsId>,
}

impl PledgeConfig {
    pub fn load_from(cfg: &Config) -> Result<Self, ConfigError> {
        match cfg.get::<Self>(CONFIG_SECTION) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(err) => Err(err),
        }
    }
}

impl Default for PledgeConfig {
    fn default() -> Self {
        Self {
            default_deadline: Duration::from_secs(60 * 60),
            receive_timeout: Duration::from_secs(60),
            finality_timeout: Duration::from_secs(120),
            scan_poll_interval: Duration::from_millis(500),
            interop_url_scheme: "tari".to_string(),
            local_tms: Vec::new(),
        }
    }
}
