//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::time::Duration;

use log::*;
use tokio::time::{self, Instant};

use crate::{
    errors::{CategorizedError, ErrorCategory},
    metadata::pledge_key,
    network::LedgerReader,
};

const LOG_TARGET: &str = "tari::dan::interop::pledge::apis::scanner";

/// Watches the local ledger for the locking transfer of a pledge.
pub struct ScannerApi<'a, TLedger> {
    ledger: &'a TLedger,
    poll_interval: Duration,
}

impl<'a, TLedger: LedgerReader> ScannerApi<'a, TLedger> {
    pub fn new(ledger: &'a TLedger, poll_interval: Duration) -> Self {
        Self { ledger, poll_interval }
    }

    /// Returns true once a transfer carrying the pledge marker for `pledge_id` has been committed, or false if none
    /// appears within `timeout`. A timeout too large to represent waits without limit. Transactions committed before
    /// `starting_tx_id` are not considered.
    pub async fn exists(
        &self,
        pledge_id: &str,
        timeout: Duration,
        starting_tx_id: Option<&str>,
    ) -> Result<bool, ScannerApiError> {
        let key = pledge_key(pledge_id);
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let found = self
                .ledger
                .lookup_transfer_metadata_key(&key, starting_tx_id)
                .await
                .map_err(|e| ScannerApiError::LedgerError {
                    pledge_id: pledge_id.to_string(),
                    details: e.to_string(),
                })?;
            if found.is_some() {
                debug!(target: LOG_TARGET, "Pledge {} found on the ledger", pledge_id);
                return Ok(true);
            }

            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!(
                            target: LOG_TARGET,
                            "Pledge {} not found within {:.2?}", pledge_id, timeout
                        );
                        return Ok(false);
                    }
                    self.poll_interval.min(deadline - now)
                },
                None => self.poll_interval,
            };
            time::sleep(wait).await;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScannerApiError {
    #[error("Ledger lookup for pledge {pledge_id} failed: {details}")]
    LedgerError { pledge_id: String, details: String },
}

impl CategorizedError for ScannerApiError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Collaborator
    }
}
