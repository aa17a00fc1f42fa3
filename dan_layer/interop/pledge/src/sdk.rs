//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::time::Duration;

use crate::{
    apis::{
        claim::ClaimApi,
        issuer_ledger::IssuerLedgerApi,
        pledge::PledgeApi,
        proofs::ProofsApi,
        reclaim::ReclaimApi,
        redeem::RedeemApi,
        scanner::ScannerApi,
        tokens::TokensApi,
        vault::PledgeVaultApi,
    },
    config::PledgeConfig,
    spec::PledgeSpec,
};

/// The collaborators of a [PledgeSdk]. Nothing is looked up from global state.
pub struct PledgeServices<TSpec: PledgeSpec> {
    pub store: TSpec::Store,
    pub signature_service: TSpec::SignatureService,
    pub endpoint_binder: TSpec::EndpointBinder,
    pub state_services: TSpec::StateServiceProvider,
    pub transactions: TSpec::TransactionService,
    pub network: TSpec::NetworkDirectory,
    pub sessions: TSpec::SessionOpener,
    pub ledger: TSpec::LedgerReader,
    pub clock: TSpec::Clock,
}

pub struct PledgeSdk<TSpec: PledgeSpec> {
    config: PledgeConfig,
    services: PledgeServices<TSpec>,
}

impl<TSpec: PledgeSpec> PledgeSdk<TSpec> {
    pub fn new(config: PledgeConfig, services: PledgeServices<TSpec>) -> Result<Self, PledgeSdkError> {
        for (name, value) in [
            ("default_deadline", config.default_deadline),
            ("receive_timeout", config.receive_timeout),
            ("finality_timeout", config.finality_timeout),
            ("scan_poll_interval", config.scan_poll_interval),
        ] {
            if value == Duration::ZERO {
                return Err(PledgeSdkError::InvalidConfig {
                    details: format!("{} must be greater than zero", name),
                });
            }
        }
        if config.interop_url_scheme.is_empty() {
            return Err(PledgeSdkError::InvalidConfig {
                details: "interop_url_scheme is empty".to_string(),
            });
        }
        Ok(Self { config, services })
    }

    pub fn config(&self) -> &PledgeConfig {
        &self.config
    }

    pub fn services(&self) -> &PledgeServices<TSpec> {
        &self.services
    }

    pub fn vault_api(&self) -> PledgeVaultApi<'_, TSpec::Store> {
        PledgeVaultApi::new(&self.services.store)
    }

    pub fn issuer_ledger_api(&self) -> IssuerLedgerApi<'_, TSpec::Store> {
        IssuerLedgerApi::new(&self.services.store)
    }

    pub fn proofs_api(&self) -> ProofsApi<'_, TSpec::StateServiceProvider> {
        ProofsApi::new(&self.services.state_services)
    }

    pub fn tokens_api(&self) -> TokensApi {
        TokensApi::new()
    }

    pub fn scanner_api(&self) -> ScannerApi<'_, TSpec::LedgerReader> {
        ScannerApi::new(&self.services.ledger, self.config.scan_poll_interval)
    }

    pub fn pledge_api(&self) -> PledgeApi<'_, TSpec> {
        PledgeApi::new(&self.services, &self.config)
    }

    pub fn claim_api(&self) -> ClaimApi<'_, TSpec> {
        ClaimApi::new(&self.services, &self.config)
    }

    pub fn reclaim_api(&self) -> ReclaimApi<'_, TSpec> {
        ReclaimApi::new(&self.services, &self.config)
    }

    pub fn redeem_api(&self) -> RedeemApi<'_, TSpec> {
        RedeemApi::new(&self.services)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PledgeSdkError {
    #[error("Invalid pledge configuration: {details}")]
    InvalidConfig { details: String },
}
