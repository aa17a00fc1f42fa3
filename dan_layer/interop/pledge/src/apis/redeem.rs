//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use log::*;

use crate::{
    apis::{
        issuer_ledger::{IssuerDecision, IssuerLedgerApi, IssuerLedgerError},
        proofs::{ProofsApi, ProofsApiError},
        tokens::{TokensApi, TokensApiError},
        vault::{PledgeVaultApi, PledgeVaultError},
    },
    clock::Clock,
    errors::{CategorizedError, ErrorCategory},
    metadata::redeem_pledge_key,
    models::{Identity, TmsId, TokenId},
    network::{NetworkDirectory, NetworkError},
    sdk::PledgeServices,
    signature::{EndpointBinder, EndpointBinderError, PledgeSigner, PledgeVerifier, SignatureError, SignatureService},
    spec::PledgeSpec,
    transaction::{TokenRequest, TransactionError, TransactionService, TransferOptions},
    wallet::{IssuerWallet, WalletError},
};

const LOG_TARGET: &str = "tari::dan::interop::pledge::apis::redeem";

/// Redeems (burns) a claimed pledge on the origin network. Only the issuer named in the pledge script can do this,
/// and only once the token it was claimed as exists on the destination network.
pub struct RedeemApi<'a, TSpec: PledgeSpec> {
    services: &'a PledgeServices<TSpec>,
}

impl<'a, TSpec: PledgeSpec> RedeemApi<'a, TSpec> {
    pub fn new(services: &'a PledgeServices<TSpec>) -> Self {
        Self { services }
    }

    /// Redeems the pledged token `token_id` held on `origin_tms`. Returns the ID of the redeeming transaction.
    pub async fn redeem<W: IssuerWallet + ?Sized>(
        &self,
        wallet: &W,
        token_id: &TokenId,
        origin_tms: &TmsId,
    ) -> Result<String, RedeemApiError> {
        let (token, script) = TokensApi::new().get_pledged_token(wallet, token_id)?;
        if !wallet.contains_identity(&script.issuer) {
            return Err(RedeemApiError::NotIssuer {
                pledge_id: script.id.clone(),
            });
        }

        let origin_url = self.services.network.interop_url(origin_tms)?;
        let proof = ProofsApi::new(&self.services.state_services)
            .request_existence_with_metadata_proof(&script.destination_network, token_id, &origin_url)
            .await?;

        // Recorded before spending so that no reclaim can be attested for this token afterwards
        IssuerLedgerApi::new(&self.services.store).record(
            &origin_url,
            token_id,
            Some(&script.id),
            IssuerDecision::Redeemed,
            self.services.clock.now(),
        )?;

        let signature_service = &self.services.signature_service;
        let signer = PledgeSigner::redeem(signature_service.get_signer(&script.issuer)?);
        let verifier = PledgeVerifier::from_script(&script, signature_service)?;
        signature_service.register_signer(&token.owner, Arc::new(signer), Arc::new(verifier))?;
        self.services
            .endpoint_binder
            .bind(&script.issuer, &Identity::new(token.owner.clone()))?;

        let mut transaction = self.services.transactions.new_anonymous_transaction(origin_tms)?;
        transaction.redeem(
            wallet,
            &token.token_type,
            token.quantity,
            TransferOptions::default()
                .with_token_ids(vec![token_id.clone()])
                .with_metadata(redeem_pledge_key(token_id), proof),
        )?;
        self.services.transactions.collect_endorsements(&mut transaction).await?;
        self.services
            .transactions
            .order_and_await_finality(&transaction)
            .await?;

        let vault = PledgeVaultApi::new(&self.services.store);
        let records = vault.pledge_by_token_id(token_id)?;
        vault.delete(&records)?;
        info!(
            target: LOG_TARGET,
            "Redeemed pledge {} ({}) in transaction {}",
            script.id,
            token_id,
            transaction.id()
        );
        Ok(transaction.id().to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RedeemApiError {
    #[error("Tokens error: {0}")]
    TokensError(#[from] TokensApiError),
    #[error("Vault error: {0}")]
    VaultError(#[from] PledgeVaultError),
    #[error("Proof error: {0}")]
    ProofError(#[from] ProofsApiError),
    #[error("Signature error: {0}")]
    SignatureError(#[from] SignatureError),
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("Wallet error: {0}")]
    WalletError(#[from] WalletError),
    #[error("Issuer ledger error: {0}")]
    IssuerLedgerError(#[from] IssuerLedgerError),
    #[error("Network error: {0}")]
    NetworkError(#[from] NetworkError),
    #[error("Endpoint binder error: {0}")]
    EndpointBinderError(#[from] EndpointBinderError),
    #[error("Pledge {pledge_id} is not issued by this wallet")]
    NotIssuer { pledge_id: String },
}

impl CategorizedError for RedeemApiError {
    fn category(&self) -> ErrorCategory {
        match self {
            RedeemApiError::TokensError(e) => e.category(),
            RedeemApiError::VaultError(e) => e.category(),
            RedeemApiError::ProofError(e) => e.category(),
            RedeemApiError::SignatureError(e) => e.category(),
            RedeemApiError::TransactionError(e) => e.category(),
            RedeemApiError::WalletError(e) => e.category(),
            RedeemApiError::IssuerLedgerError(e) => e.category(),
            RedeemApiError::NetworkError(_) | RedeemApiError::EndpointBinderError(_) => ErrorCategory::Collaborator,
            RedeemApiError::NotIssuer { .. } => ErrorCategory::Authorization,
        }
    }
}
