//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use log::*;
use tokio_util::sync::CancellationToken;

use crate::{
    apis::{
        issuer_ledger::{IssuerDecision, IssuerLedgerApi, IssuerLedgerError},
        proofs::{ProofsApi, ProofsApiError},
        send_abort,
        tokens::{TokensApi, TokensApiError},
        vault::{PledgeVaultApi, PledgeVaultError},
    },
    clock::Clock,
    config::PledgeConfig,
    errors::{CategorizedError, ErrorCategory},
    metadata::reclaim_key,
    models::{Identity, IssuerApprovalRequest, IssuerApprovalResponse, PledgeScript, TmsId, TokenId},
    network::{NetworkDirectory, NetworkError},
    owner::{encode_identity_owner, OwnerCodecError},
    sdk::PledgeServices,
    session::{receive_json, send_json, Session, SessionError, SessionOpener},
    signature::{
        EndpointBinder,
        EndpointBinderError,
        PledgeSigner,
        PledgeVerifier,
        SignatureError,
        SignatureService,
        Signer,
        Verifier,
    },
    spec::PledgeSpec,
    transaction::{TokenRequest, TransactionError, TransactionService, TransferOptions},
    wallet::{IssuerWallet, Wallet, WalletError},
};

const LOG_TARGET: &str = "tari::dan::interop::pledge::apis::reclaim";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReclaimState {
    CheckEligibility,
    AwaitProof,
    AwaitIssuerResponse,
    Spending,
    Accepted,
    Aborted(String),
}

impl Display for ReclaimState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReclaimState::CheckEligibility => write!(f, "CheckEligibility"),
            ReclaimState::AwaitProof => write!(f, "AwaitProof"),
            ReclaimState::AwaitIssuerResponse => write!(f, "AwaitIssuerResponse"),
            ReclaimState::Spending => write!(f, "Spending"),
            ReclaimState::Accepted => write!(f, "Accepted"),
            ReclaimState::Aborted(reason) => write!(f, "Aborted({})", reason),
        }
    }
}

/// The reclaim protocol. Once the deadline of an unclaimed pledge has passed, the sender obtains the origin issuer's
/// attestation and spends the pledged token back to itself.
pub struct ReclaimApi<'a, TSpec: PledgeSpec> {
    services: &'a PledgeServices<TSpec>,
    config: &'a PledgeConfig,
}

impl<'a, TSpec: PledgeSpec> ReclaimApi<'a, TSpec> {
    pub fn new(services: &'a PledgeServices<TSpec>, config: &'a PledgeConfig) -> Self {
        Self { services, config }
    }

    pub fn initiator(&self) -> ReclaimInitiator<'a, TSpec> {
        ReclaimInitiator {
            services: self.services,
            config: self.config,
            state: ReclaimState::CheckEligibility,
        }
    }

    /// Reclaims the pledged token `token_id` held on `origin_tms` into `wallet`, with the attestation of the issuer
    /// reachable at `issuer_node`. Returns the ID of the reclaiming transaction.
    pub async fn reclaim<W: Wallet + ?Sized>(
        &self,
        wallet: &W,
        token_id: &TokenId,
        origin_tms: &TmsId,
        issuer_node: &Identity,
        cancel: &CancellationToken,
    ) -> Result<String, ReclaimApiError> {
        self.initiator()
            .run(wallet, token_id, origin_tms, issuer_node, cancel)
            .await
    }

    /// Asks the issuer for its signature over the pledge ID. The returned signature is checked against the issuer
    /// named in `script` before it is handed out.
    pub async fn request_issuer_signature(
        &self,
        issuer_node: &Identity,
        origin_tms: &TmsId,
        token_id: &TokenId,
        script: &PledgeScript,
        proof: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ReclaimApiError> {
        let session = self.services.sessions.open_session(issuer_node).await?;
        let mut request = IssuerApprovalRequest {
            origin_tms_id: origin_tms.clone(),
            token_id: token_id.clone(),
            proof,
            destination: script.destination_network.clone(),
            requestor_signature: Vec::new(),
        };
        let signer = self.services.signature_service.get_signer(&script.sender)?;
        request.requestor_signature = signer.sign(&request.signing_message(&session.info().local)?)?;
        send_json(&session, &request).await?;

        let response =
            receive_json::<_, IssuerApprovalResponse>(&session, self.config.receive_timeout, cancel).await?;
        self.services
            .signature_service
            .owner_verifier(&script.issuer)?
            .verify(script.id.as_bytes(), &response.signature)
            .map_err(|e| ReclaimApiError::InvalidAttestation {
                pledge_id: script.id.clone(),
                details: e.to_string(),
            })?;
        debug!(target: LOG_TARGET, "Issuer attested reclaim of pledge {}", script.id);
        Ok(response.signature)
    }

    /// Serves one attestation request arriving on `session`. The issuer re-derives the pledge from its own view of
    /// the origin ledger and only signs once the deadline has passed and nothing was claimed.
    pub async fn respond_issuer_signature<S: Session + ?Sized, W: IssuerWallet + ?Sized>(
        &self,
        session: &S,
        wallet: &W,
        cancel: &CancellationToken,
    ) -> Result<(), ReclaimApiError> {
        let response = match self.approve_reclaim(session, wallet, cancel).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    "Refusing reclaim attestation to {}: {}",
                    session.info().caller,
                    err
                );
                send_abort(session, &err).await;
                return Err(err);
            },
        };
        send_json(session, &response).await?;
        Ok(())
    }

    async fn approve_reclaim<S: Session + ?Sized, W: IssuerWallet + ?Sized>(
        &self,
        session: &S,
        wallet: &W,
        cancel: &CancellationToken,
    ) -> Result<IssuerApprovalResponse, ReclaimApiError> {
        let request =
            receive_json::<_, IssuerApprovalRequest>(session, self.config.receive_timeout, cancel).await?;
        let (_, script) = TokensApi::new().get_pledged_token(wallet, &request.token_id)?;
        if !wallet.contains_identity(&script.issuer) {
            return Err(ReclaimApiError::NotIssuer {
                pledge_id: script.id.clone(),
            });
        }

        let now = self.services.clock.now();
        if !script.is_expired(now) {
            return Err(ReclaimApiError::DeadlineNotElapsed {
                pledge_id: script.id.clone(),
                deadline: script.deadline,
                now,
            });
        }
        if request.destination != script.destination_network {
            return Err(ReclaimApiError::DestinationMismatch {
                pledge_id: script.id.clone(),
                requested: request.destination.clone(),
                expected: script.destination_network.clone(),
            });
        }

        self.services
            .signature_service
            .owner_verifier(&script.sender)?
            .verify(
                &request.signing_message(&session.info().caller)?,
                &request.requestor_signature,
            )
            .map_err(|e| ReclaimApiError::RequestAuthenticationFailed {
                pledge_id: script.id.clone(),
                details: e.to_string(),
            })?;

        let origin_url = self.services.network.interop_url(&request.origin_tms_id)?;
        ProofsApi::new(&self.services.state_services).verify_non_existence(
            &script.destination_network,
            &request.proof,
            &request.token_id,
            &origin_url,
            script.deadline,
        )?;

        IssuerLedgerApi::new(&self.services.store).record(
            &origin_url,
            &request.token_id,
            Some(&script.id),
            IssuerDecision::ReclaimApproved,
            now,
        )?;

        let signature = self
            .services
            .signature_service
            .get_signer(&script.issuer)?
            .sign(script.id.as_bytes())?;
        self.services
            .signature_service
            .owner_verifier(&script.issuer)?
            .verify(script.id.as_bytes(), &signature)?;
        info!(
            target: LOG_TARGET,
            "Attested reclaim of pledge {} for token {}", script.id, request.token_id
        );
        Ok(IssuerApprovalResponse { signature })
    }
}

/// Drives one reclaim from the sender's side.
pub struct ReclaimInitiator<'a, TSpec: PledgeSpec> {
    services: &'a PledgeServices<TSpec>,
    config: &'a PledgeConfig,
    state: ReclaimState,
}

impl<'a, TSpec: PledgeSpec> ReclaimInitiator<'a, TSpec> {
    pub fn state(&self) -> &ReclaimState {
        &self.state
    }

    pub async fn run<W: Wallet + ?Sized>(
        &mut self,
        wallet: &W,
        token_id: &TokenId,
        origin_tms: &TmsId,
        issuer_node: &Identity,
        cancel: &CancellationToken,
    ) -> Result<String, ReclaimApiError> {
        match self.run_inner(wallet, token_id, origin_tms, issuer_node, cancel).await {
            Ok(tx_id) => Ok(tx_id),
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    "Reclaim of {} aborted in state {}: {}", token_id, self.state, err
                );
                self.state = ReclaimState::Aborted(err.to_string());
                Err(err)
            },
        }
    }

    async fn run_inner<W: Wallet + ?Sized>(
        &mut self,
        wallet: &W,
        token_id: &TokenId,
        origin_tms: &TmsId,
        issuer_node: &Identity,
        cancel: &CancellationToken,
    ) -> Result<String, ReclaimApiError> {
        let (token, script) = TokensApi::new().get_pledged_token(wallet, token_id)?;
        if !wallet.contains_identity(&script.sender) {
            return Err(ReclaimApiError::NotSender {
                pledge_id: script.id.clone(),
            });
        }
        let now = self.services.clock.now();
        if !script.is_expired(now) {
            return Err(ReclaimApiError::DeadlineNotElapsed {
                pledge_id: script.id.clone(),
                deadline: script.deadline,
                now,
            });
        }

        self.transition(&script, ReclaimState::AwaitProof);
        let origin_url = self.services.network.interop_url(origin_tms)?;
        let proof = ProofsApi::new(&self.services.state_services)
            .request_non_existence_proof(&script.destination_network, token_id, &origin_url, script.deadline)
            .await?;

        self.transition(&script, ReclaimState::AwaitIssuerResponse);
        let api = ReclaimApi::<TSpec>::new(self.services, self.config);
        let attestation = api
            .request_issuer_signature(issuer_node, origin_tms, token_id, &script, proof.clone(), cancel)
            .await?;

        self.transition(&script, ReclaimState::Spending);
        let signature_service = &self.services.signature_service;
        let signer = PledgeSigner::reclaim(signature_service.get_signer(&script.sender)?, attestation);
        let verifier = PledgeVerifier::from_script(&script, signature_service)?;
        signature_service.register_signer(&token.owner, Arc::new(signer), Arc::new(verifier))?;
        let owner_identity = Identity::new(token.owner.clone());
        self.services.endpoint_binder.bind(&script.sender, &owner_identity)?;

        let mut transaction = self.services.transactions.new_anonymous_transaction(origin_tms)?;
        transaction.transfer(
            wallet,
            &token.token_type,
            vec![token.quantity],
            vec![encode_identity_owner(&script.sender)?],
            TransferOptions::default()
                .with_token_ids(vec![token_id.clone()])
                .with_metadata(reclaim_key(token_id), proof),
        )?;
        self.services.transactions.collect_endorsements(&mut transaction).await?;
        self.services
            .transactions
            .order_and_await_finality(&transaction)
            .await?;

        let vault = PledgeVaultApi::new(&self.services.store);
        let records = vault.pledge_by_token_id(token_id)?;
        vault.delete(&records)?;
        self.transition(&script, ReclaimState::Accepted);
        info!(
            target: LOG_TARGET,
            "Reclaimed pledge {} ({}) in transaction {}",
            script.id,
            token_id,
            transaction.id()
        );
        Ok(transaction.id().to_string())
    }

    fn transition(&mut self, script: &PledgeScript, next: ReclaimState) {
        debug!(target: LOG_TARGET, "Reclaim of pledge {}: {} -> {}", script.id, self.state, next);
        self.state = next;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReclaimApiError {
    #[error("Tokens error: {0}")]
    TokensError(#[from] TokensApiError),
    #[error("Vault error: {0}")]
    VaultError(#[from] PledgeVaultError),
    #[error("Proof error: {0}")]
    ProofError(#[from] ProofsApiError),
    #[error("Session error: {0}")]
    SessionError(#[from] SessionError),
    #[error("Signature error: {0}")]
    SignatureError(#[from] SignatureError),
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("Wallet error: {0}")]
    WalletError(#[from] WalletError),
    #[error("Owner codec error: {0}")]
    OwnerCodec(#[from] OwnerCodecError),
    #[error("Issuer ledger error: {0}")]
    IssuerLedgerError(#[from] IssuerLedgerError),
    #[error("Network error: {0}")]
    NetworkError(#[from] NetworkError),
    #[error("Endpoint binder error: {0}")]
    EndpointBinderError(#[from] EndpointBinderError),
    #[error("Encoding error: {0}")]
    EncodingError(#[from] serde_json::Error),
    #[error("Pledge {pledge_id} was not sent by this wallet")]
    NotSender { pledge_id: String },
    #[error("Pledge {pledge_id} is not issued by this wallet")]
    NotIssuer { pledge_id: String },
    #[error("Deadline {deadline} of pledge {pledge_id} has not elapsed (now {now})")]
    DeadlineNotElapsed {
        pledge_id: String,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    #[error("Reclaim of pledge {pledge_id} names destination {requested}, expected {expected}")]
    DestinationMismatch {
        pledge_id: String,
        requested: String,
        expected: String,
    },
    #[error("Reclaim request for pledge {pledge_id} did not verify: {details}")]
    RequestAuthenticationFailed { pledge_id: String, details: String },
    #[error("Issuer attestation for pledge {pledge_id} did not verify: {details}")]
    InvalidAttestation { pledge_id: String, details: String },
}

impl CategorizedError for ReclaimApiError {
    fn category(&self) -> ErrorCategory {
        match self {
            ReclaimApiError::TokensError(e) => e.category(),
            ReclaimApiError::VaultError(e) => e.category(),
            ReclaimApiError::ProofError(e) => e.category(),
            ReclaimApiError::SessionError(e) => e.category(),
            ReclaimApiError::SignatureError(e) => e.category(),
            ReclaimApiError::TransactionError(e) => e.category(),
            ReclaimApiError::WalletError(e) => e.category(),
            ReclaimApiError::IssuerLedgerError(e) => e.category(),
            ReclaimApiError::OwnerCodec(_) | ReclaimApiError::EncodingError(_) => ErrorCategory::MalformedInput,
            ReclaimApiError::NetworkError(_) | ReclaimApiError::EndpointBinderError(_) => ErrorCategory::Collaborator,
            ReclaimApiError::DeadlineNotElapsed { .. } => ErrorCategory::Timing,
            ReclaimApiError::DestinationMismatch { .. } => ErrorCategory::MalformedInput,
            ReclaimApiError::NotSender { .. } |
            ReclaimApiError::NotIssuer { .. } |
            ReclaimApiError::RequestAuthenticationFailed { .. } |
            ReclaimApiError::InvalidAttestation { .. } => ErrorCategory::Authorization,
        }
    }
}
