//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use log::*;
use tokio_util::sync::CancellationToken;

use crate::{
    apis::{
        issuer_ledger::{IssuerDecision, IssuerLedgerApi, IssuerLedgerError},
        proofs::{ProofsApi, ProofsApiError},
        send_abort,
        vault::{PledgeVaultApi, PledgeVaultError},
    },
    clock::Clock,
    config::PledgeConfig,
    errors::{CategorizedError, ErrorCategory},
    metadata::ClaimMetadata,
    models::{ClaimAcceptance, ClaimRequest, Identity, PledgeInfo, PledgeScript, TmsId, TokenId, UnspentToken},
    network::{NetworkDirectory, NetworkError},
    owner::{encode_identity_owner, OwnerCodecError, TypedOwner},
    sdk::PledgeServices,
    session::{receive_json, receive_within, send_json, Session, SessionError, SessionOpener},
    signature::{EndpointBinder, EndpointBinderError, SignatureError, SignatureService, Signer, Verifier},
    spec::PledgeSpec,
    transaction::{IssueOptions, TokenRequest, TransactionError, TransactionService},
    wallet::{IssuerWallet, Wallet, WalletError},
};

const LOG_TARGET: &str = "tari::dan::interop::pledge::apis::claim";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimState {
    LookupPledge,
    AwaitProof,
    OpenSession,
    AwaitIssuerResponse,
    Accepting,
    Accepted,
    Aborted(String),
}

impl Display for ClaimState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimState::LookupPledge => write!(f, "LookupPledge"),
            ClaimState::AwaitProof => write!(f, "AwaitProof"),
            ClaimState::OpenSession => write!(f, "OpenSession"),
            ClaimState::AwaitIssuerResponse => write!(f, "AwaitIssuerResponse"),
            ClaimState::Accepting => write!(f, "Accepting"),
            ClaimState::Accepted => write!(f, "Accepted"),
            ClaimState::Aborted(reason) => write!(f, "Aborted({})", reason),
        }
    }
}

/// The claim protocol. The recipient of a pledge initiates it with the issuer of the destination network, which
/// responds by issuing an equivalent token to the recipient.
pub struct ClaimApi<'a, TSpec: PledgeSpec> {
    services: &'a PledgeServices<TSpec>,
    config: &'a PledgeConfig,
}

impl<'a, TSpec: PledgeSpec> ClaimApi<'a, TSpec> {
    pub fn new(services: &'a PledgeServices<TSpec>, config: &'a PledgeConfig) -> Self {
        Self { services, config }
    }

    pub fn initiator(&self) -> ClaimInitiator<'a, TSpec> {
        ClaimInitiator {
            services: self.services,
            config: self.config,
            state: ClaimState::LookupPledge,
        }
    }

    /// Claims the pledged token `token_id` for `wallet` from the issuer reachable at `issuer_node`. Returns the ID of
    /// the issuing transaction.
    pub async fn claim<W: Wallet + ?Sized>(
        &self,
        wallet: &W,
        token_id: &TokenId,
        issuer_node: &Identity,
        cancel: &CancellationToken,
    ) -> Result<String, ClaimApiError> {
        self.initiator().run(wallet, token_id, issuer_node, cancel).await
    }

    /// Serves one claim request arriving on `session`, issuing on `destination_tms` from `wallet`. Returns the ID of
    /// the issuing transaction.
    pub async fn respond_claim<S: Session + ?Sized, W: IssuerWallet + ?Sized>(
        &self,
        session: &S,
        wallet: &W,
        destination_tms: &TmsId,
        cancel: &CancellationToken,
    ) -> Result<String, ClaimApiError> {
        let request = match self.receive_claim_request(session, cancel).await {
            Ok(request) => request,
            Err(err) => {
                warn!(target: LOG_TARGET, "Rejecting claim request from {}: {}", session.info().caller, err);
                send_abort(session, &err).await;
                return Err(err);
            },
        };

        let provisional = match self.hold_provisional_record(&request, destination_tms) {
            Ok(provisional) => provisional,
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    "Rejecting claim of {} from {}: {}", request.origin_token_id, request.origin_network, err
                );
                send_abort(session, &err).await;
                return Err(err);
            },
        };

        let result = self
            .serve_claim(session, wallet, &request, &provisional, destination_tms, cancel)
            .await;
        if let Err(err) = PledgeVaultApi::new(&self.services.store).delete(std::slice::from_ref(&provisional)) {
            error!(
                target: LOG_TARGET,
                "Failed to remove provisional record for {}: {}", request.origin_token_id, err
            );
        }
        result
    }

    /// Stores the pledge the request claims to redeem as a provisional vault record. A claim of the same token that
    /// is still being served holds an identical record, and this request is then refused.
    pub fn hold_provisional_record(
        &self,
        request: &ClaimRequest,
        destination_tms: &TmsId,
    ) -> Result<PledgeInfo, ClaimApiError> {
        let destination_url = self.services.network.interop_url(destination_tms)?;
        let provisional = PledgeInfo {
            source: request.origin_network.clone(),
            token_type: request.token_type.clone(),
            amount: request.quantity,
            token_id: request.origin_token_id.clone(),
            token_metadata: Vec::new(),
            script: PledgeScript {
                sender: Identity::default(),
                recipient: request.recipient.clone(),
                issuer: Identity::default(),
                destination_network: destination_url,
                deadline: request.claim_deadline,
                id: String::new(),
            },
        };
        if !PledgeVaultApi::new(&self.services.store).store_pledge_once(&provisional)? {
            return Err(ClaimApiError::ClaimInProgress {
                token_id: request.origin_token_id.clone(),
            });
        }
        Ok(provisional)
    }

    /// Checks a claim request against local state. The supplied proof must show the pledge on the origin network, and
    /// the pledged token must match the single provisional record held for it. The claim deadline must not have
    /// passed.
    pub fn validate_claim_request(&self, request: &ClaimRequest) -> Result<(), ClaimApiError> {
        let provisional =
            PledgeVaultApi::new(&self.services.store).single_pledge_by_token_id(&request.origin_token_id)?;

        let proven = ProofsApi::new(&self.services.state_services).verify_existence(
            &request.origin_network,
            &request.pledge_proof,
            &request.origin_token_id,
            &[],
        )?;
        check_proven_pledge(&proven, &provisional)?;

        let now = self.services.clock.now();
        if now >= request.claim_deadline {
            return Err(ClaimApiError::DeadlineElapsed {
                deadline: request.claim_deadline,
                now,
            });
        }
        Ok(())
    }

    async fn serve_claim<S: Session + ?Sized, W: IssuerWallet + ?Sized>(
        &self,
        session: &S,
        wallet: &W,
        request: &ClaimRequest,
        provisional: &PledgeInfo,
        destination_tms: &TmsId,
        cancel: &CancellationToken,
    ) -> Result<String, ClaimApiError> {
        if let Err(err) = self.validate_claim_request(request) {
            warn!(
                target: LOG_TARGET,
                "Rejecting claim of {} from {}: {}", request.origin_token_id, request.origin_network, err
            );
            send_abort(session, &err).await;
            return Err(err);
        }

        let issuer_ledger = IssuerLedgerApi::new(&self.services.store);
        let now = self.services.clock.now();
        if let Err(err) = issuer_ledger.record(
            &provisional.source,
            &provisional.token_id,
            None,
            IssuerDecision::Claimed,
            now,
        ) {
            let err = ClaimApiError::from(err);
            send_abort(session, &err).await;
            return Err(err);
        }

        let transaction = match self
            .prepare_claim_transaction(session, wallet, request, destination_tms, cancel)
            .await
        {
            Ok(transaction) => transaction,
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    "Claim of {} aborted before ordering: {}", request.origin_token_id, err
                );
                if let Err(release_err) = issuer_ledger.release_claim(&provisional.source, &provisional.token_id) {
                    error!(
                        target: LOG_TARGET,
                        "Failed to release claim reservation for {}: {}", request.origin_token_id, release_err
                    );
                }
                send_abort(session, &err).await;
                return Err(err);
            },
        };

        // Past this point the issuance may reach the ledger, so the reservation stays in place
        if let Err(err) = self.services.transactions.order_and_await_finality(&transaction).await {
            let err = ClaimApiError::from(err);
            send_abort(session, &err).await;
            return Err(err);
        }
        info!(
            target: LOG_TARGET,
            "Issued {} {} to {} for claim of {} in transaction {}",
            request.quantity,
            request.token_type,
            request.recipient,
            request.origin_token_id,
            transaction.id()
        );
        Ok(transaction.id().to_string())
    }

    async fn receive_claim_request<S: Session + ?Sized>(
        &self,
        session: &S,
        cancel: &CancellationToken,
    ) -> Result<ClaimRequest, ClaimApiError> {
        let request = receive_json::<_, ClaimRequest>(session, self.config.receive_timeout, cancel).await?;
        let caller = &session.info().caller;
        let verifier = self.services.signature_service.owner_verifier(&request.recipient)?;
        verifier
            .verify(&request.signing_message(caller)?, &request.requestor_signature)
            .map_err(|e| ClaimApiError::RequestAuthenticationFailed {
                recipient: request.recipient.clone(),
                details: e.to_string(),
            })?;

        self.services.endpoint_binder.bind(caller, &request.recipient)?;
        self.services
            .signature_service
            .register_recipient_identity(&request.recipient, &request.recipient_audit_info)?;
        debug!(
            target: LOG_TARGET,
            "Claim request for {} from {} authenticated", request.origin_token_id, caller
        );
        Ok(request)
    }

    async fn prepare_claim_transaction<S: Session + ?Sized, W: IssuerWallet + ?Sized>(
        &self,
        session: &S,
        wallet: &W,
        request: &ClaimRequest,
        destination_tms: &TmsId,
        cancel: &CancellationToken,
    ) -> Result<TSpec::Transaction, ClaimApiError> {
        let mut transaction = self.services.transactions.new_anonymous_transaction(destination_tms)?;
        let claim = ClaimMetadata {
            origin_token_id: request.origin_token_id.clone(),
            origin_network: request.origin_network.clone(),
            proof: request.pledge_proof.clone(),
        };
        transaction.issue(
            wallet,
            encode_identity_owner(&request.recipient)?,
            &request.token_type,
            request.quantity,
            IssueOptions {
                metadata: claim.to_metadata()?,
            },
        )?;
        self.services.transactions.collect_endorsements(&mut transaction).await?;

        let transaction_bytes = transaction.to_bytes()?;
        session.send(transaction_bytes.clone()).await?;
        let acceptance = receive_json::<_, ClaimAcceptance>(session, self.config.receive_timeout, cancel).await?;
        if acceptance.tx_id != transaction.id() {
            return Err(ClaimApiError::InvalidAcceptance {
                details: format!("acceptance is for {}, expected {}", acceptance.tx_id, transaction.id()),
            });
        }
        self.services
            .signature_service
            .owner_verifier(&request.recipient)?
            .verify(&transaction_bytes, &acceptance.signature)
            .map_err(|e| ClaimApiError::InvalidAcceptance { details: e.to_string() })?;
        Ok(transaction)
    }
}

/// Drives one claim from the recipient's side.
pub struct ClaimInitiator<'a, TSpec: PledgeSpec> {
    services: &'a PledgeServices<TSpec>,
    config: &'a PledgeConfig,
    state: ClaimState,
}

impl<'a, TSpec: PledgeSpec> ClaimInitiator<'a, TSpec> {
    pub fn state(&self) -> &ClaimState {
        &self.state
    }

    pub async fn run<W: Wallet + ?Sized>(
        &mut self,
        wallet: &W,
        token_id: &TokenId,
        issuer_node: &Identity,
        cancel: &CancellationToken,
    ) -> Result<String, ClaimApiError> {
        match self.run_inner(wallet, token_id, issuer_node, cancel).await {
            Ok(tx_id) => Ok(tx_id),
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    "Claim of {} aborted in state {}: {}", token_id, self.state, err
                );
                self.state = ClaimState::Aborted(err.to_string());
                Err(err)
            },
        }
    }

    async fn run_inner<W: Wallet + ?Sized>(
        &mut self,
        wallet: &W,
        token_id: &TokenId,
        issuer_node: &Identity,
        cancel: &CancellationToken,
    ) -> Result<String, ClaimApiError> {
        let vault = PledgeVaultApi::new(&self.services.store);
        let info = vault.single_pledge_by_token_id(token_id)?;
        let recipient = info.script.recipient.clone();
        if !wallet.contains_identity(&recipient) {
            return Err(ClaimApiError::NotRecipient {
                pledge_id: info.script.id.clone(),
            });
        }

        self.transition(token_id, ClaimState::AwaitProof);
        let proof = ProofsApi::new(&self.services.state_services)
            .request_existence_proof(&info.source, token_id)
            .await?;

        self.transition(token_id, ClaimState::OpenSession);
        let session = self.services.sessions.open_session(issuer_node).await?;
        let mut request = ClaimRequest {
            token_type: info.token_type.clone(),
            quantity: info.amount,
            recipient: recipient.clone(),
            recipient_audit_info: wallet.audit_info(&recipient)?,
            claim_deadline: info.script.deadline,
            origin_token_id: token_id.clone(),
            origin_network: info.source.clone(),
            pledge_proof: proof,
            requestor_signature: Vec::new(),
        };
        let signer = self.services.signature_service.get_signer(&recipient)?;
        request.requestor_signature = signer.sign(&request.signing_message(&session.info().local)?)?;
        send_json(&session, &request).await?;

        self.transition(token_id, ClaimState::AwaitIssuerResponse);
        let transaction_bytes = receive_within(&session, self.config.receive_timeout, cancel).await?;
        let transaction = TSpec::Transaction::from_bytes(&transaction_bytes)?;

        self.transition(token_id, ClaimState::Accepting);
        if let Err(err) = check_claim_outputs(&transaction, &info, wallet) {
            send_abort(&session, &err).await;
            return Err(err);
        }
        let acceptance = ClaimAcceptance {
            tx_id: transaction.id().to_string(),
            signature: signer.sign(&transaction_bytes)?,
        };
        send_json(&session, &acceptance).await?;
        self.services
            .transactions
            .await_finality(transaction.id(), self.config.finality_timeout)
            .await?;

        vault.delete(&[info])?;
        self.transition(token_id, ClaimState::Accepted);
        info!(
            target: LOG_TARGET,
            "Claimed {} as transaction {}", token_id, transaction.id()
        );
        Ok(transaction.id().to_string())
    }

    fn transition(&mut self, token_id: &TokenId, next: ClaimState) {
        debug!(target: LOG_TARGET, "Claim of {}: {} -> {}", token_id, self.state, next);
        self.state = next;
    }
}

/// The token shown by the existence proof must carry what the claim asks for, locked by a script that names the
/// same recipient, destination network and deadline.
fn check_proven_pledge(proven: &UnspentToken, provisional: &PledgeInfo) -> Result<(), ClaimApiError> {
    let mismatch = |details: String| ClaimApiError::PledgeMismatch {
        token_id: provisional.token_id.clone(),
        details,
    };
    if proven.id != provisional.token_id {
        return Err(mismatch(format!("proof is for token {}", proven.id)));
    }
    if proven.token_type != provisional.token_type {
        return Err(mismatch(format!(
            "requested type {} but {} was pledged",
            provisional.token_type, proven.token_type
        )));
    }
    if proven.quantity != provisional.amount {
        return Err(mismatch(format!(
            "requested {} but {} was pledged",
            provisional.amount, proven.quantity
        )));
    }
    let script = match TypedOwner::decode(&proven.owner)? {
        TypedOwner::Pledge(script) => script,
        other => return Err(mismatch(format!("token is held by a {} owner", other.kind()))),
    };
    if script.recipient != provisional.script.recipient {
        return Err(mismatch(format!(
            "pledge is for {}, not {}",
            script.recipient, provisional.script.recipient
        )));
    }
    if script.destination_network != provisional.script.destination_network {
        return Err(mismatch(format!(
            "pledge is for {}, not {}",
            script.destination_network, provisional.script.destination_network
        )));
    }
    if script.deadline != provisional.script.deadline {
        return Err(mismatch(format!(
            "pledge deadline is {}, not {}",
            script.deadline, provisional.script.deadline
        )));
    }
    Ok(())
}

/// The issuance must pay the pledged amount and type to one of the recipient's identities in its first output.
fn check_claim_outputs<T: TokenRequest, W: Wallet + ?Sized>(
    transaction: &T,
    info: &PledgeInfo,
    wallet: &W,
) -> Result<(), ClaimApiError> {
    let outputs = transaction.outputs()?;
    let mismatch = |details: String| ClaimApiError::OutputMismatch {
        pledge_id: info.script.id.clone(),
        details,
    };
    let output = outputs
        .at(0)
        .ok_or_else(|| mismatch("transaction has no outputs".to_string()))?;
    if outputs.by_recipient(&info.script.recipient).count() == 0 {
        return Err(mismatch("no output is owned by the recipient".to_string()));
    }
    match output.typed_owner()? {
        TypedOwner::Identity(owner) if wallet.contains_identity(&owner) => {},
        other => {
            return Err(mismatch(format!("first output is owned by a {} owner that is not mine", other.kind())));
        },
    }
    if output.quantity != info.amount {
        return Err(mismatch(format!(
            "quantity {} does not match pledged amount {}",
            output.quantity, info.amount
        )));
    }
    if output.token_type != info.token_type {
        return Err(mismatch(format!(
            "type {} does not match pledged type {}",
            output.token_type, info.token_type
        )));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ClaimApiError {
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
    #[error("Pledge {pledge_id} is not for this wallet")]
    NotRecipient { pledge_id: String },
    #[error("Claim request signature of {recipient} did not verify: {details}")]
    RequestAuthenticationFailed { recipient: Identity, details: String },
    #[error("Claim deadline {deadline} has elapsed (now {now})")]
    DeadlineElapsed { deadline: DateTime<Utc>, now: DateTime<Utc> },
    #[error("Claim transaction for pledge {pledge_id} rejected: {details}")]
    OutputMismatch { pledge_id: String, details: String },
    #[error("Invalid claim acceptance: {details}")]
    InvalidAcceptance { details: String },
    #[error("Claim of {token_id} does not match the pledge: {details}")]
    PledgeMismatch { token_id: TokenId, details: String },
    #[error("A claim of {token_id} is already being served")]
    ClaimInProgress { token_id: TokenId },
}

impl CategorizedError for ClaimApiError {
    fn category(&self) -> ErrorCategory {
        match self {
            ClaimApiError::VaultError(e) => e.category(),
            ClaimApiError::ProofError(e) => e.category(),
            ClaimApiError::SessionError(e) => e.category(),
            ClaimApiError::SignatureError(e) => e.category(),
            ClaimApiError::TransactionError(e) => e.category(),
            ClaimApiError::WalletError(e) => e.category(),
            ClaimApiError::IssuerLedgerError(e) => e.category(),
            ClaimApiError::OwnerCodec(_) | ClaimApiError::EncodingError(_) => ErrorCategory::MalformedInput,
            ClaimApiError::NetworkError(_) | ClaimApiError::EndpointBinderError(_) => ErrorCategory::Collaborator,
            ClaimApiError::NotRecipient { .. } |
            ClaimApiError::RequestAuthenticationFailed { .. } |
            ClaimApiError::OutputMismatch { .. } |
            ClaimApiError::PledgeMismatch { .. } |
            ClaimApiError::InvalidAcceptance { .. } => ErrorCategory::Authorization,
            ClaimApiError::ClaimInProgress { .. } => ErrorCategory::StateConsistency,
            ClaimApiError::DeadlineElapsed { .. } => ErrorCategory::Timing,
        }
    }
}
