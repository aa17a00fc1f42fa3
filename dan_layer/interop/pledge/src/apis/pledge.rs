//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::time::Duration;

use log::*;
use tokio_util::sync::CancellationToken;

use crate::{
    apis::{
        send_abort,
        tokens::{TokensApi, TokensApiError},
        vault::{PledgeVaultApi, PledgeVaultError},
    },
    clock::Clock,
    config::PledgeConfig,
    errors::{CategorizedError, ErrorCategory},
    metadata::pledge_key,
    models::{
        new_pledge_id,
        Identity,
        PledgeInfo,
        PledgeInfoAck,
        PledgeScript,
        RecipientData,
        RecipientRequest,
        ScriptError,
        TmsId,
        TokenId,
    },
    network::{NetworkDirectory, NetworkError},
    owner::{encode_pledge_owner, OwnerCodecError},
    sdk::PledgeServices,
    session::{receive_json, send_json, Session, SessionError, SessionOpener},
    signature::{script_audit_info, EndpointBinder, EndpointBinderError, SignatureError, SignatureService},
    spec::PledgeSpec,
    transaction::{TokenRequest, TransactionError, TransactionService, TransferOptions},
    wallet::{Wallet, WalletError},
};

const LOG_TARGET: &str = "tari::dan::interop::pledge::apis::pledge";

#[derive(Debug, Clone)]
pub struct PledgeRequest {
    pub destination_network: String,
    /// Time until the sender may reclaim. Zero selects the configured default.
    pub deadline: Duration,
    pub recipient: Identity,
    pub issuer: Identity,
    pub token_type: String,
    pub amount: u64,
}

/// Sender and recipient operations around creating a pledge and handing its record over.
pub struct PledgeApi<'a, TSpec: PledgeSpec> {
    services: &'a PledgeServices<TSpec>,
    config: &'a PledgeConfig,
}

impl<'a, TSpec: PledgeSpec> PledgeApi<'a, TSpec> {
    pub fn new(services: &'a PledgeServices<TSpec>, config: &'a PledgeConfig) -> Self {
        Self { services, config }
    }

    pub fn new_transaction(&self, origin_tms: &TmsId) -> Result<TSpec::Transaction, PledgeApiError> {
        Ok(self.services.transactions.new_anonymous_transaction(origin_tms)?)
    }

    /// Adds to `transaction` a transfer of `amount` tokens from `wallet` to an output locked by a new pledge script.
    /// Returns the pledge ID.
    pub fn pledge<W: Wallet + ?Sized>(
        &self,
        transaction: &mut TSpec::Transaction,
        wallet: &W,
        request: &PledgeRequest,
    ) -> Result<String, PledgeApiError> {
        if request.destination_network.is_empty() {
            return Err(PledgeApiError::InvalidRequest {
                details: "destination network is empty".to_string(),
            });
        }
        if request.recipient.is_none() || request.issuer.is_none() {
            return Err(PledgeApiError::InvalidRequest {
                details: "recipient and issuer must be set".to_string(),
            });
        }
        if request.amount == 0 {
            return Err(PledgeApiError::InvalidRequest {
                details: "amount must be greater than zero".to_string(),
            });
        }

        let lock_duration = if request.deadline.is_zero() {
            self.config.default_deadline
        } else {
            request.deadline
        };
        let lock_duration =
            chrono::Duration::from_std(lock_duration).map_err(|e| PledgeApiError::InvalidRequest {
                details: format!("deadline out of range: {}", e),
            })?;
        let now = self.services.clock.now();
        let deadline = now
            .checked_add_signed(lock_duration)
            .ok_or_else(|| PledgeApiError::InvalidRequest {
                details: format!("deadline {:?} from {} is out of range", request.deadline, now),
            })?;
        let script = PledgeScript {
            sender: wallet.recipient_identity()?,
            recipient: request.recipient.clone(),
            issuer: request.issuer.clone(),
            destination_network: request.destination_network.clone(),
            deadline,
            id: new_pledge_id(),
        };
        script.well_formedness(now)?;

        let script_info = script_audit_info(&script, |identity| {
            if wallet.contains_identity(identity) {
                return wallet
                    .audit_info(identity)
                    .map(Some)
                    .map_err(|e| SignatureError::Upstream(e.into()));
            }
            self.services.signature_service.audit_info(identity)
        })?;
        let script_info = script_info
            .to_bytes()
            .map_err(|e| PledgeApiError::EncodingFailed { details: e.to_string() })?;

        let options = TransferOptions::default()
            .with_owner_audit_info(script_info)
            .with_metadata(pledge_key(&script.id), script.id.as_bytes().to_vec());
        transaction.transfer(
            wallet,
            &request.token_type,
            vec![request.amount],
            vec![encode_pledge_owner(&script)?],
            options,
        )?;

        info!(
            target: LOG_TARGET,
            "Pledged {} {} to {} on {} in transaction {} (pledge {}, deadline {})",
            request.amount,
            request.token_type,
            script.recipient,
            script.destination_network,
            transaction.id(),
            script.id,
            script.deadline
        );
        Ok(script.id)
    }

    /// Endorses, orders and waits for finality of a pledge transaction.
    pub async fn commit(&self, transaction: &mut TSpec::Transaction) -> Result<(), PledgeApiError> {
        self.services.transactions.collect_endorsements(transaction).await?;
        self.services.transactions.order_and_await_finality(transaction).await?;
        info!(target: LOG_TARGET, "Pledge transaction {} committed", transaction.id());
        Ok(())
    }

    /// Builds the record of pledge `pledge_id` from the transaction that created it.
    pub fn pledge_info_from_transaction(
        &self,
        transaction: &TSpec::Transaction,
        origin_tms: &TmsId,
        pledge_id: &str,
    ) -> Result<PledgeInfo, PledgeApiError> {
        let source = self.services.network.interop_url(origin_tms)?;
        for output in transaction.outputs()?.by_script().iter() {
            let script = output.typed_owner()?.into_pledge()?;
            if script.id == pledge_id {
                return Ok(PledgeInfo {
                    source,
                    token_type: output.token_type.clone(),
                    amount: output.quantity,
                    token_id: TokenId::new(transaction.id(), output.index),
                    token_metadata: Vec::new(),
                    script,
                });
            }
        }
        Err(PledgeApiError::PledgeOutputNotFound {
            pledge_id: pledge_id.to_string(),
            tx_id: transaction.id().to_string(),
        })
    }

    /// Re-derives the record of the pledged token `token_id` from the sender's unspent tokens.
    pub fn rebuild_pledge_info<W: Wallet + ?Sized>(
        &self,
        wallet: &W,
        token_id: &TokenId,
        origin_tms: &TmsId,
    ) -> Result<PledgeInfo, PledgeApiError> {
        let (token, script) = TokensApi::new().get_pledged_token(wallet, token_id)?;
        Ok(PledgeInfo {
            source: self.services.network.interop_url(origin_tms)?,
            token_type: token.token_type,
            amount: token.quantity,
            token_id: token.id,
            token_metadata: Vec::new(),
            script,
        })
    }

    /// Sends the record to the recipient of the pledge and waits for its acknowledgement. The sender keeps its own
    /// copy once the recipient has acknowledged.
    pub async fn distribute_pledge_info(
        &self,
        info: &PledgeInfo,
        cancel: &CancellationToken,
    ) -> Result<PledgeInfoAck, PledgeApiError> {
        let session = self.services.sessions.open_session(&info.script.recipient).await?;
        let ack = self.send_pledge_info(&session, info, cancel).await?;
        PledgeVaultApi::new(&self.services.store).store_pledge_once(info)?;
        Ok(ack)
    }

    /// Sends the record over an open session and waits for the acknowledgement.
    pub async fn send_pledge_info<S: Session + ?Sized>(
        &self,
        session: &S,
        info: &PledgeInfo,
        cancel: &CancellationToken,
    ) -> Result<PledgeInfoAck, PledgeApiError> {
        send_json(session, info).await?;
        let ack = receive_json::<_, PledgeInfoAck>(session, self.config.receive_timeout, cancel).await?;
        if ack.token_id != info.token_id {
            return Err(PledgeApiError::UnexpectedAck {
                expected: info.token_id.clone(),
                received: ack.token_id,
            });
        }
        info!(
            target: LOG_TARGET,
            "Recipient acknowledged pledge {} (stored: {})", info.script.id, ack.stored
        );
        Ok(ack)
    }

    /// Sends the record again, rebuilt from ledger data.
    pub async fn resend_pledge_info<W: Wallet + ?Sized>(
        &self,
        wallet: &W,
        token_id: &TokenId,
        origin_tms: &TmsId,
        cancel: &CancellationToken,
    ) -> Result<PledgeInfoAck, PledgeApiError> {
        let info = self.rebuild_pledge_info(wallet, token_id, origin_tms)?;
        info!(target: LOG_TARGET, "Resending pledge {} for token {}", info.script.id, token_id);
        self.distribute_pledge_info(&info, cancel).await
    }

    /// Reads a pledge record sent to `wallet`.
    pub async fn receive_pledge_info<S: Session + ?Sized, W: Wallet + ?Sized>(
        &self,
        session: &S,
        wallet: &W,
        cancel: &CancellationToken,
    ) -> Result<PledgeInfo, PledgeApiError> {
        let info = receive_json::<_, PledgeInfo>(session, self.config.receive_timeout, cancel).await?;
        let checked = info
            .script
            .check_fields()
            .map_err(PledgeApiError::from)
            .and_then(|_| {
                if wallet.contains_identity(&info.script.recipient) {
                    Ok(())
                } else {
                    Err(PledgeApiError::NotRecipient {
                        pledge_id: info.script.id.clone(),
                        recipient: info.script.recipient.clone(),
                    })
                }
            });
        if let Err(err) = checked {
            warn!(target: LOG_TARGET, "Rejecting pledge record {}: {}", info.script.id, err);
            send_abort(session, &err).await;
            return Err(err);
        }
        Ok(info)
    }

    /// Stores a received record and acknowledges it. An identical record that is already held is acknowledged
    /// without being stored again.
    pub async fn accept_pledge_info<S: Session + ?Sized>(
        &self,
        session: &S,
        info: &PledgeInfo,
    ) -> Result<bool, PledgeApiError> {
        let stored = match PledgeVaultApi::new(&self.services.store).store_pledge_once(info) {
            Ok(stored) => stored,
            Err(err) => {
                send_abort(session, &err).await;
                return Err(err.into());
            },
        };
        send_json(session, &PledgeInfoAck {
            token_id: info.token_id.clone(),
            stored,
        })
        .await?;
        info!(
            target: LOG_TARGET,
            "Accepted pledge {} for token {} (stored: {})", info.script.id, info.token_id, stored
        );
        Ok(stored)
    }

    /// Asks the node `recipient_node` for an identity to pledge to on `destination_network`, and remembers that the
    /// node answers for it.
    pub async fn request_pledge_recipient_identity(
        &self,
        recipient_node: &Identity,
        destination_network: &str,
        cancel: &CancellationToken,
    ) -> Result<Identity, PledgeApiError> {
        let session = self.services.sessions.open_session(recipient_node).await?;
        send_json(&session, &RecipientRequest {
            network: destination_network.to_string(),
        })
        .await?;
        let data = receive_json::<_, RecipientData>(&session, self.config.receive_timeout, cancel).await?;
        if data.identity.is_none() {
            return Err(PledgeApiError::InvalidRequest {
                details: "recipient returned an empty identity".to_string(),
            });
        }
        self.services
            .signature_service
            .register_recipient_identity(&data.identity, &data.audit_info)?;
        self.services.endpoint_binder.bind(recipient_node, &data.identity)?;
        debug!(
            target: LOG_TARGET,
            "Recipient identity {} received from {}", data.identity, recipient_node
        );
        Ok(data.identity)
    }

    /// Answers a recipient identity request with an identity of `wallet`.
    pub async fn respond_pledge_recipient_identity<S: Session + ?Sized, W: Wallet + ?Sized>(
        &self,
        session: &S,
        wallet: &W,
        cancel: &CancellationToken,
    ) -> Result<Identity, PledgeApiError> {
        let result = self.recipient_data(session, wallet, cancel).await;

        let data = match result {
            Ok(data) => data,
            Err(err) => {
                warn!(target: LOG_TARGET, "Refusing recipient identity request: {}", err);
                send_abort(session, &err).await;
                return Err(err);
            },
        };
        send_json(session, &data).await?;
        Ok(data.identity)
    }

    async fn recipient_data<S: Session + ?Sized, W: Wallet + ?Sized>(
        &self,
        session: &S,
        wallet: &W,
        cancel: &CancellationToken,
    ) -> Result<RecipientData, PledgeApiError> {
        let request = receive_json::<_, RecipientRequest>(session, self.config.receive_timeout, cancel).await?;
        if !self.services.network.serves(&request.network) {
            return Err(PledgeApiError::UnsupportedNetwork {
                network: request.network,
            });
        }
        let identity = wallet.recipient_identity()?;
        let audit_info = wallet.audit_info(&identity)?;
        Ok(RecipientData { identity, audit_info })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PledgeApiError {
    #[error("Invalid pledge request: {details}")]
    InvalidRequest { details: String },
    #[error("Invalid pledge script: {0}")]
    InvalidScript(#[from] ScriptError),
    #[error("Owner codec error: {0}")]
    OwnerCodec(#[from] OwnerCodecError),
    #[error("Encoding failed: {details}")]
    EncodingFailed { details: String },
    #[error("Signature error: {0}")]
    SignatureError(#[from] SignatureError),
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("Session error: {0}")]
    SessionError(#[from] SessionError),
    #[error("Vault error: {0}")]
    VaultError(#[from] PledgeVaultError),
    #[error("Tokens error: {0}")]
    TokensError(#[from] TokensApiError),
    #[error("Wallet error: {0}")]
    WalletError(#[from] WalletError),
    #[error("Network error: {0}")]
    NetworkError(#[from] NetworkError),
    #[error("Endpoint binder error: {0}")]
    EndpointBinderError(#[from] EndpointBinderError),
    #[error("Pledge {pledge_id} not found in the outputs of transaction {tx_id}")]
    PledgeOutputNotFound { pledge_id: String, tx_id: String },
    #[error("Pledge {pledge_id} is for {recipient}, which is not an identity of this wallet")]
    NotRecipient { pledge_id: String, recipient: Identity },
    #[error("Acknowledgement for {received} does not match pledged token {expected}")]
    UnexpectedAck { expected: TokenId, received: TokenId },
    #[error("Network {network} is not served by this node")]
    UnsupportedNetwork { network: String },
}

impl CategorizedError for PledgeApiError {
    fn category(&self) -> ErrorCategory {
        match self {
            PledgeApiError::InvalidRequest { .. } |
            PledgeApiError::OwnerCodec(_) |
            PledgeApiError::EncodingFailed { .. } |
            PledgeApiError::UnexpectedAck { .. } => ErrorCategory::MalformedInput,
            PledgeApiError::InvalidScript(ScriptError::DeadlineNotInFuture { .. }) => ErrorCategory::Timing,
            PledgeApiError::InvalidScript(_) => ErrorCategory::MalformedInput,
            PledgeApiError::SignatureError(e) => e.category(),
            PledgeApiError::TransactionError(e) => e.category(),
            PledgeApiError::SessionError(e) => e.category(),
            PledgeApiError::VaultError(e) => e.category(),
            PledgeApiError::TokensError(e) => e.category(),
            PledgeApiError::WalletError(e) => e.category(),
            PledgeApiError::NotRecipient { .. } => ErrorCategory::Authorization,
            PledgeApiError::PledgeOutputNotFound { .. } => ErrorCategory::StateConsistency,
            PledgeApiError::NetworkError(_) |
            PledgeApiError::EndpointBinderError(_) |
            PledgeApiError::UnsupportedNetwork { .. } => ErrorCategory::Collaborator,
        }
    }
}
