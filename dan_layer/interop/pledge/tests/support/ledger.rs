//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::{
    collections::{BTreeMap, HashMap},
    convert::Infallible,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tari_dan_interop_pledge::{
    metadata::{reclaim_key, redeem_pledge_key, ClaimMetadata},
    models::{Identity, TmsId, TokenId, UnspentToken},
    network::LedgerReader,
    owner::{encode_identity_owner, TypedOwner},
    signature::{PledgeSignature, PledgeVerifier, SignatureError, SignatureService, Signer, Verifier},
    transaction::{
        IssueOptions,
        OutputStream,
        TokenInput,
        TokenOutput,
        TokenRequest,
        TransactionError,
        TransactionService,
        TransferOptions,
    },
    wallet::{IssuerWallet, Wallet},
};
use tokio::time::{sleep, Instant};

use super::TestSignatureService;

pub const INTEROP_SCHEME: &str = "tari";

pub fn interop_url(tms_id: &TmsId) -> String {
    tms_id.interop_url(INTEROP_SCHEME)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerToken {
    pub owner: Vec<u8>,
    pub token_type: String,
    pub quantity: u64,
}

struct CommittedTransaction {
    id: String,
    metadata: BTreeMap<String, Vec<u8>>,
}

#[derive(Default)]
struct LedgerState {
    unspent: BTreeMap<TokenId, LedgerToken>,
    committed: Vec<CommittedTransaction>,
    /// (origin network, origin token) -> token issued for the claim
    claims: HashMap<(String, TokenId), TokenId>,
    mints: u64,
}

/// One simulated token ledger per TMS, keyed by interop URL.
#[derive(Clone, Default)]
pub struct TestLedgers {
    ledgers: Arc<Mutex<HashMap<String, LedgerState>>>,
}

impl TestLedgers {
    pub fn new(tms_ids: &[TmsId]) -> Self {
        let ledgers = tms_ids
            .iter()
            .map(|tms_id| (interop_url(tms_id), LedgerState::default()))
            .collect();
        Self {
            ledgers: Arc::new(Mutex::new(ledgers)),
        }
    }

    pub fn has_network(&self, url: &str) -> bool {
        self.ledgers.lock().unwrap().contains_key(url)
    }

    pub fn mint(&self, tms_id: &TmsId, owner: &Identity, token_type: &str, quantity: u64) -> TokenId {
        let mut ledgers = self.ledgers.lock().unwrap();
        let ledger = ledgers.get_mut(&interop_url(tms_id)).unwrap();
        ledger.mints += 1;
        let token_id = TokenId::new(format!("mint-{}", ledger.mints), 0);
        ledger.unspent.insert(token_id.clone(), LedgerToken {
            owner: encode_identity_owner(owner).unwrap(),
            token_type: token_type.to_string(),
            quantity,
        });
        token_id
    }

    pub fn unspent(&self, url: &str) -> Vec<UnspentToken> {
        let ledgers = self.ledgers.lock().unwrap();
        ledgers
            .get(url)
            .map(|ledger| {
                ledger
                    .unspent
                    .iter()
                    .map(|(id, token)| UnspentToken {
                        id: id.clone(),
                        owner: token.owner.clone(),
                        token_type: token.token_type.clone(),
                        quantity: token.quantity,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_unspent(&self, url: &str, token_id: &TokenId) -> Option<LedgerToken> {
        let ledgers = self.ledgers.lock().unwrap();
        ledgers.get(url)?.unspent.get(token_id).cloned()
    }

    /// Total quantity of `token_type` held by `owner` as a plain identity
    pub fn balance(&self, url: &str, owner: &Identity, token_type: &str) -> u64 {
        let owner = encode_identity_owner(owner).unwrap();
        self.unspent(url)
            .into_iter()
            .filter(|token| token.owner == owner && token.token_type == token_type)
            .map(|token| token.quantity)
            .sum()
    }

    pub fn claimed_as(&self, url: &str, origin_url: &str, token_id: &TokenId) -> Option<TokenId> {
        let ledgers = self.ledgers.lock().unwrap();
        ledgers
            .get(url)?
            .claims
            .get(&(origin_url.to_string(), token_id.clone()))
            .cloned()
    }

    pub fn is_committed(&self, tx_id: &str) -> bool {
        let ledgers = self.ledgers.lock().unwrap();
        ledgers
            .values()
            .any(|ledger| ledger.committed.iter().any(|tx| tx.id == tx_id))
    }

    pub fn lookup_metadata(&self, url: &str, key: &str, starting_tx_id: Option<&str>) -> Option<Vec<u8>> {
        let ledgers = self.ledgers.lock().unwrap();
        let committed = &ledgers.get(url)?.committed;
        let start = match starting_tx_id {
            Some(tx_id) => committed.iter().position(|tx| tx.id == tx_id)?,
            None => 0,
        };
        committed[start..]
            .iter()
            .find_map(|tx| tx.metadata.get(key).cloned())
    }

    /// Validates `transaction` the way the network's validators would and applies it.
    pub fn commit<S: SignatureService>(&self, transaction: &TestTransaction, validator: &S) -> Result<(), TransactionError> {
        let url = transaction.network_url();
        let message = transaction.signing_message()?;
        let mut ledgers = self.ledgers.lock().unwrap();
        let ledger = ledgers.get_mut(&url).ok_or_else(|| invalid(format!("unknown network {}", url)))?;

        if ledger.committed.iter().any(|tx| tx.id == transaction.id) {
            return Err(invalid(format!("transaction {} already committed", transaction.id)));
        }
        if transaction.input_signatures.len() != transaction.inputs.len() {
            return Err(invalid("transaction is not fully endorsed"));
        }

        let mut input_total = 0;
        for (input, signature) in transaction.inputs.iter().zip(&transaction.input_signatures) {
            let token = ledger
                .unspent
                .get(&input.id)
                .ok_or_else(|| invalid(format!("input {} is spent or unknown", input.id)))?;
            if *token != input.token {
                return Err(invalid(format!("input {} does not match the ledger", input.id)));
            }
            verify_spend(input, signature, &message, &transaction.metadata, validator)?;
            input_total += token.quantity;
        }

        let output_total = transaction.outputs.iter().map(|output| output.quantity).sum::<u64>();
        match &transaction.issuer {
            Some(issuer) => validator
                .owner_verifier(issuer)
                .and_then(|verifier| verifier.verify(&message, &transaction.issuer_signature))
                .map_err(rejected)?,
            None => {
                if output_total > input_total {
                    return Err(invalid("outputs exceed inputs"));
                }
            },
        }

        let claim = ClaimMetadata::from_metadata(&transaction.metadata)
            .map(|claim| (claim.origin_network, claim.origin_token_id));
        if let Some(key) = &claim {
            if ledger.claims.contains_key(key) {
                return Err(invalid(format!("{} was already claimed", key.1)));
            }
        }

        for input in &transaction.inputs {
            ledger.unspent.remove(&input.id);
        }
        for (index, output) in transaction.outputs.iter().enumerate() {
            ledger
                .unspent
                .insert(TokenId::new(transaction.id.clone(), index as u64), output.clone());
        }
        if let Some(key) = claim {
            ledger.claims.insert(key, TokenId::new(transaction.id.clone(), 0));
        }
        ledger.committed.push(CommittedTransaction {
            id: transaction.id.clone(),
            metadata: transaction.metadata.clone(),
        });
        Ok(())
    }
}

fn verify_spend<S: SignatureService>(
    input: &TestInput,
    signature: &[u8],
    message: &[u8],
    metadata: &BTreeMap<String, Vec<u8>>,
    validator: &S,
) -> Result<(), TransactionError> {
    match TypedOwner::decode(&input.token.owner)? {
        TypedOwner::Identity(identity) => validator
            .owner_verifier(&identity)
            .and_then(|verifier| verifier.verify(message, signature))
            .map_err(rejected),
        TypedOwner::Pledge(script) => {
            PledgeVerifier::from_script(&script, validator)
                .and_then(|verifier| verifier.verify(message, signature))
                .map_err(rejected)?;
            let reclaim = PledgeSignature::from_bytes(signature).map_err(rejected)?.reclaim;
            let key = if reclaim {
                reclaim_key(&input.id)
            } else {
                redeem_pledge_key(&input.id)
            };
            if !metadata.contains_key(&key) {
                return Err(invalid(format!("spend of pledge {} is missing {}", script.id, key)));
            }
            Ok(())
        },
        TypedOwner::Other { kind, .. } => Err(invalid(format!("cannot spend {} owners", kind))),
    }
}

fn invalid<T: Into<String>>(details: T) -> TransactionError {
    TransactionError::InvalidTransaction {
        details: details.into(),
    }
}

fn rejected(err: SignatureError) -> TransactionError {
    invalid(format!("invalid signature: {}", err))
}

fn upstream<E: std::error::Error + Send + Sync + 'static>(err: E) -> TransactionError {
    TransactionError::Upstream(err.into())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestInput {
    pub id: TokenId,
    pub token: LedgerToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestTransaction {
    id: String,
    tms_id: TmsId,
    inputs: Vec<TestInput>,
    outputs: Vec<LedgerToken>,
    issuer: Option<Identity>,
    metadata: BTreeMap<String, Vec<u8>>,
    input_signatures: Vec<Vec<u8>>,
    issuer_signature: Vec<u8>,
}

impl TestTransaction {
    pub fn new(tms_id: TmsId) -> Self {
        let mut id = [0u8; 16];
        OsRng.fill_bytes(&mut id);
        Self {
            id: hex::encode(id),
            tms_id,
            inputs: Vec::new(),
            outputs: Vec::new(),
            issuer: None,
            metadata: BTreeMap::new(),
            input_signatures: Vec::new(),
            issuer_signature: Vec::new(),
        }
    }

    pub fn network_url(&self) -> String {
        interop_url(&self.tms_id)
    }

    pub fn metadata(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.metadata
    }

    fn signing_message(&self) -> Result<Vec<u8>, TransactionError> {
        let unsigned = Self {
            input_signatures: Vec::new(),
            issuer_signature: Vec::new(),
            ..self.clone()
        };
        serde_json::to_vec(&unsigned).map_err(upstream)
    }

    /// Adds inputs covering `amount` and returns the change owed to the owner of the first input.
    fn select_inputs<W: Wallet + ?Sized>(
        &mut self,
        wallet: &W,
        token_type: &str,
        amount: u64,
        token_ids: &[TokenId],
    ) -> Result<Option<LedgerToken>, TransactionError> {
        let unspent = wallet.list_unspent_tokens().map_err(upstream)?;
        let selected = if token_ids.is_empty() {
            let mut selected = Vec::new();
            let mut total = 0;
            for token in unspent {
                if total >= amount {
                    break;
                }
                let is_identity_owned = matches!(TypedOwner::decode(&token.owner), Ok(TypedOwner::Identity(_)));
                if token.token_type == token_type && is_identity_owned {
                    total += token.quantity;
                    selected.push(token);
                }
            }
            selected
        } else {
            token_ids
                .iter()
                .map(|id| {
                    unspent
                        .iter()
                        .find(|token| token.id == *id)
                        .cloned()
                        .ok_or_else(|| invalid(format!("{} is not spendable by wallet {}", id, wallet.id())))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        if selected.iter().any(|token| token.token_type != token_type) {
            return Err(invalid(format!("inputs are not all of type {}", token_type)));
        }
        let available = selected.iter().map(|token| token.quantity).sum::<u64>();
        if available < amount {
            return Err(TransactionError::InsufficientFunds {
                token_type: token_type.to_string(),
                requested: amount,
                available,
            });
        }

        let change = match selected.first() {
            Some(first) if available > amount => Some(LedgerToken {
                owner: first.owner.clone(),
                token_type: token_type.to_string(),
                quantity: available - amount,
            }),
            _ => None,
        };
        self.inputs.extend(selected.into_iter().map(|token| TestInput {
            id: token.id,
            token: LedgerToken {
                owner: token.owner,
                token_type: token.token_type,
                quantity: token.quantity,
            },
        }));
        Ok(change)
    }
}

impl TokenRequest for TestTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    fn issue<W: IssuerWallet + ?Sized>(
        &mut self,
        wallet: &W,
        owner: Vec<u8>,
        token_type: &str,
        quantity: u64,
        options: IssueOptions,
    ) -> Result<(), TransactionError> {
        self.issuer = Some(wallet.issuer_identity().map_err(upstream)?);
        self.outputs.push(LedgerToken {
            owner,
            token_type: token_type.to_string(),
            quantity,
        });
        self.metadata.extend(options.metadata);
        Ok(())
    }

    fn transfer<W: Wallet + ?Sized>(
        &mut self,
        wallet: &W,
        token_type: &str,
        values: Vec<u64>,
        owners: Vec<Vec<u8>>,
        options: TransferOptions,
    ) -> Result<(), TransactionError> {
        if values.len() != owners.len() {
            return Err(invalid("values and owners differ in length"));
        }
        let amount = values.iter().sum::<u64>();
        let change = self.select_inputs(wallet, token_type, amount, &options.token_ids)?;
        for (quantity, owner) in values.into_iter().zip(owners) {
            self.outputs.push(LedgerToken {
                owner,
                token_type: token_type.to_string(),
                quantity,
            });
        }
        self.outputs.extend(change);
        self.metadata.extend(options.metadata);
        Ok(())
    }

    fn redeem<W: Wallet + ?Sized>(
        &mut self,
        wallet: &W,
        token_type: &str,
        quantity: u64,
        options: TransferOptions,
    ) -> Result<(), TransactionError> {
        let change = self.select_inputs(wallet, token_type, quantity, &options.token_ids)?;
        self.outputs.extend(change);
        self.metadata.extend(options.metadata);
        Ok(())
    }

    fn outputs(&self) -> Result<OutputStream, TransactionError> {
        Ok(OutputStream::new(
            self.outputs
                .iter()
                .enumerate()
                .map(|(index, output)| TokenOutput {
                    index: index as u64,
                    owner: output.owner.clone(),
                    token_type: output.token_type.clone(),
                    quantity: output.quantity,
                })
                .collect(),
        ))
    }

    fn inputs(&self) -> Result<Vec<TokenInput>, TransactionError> {
        Ok(self
            .inputs
            .iter()
            .map(|input| TokenInput {
                id: input.id.clone(),
                owner: input.token.owner.clone(),
                token_type: input.token.token_type.clone(),
                quantity: input.token.quantity,
            })
            .collect())
    }

    fn to_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        serde_json::to_vec(self).map_err(upstream)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        serde_json::from_slice(bytes).map_err(|e| invalid(format!("undecodable transaction: {}", e)))
    }
}

pub struct TestTransactionService {
    ledgers: TestLedgers,
    signatures: TestSignatureService,
    validator: TestSignatureService,
}

impl TestTransactionService {
    pub fn new(ledgers: TestLedgers, signatures: TestSignatureService) -> Self {
        Self {
            ledgers,
            signatures,
            validator: TestSignatureService::default(),
        }
    }

    pub fn ledgers(&self) -> &TestLedgers {
        &self.ledgers
    }
}

#[async_trait]
impl TransactionService for TestTransactionService {
    type Transaction = TestTransaction;

    fn new_anonymous_transaction(&self, tms_id: &TmsId) -> Result<TestTransaction, TransactionError> {
        if !self.ledgers.has_network(&interop_url(tms_id)) {
            return Err(invalid(format!("unknown TMS {}", tms_id)));
        }
        Ok(TestTransaction::new(tms_id.clone()))
    }

    async fn collect_endorsements(&self, transaction: &mut TestTransaction) -> Result<(), TransactionError> {
        let message = transaction.signing_message()?;
        let mut signatures = Vec::with_capacity(transaction.inputs.len());
        for input in &transaction.inputs {
            let signer = match self.signatures.owner_signer(&input.token.owner) {
                Some(signer) => signer,
                None => match TypedOwner::decode(&input.token.owner)? {
                    TypedOwner::Identity(identity) => self.signatures.get_signer(&identity).map_err(upstream)?,
                    other => return Err(invalid(format!("no signer registered for {} owner", other.kind()))),
                },
            };
            signatures.push(signer.sign(&message).map_err(upstream)?);
        }
        transaction.input_signatures = signatures;
        if let Some(issuer) = transaction.issuer.clone() {
            let signer = self.signatures.get_signer(&issuer).map_err(upstream)?;
            transaction.issuer_signature = signer.sign(&message).map_err(upstream)?;
        }
        Ok(())
    }

    async fn order_and_await_finality(&self, transaction: &TestTransaction) -> Result<(), TransactionError> {
        self.ledgers.commit(transaction, &self.validator)
    }

    async fn await_finality(&self, tx_id: &str, timeout: Duration) -> Result<(), TransactionError> {
        let deadline = Instant::now() + timeout;
        while !self.ledgers.is_committed(tx_id) {
            if Instant::now() >= deadline {
                return Err(TransactionError::NotFinalized {
                    tx_id: tx_id.to_string(),
                    details: format!("not committed within {:.2?}", timeout),
                });
            }
            sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }
}

pub struct TestLedgerReader {
    ledgers: TestLedgers,
    url: String,
}

impl TestLedgerReader {
    pub fn new(ledgers: TestLedgers, url: String) -> Self {
        Self { ledgers, url }
    }
}

#[async_trait]
impl LedgerReader for TestLedgerReader {
    type Error = Infallible;

    async fn lookup_transfer_metadata_key(
        &self,
        key: &str,
        starting_tx_id: Option<&str>,
    ) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.ledgers.lookup_metadata(&self.url, key, starting_tx_id))
    }
}
