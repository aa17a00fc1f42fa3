//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use tari_dan_interop_pledge::{
    apis::{
        claim::ClaimApiError,
        pledge::{PledgeApiError, PledgeRequest},
        reclaim::ReclaimApiError,
        redeem::RedeemApiError,
    },
    clock::Clock,
    config::PledgeConfig,
    models::{Identity, PledgeInfo, TmsId, TokenId},
    network::StaticNetworkDirectory,
    signature::SignatureService,
    storage::MemoryKeyValueStore,
    transaction::TokenRequest,
    PledgeSdk,
    PledgeServices,
    PledgeSpec,
};
use tokio_util::sync::CancellationToken;

use super::{
    audit_info_of,
    interop_url,
    KeyStore,
    MemorySession,
    MemorySessionHub,
    MemorySessionListener,
    MemorySessionOpener,
    TestLedgerReader,
    TestLedgers,
    TestSignatureService,
    TestStateServiceProvider,
    TestTransaction,
    TestTransactionService,
    TestWallet,
};

pub const TOKEN_TYPE: &str = "USD";
pub const INITIAL_BALANCE: u64 = 100;

pub struct TestSpec;

impl PledgeSpec for TestSpec {
    type Store = MemoryKeyValueStore;
    type SignatureService = TestSignatureService;
    type EndpointBinder = MemorySessionHub;
    type StateServiceProvider = TestStateServiceProvider;
    type Transaction = TestTransaction;
    type TransactionService = TestTransactionService;
    type NetworkDirectory = StaticNetworkDirectory;
    type Session = MemorySession;
    type SessionOpener = MemorySessionOpener;
    type LedgerReader = TestLedgerReader;
    type Clock = TestClock;
}

/// A clock shared by every node, moved forward by the test.
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Utc::now())),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + chrono::Duration::from_std(duration).unwrap();
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub struct TestNode {
    pub identity: Identity,
    pub keys: KeyStore,
    pub sdk: PledgeSdk<TestSpec>,
    listener: tokio::sync::Mutex<MemorySessionListener>,
}

impl TestNode {
    fn new(
        name: &str,
        hub: &MemorySessionHub,
        ledgers: &TestLedgers,
        clock: &TestClock,
        local_tms: Vec<TmsId>,
    ) -> Self {
        let identity = Identity::new(format!("node-{}", name).into_bytes());
        let keys = KeyStore::new();
        let listener = hub.listen(identity.clone()).unwrap();
        let signature_service = TestSignatureService::new(keys.clone());
        let config = PledgeConfig {
            receive_timeout: Duration::from_secs(5),
            finality_timeout: Duration::from_secs(5),
            scan_poll_interval: Duration::from_millis(10),
            local_tms,
            ..Default::default()
        };
        let services = PledgeServices::<TestSpec> {
            store: MemoryKeyValueStore::new(),
            signature_service: signature_service.clone(),
            endpoint_binder: hub.clone(),
            state_services: TestStateServiceProvider::new(ledgers.clone()),
            transactions: TestTransactionService::new(ledgers.clone(), signature_service),
            network: StaticNetworkDirectory::from_config(&config),
            sessions: hub.opener(identity.clone()),
            ledger: TestLedgerReader::new(ledgers.clone(), interop_url(&config.local_tms[0])),
            clock: clock.clone(),
        };
        Self {
            identity,
            keys,
            sdk: PledgeSdk::new(config, services).unwrap(),
            listener: tokio::sync::Mutex::new(listener),
        }
    }

    pub async fn accept(&self) -> MemorySession {
        self.listener.lock().await.accept().await.expect("session hub dropped")
    }

    pub fn signature_service(&self) -> &TestSignatureService {
        &self.sdk.services().signature_service
    }
}

#[derive(Debug, Clone)]
pub struct Pledged {
    pub token_id: TokenId,
    pub pledge_id: String,
    pub tx_id: String,
    pub info: PledgeInfo,
}

/// Alice pledges from the alpha network to Bob on the beta network. One issuer node serves both networks.
pub struct TestEnvironment {
    pub hub: MemorySessionHub,
    pub ledgers: TestLedgers,
    pub clock: TestClock,
    pub alpha: TmsId,
    pub beta: TmsId,
    pub alice: TestNode,
    pub bob: TestNode,
    pub issuer: TestNode,
    pub alice_wallet: TestWallet,
    pub bob_wallet: TestWallet,
    /// Issuer wallet on the origin network, named in pledge scripts
    pub issuer_wallet: TestWallet,
    /// Issuer wallet on the destination network, issuing claimed tokens
    pub claim_issuer_wallet: TestWallet,
    pub cancel: CancellationToken,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let alpha = TmsId::new("alpha", "testchannel", "zkat");
        let beta = TmsId::new("beta", "testchannel", "zkat");
        let ledgers = TestLedgers::new(&[alpha.clone(), beta.clone()]);
        let hub = MemorySessionHub::new();
        let clock = TestClock::new();

        let alice = TestNode::new("alice", &hub, &ledgers, &clock, vec![alpha.clone()]);
        let bob = TestNode::new("bob", &hub, &ledgers, &clock, vec![beta.clone()]);
        let issuer = TestNode::new("issuer", &hub, &ledgers, &clock, vec![alpha.clone(), beta.clone()]);

        let alice_wallet = TestWallet::new("alice", &alice.keys, ledgers.clone(), &alpha);
        let bob_wallet = TestWallet::new("bob", &bob.keys, ledgers.clone(), &beta);
        let issuer_wallet = TestWallet::issuer("issuer-alpha", &issuer.keys, ledgers.clone(), &alpha);
        let claim_issuer_wallet = TestWallet::issuer("issuer-beta", &issuer.keys, ledgers.clone(), &beta);

        // Pledgers know the origin issuer's identity from the TMS parameters
        alice
            .signature_service()
            .register_recipient_identity(issuer_wallet.identity(), &audit_info_of(issuer_wallet.identity()))
            .unwrap();
        ledgers.mint(&alpha, alice_wallet.identity(), TOKEN_TYPE, INITIAL_BALANCE);

        Self {
            hub,
            ledgers,
            clock,
            alpha,
            beta,
            alice,
            bob,
            issuer,
            alice_wallet,
            bob_wallet,
            issuer_wallet,
            claim_issuer_wallet,
            cancel: CancellationToken::new(),
        }
    }

    pub fn origin_url(&self) -> String {
        interop_url(&self.alpha)
    }

    pub fn destination_url(&self) -> String {
        interop_url(&self.beta)
    }

    /// Alice asks Bob's node for an identity to pledge to.
    pub async fn request_recipient(&self) -> Identity {
        let (requested, responded) = tokio::join!(
            async {
                self.alice
                    .sdk
                    .pledge_api()
                    .request_pledge_recipient_identity(&self.bob.identity, &self.destination_url(), &self.cancel)
                    .await
            },
            async {
                let session = self.bob.accept().await;
                self.bob
                    .sdk
                    .pledge_api()
                    .respond_pledge_recipient_identity(&session, &self.bob_wallet, &self.cancel)
                    .await
            }
        );
        let identity = requested.unwrap();
        assert_eq!(responded.unwrap(), identity);
        identity
    }

    /// Creates and commits a pledge of `amount` locked for `lock`, then delivers its record to Bob.
    pub async fn pledge(&self, amount: u64, lock: Duration) -> Pledged {
        let recipient = self.request_recipient().await;
        let api = self.alice.sdk.pledge_api();
        let mut transaction = api.new_transaction(&self.alpha).unwrap();
        let pledge_id = api
            .pledge(&mut transaction, &self.alice_wallet, &PledgeRequest {
                destination_network: self.destination_url(),
                deadline: lock,
                recipient,
                issuer: self.issuer_wallet.identity().clone(),
                token_type: TOKEN_TYPE.to_string(),
                amount,
            })
            .unwrap();
        api.commit(&mut transaction).await.unwrap();
        let info = api
            .pledge_info_from_transaction(&transaction, &self.alpha, &pledge_id)
            .unwrap();

        let (ack, stored) = tokio::join!(
            api.distribute_pledge_info(&info, &self.cancel),
            self.accept_pledge_info()
        );
        assert!(ack.unwrap().stored);
        assert!(stored.unwrap());

        Pledged {
            token_id: info.token_id.clone(),
            pledge_id,
            tx_id: transaction.id().to_string(),
            info,
        }
    }

    /// Bob's side of a pledge record delivery
    pub async fn accept_pledge_info(&self) -> Result<bool, PledgeApiError> {
        let session = self.bob.accept().await;
        let api = self.bob.sdk.pledge_api();
        let info = api.receive_pledge_info(&session, &self.bob_wallet, &self.cancel).await?;
        api.accept_pledge_info(&session, &info).await
    }

    /// Bob claims `token_id` from the issuer. Returns Bob's and the issuer's results.
    pub async fn claim(&self, token_id: &TokenId) -> (Result<String, ClaimApiError>, Result<String, ClaimApiError>) {
        tokio::join!(
            async {
                self.bob
                    .sdk
                    .claim_api()
                    .claim(&self.bob_wallet, token_id, &self.issuer.identity, &self.cancel)
                    .await
            },
            async {
                let session = self.issuer.accept().await;
                self.issuer
                    .sdk
                    .claim_api()
                    .respond_claim(&session, &self.claim_issuer_wallet, &self.beta, &self.cancel)
                    .await
            }
        )
    }

    /// Alice reclaims `token_id` with the issuer's attestation. Returns Alice's and the issuer's results.
    pub async fn reclaim(&self, token_id: &TokenId) -> (Result<String, ReclaimApiError>, Result<(), ReclaimApiError>) {
        tokio::join!(
            async {
                self.alice
                    .sdk
                    .reclaim_api()
                    .reclaim(&self.alice_wallet, token_id, &self.alpha, &self.issuer.identity, &self.cancel)
                    .await
            },
            async {
                let session = self.issuer.accept().await;
                self.issuer
                    .sdk
                    .reclaim_api()
                    .respond_issuer_signature(&session, &self.issuer_wallet, &self.cancel)
                    .await
            }
        )
    }

    pub async fn redeem(&self, token_id: &TokenId) -> Result<String, RedeemApiError> {
        self.issuer
            .sdk
            .redeem_api()
            .redeem(&self.issuer_wallet, token_id, &self.alpha)
            .await
    }
}
