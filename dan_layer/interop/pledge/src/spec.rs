//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use crate::{
    clock::Clock,
    network::{LedgerReader, NetworkDirectory},
    session::{Session, SessionOpener},
    signature::{EndpointBinder, SignatureService},
    state::StateServiceProvider,
    storage::KeyValueStore,
    transaction::{TokenRequest, TransactionService},
};

/// The collaborators a pledge node runs with.
pub trait PledgeSpec: Send + Sync + 'static {
    type Store: KeyValueStore + Send + Sync + 'static;
    type SignatureService: SignatureService + 'static;
    type EndpointBinder: EndpointBinder + 'static;
    type StateServiceProvider: StateServiceProvider + 'static;
    type Transaction: TokenRequest + 'static;
    type TransactionService: TransactionService<Transaction = Self::Transaction> + 'static;
    type NetworkDirectory: NetworkDirectory + 'static;
    type Session: Session + 'static;
    type SessionOpener: SessionOpener<Session = Self::Session> + 'static;
    type LedgerReader: LedgerReader + 'static;
    type Clock: Clock + 'static;
}
