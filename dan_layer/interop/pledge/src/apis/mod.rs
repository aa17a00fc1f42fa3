//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

pub mod claim;
pub mod issuer_ledger;
pub mod pledge;
pub mod proofs;
pub mod reclaim;
pub mod redeem;
pub mod scanner;
pub mod tokens;
pub mod vault;

use std::fmt::Display;

use log::*;

use crate::session::Session;

const LOG_TARGET: &str = "tari::dan::interop::pledge::apis";

/// Tells the remote end why this responder gave up. A failure to send is only logged.
pub(crate) async fn send_abort<S: Session + ?Sized, E: Display>(session: &S, err: &E) {
    if let Err(send_err) = session.send_error(err.to_string()).await {
        warn!(
            target: LOG_TARGET,
            "Failed to notify {} of abort ({}): {}",
            session.info().remote,
            err,
            send_err
        );
    }
}
