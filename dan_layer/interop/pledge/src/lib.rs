//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

pub mod apis;
pub mod models;
pub mod storage;

pub mod clock;
pub mod config;
pub mod errors;
pub mod metadata;
pub mod network;
pub mod optional;
pub mod owner;
pub mod session;
pub mod signature;
pub mod state;
pub mod transaction;
pub mod wallet;

mod sdk;
mod serde_with;
mod spec;

pub use sdk::{PledgeSdk, PledgeSdkError, PledgeServices};
pub use spec::PledgeSpec;
