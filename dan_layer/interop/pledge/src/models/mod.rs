//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

mod approval;
pub use approval::*;

mod claim;
pub use claim::*;

mod identity;
pub use identity::*;

mod pledge_info;
pub use pledge_info::*;

mod recipient;
pub use recipient::*;

mod script;
pub use script::*;

mod tms;
pub use tms::*;

mod token;
pub use token::*;
