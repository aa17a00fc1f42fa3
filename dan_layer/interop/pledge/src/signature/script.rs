//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use log::*;

use crate::{
    models::{Identity, PledgeScript, ScriptInfo},
    signature::{PledgeVerifier, SignatureError, SignatureService},
};

const LOG_TARGET: &str = "tari::dan::interop::pledge::signature::script";

impl PledgeVerifier {
    /// Builds the verifier for an output locked by `script` from the script alone. Validators use this so that the
    /// party spending a pledge has no say in how its spend is checked.
    pub fn from_script<S: SignatureService + ?Sized>(script: &PledgeScript, service: &S) -> Result<Self, SignatureError> {
        let sender = service.owner_verifier(&script.sender)?;
        let issuer = service.owner_verifier(&script.issuer)?;
        Ok(Self {
            sender: Some(sender),
            issuer,
            pledge_id: script.id.clone(),
        })
    }
}

/// The parties able to spend a pledge on its own network. The recipient lives on the destination network, so the
/// issuer is the only one.
pub fn script_recipients(script: &PledgeScript) -> Vec<Identity> {
    vec![script.issuer.clone()]
}

/// Assembles the owner audit info of a pledge script.
///
/// The sender's audit info is preferred. When it is not available, as is the case when the issuer redeems, the
/// issuer's is used instead. The recipient slot always holds the issuer's audit info.
pub fn script_audit_info<F>(script: &PledgeScript, mut audit_info_of: F) -> Result<ScriptInfo, SignatureError>
where F: FnMut(&Identity) -> Result<Option<Vec<u8>>, SignatureError> {
    debug!(target: LOG_TARGET, "Collecting audit info for pledge {}", script.id);
    let issuer = audit_info_of(&script.issuer)?.filter(|info| !info.is_empty());
    let sender = match audit_info_of(&script.sender)?.filter(|info| !info.is_empty()) {
        Some(info) => info,
        None => issuer.clone().ok_or_else(|| SignatureError::UnknownIdentity {
            identity: script.sender.clone(),
        })?,
    };
    let recipient = issuer.ok_or_else(|| SignatureError::UnknownIdentity {
        identity: script.issuer.clone(),
    })?;
    Ok(ScriptInfo { sender, recipient })
}
