//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use crate::{
    errors::{CategorizedError, ErrorCategory},
    models::{PledgeScript, TokenId, UnspentToken},
    owner::{OwnerCodecError, TypedOwner},
    wallet::{Wallet, WalletError},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct TokensApi;

impl TokensApi {
    pub fn new() -> Self {
        Self
    }

    /// Finds the unspent pledge-owned token `token_id` in `wallet`, together with its script.
    pub fn get_pledged_token<W: Wallet + ?Sized>(
        &self,
        wallet: &W,
        token_id: &TokenId,
    ) -> Result<(UnspentToken, PledgeScript), TokensApiError> {
        let mut matches = Vec::new();
        for token in wallet.list_unspent_tokens()? {
            if token.id != *token_id {
                continue;
            }
            if let TypedOwner::Pledge(script) = TypedOwner::decode(&token.owner)? {
                matches.push((token, script));
            }
        }
        match matches.len() {
            0 => Err(TokensApiError::NoPledgedToken {
                token_id: token_id.clone(),
            }),
            1 => Ok(matches.remove(0)),
            count => Err(TokensApiError::MultiplePledgedTokens {
                token_id: token_id.clone(),
                count,
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokensApiError {
    #[error("Wallet error: {0}")]
    WalletError(#[from] WalletError),
    #[error("Owner codec error: {0}")]
    OwnerCodec(#[from] OwnerCodecError),
    #[error("No pledged token exists for {token_id}")]
    NoPledgedToken { token_id: TokenId },
    #[error("Multiple pledged tokens ({count}) found for {token_id}")]
    MultiplePledgedTokens { token_id: TokenId, count: usize },
}

impl CategorizedError for TokensApiError {
    fn category(&self) -> ErrorCategory {
        match self {
            TokensApiError::WalletError(e) => e.category(),
            TokensApiError::OwnerCodec(_) => ErrorCategory::MalformedInput,
            TokensApiError::NoPledgedToken { .. } | TokensApiError::MultiplePledgedTokens { .. } => {
                ErrorCategory::StateConsistency
            },
        }
    }
}
