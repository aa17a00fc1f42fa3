//   Copyright 2024 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::fmt::{Display, Formatter};

/// Broad classes of protocol failure. None of them are retried by this crate. Timing failures are the ones an
/// operator can expect to resolve by trying again later or by taking the alternative path (claim vs reclaim).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad script, bad signature encoding or bad JSON
    MalformedInput,
    /// A signature or proof did not verify
    Authorization,
    /// A deadline has not elapsed, or has already elapsed, or a receive timed out
    Timing,
    /// Zero or duplicate pledge records, or a conflicting issuer decision
    StateConsistency,
    /// An external collaborator (storage, transport, ledger) failed
    Collaborator,
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::MalformedInput => write!(f, "MalformedInput"),
            ErrorCategory::Authorization => write!(f, "Authorization"),
            ErrorCategory::Timing => write!(f, "Timing"),
            ErrorCategory::StateConsistency => write!(f, "StateConsistency"),
            ErrorCategory::Collaborator => write!(f, "Collaborator"),
        }
    }
}

pub trait CategorizedError {
    fn category(&self) -> ErrorCategory;
}
