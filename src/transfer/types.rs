//! Transfer requests, receipts, and stage-tagged errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::blockchain::address::StacksAddress;
use crate::blockchain::transaction::TransactionError;
use crate::blockchain::types::{ChainError, Txid};
use crate::signer::SignerError;

/// A user's request to send funds from the custodial account.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub recipient: String,
    /// Decimal STX, e.g. `"1.5"`.
    pub amount: String,
    #[serde(default)]
    pub memo: Option<String>,
}

/// Result of a successful broadcast.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub txid: Txid,
    pub explorer_url: String,
    pub sender: StacksAddress,
    pub recipient: String,
    pub amount_micro_units: u64,
    pub fee_micro_units: u64,
    pub nonce: u64,
    /// Whether a monitor task is following the transaction.
    pub monitored: bool,
}

/// Pipeline stage at which a transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStage {
    Validation,
    NonceFetch,
    BalanceFetch,
    Build,
    Signing,
    Verification,
    Broadcast,
}

impl TransferStage {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferStage::Validation => "validation",
            TransferStage::NonceFetch => "nonce_fetch",
            TransferStage::BalanceFetch => "balance_fetch",
            TransferStage::Build => "build",
            TransferStage::Signing => "signing",
            TransferStage::Verification => "verification",
            TransferStage::Broadcast => "broadcast",
        }
    }
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying cause of a failed transfer.
#[derive(Debug, Error)]
pub enum TransferFailure {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("Insufficient funds: {available} micro-units available, {required} required")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("Signature does not recover to the sender public key")]
    SignatureMismatch,
}

/// A failed transfer, tagged with the stage that failed.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct TransferError {
    pub stage: TransferStage,
    #[source]
    pub source: TransferFailure,
}

impl TransferError {
    pub fn new(stage: TransferStage, source: impl Into<TransferFailure>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    /// Error category shown to API callers.
    pub fn kind(&self) -> &'static str {
        match &self.source {
            TransferFailure::Transaction(TransactionError::InvalidSignatureFormat(_)) => {
                "InvalidSignatureFormat"
            }
            TransferFailure::Transaction(_) => "ValidationError",
            TransferFailure::Chain(ChainError::BroadcastRejected { .. }) => "BroadcastRejected",
            TransferFailure::Chain(ChainError::Network(_)) => "NetworkError",
            TransferFailure::Chain(_) => "ChainQueryError",
            TransferFailure::Signer(SignerError::Unavailable(_)) => "SignerUnavailable",
            TransferFailure::Signer(SignerError::Rejected(_)) => "SignerRejected",
            TransferFailure::Signer(SignerError::MalformedResponse(_)) => "MalformedSignerResponse",
            TransferFailure::Signer(SignerError::Config(_)) => "SignerConfigError",
            TransferFailure::InsufficientFunds { .. } => "InsufficientFunds",
            TransferFailure::SignatureMismatch => "SignatureMismatch",
        }
    }
}
