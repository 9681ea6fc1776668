//! Chain-specific types and error definitions.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Ledger network selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
}

impl Network {
    /// Transaction version byte.
    pub fn transaction_version(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x80,
        }
    }

    /// Chain id written into every transaction.
    pub fn chain_id(self) -> u32 {
        match self {
            Network::Mainnet => 0x0000_0001,
            Network::Testnet => 0x8000_0000,
        }
    }

    /// Address version for single-signature (P2PKH) accounts.
    pub fn single_sig_version(self) -> u8 {
        match self {
            Network::Mainnet => 22,
            Network::Testnet => 26,
        }
    }

    /// Address version for multi-signature (P2SH) accounts.
    pub fn multi_sig_version(self) -> u8 {
        match self {
            Network::Mainnet => 20,
            Network::Testnet => 21,
        }
    }

    /// Whether an address version byte belongs to this network.
    pub fn accepts_address_version(self, version: u8) -> bool {
        version == self.single_sig_version() || version == self.multi_sig_version()
    }

    /// Public indexer for this network.
    pub fn default_indexer_url(self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.hiro.so",
            Network::Testnet => "https://api.testnet.hiro.so",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "testnet" => Ok(Network::Testnet),
            "mainnet" => Ok(Network::Mainnet),
            other => Err(format!("unknown network '{}'", other)),
        }
    }
}

/// Errors that can occur while talking to the chain indexer.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Transport failure (connect, timeout, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The indexer answered with an unexpected HTTP status.
    #[error("Chain query failed with status {status}: {message}")]
    Query { status: u16, message: String },

    /// The indexer answered with a body that does not match the expected schema.
    #[error("Malformed indexer response: {0}")]
    MalformedResponse(String),

    /// The network refused the transaction (bad nonce, insufficient funds, ...).
    #[error("Transaction rejected: {reason}")]
    BroadcastRejected {
        reason: String,
        reason_data: Option<serde_json::Value>,
    },
}

impl ChainError {
    /// Whether repeating the same read could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ChainError::Network(_) => true,
            ChainError::Query { status, .. } => *status == 429 || *status >= 500,
            ChainError::MalformedResponse(_) | ChainError::BroadcastRejected { .. } => false,
        }
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Balance of an account, in micro-units.
///
/// `total_micro_units` is always recomputed as `available + locked`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountBalance {
    pub available_micro_units: u64,
    pub locked_micro_units: u64,
    pub total_micro_units: u64,
    pub fungible_tokens: BTreeMap<String, serde_json::Value>,
    pub non_fungible_tokens: BTreeMap<String, serde_json::Value>,
}

impl AccountBalance {
    pub fn new(
        available_micro_units: u64,
        locked_micro_units: u64,
        fungible_tokens: BTreeMap<String, serde_json::Value>,
        non_fungible_tokens: BTreeMap<String, serde_json::Value>,
    ) -> ChainResult<Self> {
        let total_micro_units = available_micro_units
            .checked_add(locked_micro_units)
            .ok_or_else(|| ChainError::MalformedResponse("balance overflows u64".to_string()))?;

        Ok(Self {
            available_micro_units,
            locked_micro_units,
            total_micro_units,
            fungible_tokens,
            non_fungible_tokens,
        })
    }
}

/// Transaction as reported by the indexer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub tx_id: String,
    pub tx_status: String,
    pub block_height: Option<u64>,
    pub block_hash: Option<String>,
    pub raw: serde_json::Value,
}

/// 32-byte transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Txid(pub [u8; 32]);

impl Txid {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Txid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('"');
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| format!("invalid txid '{}': {}", s, e))?;
        Ok(Txid(bytes))
    }
}

impl Serialize for Txid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Block explorer link for a transaction.
pub fn explorer_url(base_url: &str, txid: &Txid, network: Network) -> String {
    format!(
        "{}/txid/{}?chain={}",
        base_url.trim_end_matches('/'),
        txid,
        network
    )
}
