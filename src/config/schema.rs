//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the wallet service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::blockchain::types::Network;

/// Root configuration for the wallet service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Ledger network the wallet operates on.
    pub network: Network,

    /// Chain indexer API settings.
    pub indexer: IndexerConfig,

    /// Remote custodial signer settings.
    pub signer: SignerConfig,

    /// Testnet faucet settings.
    pub faucet: FaucetConfig,

    /// Transfer building parameters (fee, verification).
    pub transfer: TransferConfig,

    /// Transaction status monitoring.
    pub monitor: MonitorConfig,

    /// Retry configuration for idempotent indexer reads.
    pub retries: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Block explorer links.
    pub explorer: ExplorerConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Chain indexer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Base URL of the indexer API (e.g., "https://api.testnet.hiro.so").
    pub base_url: String,

    /// Optional API key sent as `x-api-key`.
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Honour HTTP(S)_PROXY environment variables.
    pub use_system_proxy: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            base_url: Network::Testnet.default_indexer_url().to_string(),
            api_key: None,
            timeout_secs: 10,
            use_system_proxy: true,
        }
    }
}

/// Remote signer configuration.
///
/// The API key pair authenticates requests to the signer; it never signs transactions.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Base URL of the signer API.
    pub base_url: String,

    /// Organization that owns the signing key.
    pub organization_id: String,

    /// Hex-encoded compressed secp256k1 API public key.
    pub api_public_key: String,

    /// Hex-encoded API private key. Never logged.
    #[serde(skip_serializing)]
    pub api_private_key: String,

    /// Key identifier passed as `signWith`. Falls back to `public_key` when empty.
    pub sign_with: String,

    /// Hex-encoded public key of the custodial signing key (the sender).
    pub public_key: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.turnkey.com".to_string(),
            organization_id: String::new(),
            api_public_key: String::new(),
            api_private_key: String::new(),
            sign_with: String::new(),
            public_key: String::new(),
            timeout_secs: 15,
        }
    }
}

impl SignerConfig {
    /// Identifier the signer should sign with.
    pub fn signing_identity(&self) -> &str {
        if self.sign_with.is_empty() {
            &self.public_key
        } else {
            &self.sign_with
        }
    }
}

/// Faucet configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FaucetConfig {
    /// Expose `POST /faucet` (testnet only).
    pub enabled: bool,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Transfer building configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Fee attached to every transfer, in micro-units.
    pub fee_micro_units: u64,

    /// Minimum fee rate per serialized byte (network fee floor).
    pub fee_rate_per_byte: u64,

    /// Recover the signer key from each signature before broadcasting.
    pub verify_signature: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            fee_micro_units: 180,
            fee_rate_per_byte: 1,
            verify_signature: true,
        }
    }
}

/// Transaction status monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Track broadcast transactions until they reach a terminal state.
    pub enabled: bool,

    /// Maximum number of status polls before giving up with `timeout`.
    pub max_attempts: u32,

    /// Delay between polls in milliseconds.
    pub poll_interval_ms: u64,

    /// Seconds a terminal entry stays queryable before it is evicted.
    pub retention_secs: u64,

    /// Upper bound on tracked transactions; the oldest terminal entries go first.
    pub max_tracked: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 60,
            poll_interval_ms: 5000,
            retention_secs: 3600,
            max_tracked: 10_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries of idempotent reads.
    pub enabled: bool,

    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Block explorer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Explorer base URL; links take the form `<base>/txid/<txid>?chain=<network>`.
    pub base_url: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://explorer.hiro.so".to_string(),
        }
    }
}
