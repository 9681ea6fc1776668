//! Ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! configured sender public key
//!     → wallet.rs / address.rs (key parsing, address derivation)
//!     → client.rs (nonce & balance reads against the indexer)
//!     → transaction.rs (build unsigned transfer, pre-sign hash, splice signature)
//!     → client.rs (broadcast)
//! ```
//!
//! # Security Constraints
//! - No private key material ever enters this subsystem
//! - All indexer calls have configurable timeouts
//! - Byte layouts are fixed; any deviation is rejected by the network

pub mod address;
pub mod c32;
pub mod client;
pub mod faucet;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use address::{derive_address, AddressError, Principal, StacksAddress};
pub use client::ChainClient;
pub use faucet::{FaucetError, FaucetReceipt, RATE_LIMIT_MESSAGE};
pub use transaction::{
    build_unsigned_transfer, format_micro_stx, parse_stx_amount, splice_signature, FeePolicy,
    MessageSignature, SignedTransaction, SigningHash, TransactionError, TransferParams,
    UnsignedTransfer,
};
pub use types::{
    explorer_url, AccountBalance, ChainError, ChainResult, Network, TransactionRecord, Txid,
};
pub use wallet::{verify_signature, Account, SenderPublicKey};
