//! Remote signature adapter subsystem.
//!
//! # Data Flow
//! ```text
//! pre-sign hash (32 bytes)
//!     → client.rs (hex payload, NO_OP hash function, signWith = configured key id)
//!     → stamp.rs (X-Stamp over the request body)
//!     → signer API
//!     → types.rs (activity schema → RawSignature or SignerError)
//! ```
//!
//! # Security Constraints
//! - The API private key only stamps requests; it is never serialized or logged
//! - Transaction private keys never leave the signer

pub mod client;
pub mod stamp;
pub mod types;

pub use client::{RemoteSigner, SignerClient};
pub use stamp::ApiKeyStamper;
pub use types::{HashFunction, RawSignature, SignerError, SignerResult};
