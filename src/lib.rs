//! Custodial wallet service for the Stacks ledger.
//!
//! Signs token transfers through a remote custodial signer, broadcasts them
//! through a chain indexer, and tracks them to a terminal status.

// Core pipeline
pub mod blockchain;
pub mod monitor;
pub mod signer;
pub mod transfer;

// Service surface
pub mod config;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::WalletConfig;
pub use http::WalletServer;
pub use lifecycle::Shutdown;
