//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Chain read (nonce, balance):
//!     → retries.rs (transient? retry with backoff)
//!     → backoff.rs (exponential delay + jitter)
//! ```
//!
//! # Design Decisions
//! - Every external call already carries a client-side timeout
//! - Only idempotent reads are retried
//! - Jittered backoff spreads retries from concurrent requests

pub mod backoff;
pub mod retries;

pub use backoff::{calculate_backoff, RetryPolicy};
pub use retries::retry_read;
