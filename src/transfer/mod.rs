//! Transfer pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! POST /send {recipient, amount, memo?}
//!     → engine.rs (validate, fetch nonce & balance, build, sign, verify, broadcast)
//!     → monitor registry (track until terminal)
//!     → types.rs (TransferReceipt, or TransferError tagged with the failing stage)
//! ```

pub mod engine;
pub mod types;

pub use engine::TransferEngine;
pub use types::{TransferError, TransferFailure, TransferReceipt, TransferRequest, TransferStage};
