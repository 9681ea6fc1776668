//! Broadcast & status monitor subsystem.
//!
//! # Data Flow
//! ```text
//! accepted txid
//!     → registry.rs (register as pending, spawn monitor task)
//!     → watcher.rs (poll StatusSource every interval, one request at a time)
//!     → types.rs (indexer status → pending | confirmed | failed | error)
//!     → registry.rs (latest update, readable via GET /transactions/{txid})
//! ```
//!
//! # Design Decisions
//! - A 404 from the indexer means "not yet seen", never failure
//! - Poll errors are reported and polling continues
//! - Timeout is terminal but inconclusive; the explorer link stays valid
//! - Shutdown cancels monitors between polls

pub mod registry;
pub mod types;
pub mod watcher;

pub use registry::{RetentionPolicy, TrackedTransaction, TransactionRegistry};
pub use types::{classify, MonitorOutcome, MonitorStatus, StatusUpdate};
pub use watcher::{MonitorSettings, StatusSource, TransactionMonitor};
