//! Monitor states and status updates.

use serde::Serialize;

use crate::blockchain::types::{TransactionRecord, Txid};

/// Monitor-side view of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Pending,
    Confirmed,
    Failed,
    Timeout,
    Error,
}

impl MonitorStatus {
    /// Whether polling stops at this status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MonitorStatus::Confirmed | MonitorStatus::Failed | MonitorStatus::Timeout
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MonitorStatus::Pending => "pending",
            MonitorStatus::Confirmed => "confirmed",
            MonitorStatus::Failed => "failed",
            MonitorStatus::Timeout => "timeout",
            MonitorStatus::Error => "error",
        }
    }
}

/// Map an indexer status string onto a monitor status.
pub fn classify(tx_status: &str) -> MonitorStatus {
    match tx_status {
        "success" => MonitorStatus::Confirmed,
        "abort_by_response" | "abort_by_post_condition" => MonitorStatus::Failed,
        _ => MonitorStatus::Pending,
    }
}

/// One observation handed to the monitor's observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub txid: Txid,
    pub status: MonitorStatus,
    /// Poll number that produced this update (0 before the first poll).
    pub attempt: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl StatusUpdate {
    fn bare(txid: Txid, status: MonitorStatus, attempt: u32, message: String) -> Self {
        Self {
            txid,
            status,
            attempt,
            message,
            tx_status: None,
            block_height: None,
            block_hash: None,
            raw: None,
        }
    }

    /// Accepted by the indexer, not yet polled.
    pub fn submitted(txid: Txid) -> Self {
        Self::bare(
            txid,
            MonitorStatus::Pending,
            0,
            "Transaction broadcast accepted".to_string(),
        )
    }

    /// The indexer has not seen the transaction yet.
    pub fn not_found(txid: Txid, attempt: u32) -> Self {
        Self::bare(
            txid,
            MonitorStatus::Pending,
            attempt,
            "Transaction submitted to mempool, waiting for confirmation...".to_string(),
        )
    }

    pub fn from_record(txid: Txid, attempt: u32, record: TransactionRecord) -> Self {
        let status = classify(&record.tx_status);
        let message = match status {
            MonitorStatus::Confirmed => match record.block_height {
                Some(height) => format!("Transaction confirmed in block {}", height),
                None => "Transaction confirmed".to_string(),
            },
            MonitorStatus::Failed => format!("Transaction failed: {}", record.tx_status),
            _ => format!("Transaction status: {}", record.tx_status),
        };

        Self {
            txid,
            status,
            attempt,
            message,
            tx_status: Some(record.tx_status),
            block_height: record.block_height,
            block_hash: record.block_hash,
            raw: Some(record.raw),
        }
    }

    pub fn error(txid: Txid, attempt: u32, error: &dyn std::fmt::Display) -> Self {
        Self::bare(
            txid,
            MonitorStatus::Error,
            attempt,
            format!("Error checking status: {}", error),
        )
    }

    pub fn timeout(txid: Txid, attempt: u32) -> Self {
        Self::bare(
            txid,
            MonitorStatus::Timeout,
            attempt,
            "Transaction monitoring timeout. Please check explorer.".to_string(),
        )
    }
}

/// How a monitoring run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
    /// Reached `confirmed`, `failed`, or `timeout`.
    Terminal(StatusUpdate),
    /// Shutdown fired before a terminal state.
    Cancelled { attempts: u32 },
}
