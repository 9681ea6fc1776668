//! Poll-driven transaction status monitor.
//!
//! # State Machine
//! ```text
//! pending ──poll──▶ pending    (404, or any non-final status)
//!    │      └────▶ error      (transport/parse failure; polling continues)
//!    ├──success──▶ confirmed
//!    ├──abort_*──▶ failed
//!    └─max polls─▶ timeout
//! ```
//!
//! One request is outstanding at a time; the interval sleep is the only
//! place cancellation is observed.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::{ChainResult, TransactionRecord, Txid};
use crate::config::MonitorConfig;
use crate::monitor::types::{MonitorOutcome, StatusUpdate};
use crate::observability::metrics;

/// Where transaction status comes from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// `Ok(None)` while the transaction is unknown to the source.
    async fn fetch_status(&self, txid: &Txid) -> ChainResult<Option<TransactionRecord>>;
}

#[async_trait]
impl StatusSource for ChainClient {
    async fn fetch_status(&self, txid: &Txid) -> ChainResult<Option<TransactionRecord>> {
        self.get_transaction_by_id(txid).await
    }
}

/// Poll budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub max_attempts: u32,
    pub poll_interval: Duration,
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

/// Drives one transaction to a terminal state.
#[derive(Debug)]
pub struct TransactionMonitor<S> {
    source: S,
    settings: MonitorSettings,
}

impl<S: StatusSource> TransactionMonitor<S> {
    pub fn new(source: S, settings: MonitorSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> MonitorSettings {
        self.settings
    }

    /// Poll until terminal, with no way to cancel.
    pub async fn watch<F>(&self, txid: Txid, observer: F) -> MonitorOutcome
    where
        F: FnMut(&StatusUpdate) + Send,
    {
        let (_never, cancel) = broadcast::channel(1);
        self.watch_until(txid, cancel, observer).await
    }

    /// Poll until terminal or until `cancel` fires.
    ///
    /// `observer` sees every update; exactly one of them is terminal unless
    /// the run is cancelled, in which case none is.
    pub async fn watch_until<F>(
        &self,
        txid: Txid,
        mut cancel: broadcast::Receiver<()>,
        mut observer: F,
    ) -> MonitorOutcome
    where
        F: FnMut(&StatusUpdate) + Send,
    {
        let max_attempts = self.settings.max_attempts;
        tracing::info!(
            txid = %txid,
            max_attempts,
            interval = ?self.settings.poll_interval,
            "Monitoring transaction"
        );

        for attempt in 1..=max_attempts {
            let update = self.poll_once(txid, attempt).await;
            observer(&update);

            if update.status.is_terminal() {
                tracing::info!(
                    txid = %txid,
                    attempt,
                    status = update.status.as_str(),
                    block_height = ?update.block_height,
                    "Transaction reached terminal state"
                );
                metrics::record_monitor_outcome(update.status.as_str());
                return MonitorOutcome::Terminal(update);
            }

            if attempt == max_attempts {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = cancel.recv() => {
                    tracing::info!(txid = %txid, attempt, "Monitoring cancelled");
                    return MonitorOutcome::Cancelled { attempts: attempt };
                }
            }
        }

        let update = StatusUpdate::timeout(txid, max_attempts);
        tracing::warn!(txid = %txid, attempts = max_attempts, "Transaction monitoring timed out");
        observer(&update);
        metrics::record_monitor_outcome(update.status.as_str());
        MonitorOutcome::Terminal(update)
    }

    async fn poll_once(&self, txid: Txid, attempt: u32) -> StatusUpdate {
        match self.source.fetch_status(&txid).await {
            Ok(None) => {
                tracing::debug!(txid = %txid, attempt, "Transaction not yet indexed");
                StatusUpdate::not_found(txid, attempt)
            }
            Ok(Some(record)) => {
                tracing::debug!(txid = %txid, attempt, tx_status = %record.tx_status, "Polled transaction");
                StatusUpdate::from_record(txid, attempt, record)
            }
            Err(e) => {
                tracing::warn!(txid = %txid, attempt, error = %e, "Status poll failed");
                StatusUpdate::error(txid, attempt, &e)
            }
        }
    }
}
