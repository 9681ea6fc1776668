//! In-memory registry of broadcast transactions and their latest status.
//!
//! A txid is tracked once: registering it again keeps the existing entry and
//! starts no second monitor. Terminal entries are evicted after the retention
//! TTL, and the oldest terminal entries go first when the map is full.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::blockchain::types::Txid;
use crate::config::MonitorConfig;
use crate::monitor::types::{MonitorOutcome, StatusUpdate};
use crate::monitor::watcher::{StatusSource, TransactionMonitor};
use crate::observability::metrics;

/// Latest known state of one broadcast transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedTransaction {
    pub txid: Txid,
    pub latest: StatusUpdate,
    pub updates: u32,
    pub submitted_at_ms: u64,
    /// When the entry reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    pub explorer_url: String,
}

/// How long finished transactions stay queryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for RetentionPolicy {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.retention_secs),
            max_entries: config.max_tracked.max(1),
        }
    }
}

/// Shared, lock-free map from txid to tracked state.
#[derive(Debug, Clone, Default)]
pub struct TransactionRegistry {
    entries: Arc<DashMap<Txid, TrackedTransaction>>,
    retention: RetentionPolicy,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self {
            entries: Arc::default(),
            retention,
        }
    }

    /// Start tracking `txid` in the `pending` state.
    ///
    /// Returns `false` and leaves the entry untouched if `txid` is already tracked.
    pub fn register(&self, txid: Txid, explorer_url: String) -> bool {
        let now = now_ms();
        self.prune_at(now);

        let inserted = match self.entries.entry(txid) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(TrackedTransaction {
                    txid,
                    latest: StatusUpdate::submitted(txid),
                    updates: 0,
                    submitted_at_ms: now,
                    finished_at_ms: None,
                    explorer_url,
                });
                true
            }
        };
        metrics::set_tracked_transactions(self.entries.len());
        inserted
    }

    /// Store `update` unless the entry already reached a terminal state.
    pub fn record(&self, update: &StatusUpdate) {
        if let Some(mut entry) = self.entries.get_mut(&update.txid) {
            if entry.latest.status.is_terminal() {
                return;
            }
            entry.latest = update.clone();
            entry.updates += 1;
            if update.status.is_terminal() {
                entry.finished_at_ms = Some(now_ms());
            }
        }
    }

    pub fn get(&self, txid: &Txid) -> Option<TrackedTransaction> {
        self.entries.get(txid).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict terminal entries past their retention.
    pub fn prune(&self) {
        self.prune_at(now_ms());
        metrics::set_tracked_transactions(self.entries.len());
    }

    /// Drop expired terminal entries, then make room for one more entry.
    /// Pending entries are never evicted; their monitors are bounded.
    fn prune_at(&self, now_ms: u64) {
        let ttl_ms = u64::try_from(self.retention.ttl.as_millis()).unwrap_or(u64::MAX);
        self.entries.retain(|_, entry| match entry.finished_at_ms {
            Some(finished) => now_ms.saturating_sub(finished) < ttl_ms,
            None => true,
        });

        let len = self.entries.len();
        if len < self.retention.max_entries {
            return;
        }
        let mut finished: Vec<(u64, Txid)> = self
            .entries
            .iter()
            .filter_map(|entry| entry.finished_at_ms.map(|at| (at, entry.txid)))
            .collect();
        finished.sort_unstable_by_key(|(at, _)| *at);

        let excess = len + 1 - self.retention.max_entries;
        for (_, txid) in finished.into_iter().take(excess) {
            self.entries.remove(&txid);
        }
    }

    /// Register `txid` and spawn a monitor task feeding this registry.
    ///
    /// Returns `None` when `txid` is already tracked by an earlier task.
    pub fn spawn_tracked<S>(
        &self,
        monitor: Arc<TransactionMonitor<S>>,
        txid: Txid,
        explorer_url: String,
        cancel: broadcast::Receiver<()>,
    ) -> Option<JoinHandle<MonitorOutcome>>
    where
        S: StatusSource + 'static,
    {
        if !self.register(txid, explorer_url) {
            tracing::debug!(txid = %txid, "Transaction already tracked");
            return None;
        }
        let registry = self.clone();
        Some(tokio::spawn(async move {
            let observer = |update: &StatusUpdate| registry.record(update);
            monitor.watch_until(txid, cancel, observer).await
        }))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::{ChainResult, TransactionRecord};
    use crate::monitor::types::MonitorStatus;
    use crate::monitor::watcher::MonitorSettings;
    use async_trait::async_trait;
    use std::time::Duration;

    struct AlwaysConfirmed;

    #[async_trait]
    impl StatusSource for AlwaysConfirmed {
        async fn fetch_status(&self, _txid: &Txid) -> ChainResult<Option<TransactionRecord>> {
            Ok(Some(TransactionRecord {
                tx_id: String::new(),
                tx_status: "success".into(),
                block_height: Some(42),
                block_hash: None,
                raw: serde_json::Value::Null,
            }))
        }
    }

    #[test]
    fn test_terminal_state_is_never_overwritten() {
        let registry = TransactionRegistry::new();
        let txid = Txid([1; 32]);
        registry.register(txid, "https://explorer/txid/01".into());
        assert_eq!(registry.get(&txid).unwrap().latest.status, MonitorStatus::Pending);

        registry.record(&StatusUpdate::timeout(txid, 60));
        registry.record(&StatusUpdate::not_found(txid, 61));

        let entry = registry.get(&txid).unwrap();
        assert_eq!(entry.latest.status, MonitorStatus::Timeout);
        assert_eq!(entry.updates, 1);
    }

    #[test]
    fn test_updates_for_unknown_txids_are_ignored() {
        let registry = TransactionRegistry::new();
        registry.record(&StatusUpdate::not_found(Txid([2; 32]), 1));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_monitor_updates_registry() {
        let registry = TransactionRegistry::new();
        let monitor = Arc::new(TransactionMonitor::new(
            AlwaysConfirmed,
            MonitorSettings {
                max_attempts: 5,
                poll_interval: Duration::from_secs(1),
            },
        ));
        let (_keep, cancel) = broadcast::channel(1);
        let txid = Txid([3; 32]);

        let outcome = registry
            .spawn_tracked(monitor.clone(), txid, String::new(), cancel)
            .unwrap()
            .await
            .unwrap();

        assert!(matches!(outcome, MonitorOutcome::Terminal(_)));
        let entry = registry.get(&txid).unwrap();
        assert_eq!(entry.latest.status, MonitorStatus::Confirmed);
        assert_eq!(entry.latest.block_height, Some(42));
        assert!(entry.finished_at_ms.is_some());

        let (_keep, cancel) = broadcast::channel(1);
        assert!(registry
            .spawn_tracked(monitor, txid, String::new(), cancel)
            .is_none());
        assert_eq!(registry.get(&txid).unwrap().updates, entry.updates);
    }

    #[test]
    fn test_reregistering_keeps_first_entry() {
        let registry = TransactionRegistry::new();
        let txid = Txid([4; 32]);
        assert!(registry.register(txid, "first".into()));
        registry.record(&StatusUpdate::timeout(txid, 60));

        assert!(!registry.register(txid, "second".into()));

        let entry = registry.get(&txid).unwrap();
        assert_eq!(entry.latest.status, MonitorStatus::Timeout);
        assert_eq!(entry.updates, 1);
        assert_eq!(entry.explorer_url, "first");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_expired_terminal_entries_are_evicted() {
        let registry = TransactionRegistry::with_retention(RetentionPolicy {
            ttl: Duration::from_secs(60),
            max_entries: 100,
        });
        let done = Txid([5; 32]);
        let pending = Txid([6; 32]);
        registry.register(done, String::new());
        registry.register(pending, String::new());
        registry.record(&StatusUpdate::timeout(done, 60));
        let finished = registry.get(&done).unwrap().finished_at_ms.unwrap();

        registry.prune_at(finished + 59_000);
        assert!(registry.get(&done).is_some());

        registry.prune_at(finished + 60_000);
        assert!(registry.get(&done).is_none());
        assert!(registry.get(&pending).is_some());
    }

    #[test]
    fn test_full_registry_evicts_oldest_terminal_entry() {
        let registry = TransactionRegistry::with_retention(RetentionPolicy {
            ttl: Duration::from_secs(3600),
            max_entries: 3,
        });
        let (a, b, c) = (Txid([7; 32]), Txid([8; 32]), Txid([9; 32]));
        for txid in [a, b, c] {
            registry.register(txid, String::new());
        }
        registry.record(&StatusUpdate::timeout(b, 60));
        registry.record(&StatusUpdate::timeout(c, 60));
        let now = now_ms();
        registry.entries.get_mut(&b).unwrap().finished_at_ms = Some(now - 2_000);
        registry.entries.get_mut(&c).unwrap().finished_at_ms = Some(now - 1_000);

        registry.prune_at(now);

        assert_eq!(registry.len(), 2);
        assert!(registry.get(&a).is_some(), "pending entries are kept");
        assert!(registry.get(&b).is_none());
        assert!(registry.get(&c).is_some());
        assert!(registry.register(Txid([10; 32]), String::new()));
        assert_eq!(registry.len(), 3);
    }
}
