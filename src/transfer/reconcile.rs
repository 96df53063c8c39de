//! Record Reconciler
//!
//! Replays transfer records whose write failed after the balances were
//! committed. Record saves are idempotent, so replaying a record that did land
//! after all is harmless.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::types::{TransferId, TransferRecord};
use crate::store::{AccountStore, StoreError};

/// Retry policy for record replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Attempts per record, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after every failure
    pub initial_backoff_ms: u64,
    /// Upper bound for one save attempt; an elapsed attempt counts as failed
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

fn default_attempt_timeout_ms() -> u64 {
    5_000
}

impl ReconcileConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 50,
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

/// Outcome of a replay run
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub persisted: Vec<TransferId>,
    /// Records still missing, with the last error seen
    pub failed: Vec<(TransferRecord, String)>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct RecordReconciler {
    store: Arc<dyn AccountStore>,
    config: ReconcileConfig,
}

impl RecordReconciler {
    pub fn new(store: Arc<dyn AccountStore>, config: ReconcileConfig) -> Self {
        Self { store, config }
    }

    pub fn with_defaults(store: Arc<dyn AccountStore>) -> Self {
        Self::new(store, ReconcileConfig::default())
    }

    /// Persist one record, retrying with exponential backoff
    pub async fn replay_one(&self, record: &TransferRecord) -> Result<(), StoreError> {
        let attempts = self.config.max_attempts.max(1);
        let mut backoff = Duration::from_millis(self.config.initial_backoff_ms);
        let mut attempt = 1;

        loop {
            let saved = tokio::time::timeout(
                self.config.attempt_timeout(),
                self.store.save_transfer_record(record),
            )
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::backend(format!(
                    "{} timed out after {:?}",
                    self.store.name(),
                    self.config.attempt_timeout()
                )))
            });

            match saved {
                Ok(()) => {
                    debug!(transfer_id = %record.id, attempt, "Transfer record persisted");
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        transfer_id = %record.id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Record replay failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Replay every record, collecting the ones that still fail
    pub async fn replay(&self, records: impl IntoIterator<Item = TransferRecord>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for record in records {
            match self.replay_one(&record).await {
                Ok(()) => report.persisted.push(record.id),
                Err(e) => {
                    error!(
                        transfer_id = %record.id,
                        attempts = self.config.max_attempts,
                        error = %e,
                        "Giving up on transfer record"
                    );
                    report.failed.push((record, e.to_string()));
                }
            }
        }

        info!(
            persisted = report.persisted.len(),
            failed = report.failed.len(),
            "Record reconciliation finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, AccountId, Currency};
    use crate::store::MemoryAccountStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` record saves
    struct FlakyRecords {
        inner: MemoryAccountStore,
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl AccountStore for FlakyRecords {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn load_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
            self.inner.load_account(id).await
        }

        async fn conditional_save_accounts(&self, accounts: &[Account]) -> Result<(), StoreError> {
            self.inner.conditional_save_accounts(accounts).await
        }

        async fn save_transfer_record(&self, record: &TransferRecord) -> Result<(), StoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(StoreError::backend("connection reset"));
            }
            self.inner.save_transfer_record(record).await
        }
    }

    fn flaky(failures: u32) -> Arc<FlakyRecords> {
        Arc::new(FlakyRecords {
            inner: MemoryAccountStore::new(),
            failures,
            calls: AtomicU32::new(0),
        })
    }

    fn record(amount: i64) -> TransferRecord {
        TransferRecord::new(
            TransferId::new(),
            AccountId::new(1),
            AccountId::new(2),
            Decimal::from(amount),
            Currency::Gbp,
        )
    }

    fn config(max_attempts: u32) -> ReconcileConfig {
        ReconcileConfig {
            max_attempts,
            initial_backoff_ms: 1,
            attempt_timeout_ms: 100,
        }
    }

    /// Record saves that never complete
    struct StalledRecords {
        calls: AtomicU32,
    }

    #[async_trait]
    impl AccountStore for StalledRecords {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn load_account(&self, _id: AccountId) -> Result<Option<Account>, StoreError> {
            Ok(None)
        }

        async fn conditional_save_accounts(&self, _accounts: &[Account]) -> Result<(), StoreError> {
            Ok(())
        }

        async fn save_transfer_record(&self, _record: &TransferRecord) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_replay_recovers_after_transient_failures() {
        let store = flaky(2);
        let reconciler = RecordReconciler::new(store.clone(), config(3));
        let record = record(100);

        reconciler.replay_one(&record).await.unwrap();

        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.inner.records().unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_replay_gives_up() {
        let store = flaky(10);
        let reconciler = RecordReconciler::new(store.clone(), config(2));

        let report = reconciler.replay([record(5), record(6)]).await;

        assert!(report.persisted.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed[0].1.contains("connection reset"));
        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_replay_is_idempotent() {
        let store = flaky(0);
        let reconciler = RecordReconciler::with_defaults(store.clone());
        let record = record(7);

        let report = reconciler.replay([record.clone(), record.clone()]).await;

        assert!(report.is_clean());
        assert_eq!(report.persisted, vec![record.id, record.id]);
        assert_eq!(store.inner.records().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stalled_store_gives_up_after_bounded_attempts() {
        let store = Arc::new(StalledRecords {
            calls: AtomicU32::new(0),
        });
        let reconciler = RecordReconciler::new(store.clone(), config(2));

        let result = tokio::time::timeout(Duration::from_secs(5), reconciler.replay_one(&record(9)))
            .await
            .expect("replay must not hang on a stalled store");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }
}
