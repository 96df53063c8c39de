//! In-memory account store
//!
//! Each account row sits behind its own mutex, so two transfers that share no
//! account never contend. A batch save locks its rows one by one in the order
//! given, verifies every version, and only then applies the writes.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use async_trait::async_trait;
use tracing::debug;

use super::{AccountStore, StoreError};
use crate::account::{Account, AccountId};
use crate::transfer::{TransferId, TransferRecord};

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::backend(format!("Lock poisoned: {}", e))
}

/// In-memory account store
#[derive(Default)]
pub struct MemoryAccountStore {
    rows: RwLock<HashMap<AccountId, Arc<Mutex<Account>>>>,
    records: Mutex<BTreeMap<TransferId, TransferRecord>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with accounts (replaces rows with the same id)
    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Result<Self, StoreError> {
        let store = Self::new();
        for account in accounts {
            store.insert(account)?;
        }
        Ok(store)
    }

    /// Insert or replace an account row as-is
    pub fn insert(&self, account: Account) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        rows.insert(account.id, Arc::new(Mutex::new(account)));
        Ok(())
    }

    /// Current committed state of an account
    pub fn snapshot(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let Some(row) = self.row(id)? else {
            return Ok(None);
        };
        let account = row.lock().map_err(poisoned)?;
        Ok(Some(account.clone()))
    }

    /// Number of account rows
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.rows.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// All persisted transfer records, oldest first
    pub fn records(&self) -> Result<Vec<TransferRecord>, StoreError> {
        let records = self.records.lock().map_err(poisoned)?;
        Ok(records.values().cloned().collect())
    }

    fn row(&self, id: AccountId) -> Result<Option<Arc<Mutex<Account>>>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.get(&id).cloned())
    }

    /// Lock, verify and apply a batch. Never held across an await.
    fn commit_batch(&self, accounts: &[Account]) -> Result<(), StoreError> {
        for (i, account) in accounts.iter().enumerate() {
            if accounts[..i].iter().any(|a| a.id == account.id) {
                return Err(StoreError::backend(format!(
                    "Account {} appears twice in one batch",
                    account.id
                )));
            }
        }

        let mut rows = Vec::with_capacity(accounts.len());
        for account in accounts {
            let row = self
                .row(account.id)?
                .ok_or(StoreError::NotFound(account.id))?;
            rows.push(row);
        }

        // Lock in the caller's order
        let mut guards: Vec<MutexGuard<'_, Account>> = Vec::with_capacity(rows.len());
        for row in &rows {
            guards.push(row.lock().map_err(poisoned)?);
        }

        for (stored, update) in guards.iter().zip(accounts) {
            if stored.version != update.version {
                return Err(StoreError::VersionConflict {
                    account_id: update.id,
                    expected: update.version,
                    actual: stored.version,
                });
            }
        }

        for (stored, update) in guards.iter_mut().zip(accounts) {
            stored.balance = update.balance;
            stored.version += 1;
        }

        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.snapshot(id)
    }

    async fn conditional_save_accounts(&self, accounts: &[Account]) -> Result<(), StoreError> {
        self.commit_batch(accounts)?;
        debug!(rows = accounts.len(), "Memory store batch committed");
        Ok(())
    }

    async fn save_transfer_record(&self, record: &TransferRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(poisoned)?;
        records.entry(record.id).or_insert_with(|| record.clone());
        Ok(())
    }
}
