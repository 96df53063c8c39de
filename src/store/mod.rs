//! Account Store
//!
//! Port through which the executor reads and writes accounts, plus the two
//! adapters shipped with the crate.
//!
//! # Conditional saves
//!
//! An account passed to a save carries the `version` that was read. The save
//! succeeds only if the stored version still equals it, and then writes the
//! new balance together with `version + 1`. On mismatch nothing is written.

pub mod memory;
pub mod postgres;

pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::account::{Account, AccountId};
use crate::transfer::TransferRecord;

/// Account store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Version conflict on account {account_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        account_id: AccountId,
        expected: i64,
        actual: i64,
    },

    #[error("Account not found: {0}")]
    NotFound(AccountId),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Account store port
///
/// Implementations must provide per-record optimistic versioning and durable
/// writes. All methods may suspend on I/O.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Store name for logging
    fn name(&self) -> &'static str;

    /// Load an account snapshot together with its current version
    async fn load_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Conditionally save a single account
    async fn conditional_save_account(&self, account: &Account) -> Result<(), StoreError> {
        self.conditional_save_accounts(std::slice::from_ref(account))
            .await
    }

    /// Conditionally save several accounts as one unit
    ///
    /// Either every account is written or none is. Rows are written (and, for
    /// stores that lock, locked) in exactly the order given; callers that
    /// touch more than one account must pass them in ascending id order.
    async fn conditional_save_accounts(&self, accounts: &[Account]) -> Result<(), StoreError>;

    /// Persist a transfer record
    ///
    /// # Idempotency
    /// Saving a record whose id already exists is a no-op success.
    async fn save_transfer_record(&self, record: &TransferRecord) -> Result<(), StoreError>;
}
