//! Money Transfer
//!
//! Moves an amount between two accounts held in an [`AccountStore`] using
//! optimistic concurrency: snapshots are read with their versions, checked by
//! the validator, and written back as one conditional batch.
//!
//! # Guarantees
//!
//! 1. **No partial transfer**: debit and credit commit together or not at all
//! 2. **No lost update**: a stale version makes the commit fail, nothing is applied
//! 3. **Conservation**: the sum of balances is unchanged by a successful transfer
//! 4. **Caller-driven retry**: conflicts are reported, never retried internally
//!
//! [`AccountStore`]: crate::store::AccountStore

pub mod concurrency;
pub mod error;
pub mod executor;
pub mod reconcile;
pub mod state;
pub mod types;
pub mod validator;

pub use error::{ErrorClass, StoreOp, TransferError, ValidationError};
pub use executor::TransferExecutor;
pub use reconcile::{ReconcileConfig, ReconcileReport, RecordReconciler};
pub use state::TransferPhase;
pub use types::{TransferId, TransferRecord, TransferRequest};
pub use validator::validate;
