//! Money Transfer Core
//!
//! Moves funds between two accounts with optimistic concurrency control.
//!
//! # Modules
//!
//! - [`account`] - Account, AccountId and Currency
//! - [`transfer`] - Validator, executor, record reconciler and error types
//! - [`store`] - Account store port plus in-memory and PostgreSQL adapters
//! - [`db`] - PostgreSQL connection and schema
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

pub mod account;
pub mod config;
pub mod db;
pub mod logging;
pub mod store;
pub mod transfer;

// Convenient re-exports at crate root
pub use account::{Account, AccountId, Currency};
pub use config::{AppConfig, TransferConfig};
pub use store::{AccountStore, MemoryAccountStore, PgAccountStore, StoreError};
pub use transfer::{
    ErrorClass, RecordReconciler, TransferError, TransferExecutor, TransferId, TransferRecord,
    TransferRequest, ValidationError,
};
