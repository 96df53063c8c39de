//! Account data model
//!
//! Accounts are created outside this crate; here they are only loaded,
//! validated and mutated through the transfer executor.

pub mod models;

// Re-export commonly used types
pub use models::{Account, AccountId, Currency, UnknownCurrency};
