//! Write ordering for multi-account commits
//!
//! Stores that take row locks inside a transaction lock rows in the order
//! they are written. Two transfers touching the same pair of accounts in
//! opposite roles (X→Y and Y→X) would otherwise lock X-then-Y and Y-then-X
//! and could deadlock. Every multi-account write is therefore issued in
//! ascending [`AccountId`] order, regardless of source/target role.
//!
//! [`AccountId`]: crate::account::AccountId

use crate::account::Account;

/// Updated source/target pair in the global write order
pub fn ordered_pair(source: Account, target: Account) -> [Account; 2] {
    if source.id <= target.id {
        [source, target]
    } else {
        [target, source]
    }
}
