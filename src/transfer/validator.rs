//! Transfer Validator
//!
//! Pure checks over two account snapshots and a requested amount. Evaluated
//! in a fixed order, first failure wins:
//!
//! 1. source and target are different accounts
//! 2. source balance covers the amount
//! 3. source and target share a currency
//!
//! The order decides which error is reported when several conditions fail at
//! once and must not change.

use rust_decimal::Decimal;

use super::error::ValidationError;
use crate::account::Account;

/// Validate a transfer of `amount` from `source` to `target`
pub fn validate(source: &Account, target: &Account, amount: Decimal) -> Result<(), ValidationError> {
    if source.id == target.id {
        return Err(ValidationError::SameAccount(source.id));
    }

    if source.balance < amount {
        return Err(ValidationError::InsufficientBalance {
            account_id: source.id,
            requested: amount,
            available: source.balance,
        });
    }

    if source.currency != target.currency {
        return Err(ValidationError::CurrencyMismatch {
            source_currency: source.currency,
            target_currency: target.currency,
        });
    }

    Ok(())
}
