//! Transfer Error Types
//!
//! Every failure carries enough detail (account id, requested vs available,
//! currencies) for the caller to render a precise message.

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use super::state::TransferPhase;
use super::types::TransferRecord;
use crate::account::{AccountId, Currency};
use crate::store::StoreError;

/// Precondition failures reported by the validator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Transfer between same account is not possible: {0}")]
    SameAccount(AccountId),

    #[error("Insufficient balance for account {account_id}: requested {requested}, available {available}")]
    InsufficientBalance {
        account_id: AccountId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Currency mismatch: source currency {source_currency}, target currency {target_currency}")]
    CurrencyMismatch {
        source_currency: Currency,
        target_currency: Currency,
    },
}

/// Store operation a timeout happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    LoadAccount,
    SaveAccounts,
}

impl StoreOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOp::LoadAccount => "load_account",
            StoreOp::SaveAccounts => "save_accounts",
        }
    }

    /// Whether the store may have applied a write before the timeout fired
    pub fn may_have_mutated(&self) -> bool {
        matches!(self, StoreOp::SaveAccounts)
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a failure should be presented to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Deterministic rejection; retrying with the same inputs fails again
    Rejected,
    /// Transient; re-read, re-validate and retry the whole operation
    Retryable,
    /// Outcome unknown; re-read balances before retrying, never blindly resend
    Inconclusive,
    /// Balances moved but the receipt is missing; needs reconciliation
    DegradedSuccess,
    /// Store failure unrelated to concurrency
    Internal,
}

/// Transfer error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    #[error("Account does not exist: {0}")]
    AccountNotFound(AccountId),

    #[error("Amount must be greater than zero: {0}")]
    InvalidAmount(Decimal),

    #[error("Balance of account {0} would overflow")]
    Overflow(AccountId),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Transfer failed, there is a modify operation in progress on account {0}, please try again")]
    ConcurrencyConflict(AccountId),

    #[error("Transfer {} committed but its record was not persisted: {reason}", .record.id)]
    RecordNotPersisted {
        record: Box<TransferRecord>,
        reason: String,
    },

    #[error("Store timed out during {op}")]
    Timeout { op: StoreOp },

    #[error("Store error: {0}")]
    Store(String),
}

impl TransferError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::InvalidAmount(_) => "INVALID_AMOUNT",
            TransferError::Overflow(_) => "OVERFLOW",
            TransferError::Validation(ValidationError::SameAccount(_)) => "SAME_ACCOUNT",
            TransferError::Validation(ValidationError::InsufficientBalance { .. }) => {
                "INSUFFICIENT_BALANCE"
            }
            TransferError::Validation(ValidationError::CurrencyMismatch { .. }) => {
                "CURRENCY_MISMATCH"
            }
            TransferError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            TransferError::RecordNotPersisted { .. } => "RECORD_NOT_PERSISTED",
            TransferError::Timeout { .. } => "TIMEOUT",
            TransferError::Store(_) => "STORE_ERROR",
        }
    }

    /// Caller-facing classification
    pub fn class(&self) -> ErrorClass {
        match self {
            TransferError::AccountNotFound(_)
            | TransferError::InvalidAmount(_)
            | TransferError::Overflow(_)
            | TransferError::Validation(_) => ErrorClass::Rejected,
            TransferError::ConcurrencyConflict(_) => ErrorClass::Retryable,
            TransferError::Timeout { op } if op.may_have_mutated() => ErrorClass::Inconclusive,
            TransferError::Timeout { .. } => ErrorClass::Retryable,
            TransferError::RecordNotPersisted { .. } => ErrorClass::DegradedSuccess,
            TransferError::Store(_) => ErrorClass::Internal,
        }
    }

    /// Terminal phase of the attempt that produced this error
    pub fn phase(&self) -> TransferPhase {
        match self {
            TransferError::AccountNotFound(_) => TransferPhase::NotFound,
            TransferError::InvalidAmount(_)
            | TransferError::Overflow(_)
            | TransferError::Validation(_) => TransferPhase::Rejected,
            TransferError::ConcurrencyConflict(_) => TransferPhase::Conflicted,
            TransferError::RecordNotPersisted { .. } => TransferPhase::Committed,
            TransferError::Timeout { op: StoreOp::LoadAccount } => TransferPhase::Started,
            TransferError::Timeout { op: StoreOp::SaveAccounts } | TransferError::Store(_) => {
                TransferPhase::Validated
            }
        }
    }

    /// Whether re-reading and retrying the whole operation may succeed
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// The committed transfer whose record still has to be written, if any
    pub fn unpersisted_record(&self) -> Option<&TransferRecord> {
        match self {
            TransferError::RecordNotPersisted { record, .. } => Some(&**record),
            _ => None,
        }
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::VersionConflict { account_id, .. } => {
                TransferError::ConcurrencyConflict(account_id)
            }
            StoreError::NotFound(account_id) => TransferError::AccountNotFound(account_id),
            StoreError::Backend(msg) => TransferError::Store(msg),
        }
    }
}

impl From<sqlx::Error> for TransferError {
    fn from(e: sqlx::Error) -> Self {
        TransferError::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TransferId;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            TransferError::from(ValidationError::SameAccount(AccountId::new(1))).code(),
            "SAME_ACCOUNT"
        );
        assert_eq!(
            TransferError::ConcurrencyConflict(AccountId::new(1)).code(),
            "CONCURRENCY_CONFLICT"
        );
        assert_eq!(
            TransferError::AccountNotFound(AccountId::new(1)).code(),
            "ACCOUNT_NOT_FOUND"
        );
    }

    #[test]
    fn test_classes() {
        assert_eq!(
            TransferError::AccountNotFound(AccountId::new(1)).class(),
            ErrorClass::Rejected
        );
        assert_eq!(
            TransferError::ConcurrencyConflict(AccountId::new(1)).class(),
            ErrorClass::Retryable
        );
        assert!(TransferError::ConcurrencyConflict(AccountId::new(1)).is_retryable());
        assert_eq!(
            TransferError::Timeout { op: StoreOp::LoadAccount }.class(),
            ErrorClass::Retryable
        );
        assert_eq!(
            TransferError::Timeout { op: StoreOp::SaveAccounts }.class(),
            ErrorClass::Inconclusive
        );
        assert!(!TransferError::Timeout { op: StoreOp::SaveAccounts }.is_retryable());

        let record = TransferRecord::new(
            TransferId::new(),
            AccountId::new(1),
            AccountId::new(2),
            Decimal::from(1),
            Currency::Gbp,
        );
        let err = TransferError::RecordNotPersisted {
            record: Box::new(record),
            reason: "disk full".into(),
        };
        assert_eq!(err.class(), ErrorClass::DegradedSuccess);
        assert!(err.phase().has_committed_balances());
        assert!(err.unpersisted_record().is_some());
        assert!(TransferError::Overflow(AccountId::new(2)).unpersisted_record().is_none());
    }

    #[test]
    fn test_store_error_mapping() {
        let conflict = StoreError::VersionConflict {
            account_id: AccountId::new(9),
            expected: 1,
            actual: 2,
        };
        assert_eq!(
            TransferError::from(conflict),
            TransferError::ConcurrencyConflict(AccountId::new(9))
        );
        assert_eq!(
            TransferError::from(StoreError::NotFound(AccountId::new(4))),
            TransferError::AccountNotFound(AccountId::new(4))
        );
        assert_eq!(
            TransferError::from(StoreError::backend("boom")).class(),
            ErrorClass::Internal
        );
    }

    #[test]
    fn test_display_carries_details() {
        let err = TransferError::from(ValidationError::InsufficientBalance {
            account_id: AccountId::new(102),
            requested: Decimal::from(500),
            available: Decimal::from(300),
        });
        let msg = err.to_string();
        assert!(msg.contains("102"));
        assert!(msg.contains("requested 500"));
        assert!(msg.contains("available 300"));

        let err = TransferError::from(ValidationError::CurrencyMismatch {
            source_currency: Currency::Gbp,
            target_currency: Currency::Eur,
        });
        assert_eq!(
            err.to_string(),
            "Currency mismatch: source currency GBP, target currency EUR"
        );
    }
}
