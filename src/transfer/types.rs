//! Transfer Core Types
//!
//! Identifiers, requests and the durable transfer record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::account::{AccountId, Currency};

/// Transfer ID type - ULID-based unique identifier
///
/// Using ULID provides:
/// - Monotonic, sortable IDs
/// - No coordination needed between executor instances
/// - 128-bit with good entropy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransferId(ulid::Ulid);

impl TransferId {
    /// Generate a new unique TransferId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Get the inner ULID value
    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

impl Serialize for TransferId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TransferId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Transfer request: the arguments of the single inbound operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source: AccountId,
    pub target: AccountId,
    pub amount: Decimal,
}

impl TransferRequest {
    pub fn new(source: impl Into<AccountId>, target: impl Into<AccountId>, amount: Decimal) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            amount,
        }
    }
}

/// Durable receipt of one completed transfer
///
/// Exists only if both the debit and the credit were committed. Account ids
/// are identity snapshots, not live references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: TransferId,
    pub source_account_id: AccountId,
    pub target_account_id: AccountId,
    pub amount: Decimal,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    pub fn new(
        id: TransferId,
        source_account_id: AccountId,
        target_account_id: AccountId,
        amount: Decimal,
        currency: Currency,
    ) -> Self {
        Self {
            id,
            source_account_id,
            target_account_id,
            amount,
            currency,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_id_display_parse() {
        let id = TransferId::new();
        let s = id.to_string();
        assert_eq!(s.len(), 26);
        assert_eq!(s.parse::<TransferId>().unwrap(), id);
        assert!("not-a-ulid".parse::<TransferId>().is_err());
    }

    #[test]
    fn test_transfer_ids_are_unique() {
        let a = TransferId::new();
        let b = TransferId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_serializes_id_as_string() {
        let record = TransferRecord::new(
            TransferId::new(),
            AccountId::new(1),
            AccountId::new(2),
            Decimal::from(100),
            Currency::Gbp,
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], serde_json::json!(record.id.to_string()));
        assert_eq!(json["source_account_id"], serde_json::json!(1));
        assert_eq!(json["currency"], serde_json::json!("GBP"));

        let back: TransferRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
