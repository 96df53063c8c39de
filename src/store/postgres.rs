//! PostgreSQL account store
//!
//! A batch save runs inside one database transaction. Each `UPDATE` carries
//! the expected version in its `WHERE` clause (atomic CAS) and takes the row
//! lock, so rows are locked in the order the caller passed them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use super::{AccountStore, StoreError};
use crate::account::{Account, AccountId, Currency};
use crate::transfer::TransferRecord;

/// PostgreSQL-backed account store
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    /// Create a new PgAccountStore with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an account row (account creation happens outside the executor)
    pub async fn create_account(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts_tb (account_id, balance, currency, version, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(account.id.get())
        .bind(account.balance)
        .bind(account.currency.as_str())
        .bind(account.version)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_account(row: &PgRow) -> Result<Account, StoreError> {
        let currency: String = row.try_get("currency")?;
        let currency: Currency = currency
            .parse()
            .map_err(|e: crate::account::UnknownCurrency| StoreError::backend(e.to_string()))?;

        Ok(Account {
            id: AccountId::new(row.try_get::<i64, _>("account_id")?),
            balance: row.try_get::<Decimal, _>("balance")?,
            currency,
            version: row.try_get::<i64, _>("version")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn load_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT account_id, balance, currency, version, created_at
            FROM accounts_tb
            WHERE account_id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    async fn conditional_save_accounts(&self, accounts: &[Account]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for account in accounts {
            let result = sqlx::query(
                r#"
                UPDATE accounts_tb
                SET balance = $1, version = version + 1
                WHERE account_id = $2 AND version = $3
                "#,
            )
            .bind(account.balance)
            .bind(account.id.get())
            .bind(account.version)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let actual: Option<i64> =
                    sqlx::query_scalar("SELECT version FROM accounts_tb WHERE account_id = $1")
                        .bind(account.id.get())
                        .fetch_optional(&mut *tx)
                        .await?;
                tx.rollback().await?;

                warn!(
                    account_id = %account.id,
                    expected = account.version,
                    actual = ?actual,
                    "Conditional save rejected, transaction rolled back"
                );
                return Err(match actual {
                    Some(actual) => StoreError::VersionConflict {
                        account_id: account.id,
                        expected: account.version,
                        actual,
                    },
                    None => StoreError::NotFound(account.id),
                });
            }
        }

        tx.commit().await?;
        debug!(rows = accounts.len(), "Postgres batch committed");
        Ok(())
    }

    async fn save_transfer_record(&self, record: &TransferRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transfers_tb
                (transfer_id, source_account_id, target_account_id, amount, currency, created_at)
            VALUES
                ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (transfer_id) DO NOTHING
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.source_account_id.get())
        .bind(record.target_account_id.get())
        .bind(record.amount)
        .bind(record.currency.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
