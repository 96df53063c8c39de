//! Transfer Executor
//!
//! Runs one transfer attempt end to end:
//!
//! ```text
//! Started → Validated → Committed → Recorded → Done
//!    ↓           ↓
//! Rejected   Conflicted
//! NotFound   NotFound
//! ```
//!
//! Both accounts are read once. The debit and credit are then written as a
//! single conditional batch carrying the versions that were read, so a
//! concurrent writer on either account makes the whole batch fail with
//! nothing applied. The executor never retries on its own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::concurrency::ordered_pair;
use super::error::{StoreOp, TransferError, ValidationError};
use super::state::TransferPhase;
use super::types::{TransferId, TransferRecord, TransferRequest};
use super::validator::validate;
use crate::account::{Account, AccountId};
use crate::config::TransferConfig;
use crate::store::{AccountStore, StoreError};

/// Phase tracker for a single attempt
struct Attempt {
    id: TransferId,
    phase: TransferPhase,
}

impl Attempt {
    fn start(id: TransferId) -> Self {
        Self {
            id,
            phase: TransferPhase::Started,
        }
    }

    fn advance(&mut self, next: TransferPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal transition {} -> {}",
            self.phase,
            next
        );
        debug!(transfer_id = %self.id, from = %self.phase, to = %next, "Transfer phase");
        self.phase = next;
    }
}

/// Transfer executor
pub struct TransferExecutor {
    store: Arc<dyn AccountStore>,
    config: TransferConfig,
}

impl TransferExecutor {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self::with_config(store, TransferConfig::default())
    }

    pub fn with_config(store: Arc<dyn AccountStore>, config: TransferConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    pub async fn execute_request(
        &self,
        request: TransferRequest,
    ) -> Result<TransferRecord, TransferError> {
        self.execute(request.source, request.target, request.amount)
            .await
    }

    /// Move `amount` from `source_id` to `target_id`
    ///
    /// On success both balances have been committed and the returned record
    /// has been persisted. `RecordNotPersisted` means the balances did move
    /// and the record inside the error still has to be written.
    pub async fn execute(
        &self,
        source_id: AccountId,
        target_id: AccountId,
        amount: Decimal,
    ) -> Result<TransferRecord, TransferError> {
        let mut attempt = Attempt::start(TransferId::new());
        let result = self
            .run(&mut attempt, source_id, target_id, amount)
            .await;

        match &result {
            Ok(record) => info!(
                transfer_id = %record.id,
                source = %source_id,
                target = %target_id,
                amount = %amount,
                "Transfer completed"
            ),
            Err(e @ TransferError::RecordNotPersisted { .. }) => error!(
                transfer_id = %attempt.id,
                error = %e,
                "Balances committed without a transfer record"
            ),
            Err(e) => warn!(
                transfer_id = %attempt.id,
                source = %source_id,
                target = %target_id,
                amount = %amount,
                phase = %attempt.phase,
                code = e.code(),
                error = %e,
                "Transfer failed"
            ),
        }

        result
    }

    async fn run(
        &self,
        attempt: &mut Attempt,
        source_id: AccountId,
        target_id: AccountId,
        amount: Decimal,
    ) -> Result<TransferRecord, TransferError> {
        // Same-account wins over every other failure, missing rows included
        if source_id == target_id {
            attempt.advance(TransferPhase::Rejected);
            return Err(ValidationError::SameAccount(source_id).into());
        }
        if amount <= Decimal::ZERO {
            attempt.advance(TransferPhase::Rejected);
            return Err(TransferError::InvalidAmount(amount));
        }

        let source = self.load(attempt, source_id).await?;
        let target = self.load(attempt, target_id).await?;

        if let Err(e) = validate(&source, &target, amount) {
            attempt.advance(TransferPhase::Rejected);
            return Err(e.into());
        }

        let (Some(debited), Some(credited)) = (
            source.balance.checked_sub(amount),
            target.balance.checked_add(amount),
        ) else {
            attempt.advance(TransferPhase::Rejected);
            return Err(TransferError::Overflow(target.id));
        };
        attempt.advance(TransferPhase::Validated);

        let batch = ordered_pair(source.with_balance(debited), target.with_balance(credited));
        match self
            .bounded(StoreOp::SaveAccounts, self.store.conditional_save_accounts(&batch))
            .await
        {
            Ok(()) => attempt.advance(TransferPhase::Committed),
            Err(e) => {
                if matches!(
                    e,
                    TransferError::ConcurrencyConflict(_) | TransferError::AccountNotFound(_)
                ) {
                    attempt.advance(e.phase());
                }
                return Err(e);
            }
        }

        let record = TransferRecord::new(attempt.id, source.id, target.id, amount, source.currency);
        let saved = tokio::time::timeout(
            self.timeout(),
            self.store.save_transfer_record(&record),
        )
        .await;
        let reason = match saved {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "{} timed out after {:?}",
                self.store.name(),
                self.timeout()
            )),
        };
        if let Some(reason) = reason {
            return Err(TransferError::RecordNotPersisted {
                record: Box::new(record),
                reason,
            });
        }
        attempt.advance(TransferPhase::Recorded);
        attempt.advance(TransferPhase::Done);

        Ok(record)
    }

    async fn load(&self, attempt: &mut Attempt, id: AccountId) -> Result<Account, TransferError> {
        match self
            .bounded(StoreOp::LoadAccount, self.store.load_account(id))
            .await?
        {
            Some(account) => Ok(account),
            None => {
                attempt.advance(TransferPhase::NotFound);
                Err(TransferError::AccountNotFound(id))
            }
        }
    }

    async fn bounded<T>(
        &self,
        op: StoreOp,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, TransferError> {
        match tokio::time::timeout(self.timeout(), fut).await {
            Ok(result) => result.map_err(TransferError::from),
            Err(_) => Err(TransferError::Timeout { op }),
        }
    }

    fn timeout(&self) -> Duration {
        self.config.store_timeout()
    }
}
