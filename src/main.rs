//! Money Transfer
//!
//! Executes a single transfer and prints the resulting record as JSON.
//!
//! ```text
//! money_transfer [--env dev] --from 1 --to 2 --amount 100.00
//! ```
//!
//! Without `postgres_url` in the config an in-memory store seeded with two
//! GBP accounts (1: 2000, 2: 1000) is used.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use tracing::{info, warn};

use money_transfer::account::{Account, AccountId, Currency};
use money_transfer::config::AppConfig;
use money_transfer::db::Database;
use money_transfer::logging::init_logging;
use money_transfer::store::{AccountStore, MemoryAccountStore, PgAccountStore};
use money_transfer::transfer::{RecordReconciler, TransferError, TransferExecutor, TransferRequest};

fn get_arg(args: &[String], names: &[&str]) -> Option<String> {
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_request(args: &[String]) -> Result<TransferRequest> {
    let Some(from) = get_arg(args, &["--from"]) else {
        bail!("missing --from <account id>");
    };
    let Some(to) = get_arg(args, &["--to"]) else {
        bail!("missing --to <account id>");
    };
    let Some(amount) = get_arg(args, &["--amount"]) else {
        bail!("missing --amount <decimal>");
    };

    let from: i64 = from.parse().with_context(|| format!("invalid --from: {}", from))?;
    let to: i64 = to.parse().with_context(|| format!("invalid --to: {}", to))?;
    let amount: Decimal = amount
        .parse()
        .with_context(|| format!("invalid --amount: {}", amount))?;

    Ok(TransferRequest::new(from, to, amount))
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn AccountStore>> {
    match &config.postgres_url {
        Some(url) => {
            let db = Database::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            db.health_check().await?;
            db.ensure_schema().await?;
            info!("Using PostgreSQL account store");
            Ok(Arc::new(PgAccountStore::new(db.pool().clone())))
        }
        None => {
            let store = MemoryAccountStore::with_accounts([
                Account::new(AccountId::new(1), Decimal::from(2000), Currency::Gbp),
                Account::new(AccountId::new(2), Decimal::from(1000), Currency::Gbp),
            ])?;
            let accounts = store.len()?;
            info!(accounts, "Using in-memory account store");
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let env = get_arg(&args, &["--env", "-e"]).unwrap_or_else(|| "dev".to_string());

    let config = AppConfig::load(&env)?;
    let _guard = init_logging(&config);
    info!(env = %env, "Starting money_transfer");

    let request = parse_request(&args)?;
    let store = open_store(&config).await?;
    let executor = TransferExecutor::with_config(store.clone(), config.transfer.clone());

    let record = match executor.execute_request(request).await {
        Ok(record) => record,
        Err(TransferError::RecordNotPersisted { record, reason }) => {
            warn!(transfer_id = %record.id, reason = %reason, "Replaying transfer record");
            let reconciler = RecordReconciler::new(store, config.reconcile.clone());
            reconciler
                .replay_one(&record)
                .await
                .with_context(|| format!("transfer {} committed but not recorded", record.id))?;
            *record
        }
        Err(e) => {
            let context = format!("transfer failed [{}] ({:?})", e.code(), e.class());
            return Err(anyhow::Error::new(e).context(context));
        }
    };

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
