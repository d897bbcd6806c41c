// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::path::PathBuf;

use anyhow::Result;
use fin_ledger::application::SqliteLedger;
use fin_ledger::domain::{Cents, StatementEntry, UserId};
use fin_ledger::storage::LedgerStore;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(SqliteLedger, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = SqliteLedger::init(db_path(&temp_dir).to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

pub fn db_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("test.db")
}

/// A second connection pool on the test database, bypassing the service
pub async fn raw_pool(temp_dir: &TempDir) -> Result<SqlitePool> {
    Ok(SqlitePool::connect(&format!("sqlite:{}", db_path(temp_dir).display())).await?)
}

/// Register a user in the service's directory and return its id
pub async fn add_user(service: &SqliteLedger, name: &str) -> Result<UserId> {
    Ok(service.directory().register_user(name).await?.id)
}

/// Register a user and fund the account with a deposit
pub async fn funded_user(service: &SqliteLedger, name: &str, amount: Cents) -> Result<UserId> {
    let user = add_user(service, name).await?;
    service.record_deposit(user, amount, "initial deposit").await?;
    Ok(user)
}

/// Every entry in the ledger, in creation order
pub async fn all_entries(service: &SqliteLedger) -> Result<Vec<StatementEntry>> {
    service.store().list_all().await
}
