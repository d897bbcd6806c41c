mod common;

use anyhow::Result;
use chrono::Utc;
use common::{add_user, funded_user, raw_pool, test_service};
use fin_ledger::application::{QueryError, RecordError};
use fin_ledger::domain::EntryKind;
use fin_ledger::io::StatementExporter;
use tempfile::TempDir;
use uuid::Uuid;

/// Insert a row directly, bypassing the ledger service, the way data
/// migrated from an older deployment would appear.
async fn insert_raw_row(
    temp: &TempDir,
    sequence: i64,
    owner: Uuid,
    counterparty: Option<Uuid>,
    kind: &str,
    amount: i64,
) -> Result<Uuid> {
    let pool = raw_pool(temp).await?;
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO statements (id, sequence, user_id, sender_id, type, amount, description, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(sequence)
    .bind(owner.to_string())
    .bind(counterparty.map(|c| c.to_string()))
    .bind(kind)
    .bind(amount)
    .bind("imported")
    .bind(Utc::now().to_rfc3339())
    .execute(&pool)
    .await?;
    pool.close().await;
    Ok(id)
}

#[tokio::test]
async fn test_healthy_ledger_passes_check() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_user(&service, "alice", 500).await?;
    let bob = add_user(&service, "bob").await?;
    service.transfer(alice, bob, 200, "transfer value").await?;
    service.record_withdraw(bob, 50, "cash").await?;

    let report = service.check_integrity().await?;

    assert!(report.is_healthy());
    assert_eq!(report.entry_count, 4);
    assert_eq!(report.owner_count, 2);
    Ok(())
}

#[tokio::test]
async fn test_legacy_transfer_names_load() -> Result<()> {
    let (service, temp) = test_service().await?;
    let alice = funded_user(&service, "alice", 500).await?;
    let bob = add_user(&service, "bob").await?;

    insert_raw_row(&temp, 1000, bob, Some(alice), "transfer-in", 200).await?;
    let debit_id = insert_raw_row(&temp, 1001, alice, Some(bob), "transfer-out", 200).await?;

    let debit = service.get_entry(alice, debit_id).await?;
    assert_eq!(debit.kind, EntryKind::TransferDebit);
    assert_eq!(service.compute_balance(alice).await?, 300);
    assert_eq!(service.compute_balance(bob).await?, 200);
    assert!(service.check_integrity().await?.is_healthy());

    // New entries keep sequencing after the imported rows.
    let latest = service.record_deposit(bob, 10, "after import").await?;
    let history = service.get_balance_and_history(bob).await?;
    assert_eq!(history.entries.last().map(|e| e.id), Some(latest.id));
    Ok(())
}

#[tokio::test]
async fn test_check_flags_orphaned_leg_and_unknown_owner() -> Result<()> {
    let (service, temp) = test_service().await?;
    let alice = funded_user(&service, "alice", 500).await?;
    let stranger = Uuid::new_v4();

    let orphan =
        insert_raw_row(&temp, 1000, alice, Some(stranger), "transfer-debit", 100).await?;
    insert_raw_row(&temp, 1001, stranger, None, "withdraw", 40).await?;

    let report = service.check_integrity().await?;

    assert!(!report.is_healthy());
    assert_eq!(report.unpaired_legs, vec![orphan]);
    assert_eq!(report.unknown_owners, vec![stranger]);
    assert_eq!(report.negative_balances, vec![(stranger, -40)]);
    assert!(report.invalid_amounts.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_overflowing_history_is_reported_not_panicked() -> Result<()> {
    let (service, temp) = test_service().await?;
    let alice = add_user(&service, "alice").await?;

    insert_raw_row(&temp, 1000, alice, None, "deposit", i64::MAX).await?;
    insert_raw_row(&temp, 1001, alice, None, "deposit", i64::MAX).await?;

    assert!(matches!(
        service.compute_balance(alice).await,
        Err(QueryError::StorageFailure(_))
    ));
    assert!(matches!(
        service.get_balance_and_history(alice).await,
        Err(QueryError::StorageFailure(_))
    ));
    assert!(matches!(
        service.record_withdraw(alice, 1, "cash").await,
        Err(RecordError::StorageFailure(_))
    ));

    let report = service.check_integrity().await?;
    assert!(!report.is_healthy());
    assert_eq!(report.overflowed_balances, vec![alice]);
    Ok(())
}

#[tokio::test]
async fn test_store_rejects_non_positive_rows() -> Result<()> {
    let (_service, temp) = test_service().await?;

    let result = insert_raw_row(&temp, 1000, Uuid::new_v4(), None, "deposit", 0).await;

    assert!(result.is_err(), "CHECK constraint must reject zero amounts");
    Ok(())
}

#[tokio::test]
async fn test_export_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_user(&service, "alice", 500).await?;
    let bob = add_user(&service, "bob").await?;
    service.transfer(alice, bob, 200, "rent, march").await?;

    let mut buffer = Vec::new();
    let rows = StatementExporter::new(&service)
        .export_csv(alice, &mut buffer)
        .await?;

    assert_eq!(rows, 2);
    let output = String::from_utf8(buffer)?;
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines[0], "id,created_at,kind,amount,counterparty_id,description");
    assert!(lines[1].contains(",deposit,500,,initial deposit"));
    assert!(lines[2].contains(&format!(",transfer-debit,200,{},\"rent, march\"", bob)));
    Ok(())
}

#[tokio::test]
async fn test_export_json() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_user(&service, "alice", 500).await?;
    service.record_withdraw(alice, 125, "books").await?;

    let mut buffer = Vec::new();
    StatementExporter::new(&service)
        .export_json(alice, &mut buffer)
        .await?;

    let value: serde_json::Value = serde_json::from_slice(&buffer)?;
    assert_eq!(value["balance"], 375);
    assert_eq!(value["entries"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(value["entries"][1]["kind"], "withdraw");
    Ok(())
}

#[tokio::test]
async fn test_export_for_unknown_user_fails() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = StatementExporter::new(&service)
        .export_csv(Uuid::new_v4(), Vec::new())
        .await;

    assert!(result.is_err());
    Ok(())
}
