use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{EntryId, EntryKind, NewEntry, StatementEntry, User, UserId};

use super::{LedgerStore, MIGRATION_001_INITIAL, UserDirectory};

const ENTRY_COLUMNS: &str =
    "id, user_id, sender_id, type, amount, description, created_at";

/// SQLite-backed ledger store and user directory.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // User directory administration
    // ========================

    /// Add a user to the local directory. This is an administrative action of
    /// the directory; ledger operations never create users.
    pub async fn register_user(&self, name: &str) -> Result<User> {
        let user = User::new(name);
        sqlx::query("INSERT INTO users (id, name, created_at) VALUES (?, ?, ?)")
            .bind(user.id.to_string())
            .bind(&user.name)
            .bind(user.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to save user")?;
        Ok(user)
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name, created_at FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM users ORDER BY created_at, name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;

        rows.iter().map(Self::row_to_user).collect()
    }

    // ========================
    // Statement persistence
    // ========================

    /// Insert one stamped entry inside an open transaction, taking the next
    /// sequence number from the counter. Rows imported with their own
    /// sequence numbers push the counter forward.
    async fn insert_entry(
        tx: &mut Transaction<'_, Sqlite>,
        entry: &StatementEntry,
    ) -> Result<()> {
        let sequence: i64 = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = MAX(value, (SELECT COALESCE(MAX(sequence), 0) FROM statements)) + 1
            WHERE name = 'statement_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut **tx)
        .await
        .context("Failed to get next sequence number")?
        .get("value");

        sqlx::query(
            r#"
            INSERT INTO statements (id, sequence, user_id, sender_id, type, amount, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(sequence)
        .bind(entry.owner_id.to_string())
        .bind(entry.counterparty_id.map(|id| id.to_string()))
        .bind(entry.kind.as_str())
        .bind(entry.amount)
        .bind(&entry.description)
        .bind(entry.created_at.to_rfc3339())
        .execute(&mut **tx)
        .await
        .context("Failed to save statement entry")?;

        Ok(())
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(User {
            id: Uuid::parse_str(&id_str).context("Invalid user ID")?,
            name: row.get("name"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<StatementEntry> {
        let id_str: String = row.get("id");
        let owner_str: String = row.get("user_id");
        let counterparty_str: Option<String> = row.get("sender_id");
        let kind_str: String = row.get("type");
        let created_at_str: String = row.get("created_at");

        Ok(StatementEntry {
            id: Uuid::parse_str(&id_str).context("Invalid statement ID")?,
            owner_id: Uuid::parse_str(&owner_str).context("Invalid user_id")?,
            counterparty_id: counterparty_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid sender_id")?,
            kind: EntryKind::parse(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid statement type: {}", kind_str))?,
            amount: row.get("amount"),
            description: row.get("description"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl LedgerStore for SqliteRepository {
    async fn append(&self, entry: NewEntry) -> Result<StatementEntry> {
        let mut stored = self.append_many(vec![entry]).await?;
        stored
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Append returned no entry"))
    }

    async fn append_many(&self, entries: Vec<NewEntry>) -> Result<Vec<StatementEntry>> {
        let created_at = Utc::now();
        let stored: Vec<StatementEntry> =
            entries.into_iter().map(|e| e.stamp(created_at)).collect();

        // Dropping the transaction without commit rolls it back.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        for entry in &stored {
            Self::insert_entry(&mut tx, entry).await?;
        }
        tx.commit().await.context("Failed to commit statement entries")?;

        debug!(count = stored.len(), "appended statement entries");
        Ok(stored)
    }

    async fn find_by_id(&self, id: EntryId) -> Result<Option<StatementEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM statements WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch statement entry")?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    async fn find_all_by_owner(&self, owner_id: UserId) -> Result<Vec<StatementEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM statements WHERE user_id = ? ORDER BY sequence"
        ))
        .bind(owner_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list statement entries for user")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn list_all(&self) -> Result<Vec<StatementEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM statements ORDER BY sequence"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list statement entries")?;

        rows.iter().map(Self::row_to_entry).collect()
    }
}

#[async_trait]
impl UserDirectory for SqliteRepository {
    async fn resolve(&self, user_id: UserId) -> Result<Option<User>> {
        self.get_user(user_id).await
    }
}
