mod memory;
mod repository;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{EntryId, NewEntry, StatementEntry, User, UserId};

pub use memory::*;
pub use repository::*;

/// SQL migration for initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// Append-only persistence for statement entries.
///
/// Business rules are checked by callers before anything is appended; a
/// store only fails on I/O or constraint errors, and a failed call leaves
/// nothing visible.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Stamp and persist a single entry.
    async fn append(&self, entry: NewEntry) -> Result<StatementEntry>;

    /// Stamp and persist several entries as one unit: either every entry is
    /// stored or none is, and no reader observes a partial batch. Entries are
    /// stored, and returned, in the given order.
    async fn append_many(&self, entries: Vec<NewEntry>) -> Result<Vec<StatementEntry>>;

    async fn find_by_id(&self, id: EntryId) -> Result<Option<StatementEntry>>;

    /// All entries owned by `owner_id`, in creation order.
    async fn find_all_by_owner(&self, owner_id: UserId) -> Result<Vec<StatementEntry>>;

    /// Every entry in the ledger, in creation order.
    async fn list_all(&self) -> Result<Vec<StatementEntry>>;
}

/// Lookup of users managed outside the ledger.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve(&self, user_id: UserId) -> Result<Option<User>>;
}
