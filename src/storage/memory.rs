use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{EntryId, NewEntry, StatementEntry, User, UserId};

use super::{LedgerStore, UserDirectory};

/// In-memory ledger store and user directory.
///
/// Intended for tests. A batch is appended under a single write lock, so
/// readers see all of it or none of it.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<Vec<StatementEntry>>,
    users: RwLock<HashMap<UserId, User>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user to the directory.
    pub fn add_user(&self, name: &str) -> Result<User> {
        let user = User::new(name);
        let mut users = self
            .users
            .write()
            .map_err(|_| anyhow::anyhow!("user directory lock poisoned"))?;
        users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Make every following append fail as if the backend were unavailable.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or_default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn append(&self, entry: NewEntry) -> Result<StatementEntry> {
        let mut stored = self.append_many(vec![entry]).await?;
        stored
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Append returned no entry"))
    }

    async fn append_many(&self, entries: Vec<NewEntry>) -> Result<Vec<StatementEntry>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("Failed to save statement entries: store unavailable");
        }

        let created_at = Utc::now();
        let stored: Vec<StatementEntry> =
            entries.into_iter().map(|e| e.stamp(created_at)).collect();

        let mut log = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("ledger lock poisoned"))?;
        log.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn find_by_id(&self, id: EntryId) -> Result<Option<StatementEntry>> {
        let log = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("ledger lock poisoned"))?;
        Ok(log.iter().find(|e| e.id == id).cloned())
    }

    async fn find_all_by_owner(&self, owner_id: UserId) -> Result<Vec<StatementEntry>> {
        let log = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("ledger lock poisoned"))?;
        Ok(log.iter().filter(|e| e.owner_id == owner_id).cloned().collect())
    }

    async fn list_all(&self) -> Result<Vec<StatementEntry>> {
        let log = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("ledger lock poisoned"))?;
        Ok(log.clone())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn resolve(&self, user_id: UserId) -> Result<Option<User>> {
        let users = self
            .users
            .read()
            .map_err(|_| anyhow::anyhow!("user directory lock poisoned"))?;
        Ok(users.get(&user_id).cloned())
    }
}
