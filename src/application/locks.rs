use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::UserId;

/// One async lock per account.
///
/// Held across "read balance, then append" for every write, so two writes
/// touching the same account run one after the other. An account's entry is
/// dropped from the table once nobody holds or waits for its lock.
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

/// Exclusive access to one account, released on drop.
#[derive(Debug)]
pub struct AccountGuard<'a> {
    owner_id: UserId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a AccountLocks,
}

impl Drop for AccountGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(self.owner_id);
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `owner_id`'s account.
    pub async fn acquire(&self, owner_id: UserId) -> AccountGuard<'_> {
        let lock = Arc::clone(self.table().entry(owner_id).or_default());
        AccountGuard {
            owner_id,
            guard: Some(lock.lock_owned().await),
            locks: self,
        }
    }

    /// Lock two accounts in id order. The second guard is `None` when both
    /// ids are the same account.
    pub async fn acquire_pair(
        &self,
        first: UserId,
        second: UserId,
    ) -> (AccountGuard<'_>, Option<AccountGuard<'_>>) {
        if first == second {
            return (self.acquire(first).await, None);
        }
        let (low, high) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        let low_guard = self.acquire(low).await;
        let high_guard = self.acquire(high).await;
        (low_guard, Some(high_guard))
    }

    /// Number of accounts currently tracked.
    pub fn tracked(&self) -> usize {
        self.table().len()
    }

    fn release(&self, owner_id: UserId) {
        let mut table = self.table();
        // The table's own clone is the last one: no holder, no waiter.
        if table
            .get(&owner_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            table.remove(&owner_id);
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<UserId, Arc<AsyncMutex<()>>>> {
        // Every update is a single insert or remove, so a poisoned table is still consistent.
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
