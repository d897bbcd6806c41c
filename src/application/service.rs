use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::domain::{
    Cents, EntryId, EntryKind, IntegrityReport, NewEntry, StatementEntry, UserId,
    build_integrity_report, compute_balance,
};
use crate::storage::{LedgerStore, SqliteRepository, UserDirectory};

use super::{AccountLocks, QueryError, RecordError, TransferError};

/// Application service providing the ledger operations.
/// This is the interface every caller (CLI, HTTP layer, tests) goes through.
pub struct LedgerService<S, D> {
    store: Arc<S>,
    users: Arc<D>,
    locks: AccountLocks,
}

/// A ledger backed by one SQLite database for both entries and users.
pub type SqliteLedger = LedgerService<SqliteRepository, SqliteRepository>;

/// A user's balance together with the entries it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub balance: Cents,
    pub entries: Vec<StatementEntry>,
}

impl SqliteLedger {
    /// Create (if needed) and migrate the database at the given path.
    pub async fn init(database_path: &str) -> anyhow::Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = SqliteRepository::init(&db_url).await?;
        Ok(Self::from_repository(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> anyhow::Result<Self> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = SqliteRepository::connect(&db_url).await?;
        Ok(Self::from_repository(repo))
    }

    pub fn from_repository(repo: SqliteRepository) -> Self {
        let repo = Arc::new(repo);
        Self::new(Arc::clone(&repo), repo)
    }
}

impl<S, D> LedgerService<S, D>
where
    S: LedgerStore,
    D: UserDirectory,
{
    pub fn new(store: Arc<S>, users: Arc<D>) -> Self {
        Self {
            store,
            users,
            locks: AccountLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn directory(&self) -> &D {
        &self.users
    }

    // ========================
    // Deposits and withdrawals
    // ========================

    /// Record money entering the user's account.
    #[instrument(skip(self, description), fields(owner = %owner_id), err)]
    pub async fn record_deposit(
        &self,
        owner_id: UserId,
        amount: Cents,
        description: &str,
    ) -> Result<StatementEntry, RecordError> {
        self.record(owner_id, EntryKind::Deposit, amount, description)
            .await
    }

    /// Record money leaving the user's account. Rejected if the balance
    /// does not cover `amount`.
    #[instrument(skip(self, description), fields(owner = %owner_id), err)]
    pub async fn record_withdraw(
        &self,
        owner_id: UserId,
        amount: Cents,
        description: &str,
    ) -> Result<StatementEntry, RecordError> {
        self.record(owner_id, EntryKind::Withdraw, amount, description)
            .await
    }

    async fn record(
        &self,
        owner_id: UserId,
        kind: EntryKind,
        amount: Cents,
        description: &str,
    ) -> Result<StatementEntry, RecordError> {
        debug_assert!(matches!(kind, EntryKind::Deposit | EntryKind::Withdraw));

        if amount <= 0 {
            return Err(RecordError::InvalidAmount(amount));
        }

        if self.users.resolve(owner_id).await?.is_none() {
            return Err(RecordError::UserNotFound(owner_id));
        }

        let _guard = self.locks.acquire(owner_id).await;
        let balance = self.balance_of(owner_id).await?;
        if kind.is_debit() && balance < amount {
            warn!(balance, required = amount, "withdraw rejected: insufficient funds");
            return Err(RecordError::InsufficientFunds {
                balance,
                required: amount,
            });
        }
        if !kind.is_debit() && balance.checked_add(amount).is_none() {
            warn!(balance, amount, "deposit rejected: balance limit exceeded");
            return Err(RecordError::BalanceLimitExceeded { balance, amount });
        }

        let draft = NewEntry::new(owner_id, kind, amount, description);
        let entry = self.store.append(draft).await?;

        info!(entry = %entry.id, kind = %entry.kind, amount, "statement entry recorded");
        Ok(entry)
    }

    // ========================
    // Transfers
    // ========================

    /// Move `amount` from the initiator to the receiver.
    ///
    /// Both legs are written as one unit, credit first. Returns the debit leg
    /// owned by the initiator.
    #[instrument(
        skip(self, description),
        fields(initiator = %initiator_id, receiver = %receiver_id),
        err
    )]
    pub async fn transfer(
        &self,
        initiator_id: UserId,
        receiver_id: UserId,
        amount: Cents,
        description: &str,
    ) -> Result<StatementEntry, TransferError> {
        if amount <= 0 {
            return Err(TransferError::InvalidAmount(amount));
        }

        if self.users.resolve(initiator_id).await?.is_none() {
            return Err(TransferError::SenderUserNotFound(initiator_id));
        }
        if self.users.resolve(receiver_id).await?.is_none() {
            return Err(TransferError::ReceiverUserNotFound(receiver_id));
        }

        let _guards = self.locks.acquire_pair(initiator_id, receiver_id).await;

        let balance = self.balance_of(initiator_id).await?;
        if balance < amount {
            warn!(balance, required = amount, "transfer rejected: insufficient funds");
            return Err(TransferError::InsufficientFunds {
                balance,
                required: amount,
            });
        }

        // A self-transfer leaves the balance unchanged.
        if receiver_id != initiator_id {
            let receiver_balance = self.balance_of(receiver_id).await?;
            if receiver_balance.checked_add(amount).is_none() {
                warn!(
                    balance = receiver_balance,
                    amount, "transfer rejected: receiver balance limit exceeded"
                );
                return Err(TransferError::BalanceLimitExceeded {
                    balance: receiver_balance,
                    amount,
                });
            }
        }

        let legs = NewEntry::transfer_legs(initiator_id, receiver_id, amount, description);
        let mut stored = self.store.append_many(legs.to_vec()).await?;
        let debit = stored
            .pop()
            .filter(|leg| leg.kind == EntryKind::TransferDebit)
            .ok_or_else(|| anyhow::anyhow!("Store did not return the debit leg"))?;

        info!(entry = %debit.id, amount, "transfer recorded");
        Ok(debit)
    }

    // ========================
    // Queries
    // ========================

    /// Current balance of a user, folded from all of their entries.
    #[instrument(skip(self), fields(owner = %owner_id), err)]
    pub async fn compute_balance(&self, owner_id: UserId) -> Result<Cents, QueryError> {
        self.require_user(owner_id).await?;
        Ok(self.balance_of(owner_id).await?)
    }

    /// Fetch one entry on behalf of `owner_id`.
    ///
    /// Entries the caller neither owns nor is counterparty of are reported as
    /// not found, so their existence is not revealed.
    #[instrument(skip(self), fields(owner = %owner_id, entry = %entry_id), err)]
    pub async fn get_entry(
        &self,
        owner_id: UserId,
        entry_id: EntryId,
    ) -> Result<StatementEntry, QueryError> {
        self.require_user(owner_id).await?;

        self.store
            .find_by_id(entry_id)
            .await?
            .filter(|entry| entry.involves(owner_id))
            .ok_or(QueryError::StatementNotFound(entry_id))
    }

    /// Balance and full history of a user, from a single read of the history.
    #[instrument(skip(self), fields(owner = %owner_id), err)]
    pub async fn get_balance_and_history(&self, owner_id: UserId) -> Result<Statement, QueryError> {
        self.require_user(owner_id).await?;

        let entries = self.store.find_all_by_owner(owner_id).await?;
        let balance = compute_balance(owner_id, &entries).map_err(anyhow::Error::from)?;
        Ok(Statement { balance, entries })
    }

    // ========================
    // Integrity operations
    // ========================

    /// Verify ledger invariants over every stored entry.
    #[instrument(skip(self), err)]
    pub async fn check_integrity(&self) -> Result<IntegrityReport, QueryError> {
        let entries = self.store.list_all().await?;

        let owners: HashSet<UserId> = entries.iter().map(|e| e.owner_id).collect();
        let mut known = HashSet::with_capacity(owners.len());
        for owner in owners {
            if self.users.resolve(owner).await?.is_some() {
                known.insert(owner);
            }
        }

        let report = build_integrity_report(&entries, &known);
        if report.is_healthy() {
            info!(entries = report.entry_count, "ledger integrity verified");
        } else {
            warn!(
                unpaired = report.unpaired_legs.len(),
                negative = report.negative_balances.len(),
                overflowed = report.overflowed_balances.len(),
                unknown = report.unknown_owners.len(),
                "ledger integrity problems found"
            );
        }
        Ok(report)
    }

    async fn require_user(&self, owner_id: UserId) -> Result<(), QueryError> {
        match self.users.resolve(owner_id).await? {
            Some(_) => Ok(()),
            None => Err(QueryError::UserNotFound(owner_id)),
        }
    }

    async fn balance_of(&self, owner_id: UserId) -> anyhow::Result<Cents> {
        let entries = self.store.find_all_by_owner(owner_id).await?;
        Ok(compute_balance(owner_id, &entries)?)
    }
}
