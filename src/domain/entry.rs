use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type UserId = Uuid;
pub type EntryId = Uuid;

/// A user as seen by the ledger. Users are owned by an external directory;
/// the ledger only ever looks them up by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    /// Money entering the owner's account from outside the ledger
    Deposit,
    /// Money leaving the owner's account to outside the ledger
    Withdraw,
    /// Receiving side of a transfer
    TransferCredit,
    /// Sending side of a transfer
    TransferDebit,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "deposit",
            EntryKind::Withdraw => "withdraw",
            EntryKind::TransferCredit => "transfer-credit",
            EntryKind::TransferDebit => "transfer-debit",
        }
    }

    /// Parse a stored kind. The older `transfer-in`/`transfer-out` names are
    /// accepted so rows written by the previous schema still load.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deposit" => Some(EntryKind::Deposit),
            "withdraw" => Some(EntryKind::Withdraw),
            "transfer-credit" | "transfer-in" => Some(EntryKind::TransferCredit),
            "transfer-debit" | "transfer-out" => Some(EntryKind::TransferDebit),
            _ => None,
        }
    }

    /// +1 for entries that raise the owner's balance, -1 for those that lower it.
    pub fn sign(&self) -> Cents {
        match self {
            EntryKind::Deposit | EntryKind::TransferCredit => 1,
            EntryKind::Withdraw | EntryKind::TransferDebit => -1,
        }
    }

    pub fn is_debit(&self) -> bool {
        self.sign() < 0
    }

    pub fn is_transfer_leg(&self) -> bool {
        matches!(self, EntryKind::TransferCredit | EntryKind::TransferDebit)
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// An entry that has not been stored yet. The store stamps it with an id and
/// a creation time when it is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub owner_id: UserId,
    pub counterparty_id: Option<UserId>,
    pub kind: EntryKind,
    pub amount: Cents,
    pub description: String,
}

impl NewEntry {
    pub fn new(
        owner_id: UserId,
        kind: EntryKind,
        amount: Cents,
        description: impl Into<String>,
    ) -> Self {
        assert!(amount > 0, "Entry amount must be positive");
        Self {
            owner_id,
            counterparty_id: None,
            kind,
            amount,
            description: description.into(),
        }
    }

    pub fn with_counterparty(mut self, counterparty_id: UserId) -> Self {
        self.counterparty_id = Some(counterparty_id);
        self
    }

    /// Build both legs of a transfer, credit first, then debit.
    pub fn transfer_legs(
        initiator_id: UserId,
        receiver_id: UserId,
        amount: Cents,
        description: &str,
    ) -> [NewEntry; 2] {
        let credit = NewEntry::new(receiver_id, EntryKind::TransferCredit, amount, description)
            .with_counterparty(initiator_id);
        let debit = NewEntry::new(initiator_id, EntryKind::TransferDebit, amount, description)
            .with_counterparty(receiver_id);
        [credit, debit]
    }

    /// Assign an id and creation time, producing the immutable stored form.
    pub fn stamp(self, created_at: DateTime<Utc>) -> StatementEntry {
        StatementEntry {
            id: Uuid::new_v4(),
            owner_id: self.owner_id,
            counterparty_id: self.counterparty_id,
            kind: self.kind,
            amount: self.amount,
            description: self.description,
            created_at,
        }
    }
}

/// One immutable ledger record affecting exactly one user's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementEntry {
    pub id: EntryId,
    /// User whose balance this entry changes
    pub owner_id: UserId,
    /// Other party of a transfer leg; `None` for deposits and withdrawals
    pub counterparty_id: Option<UserId>,
    pub kind: EntryKind,
    /// Amount in cents (always positive)
    pub amount: Cents,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl StatementEntry {
    /// The amount with the sign it contributes to the owner's balance.
    pub fn signed_amount(&self) -> Cents {
        self.kind.sign() * self.amount
    }

    /// True if `user_id` owns this entry or is its counterparty.
    pub fn involves(&self, user_id: UserId) -> bool {
        self.owner_id == user_id || self.counterparty_id == Some(user_id)
    }

    /// True if `other` is the opposite leg of the same transfer.
    pub fn mirrors(&self, other: &StatementEntry) -> bool {
        self.kind.is_transfer_leg()
            && other.kind.is_transfer_leg()
            && self.kind != other.kind
            && self.counterparty_id == Some(other.owner_id)
            && other.counterparty_id == Some(self.owner_id)
            && self.amount == other.amount
            && self.description == other.description
    }
}
