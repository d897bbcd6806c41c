use thiserror::Error;

use crate::domain::{Cents, EntryId, UserId};

/// Errors from recording a deposit or a withdrawal.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Invalid amount: {0} (must be positive)")]
    InvalidAmount(Cents),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Cents, required: Cents },

    #[error("Balance limit exceeded: balance {balance} cannot take {amount} more")]
    BalanceLimitExceeded { balance: Cents, amount: Cents },

    #[error("Storage failure: {0}")]
    StorageFailure(#[from] anyhow::Error),
}

/// Errors from a transfer between two users.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid amount: {0} (must be positive)")]
    InvalidAmount(Cents),

    #[error("Sender user not found: {0}")]
    SenderUserNotFound(UserId),

    #[error("Receiver user not found: {0}")]
    ReceiverUserNotFound(UserId),

    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Cents, required: Cents },

    #[error("Balance limit exceeded: balance {balance} cannot take {amount} more")]
    BalanceLimitExceeded { balance: Cents, amount: Cents },

    #[error("Storage failure: {0}")]
    StorageFailure(#[from] anyhow::Error),
}

/// Errors from read-side statement queries.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Statement not found: {0}")]
    StatementNotFound(EntryId),

    #[error("Storage failure: {0}")]
    StorageFailure(#[from] anyhow::Error),
}
