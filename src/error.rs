use crate::domain::account::UserId;
use crate::domain::checksum::ChecksumError;
use crate::domain::money::Points;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid order number: {0}")]
    InvalidOrderNumber(#[from] ChecksumError),
    #[error("order {0} was already registered by another user")]
    ConflictOtherOwner(String),
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Points, available: Points },
    #[error("no account for user {0}")]
    AccountNotFound(UserId),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("reconciliation batch rejected: {0}")]
    BatchRejected(String),
    #[error("Storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into().into())
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(e: rocksdb::Error) -> Self {
        Self::Storage(Box::new(e))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(Box::new(e))
    }
}
