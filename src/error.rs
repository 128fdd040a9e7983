use crate::domain::transaction::TransactionStatus;
use thiserror::Error;

/// Failures raised by the ledger engine.
///
/// Every engine operation returns one of these kinds; storage failures are
/// carried unchanged inside [`LedgerError::Storage`].
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("wallet not found: {0}")]
    WalletNotFound(String),
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("wallet {0} is not active")]
    WalletInactive(String),
    #[error("wallet {0} is frozen")]
    WalletFrozen(String),
    #[error("insufficient balance in wallet {wallet_id}: available {available}, requested {requested}")]
    InsufficientBalance {
        wallet_id: String,
        available: i64,
        requested: i64,
    },
    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),
    #[error("only pending transactions can be modified: {id} is {status}")]
    PendingTransactionOnly {
        id: String,
        status: TransactionStatus,
    },
    #[error("cannot transfer from wallet {0} to itself")]
    SameWalletTransfer(String),
    #[error("balance overflow in wallet {0}")]
    BalanceOverflow(String),
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Failures raised by a persistence adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("duplicate {entity}: {key}")]
    Conflict { entity: &'static str, key: String },
    #[error("{entity} {id} does not exist")]
    MissingRecord { entity: &'static str, id: String },
    #[error("unit of work already finished")]
    UnitOfWorkClosed,
    #[error("internal storage error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}
