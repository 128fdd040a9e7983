pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::config::EngineConfig;
pub use application::engine::LedgerEngine;
pub use application::entry::{Entry, Transfer, TransferMemo};
pub use domain::ports::{Store, StoreBox, UnitOfWork, UnitOfWorkBox};
pub use domain::transaction::{
    Amount, Transaction, TransactionData, TransactionStatus, TransactionType,
};
pub use domain::wallet::Wallet;
pub use error::{LedgerError, Result, StoreError, StoreResult};
pub use infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
pub use infrastructure::rocksdb::{RocksDBStore, RocksDbConfig};
