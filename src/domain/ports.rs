//! Persistence port used by the ledger engine.
//!
//! A `Store` answers single-statement reads and writes and opens
//! `UnitOfWork`s. A unit of work exposes the same operations scoped to one
//! atomic context: its writes are visible to its own reads and become
//! visible to everyone else only on `commit`.
//!
//! Lookups by id return `Ok(None)` when the row is absent. Transaction
//! listings are ordered by `created_at` descending and paginated with
//! `limit`/`offset`.

use super::transaction::Transaction;
use super::wallet::Wallet;
use crate::error::StoreResult;
use async_trait::async_trait;

#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a unit of work. Implementations serialise conflicting units of
    /// work so that concurrent writers cannot lose each other's updates.
    async fn begin(&self) -> StoreResult<UnitOfWorkBox>;

    async fn save_wallet(&self, wallet: &Wallet) -> StoreResult<()>;
    async fn find_wallet(&self, wallet_id: &str) -> StoreResult<Option<Wallet>>;
    async fn find_wallets_by_user(&self, user_id: &str) -> StoreResult<Vec<Wallet>>;
    async fn find_wallet_by_user_and_reference(
        &self,
        user_id: &str,
        reference: &str,
    ) -> StoreResult<Option<Wallet>>;
    /// The user's wallet flagged primary, provided it is also active.
    async fn find_primary_wallet(&self, user_id: &str) -> StoreResult<Option<Wallet>>;
    async fn update_wallet(&self, wallet: &Wallet) -> StoreResult<()>;

    async fn save_transaction(&self, transaction: &Transaction) -> StoreResult<()>;
    async fn find_transaction(&self, transaction_id: &str) -> StoreResult<Option<Transaction>>;
    async fn find_transactions_by_wallet(
        &self,
        wallet_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>>;
    async fn find_transactions_by_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>>;
    async fn update_transaction(&self, transaction: &Transaction) -> StoreResult<()>;
}

#[async_trait]
pub trait UnitOfWork: Send {
    async fn save_wallet(&mut self, wallet: &Wallet) -> StoreResult<()>;
    async fn find_wallet(&mut self, wallet_id: &str) -> StoreResult<Option<Wallet>>;
    async fn find_wallets_by_user(&mut self, user_id: &str) -> StoreResult<Vec<Wallet>>;
    async fn find_wallet_by_user_and_reference(
        &mut self,
        user_id: &str,
        reference: &str,
    ) -> StoreResult<Option<Wallet>>;
    async fn find_primary_wallet(&mut self, user_id: &str) -> StoreResult<Option<Wallet>>;
    async fn update_wallet(&mut self, wallet: &Wallet) -> StoreResult<()>;

    async fn save_transaction(&mut self, transaction: &Transaction) -> StoreResult<()>;
    async fn find_transaction(&mut self, transaction_id: &str)
    -> StoreResult<Option<Transaction>>;
    async fn find_transactions_by_wallet(
        &mut self,
        wallet_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>>;
    async fn find_transactions_by_user(
        &mut self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>>;
    async fn update_transaction(&mut self, transaction: &Transaction) -> StoreResult<()>;

    /// Publishes every staged write atomically.
    async fn commit(&mut self) -> StoreResult<()>;
    /// Discards staged writes. A no-op once the unit of work has finished.
    async fn rollback(&mut self) -> StoreResult<()>;
}

pub type StoreBox = Box<dyn Store>;
pub type UnitOfWorkBox = Box<dyn UnitOfWork>;
