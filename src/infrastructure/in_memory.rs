use super::query::{self, RecordSource, StagedWrites};
use crate::domain::ports::{Store, UnitOfWork, UnitOfWorkBox};
use crate::domain::transaction::Transaction;
use crate::domain::wallet::Wallet;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

/// Committed rows of an [`InMemoryStore`].
#[derive(Debug, Default, Clone)]
pub struct LedgerTables {
    wallets: HashMap<String, Wallet>,
    transactions: HashMap<String, Transaction>,
}

impl LedgerTables {
    fn apply(&mut self, wallets: Vec<Wallet>, transactions: Vec<Transaction>) {
        for wallet in wallets {
            self.wallets.insert(wallet.id.clone(), wallet);
        }
        for tx in transactions {
            self.transactions.insert(tx.id.clone(), tx);
        }
    }
}

impl RecordSource for LedgerTables {
    fn wallet(&self, wallet_id: &str) -> StoreResult<Option<Wallet>> {
        Ok(self.wallets.get(wallet_id).cloned())
    }

    fn wallets(&self) -> StoreResult<Vec<Wallet>> {
        Ok(self.wallets.values().cloned().collect())
    }

    fn transaction(&self, transaction_id: &str) -> StoreResult<Option<Transaction>> {
        Ok(self.transactions.get(transaction_id).cloned())
    }

    fn transactions(&self) -> StoreResult<Vec<Transaction>> {
        Ok(self.transactions.values().cloned().collect())
    }
}

/// A thread-safe in-memory ledger store.
///
/// Uses `Arc<RwLock<..>>` so clones share the same tables. A unit of work
/// holds the write lock from `begin` until it commits, rolls back or is
/// dropped, which serialises units of work against each other and against
/// single-statement calls. Do not call the store from a task that keeps a
/// unit of work open.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<LedgerTables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> StoreResult<UnitOfWorkBox> {
        let guard = self.tables.clone().write_owned().await;
        Ok(Box::new(InMemoryUnitOfWork {
            guard: Some(guard),
            staged: StagedWrites::default(),
        }))
    }

    async fn save_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        query::check_wallet_insert(&*tables, wallet)?;
        tables.wallets.insert(wallet.id.clone(), wallet.clone());
        Ok(())
    }

    async fn find_wallet(&self, wallet_id: &str) -> StoreResult<Option<Wallet>> {
        self.tables.read().await.wallet(wallet_id)
    }

    async fn find_wallets_by_user(&self, user_id: &str) -> StoreResult<Vec<Wallet>> {
        query::wallets_by_user(&*self.tables.read().await, user_id)
    }

    async fn find_wallet_by_user_and_reference(
        &self,
        user_id: &str,
        reference: &str,
    ) -> StoreResult<Option<Wallet>> {
        query::wallet_by_user_and_reference(&*self.tables.read().await, user_id, reference)
    }

    async fn find_primary_wallet(&self, user_id: &str) -> StoreResult<Option<Wallet>> {
        query::primary_wallet(&*self.tables.read().await, user_id)
    }

    async fn update_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        query::check_wallet_update(&*tables, wallet)?;
        tables.wallets.insert(wallet.id.clone(), wallet.clone());
        Ok(())
    }

    async fn save_transaction(&self, transaction: &Transaction) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        query::check_transaction_insert(&*tables, transaction)?;
        tables
            .transactions
            .insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    async fn find_transaction(&self, transaction_id: &str) -> StoreResult<Option<Transaction>> {
        self.tables.read().await.transaction(transaction_id)
    }

    async fn find_transactions_by_wallet(
        &self,
        wallet_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>> {
        query::transactions_by_wallet(&*self.tables.read().await, wallet_id, limit, offset)
    }

    async fn find_transactions_by_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>> {
        query::transactions_by_user(&*self.tables.read().await, user_id, limit, offset)
    }

    async fn update_transaction(&self, transaction: &Transaction) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        query::check_transaction_update(&*tables, transaction)?;
        tables
            .transactions
            .insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }
}

/// Unit of work over an [`InMemoryStore`].
///
/// Writes are staged until `commit`; dropping it without committing
/// discards them and releases the store.
pub struct InMemoryUnitOfWork {
    guard: Option<OwnedRwLockWriteGuard<LedgerTables>>,
    staged: StagedWrites,
}

impl InMemoryUnitOfWork {
    fn tables(&self) -> StoreResult<&LedgerTables> {
        self.guard.as_deref().ok_or(StoreError::UnitOfWorkClosed)
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn save_wallet(&mut self, wallet: &Wallet) -> StoreResult<()> {
        let tables = self.tables()?;
        query::check_wallet_insert(&self.staged.over(tables), wallet)?;
        self.staged.stage_wallet(wallet.clone());
        Ok(())
    }

    async fn find_wallet(&mut self, wallet_id: &str) -> StoreResult<Option<Wallet>> {
        self.staged.over(self.tables()?).wallet(wallet_id)
    }

    async fn find_wallets_by_user(&mut self, user_id: &str) -> StoreResult<Vec<Wallet>> {
        query::wallets_by_user(&self.staged.over(self.tables()?), user_id)
    }

    async fn find_wallet_by_user_and_reference(
        &mut self,
        user_id: &str,
        reference: &str,
    ) -> StoreResult<Option<Wallet>> {
        query::wallet_by_user_and_reference(&self.staged.over(self.tables()?), user_id, reference)
    }

    async fn find_primary_wallet(&mut self, user_id: &str) -> StoreResult<Option<Wallet>> {
        query::primary_wallet(&self.staged.over(self.tables()?), user_id)
    }

    async fn update_wallet(&mut self, wallet: &Wallet) -> StoreResult<()> {
        let tables = self.tables()?;
        query::check_wallet_update(&self.staged.over(tables), wallet)?;
        self.staged.stage_wallet(wallet.clone());
        Ok(())
    }

    async fn save_transaction(&mut self, transaction: &Transaction) -> StoreResult<()> {
        let tables = self.tables()?;
        query::check_transaction_insert(&self.staged.over(tables), transaction)?;
        self.staged.stage_transaction(transaction.clone());
        Ok(())
    }

    async fn find_transaction(
        &mut self,
        transaction_id: &str,
    ) -> StoreResult<Option<Transaction>> {
        self.staged.over(self.tables()?).transaction(transaction_id)
    }

    async fn find_transactions_by_wallet(
        &mut self,
        wallet_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>> {
        query::transactions_by_wallet(&self.staged.over(self.tables()?), wallet_id, limit, offset)
    }

    async fn find_transactions_by_user(
        &mut self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>> {
        query::transactions_by_user(&self.staged.over(self.tables()?), user_id, limit, offset)
    }

    async fn update_transaction(&mut self, transaction: &Transaction) -> StoreResult<()> {
        let tables = self.tables()?;
        query::check_transaction_update(&self.staged.over(tables), transaction)?;
        self.staged.stage_transaction(transaction.clone());
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let mut guard = self.guard.take().ok_or(StoreError::UnitOfWorkClosed)?;
        let (wallets, transactions) = self.staged.take();
        guard.apply(wallets, transactions);
        Ok(())
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        self.staged.clear();
        self.guard = None;
        Ok(())
    }
}
