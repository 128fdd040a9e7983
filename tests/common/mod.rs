#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wallet_ledger::{
    InMemoryStore, LedgerEngine, Store, StoreError, StoreResult, Transaction, TransactionStatus,
    UnitOfWork, UnitOfWorkBox, Wallet,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn in_memory_engine() -> LedgerEngine {
    init_tracing();
    LedgerEngine::new(InMemoryStore::new().into())
}

/// Creates a wallet for `user_id` and credits it with `balance`.
pub async fn funded_wallet(
    engine: &LedgerEngine,
    user_id: &str,
    reference: &str,
    balance: i64,
) -> Wallet {
    let wallet = engine
        .create_wallet(user_id, reference, "", reference)
        .await
        .unwrap();
    if balance > 0 {
        engine
            .credit(&wallet.id, balance, wallet_ledger::Entry::new("Initial Credit"))
            .await
            .unwrap();
    }
    engine.get_wallet(&wallet.id).await.unwrap().unwrap()
}

/// Recomputes a wallet balance from its completed history.
pub async fn replay_balance(engine: &LedgerEngine, wallet_id: &str) -> i64 {
    engine
        .list_transactions(wallet_id, usize::MAX, 0)
        .await
        .unwrap()
        .iter()
        .filter(|tx| tx.status == TransactionStatus::Completed)
        .map(Transaction::signed_amount)
        .sum()
}

/// Wraps an [`InMemoryStore`] and injects faults into its writes.
#[derive(Clone)]
pub struct FaultyStore {
    inner: InMemoryStore,
    fail_on: Option<usize>,
    wallet_write_delay: Option<Duration>,
    inserts: Arc<AtomicUsize>,
}

impl FaultyStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            fail_on: None,
            wallet_write_delay: None,
            inserts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fails the `nth` transaction insert made inside a unit of work
    /// (1-based, counted across all units of work).
    pub fn failing_insert(mut self, nth: usize) -> Self {
        self.fail_on = Some(nth);
        self
    }

    /// Sleeps before every wallet update, in and out of units of work.
    pub fn delaying_wallet_writes(mut self, delay: Duration) -> Self {
        self.wallet_write_delay = Some(delay);
        self
    }
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn begin(&self) -> StoreResult<UnitOfWorkBox> {
        Ok(Box::new(FaultyUnitOfWork {
            inner: self.inner.begin().await?,
            fail_on: self.fail_on,
            wallet_write_delay: self.wallet_write_delay,
            inserts: self.inserts.clone(),
        }))
    }

    async fn save_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        self.inner.save_wallet(wallet).await
    }

    async fn find_wallet(&self, wallet_id: &str) -> StoreResult<Option<Wallet>> {
        self.inner.find_wallet(wallet_id).await
    }

    async fn find_wallets_by_user(&self, user_id: &str) -> StoreResult<Vec<Wallet>> {
        self.inner.find_wallets_by_user(user_id).await
    }

    async fn find_wallet_by_user_and_reference(
        &self,
        user_id: &str,
        reference: &str,
    ) -> StoreResult<Option<Wallet>> {
        self.inner
            .find_wallet_by_user_and_reference(user_id, reference)
            .await
    }

    async fn find_primary_wallet(&self, user_id: &str) -> StoreResult<Option<Wallet>> {
        self.inner.find_primary_wallet(user_id).await
    }

    async fn update_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        pause(self.wallet_write_delay).await;
        self.inner.update_wallet(wallet).await
    }

    async fn save_transaction(&self, transaction: &Transaction) -> StoreResult<()> {
        self.inner.save_transaction(transaction).await
    }

    async fn find_transaction(&self, transaction_id: &str) -> StoreResult<Option<Transaction>> {
        self.inner.find_transaction(transaction_id).await
    }

    async fn find_transactions_by_wallet(
        &self,
        wallet_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>> {
        self.inner
            .find_transactions_by_wallet(wallet_id, limit, offset)
            .await
    }

    async fn find_transactions_by_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>> {
        self.inner
            .find_transactions_by_user(user_id, limit, offset)
            .await
    }

    async fn update_transaction(&self, transaction: &Transaction) -> StoreResult<()> {
        self.inner.update_transaction(transaction).await
    }
}

struct FaultyUnitOfWork {
    inner: UnitOfWorkBox,
    fail_on: Option<usize>,
    wallet_write_delay: Option<Duration>,
    inserts: Arc<AtomicUsize>,
}

#[async_trait]
impl UnitOfWork for FaultyUnitOfWork {
    async fn save_wallet(&mut self, wallet: &Wallet) -> StoreResult<()> {
        self.inner.save_wallet(wallet).await
    }

    async fn find_wallet(&mut self, wallet_id: &str) -> StoreResult<Option<Wallet>> {
        self.inner.find_wallet(wallet_id).await
    }

    async fn find_wallets_by_user(&mut self, user_id: &str) -> StoreResult<Vec<Wallet>> {
        self.inner.find_wallets_by_user(user_id).await
    }

    async fn find_wallet_by_user_and_reference(
        &mut self,
        user_id: &str,
        reference: &str,
    ) -> StoreResult<Option<Wallet>> {
        self.inner
            .find_wallet_by_user_and_reference(user_id, reference)
            .await
    }

    async fn find_primary_wallet(&mut self, user_id: &str) -> StoreResult<Option<Wallet>> {
        self.inner.find_primary_wallet(user_id).await
    }

    async fn update_wallet(&mut self, wallet: &Wallet) -> StoreResult<()> {
        pause(self.wallet_write_delay).await;
        self.inner.update_wallet(wallet).await
    }

    async fn save_transaction(&mut self, transaction: &Transaction) -> StoreResult<()> {
        let count = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if Some(count) == self.fail_on {
            return Err(StoreError::Internal("injected insert failure".into()));
        }
        self.inner.save_transaction(transaction).await
    }

    async fn find_transaction(
        &mut self,
        transaction_id: &str,
    ) -> StoreResult<Option<Transaction>> {
        self.inner.find_transaction(transaction_id).await
    }

    async fn find_transactions_by_wallet(
        &mut self,
        wallet_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>> {
        self.inner
            .find_transactions_by_wallet(wallet_id, limit, offset)
            .await
    }

    async fn find_transactions_by_user(
        &mut self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>> {
        self.inner
            .find_transactions_by_user(user_id, limit, offset)
            .await
    }

    async fn update_transaction(&mut self, transaction: &Transaction) -> StoreResult<()> {
        self.inner.update_transaction(transaction).await
    }

    async fn commit(&mut self) -> StoreResult<()> {
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        self.inner.rollback().await
    }
}
