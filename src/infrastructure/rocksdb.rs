use super::query::{self, RecordSource, StagedWrites};
use crate::domain::ports::{Store, UnitOfWork, UnitOfWorkBox};
use crate::domain::transaction::Transaction;
use crate::domain::wallet::Wallet;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Default column family for wallet rows.
pub const DEFAULT_WALLET_CF: &str = "wallets";
/// Default column family for transaction rows.
pub const DEFAULT_TRANSACTION_CF: &str = "transactions";

/// Where and how a [`RocksDBStore`] keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RocksDbConfig {
    pub path: PathBuf,
    pub wallet_cf: String,
    pub transaction_cf: String,
}

impl RocksDbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            wallet_cf: DEFAULT_WALLET_CF.to_string(),
            transaction_cf: DEFAULT_TRANSACTION_CF.to_string(),
        }
    }

    /// Lets several ledgers share one database under different names.
    pub fn with_column_families(
        mut self,
        wallet_cf: impl Into<String>,
        transaction_cf: impl Into<String>,
    ) -> Self {
        self.wallet_cf = wallet_cf.into();
        self.transaction_cf = transaction_cf.into();
        self
    }
}

/// A persistent store implementation using RocksDB.
///
/// Wallets and transactions live in separate column families, keyed by id
/// and encoded as JSON. Writers (single statements and units of work) take
/// a shared async mutex, so units of work are serialised; a unit of work
/// publishes its staged rows with one atomic `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    wallet_cf: String,
    transaction_cf: String,
    writer: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path` with the default
    /// column family names.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::open_with(RocksDbConfig::new(path.as_ref()))
    }

    /// Opens or creates a RocksDB instance described by `config`, creating
    /// missing column families.
    pub fn open_with(config: RocksDbConfig) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_wallets = ColumnFamilyDescriptor::new(&config.wallet_cf, Options::default());
        let cf_transactions =
            ColumnFamilyDescriptor::new(&config.transaction_cf, Options::default());

        let db = DB::open_cf_descriptors(&opts, &config.path, vec![cf_wallets, cf_transactions])?;

        Ok(Self {
            db: Arc::new(db),
            wallet_cf: config.wallet_cf,
            transaction_cf: config.transaction_cf,
            writer: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> StoreResult<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Internal(format!("column family {name} not found")))
    }

    fn get_row<T: DeserializeOwned>(&self, cf_name: &str, id: &str) -> StoreResult<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_rows<T: DeserializeOwned>(&self, cf_name: &str) -> StoreResult<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    fn put_row<T: Serialize>(&self, cf_name: &str, id: &str, row: &T) -> StoreResult<()> {
        let cf = self.cf(cf_name)?;
        let value = serde_json::to_vec(row)?;
        self.db.put_cf(cf, id.as_bytes(), value)?;
        Ok(())
    }

    fn write_staged(&self, wallets: Vec<Wallet>, transactions: Vec<Transaction>) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        let wallet_cf = self.cf(&self.wallet_cf)?;
        for wallet in &wallets {
            batch.put_cf(wallet_cf, wallet.id.as_bytes(), serde_json::to_vec(wallet)?);
        }
        let transaction_cf = self.cf(&self.transaction_cf)?;
        for tx in &transactions {
            batch.put_cf(transaction_cf, tx.id.as_bytes(), serde_json::to_vec(tx)?);
        }
        self.db.write(batch)?;
        Ok(())
    }
}

impl RecordSource for RocksDBStore {
    fn wallet(&self, wallet_id: &str) -> StoreResult<Option<Wallet>> {
        self.get_row(&self.wallet_cf, wallet_id)
    }

    fn wallets(&self) -> StoreResult<Vec<Wallet>> {
        self.scan_rows(&self.wallet_cf)
    }

    fn transaction(&self, transaction_id: &str) -> StoreResult<Option<Transaction>> {
        self.get_row(&self.transaction_cf, transaction_id)
    }

    fn transactions(&self) -> StoreResult<Vec<Transaction>> {
        self.scan_rows(&self.transaction_cf)
    }
}

#[async_trait]
impl Store for RocksDBStore {
    async fn begin(&self) -> StoreResult<UnitOfWorkBox> {
        let guard = self.writer.clone().lock_owned().await;
        Ok(Box::new(RocksDBUnitOfWork {
            store: self.clone(),
            guard: Some(guard),
            staged: StagedWrites::default(),
        }))
    }

    async fn save_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        let _writer = self.writer.lock().await;
        query::check_wallet_insert(self, wallet)?;
        self.put_row(&self.wallet_cf, &wallet.id, wallet)
    }

    async fn find_wallet(&self, wallet_id: &str) -> StoreResult<Option<Wallet>> {
        self.wallet(wallet_id)
    }

    async fn find_wallets_by_user(&self, user_id: &str) -> StoreResult<Vec<Wallet>> {
        query::wallets_by_user(self, user_id)
    }

    async fn find_wallet_by_user_and_reference(
        &self,
        user_id: &str,
        reference: &str,
    ) -> StoreResult<Option<Wallet>> {
        query::wallet_by_user_and_reference(self, user_id, reference)
    }

    async fn find_primary_wallet(&self, user_id: &str) -> StoreResult<Option<Wallet>> {
        query::primary_wallet(self, user_id)
    }

    async fn update_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        let _writer = self.writer.lock().await;
        query::check_wallet_update(self, wallet)?;
        self.put_row(&self.wallet_cf, &wallet.id, wallet)
    }

    async fn save_transaction(&self, transaction: &Transaction) -> StoreResult<()> {
        let _writer = self.writer.lock().await;
        query::check_transaction_insert(self, transaction)?;
        self.put_row(&self.transaction_cf, &transaction.id, transaction)
    }

    async fn find_transaction(&self, transaction_id: &str) -> StoreResult<Option<Transaction>> {
        self.transaction(transaction_id)
    }

    async fn find_transactions_by_wallet(
        &self,
        wallet_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>> {
        query::transactions_by_wallet(self, wallet_id, limit, offset)
    }

    async fn find_transactions_by_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>> {
        query::transactions_by_user(self, user_id, limit, offset)
    }

    async fn update_transaction(&self, transaction: &Transaction) -> StoreResult<()> {
        let _writer = self.writer.lock().await;
        query::check_transaction_update(self, transaction)?;
        self.put_row(&self.transaction_cf, &transaction.id, transaction)
    }
}

/// Unit of work over a [`RocksDBStore`].
pub struct RocksDBUnitOfWork {
    store: RocksDBStore,
    guard: Option<OwnedMutexGuard<()>>,
    staged: StagedWrites,
}

impl RocksDBUnitOfWork {
    fn base(&self) -> StoreResult<&RocksDBStore> {
        match self.guard {
            Some(_) => Ok(&self.store),
            None => Err(StoreError::UnitOfWorkClosed),
        }
    }
}

#[async_trait]
impl UnitOfWork for RocksDBUnitOfWork {
    async fn save_wallet(&mut self, wallet: &Wallet) -> StoreResult<()> {
        let base = self.base()?;
        query::check_wallet_insert(&self.staged.over(base), wallet)?;
        self.staged.stage_wallet(wallet.clone());
        Ok(())
    }

    async fn find_wallet(&mut self, wallet_id: &str) -> StoreResult<Option<Wallet>> {
        self.staged.over(self.base()?).wallet(wallet_id)
    }

    async fn find_wallets_by_user(&mut self, user_id: &str) -> StoreResult<Vec<Wallet>> {
        query::wallets_by_user(&self.staged.over(self.base()?), user_id)
    }

    async fn find_wallet_by_user_and_reference(
        &mut self,
        user_id: &str,
        reference: &str,
    ) -> StoreResult<Option<Wallet>> {
        query::wallet_by_user_and_reference(&self.staged.over(self.base()?), user_id, reference)
    }

    async fn find_primary_wallet(&mut self, user_id: &str) -> StoreResult<Option<Wallet>> {
        query::primary_wallet(&self.staged.over(self.base()?), user_id)
    }

    async fn update_wallet(&mut self, wallet: &Wallet) -> StoreResult<()> {
        let base = self.base()?;
        query::check_wallet_update(&self.staged.over(base), wallet)?;
        self.staged.stage_wallet(wallet.clone());
        Ok(())
    }

    async fn save_transaction(&mut self, transaction: &Transaction) -> StoreResult<()> {
        let base = self.base()?;
        query::check_transaction_insert(&self.staged.over(base), transaction)?;
        self.staged.stage_transaction(transaction.clone());
        Ok(())
    }

    async fn find_transaction(
        &mut self,
        transaction_id: &str,
    ) -> StoreResult<Option<Transaction>> {
        self.staged.over(self.base()?).transaction(transaction_id)
    }

    async fn find_transactions_by_wallet(
        &mut self,
        wallet_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>> {
        query::transactions_by_wallet(&self.staged.over(self.base()?), wallet_id, limit, offset)
    }

    async fn find_transactions_by_user(
        &mut self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Transaction>> {
        query::transactions_by_user(&self.staged.over(self.base()?), user_id, limit, offset)
    }

    async fn update_transaction(&mut self, transaction: &Transaction) -> StoreResult<()> {
        let base = self.base()?;
        query::check_transaction_update(&self.staged.over(base), transaction)?;
        self.staged.stage_transaction(transaction.clone());
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let guard = self.guard.take().ok_or(StoreError::UnitOfWorkClosed)?;
        let (wallets, transactions) = self.staged.take();
        let result = self.store.write_staged(wallets, transactions);
        drop(guard);
        result
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        self.staged.clear();
        self.guard = None;
        Ok(())
    }
}
