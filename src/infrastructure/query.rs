//! Query and constraint logic shared by the storage adapters.
//!
//! An adapter only has to expose its rows through [`RecordSource`]; the
//! filtering, ordering, pagination and uniqueness rules of the persistence
//! port live here so every backend answers queries identically. Units of
//! work layer their [`StagedWrites`] over the committed rows with
//! [`StagedWrites::over`].

use crate::domain::transaction::Transaction;
use crate::domain::wallet::Wallet;
use crate::error::{StoreError, StoreResult};
use std::collections::{HashMap, HashSet};

/// Raw row access implemented by each backend.
pub trait RecordSource {
    fn wallet(&self, wallet_id: &str) -> StoreResult<Option<Wallet>>;
    fn wallets(&self) -> StoreResult<Vec<Wallet>>;
    fn transaction(&self, transaction_id: &str) -> StoreResult<Option<Transaction>>;
    fn transactions(&self) -> StoreResult<Vec<Transaction>>;
}

/// Wallets of a user, oldest first.
pub fn wallets_by_user<S: RecordSource + ?Sized>(
    source: &S,
    user_id: &str,
) -> StoreResult<Vec<Wallet>> {
    let mut wallets: Vec<Wallet> = source
        .wallets()?
        .into_iter()
        .filter(|wallet| wallet.user_id == user_id)
        .collect();
    wallets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(wallets)
}

pub fn wallet_by_user_and_reference<S: RecordSource + ?Sized>(
    source: &S,
    user_id: &str,
    reference: &str,
) -> StoreResult<Option<Wallet>> {
    Ok(wallets_by_user(source, user_id)?
        .into_iter()
        .find(|wallet| wallet.reference == reference))
}

pub fn primary_wallet<S: RecordSource + ?Sized>(
    source: &S,
    user_id: &str,
) -> StoreResult<Option<Wallet>> {
    Ok(wallets_by_user(source, user_id)?
        .into_iter()
        .find(|wallet| wallet.primary && wallet.active))
}

pub fn transactions_by_wallet<S: RecordSource + ?Sized>(
    source: &S,
    wallet_id: &str,
    limit: usize,
    offset: usize,
) -> StoreResult<Vec<Transaction>> {
    let transactions = source
        .transactions()?
        .into_iter()
        .filter(|tx| tx.wallet_id == wallet_id)
        .collect();
    Ok(newest_first(transactions, limit, offset))
}

pub fn transactions_by_user<S: RecordSource + ?Sized>(
    source: &S,
    user_id: &str,
    limit: usize,
    offset: usize,
) -> StoreResult<Vec<Transaction>> {
    let wallet_ids: HashSet<String> = wallets_by_user(source, user_id)?
        .into_iter()
        .map(|wallet| wallet.id)
        .collect();
    let transactions = source
        .transactions()?
        .into_iter()
        .filter(|tx| wallet_ids.contains(&tx.wallet_id))
        .collect();
    Ok(newest_first(transactions, limit, offset))
}

fn newest_first(mut transactions: Vec<Transaction>, limit: usize, offset: usize) -> Vec<Transaction> {
    transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    transactions.into_iter().skip(offset).take(limit).collect()
}

/// Rejects a wallet whose id or `(user_id, reference)` pair is taken.
pub fn check_wallet_insert<S: RecordSource + ?Sized>(
    source: &S,
    wallet: &Wallet,
) -> StoreResult<()> {
    if source.wallet(&wallet.id)?.is_some() {
        return Err(StoreError::Conflict {
            entity: "wallet",
            key: wallet.id.clone(),
        });
    }
    if wallet_by_user_and_reference(source, &wallet.user_id, &wallet.reference)?.is_some() {
        return Err(reference_conflict(wallet));
    }
    Ok(())
}

/// Rejects updates of unknown wallets and reference changes that collide
/// with another wallet of the same user.
pub fn check_wallet_update<S: RecordSource + ?Sized>(
    source: &S,
    wallet: &Wallet,
) -> StoreResult<()> {
    if source.wallet(&wallet.id)?.is_none() {
        return Err(StoreError::MissingRecord {
            entity: "wallet",
            id: wallet.id.clone(),
        });
    }
    match wallet_by_user_and_reference(source, &wallet.user_id, &wallet.reference)? {
        Some(other) if other.id != wallet.id => Err(reference_conflict(wallet)),
        _ => Ok(()),
    }
}

pub fn check_transaction_insert<S: RecordSource + ?Sized>(
    source: &S,
    transaction: &Transaction,
) -> StoreResult<()> {
    if source.transaction(&transaction.id)?.is_some() {
        return Err(StoreError::Conflict {
            entity: "transaction",
            key: transaction.id.clone(),
        });
    }
    Ok(())
}

pub fn check_transaction_update<S: RecordSource + ?Sized>(
    source: &S,
    transaction: &Transaction,
) -> StoreResult<()> {
    if source.transaction(&transaction.id)?.is_none() {
        return Err(StoreError::MissingRecord {
            entity: "transaction",
            id: transaction.id.clone(),
        });
    }
    Ok(())
}

fn reference_conflict(wallet: &Wallet) -> StoreError {
    StoreError::Conflict {
        entity: "wallet reference",
        key: format!("{}/{}", wallet.user_id, wallet.reference),
    }
}

/// Writes buffered by a unit of work until it commits.
#[derive(Debug, Default)]
pub struct StagedWrites {
    wallets: HashMap<String, Wallet>,
    transactions: HashMap<String, Transaction>,
}

impl StagedWrites {
    pub fn stage_wallet(&mut self, wallet: Wallet) {
        self.wallets.insert(wallet.id.clone(), wallet);
    }

    pub fn stage_transaction(&mut self, transaction: Transaction) {
        self.transactions.insert(transaction.id.clone(), transaction);
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty() && self.transactions.is_empty()
    }

    /// Empties the buffer, handing back everything staged so far.
    pub fn take(&mut self) -> (Vec<Wallet>, Vec<Transaction>) {
        let wallets = std::mem::take(&mut self.wallets).into_values().collect();
        let transactions = std::mem::take(&mut self.transactions)
            .into_values()
            .collect();
        (wallets, transactions)
    }

    pub fn clear(&mut self) {
        self.wallets.clear();
        self.transactions.clear();
    }

    /// A view of `base` as it would look after committing these writes.
    pub fn over<'a, S: RecordSource + ?Sized>(&'a self, base: &'a S) -> Overlay<'a, S> {
        Overlay { base, staged: self }
    }
}

pub struct Overlay<'a, S: ?Sized> {
    base: &'a S,
    staged: &'a StagedWrites,
}

impl<S: RecordSource + ?Sized> RecordSource for Overlay<'_, S> {
    fn wallet(&self, wallet_id: &str) -> StoreResult<Option<Wallet>> {
        match self.staged.wallets.get(wallet_id) {
            Some(wallet) => Ok(Some(wallet.clone())),
            None => self.base.wallet(wallet_id),
        }
    }

    fn wallets(&self) -> StoreResult<Vec<Wallet>> {
        let mut wallets: Vec<Wallet> = self
            .base
            .wallets()?
            .into_iter()
            .filter(|wallet| !self.staged.wallets.contains_key(&wallet.id))
            .collect();
        wallets.extend(self.staged.wallets.values().cloned());
        Ok(wallets)
    }

    fn transaction(&self, transaction_id: &str) -> StoreResult<Option<Transaction>> {
        match self.staged.transactions.get(transaction_id) {
            Some(tx) => Ok(Some(tx.clone())),
            None => self.base.transaction(transaction_id),
        }
    }

    fn transactions(&self) -> StoreResult<Vec<Transaction>> {
        let mut transactions: Vec<Transaction> = self
            .base
            .transactions()?
            .into_iter()
            .filter(|tx| !self.staged.transactions.contains_key(&tx.id))
            .collect();
        transactions.extend(self.staged.transactions.values().cloned());
        Ok(transactions)
    }
}
