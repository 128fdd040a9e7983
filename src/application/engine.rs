use super::config::EngineConfig;
use super::entry::{Entry, Transfer, TransferMemo};
use crate::domain::id::generate_id;
use crate::domain::ports::{Store, StoreBox, UnitOfWork, UnitOfWorkBox};
use crate::domain::transaction::{Amount, Transaction, TransactionStatus, TransactionType};
use crate::domain::wallet::Wallet;
use crate::error::{LedgerError, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

/// The ledger consistency engine.
///
/// `LedgerEngine` keeps wallet balances and their transaction history
/// consistent. It holds no state of its own between calls: every
/// multi-step mutation runs in one unit of work from the store, committed
/// on success and rolled back on any failure, so no partial writes are
/// ever visible.
pub struct LedgerEngine {
    store: StoreBox,
}

/// Wallet lifecycle
impl LedgerEngine {
    /// Creates a new `LedgerEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `config` - Carries the store every operation runs against.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: config.store,
        }
    }

    /// The persistence port, e.g. for inserting pending transactions that
    /// are later settled with [`complete_transaction`](Self::complete_transaction).
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Creates a wallet, or returns the existing one for the same
    /// `(user_id, reference)` pair unchanged.
    ///
    /// The user's first wallet becomes primary. A concurrent creation for
    /// the same pair resolves to the wallet that won the insert.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Owner of the wallet.
    /// * `name` - Display name, ignored when the wallet already exists.
    /// * `description` - Free text, ignored when the wallet already exists.
    /// * `reference` - Caller's correlation key, unique per user.
    pub async fn create_wallet(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
        reference: &str,
    ) -> Result<Wallet> {
        if let Some(existing) = self
            .store
            .find_wallet_by_user_and_reference(user_id, reference)
            .await?
        {
            debug!(wallet_id = %existing.id, user_id, reference, "wallet already exists");
            return Ok(existing);
        }

        let mut uow = self.store.begin().await?;
        let result = insert_wallet(uow.as_mut(), user_id, name, description, reference).await;
        match finish(uow, result).await {
            Ok(wallet) => {
                info!(wallet_id = %wallet.id, user_id, reference, primary = wallet.primary, "wallet created");
                Ok(wallet)
            }
            // A concurrent creation for the same pair won the insert.
            Err(LedgerError::Storage(err)) if err.is_conflict() => self
                .store
                .find_wallet_by_user_and_reference(user_id, reference)
                .await?
                .inspect(|existing| {
                    debug!(wallet_id = %existing.id, user_id, reference, "wallet created concurrently")
                })
                .ok_or(LedgerError::Storage(err)),
            Err(err) => {
                warn!(user_id, reference, error = %err, "wallet creation failed");
                Err(err)
            }
        }
    }

    pub async fn get_wallet(&self, wallet_id: &str) -> Result<Option<Wallet>> {
        Ok(self.store.find_wallet(wallet_id).await?)
    }

    pub async fn get_wallets_by_user(&self, user_id: &str) -> Result<Vec<Wallet>> {
        Ok(self.store.find_wallets_by_user(user_id).await?)
    }

    pub async fn get_wallet_by_user_and_reference(
        &self,
        user_id: &str,
        reference: &str,
    ) -> Result<Option<Wallet>> {
        Ok(self
            .store
            .find_wallet_by_user_and_reference(user_id, reference)
            .await?)
    }

    /// The user's primary wallet, if it is active.
    pub async fn get_primary_wallet(&self, user_id: &str) -> Result<Option<Wallet>> {
        Ok(self.store.find_primary_wallet(user_id).await?)
    }

    /// Makes `wallet_id` the user's only primary wallet.
    pub async fn set_primary_wallet(&self, wallet_id: &str) -> Result<Wallet> {
        let mut uow = self.store.begin().await?;
        let result = promote_wallet(uow.as_mut(), wallet_id).await;
        let result = finish(uow, result).await;
        log_outcome("set_primary_wallet", wallet_id, &result);
        result
    }

    pub async fn update_wallet_active(&self, wallet_id: &str, active: bool) -> Result<Wallet> {
        self.modify_wallet("update_wallet_active", wallet_id, |wallet| {
            wallet.active = active
        })
        .await
    }

    pub async fn update_wallet_name(&self, wallet_id: &str, name: &str) -> Result<Wallet> {
        let name = name.to_string();
        self.modify_wallet("update_wallet_name", wallet_id, move |wallet| {
            wallet.name = name
        })
        .await
    }

    pub async fn update_wallet_description(
        &self,
        wallet_id: &str,
        description: &str,
    ) -> Result<Wallet> {
        let description = description.to_string();
        self.modify_wallet("update_wallet_description", wallet_id, move |wallet| {
            wallet.description = description
        })
        .await
    }

    pub async fn update_wallet_reference(&self, wallet_id: &str, reference: &str) -> Result<Wallet> {
        let reference = reference.to_string();
        self.modify_wallet("update_wallet_reference", wallet_id, move |wallet| {
            wallet.reference = reference
        })
        .await
    }

    /// Blocks credits, debits and transfers on the wallet until unfrozen.
    /// Transactions already recorded are left untouched.
    pub async fn freeze_wallet(&self, wallet_id: &str, reason: &str) -> Result<Wallet> {
        info!(wallet_id, reason, "freezing wallet");
        self.modify_wallet("freeze_wallet", wallet_id, |wallet| wallet.frozen = true)
            .await
    }

    pub async fn unfreeze_wallet(&self, wallet_id: &str) -> Result<Wallet> {
        self.modify_wallet("unfreeze_wallet", wallet_id, |wallet| wallet.frozen = false)
            .await
    }

    /// Marks the wallet for external risk review. Does not gate operations.
    pub async fn flag_wallet_risk(&self, wallet_id: &str, reason: &str) -> Result<Wallet> {
        info!(wallet_id, reason, "flagging wallet risk");
        self.modify_wallet("flag_wallet_risk", wallet_id, |wallet| {
            wallet.risk_flagged = true
        })
        .await
    }

    pub async fn clear_wallet_risk_flag(&self, wallet_id: &str) -> Result<Wallet> {
        self.modify_wallet("clear_wallet_risk_flag", wallet_id, |wallet| {
            wallet.risk_flagged = false
        })
        .await
    }

    /// Read-then-write of wallet fields, serialised with balance mutations.
    async fn modify_wallet<F>(&self, operation: &str, wallet_id: &str, change: F) -> Result<Wallet>
    where
        F: FnOnce(&mut Wallet) + Send,
    {
        let mut uow = self.store.begin().await?;
        let result = modify_in(uow.as_mut(), wallet_id, change).await;
        let result = finish(uow, result).await;
        log_outcome(operation, wallet_id, &result);
        result
    }
}

/// Balance-affecting operations
impl LedgerEngine {
    /// Adds `amount` to the wallet and records a completed credit.
    ///
    /// # Arguments
    ///
    /// * `wallet_id` - The wallet to credit. It must be active and not frozen.
    /// * `amount` - Strictly positive amount.
    /// * `entry` - Description, note, reference and data stored on the record.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `WalletNotFound`, `WalletInactive`, `WalletFrozen`,
    /// `BalanceOverflow`, or a storage failure. Nothing is written on error.
    pub async fn credit(&self, wallet_id: &str, amount: i64, entry: Entry) -> Result<Transaction> {
        self.post_entry(wallet_id, TransactionType::Credit, amount, entry)
            .await
    }

    /// Removes `amount` from the wallet and records a completed debit.
    ///
    /// # Arguments
    ///
    /// * `wallet_id` - The wallet to debit. It must be active and not frozen.
    /// * `amount` - Strictly positive amount, at most the current balance.
    /// * `entry` - Description, note, reference and data stored on the record.
    ///
    /// # Errors
    ///
    /// Fails with `InsufficientBalance` rather than going negative, and with
    /// the same kinds as [`credit`](Self::credit) otherwise.
    pub async fn debit(&self, wallet_id: &str, amount: i64, entry: Entry) -> Result<Transaction> {
        self.post_entry(wallet_id, TransactionType::Debit, amount, entry)
            .await
    }

    async fn post_entry(
        &self,
        wallet_id: &str,
        r#type: TransactionType,
        amount: i64,
        entry: Entry,
    ) -> Result<Transaction> {
        let result = self.run_entry(wallet_id, r#type, amount, entry).await;
        match &result {
            Ok(tx) => info!(
                wallet_id,
                kind = %r#type,
                transaction_id = %tx.id,
                amount = tx.amount,
                balance = tx.balance,
                "entry applied"
            ),
            Err(err) => warn!(wallet_id, kind = %r#type, amount, error = %err, "entry rejected"),
        }
        result
    }

    async fn run_entry(
        &self,
        wallet_id: &str,
        r#type: TransactionType,
        amount: i64,
        entry: Entry,
    ) -> Result<Transaction> {
        let amount = Amount::new(amount)?;
        let mut uow = self.store.begin().await?;
        let result = post_entry_in(uow.as_mut(), wallet_id, r#type, amount, entry).await;
        finish(uow, result).await
    }

    /// Moves `amount` between two wallets atomically.
    ///
    /// Writes a debit leg on the source and a credit leg on the destination
    /// that share one generated reference. On any failure neither wallet
    /// nor either history changes.
    ///
    /// # Arguments
    ///
    /// * `from_wallet_id` - Source wallet, debited by `amount`.
    /// * `to_wallet_id` - Destination wallet, credited by `amount`. Must differ
    ///   from the source.
    /// * `amount` - Strictly positive amount.
    /// * `memo` - Description, note and data copied onto both legs.
    pub async fn transfer(
        &self,
        from_wallet_id: &str,
        to_wallet_id: &str,
        amount: i64,
        memo: TransferMemo,
    ) -> Result<Transfer> {
        let result = self
            .run_transfer(from_wallet_id, to_wallet_id, amount, memo)
            .await;
        match &result {
            Ok(transfer) => info!(
                from_wallet_id,
                to_wallet_id,
                amount,
                reference = %transfer.reference,
                "transfer applied"
            ),
            Err(err) => warn!(from_wallet_id, to_wallet_id, amount, error = %err, "transfer rejected"),
        }
        result
    }

    async fn run_transfer(
        &self,
        from_wallet_id: &str,
        to_wallet_id: &str,
        amount: i64,
        memo: TransferMemo,
    ) -> Result<Transfer> {
        let amount = Amount::new(amount)?;
        if from_wallet_id == to_wallet_id {
            return Err(LedgerError::SameWalletTransfer(from_wallet_id.to_string()));
        }
        let mut uow = self.store.begin().await?;
        let result = transfer_in(uow.as_mut(), from_wallet_id, to_wallet_id, amount, memo).await;
        finish(uow, result).await
    }
}

/// Transaction lifecycle and queries
impl LedgerEngine {
    pub async fn get_transaction(&self, transaction_id: &str) -> Result<Option<Transaction>> {
        Ok(self.store.find_transaction(transaction_id).await?)
    }

    /// Transactions of one wallet, newest first.
    pub async fn list_transactions(
        &self,
        wallet_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        Ok(self
            .store
            .find_transactions_by_wallet(wallet_id, limit, offset)
            .await?)
    }

    /// Transactions across all wallets of a user, newest first.
    pub async fn list_user_transactions(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        Ok(self
            .store
            .find_transactions_by_user(user_id, limit, offset)
            .await?)
    }

    /// Settles a pending transaction against its wallet.
    ///
    /// The wallet balance is re-checked at this point for debits, and the
    /// transaction's `balance` is rewritten to the post-settlement value.
    ///
    /// # Arguments
    ///
    /// * `transaction_id` - A transaction in `pending` status.
    ///
    /// # Errors
    ///
    /// `TransactionNotFound`, `PendingTransactionOnly` for any other status,
    /// `InsufficientBalance` for a debit the wallet can no longer cover.
    pub async fn complete_transaction(&self, transaction_id: &str) -> Result<Transaction> {
        let mut uow = self.store.begin().await?;
        let result = complete_in(uow.as_mut(), transaction_id).await;
        let result = finish(uow, result).await;
        log_outcome("complete_transaction", transaction_id, &result);
        result
    }

    /// Cancels a pending transaction. The wallet balance is not touched
    /// since pending transactions were never applied.
    pub async fn cancel_transaction(&self, transaction_id: &str, reason: &str) -> Result<Transaction> {
        let mut uow = self.store.begin().await?;
        let result = cancel_in(uow.as_mut(), transaction_id, reason).await;
        let result = finish(uow, result).await;
        log_outcome("cancel_transaction", transaction_id, &result);
        result
    }

    /// Total balance over the user's wallets that are active and not frozen.
    pub async fn get_user_wallet_summary(&self, user_id: &str) -> Result<i64> {
        self.store
            .find_wallets_by_user(user_id)
            .await?
            .iter()
            .filter(|wallet| wallet.is_spendable())
            .try_fold(0i64, |total, wallet| total.checked_add(wallet.balance))
            .ok_or_else(|| LedgerError::BalanceOverflow(user_id.to_string()))
    }
}

/// Commits on success, rolls back on failure.
async fn finish<T>(mut uow: UnitOfWorkBox, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => match uow.commit().await {
            Ok(()) => Ok(value),
            Err(err) => {
                discard(uow.as_mut()).await;
                Err(err.into())
            }
        },
        Err(err) => {
            discard(uow.as_mut()).await;
            Err(err)
        }
    }
}

async fn discard(uow: &mut dyn UnitOfWork) {
    if let Err(err) = uow.rollback().await {
        warn!(error = %err, "unit of work rollback failed");
    }
}

fn log_outcome<T>(operation: &str, subject: &str, result: &Result<T>) {
    match result {
        Ok(_) => info!(operation, subject, "ledger operation applied"),
        Err(err) => warn!(operation, subject, error = %err, "ledger operation failed"),
    }
}

async fn load_wallet(uow: &mut dyn UnitOfWork, wallet_id: &str) -> Result<Wallet> {
    uow.find_wallet(wallet_id)
        .await?
        .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()))
}

async fn load_pending(uow: &mut dyn UnitOfWork, transaction_id: &str) -> Result<Transaction> {
    let tx = uow
        .find_transaction(transaction_id)
        .await?
        .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.to_string()))?;
    if !tx.is_pending() {
        return Err(LedgerError::PendingTransactionOnly {
            id: tx.id,
            status: tx.status,
        });
    }
    Ok(tx)
}

fn apply(wallet: &mut Wallet, r#type: TransactionType, amount: Amount) -> Result<i64> {
    match r#type {
        TransactionType::Credit => wallet.credit(amount),
        TransactionType::Debit => wallet.debit(amount),
    }
}

async fn insert_wallet(
    uow: &mut dyn UnitOfWork,
    user_id: &str,
    name: &str,
    description: &str,
    reference: &str,
) -> Result<Wallet> {
    let is_first = uow.find_wallets_by_user(user_id).await?.is_empty();
    let wallet = Wallet::new(user_id, name, description, reference, is_first);
    uow.save_wallet(&wallet).await?;
    Ok(wallet)
}

async fn modify_in<F>(uow: &mut dyn UnitOfWork, wallet_id: &str, change: F) -> Result<Wallet>
where
    F: FnOnce(&mut Wallet) + Send,
{
    let mut wallet = load_wallet(uow, wallet_id).await?;
    change(&mut wallet);
    wallet.touch();
    uow.update_wallet(&wallet).await?;
    Ok(wallet)
}

async fn promote_wallet(uow: &mut dyn UnitOfWork, wallet_id: &str) -> Result<Wallet> {
    let mut wallet = load_wallet(uow, wallet_id).await?;
    // Inactive wallets may still carry the flag; demote every other holder.
    for mut other in uow.find_wallets_by_user(&wallet.user_id).await? {
        if other.primary && other.id != wallet.id {
            other.primary = false;
            other.touch();
            uow.update_wallet(&other).await?;
        }
    }
    wallet.primary = true;
    wallet.touch();
    uow.update_wallet(&wallet).await?;
    Ok(wallet)
}

async fn post_entry_in(
    uow: &mut dyn UnitOfWork,
    wallet_id: &str,
    r#type: TransactionType,
    amount: Amount,
    entry: Entry,
) -> Result<Transaction> {
    let mut wallet = load_wallet(uow, wallet_id).await?;
    wallet.ensure_operable()?;
    let balance = apply(&mut wallet, r#type, amount)?;
    uow.update_wallet(&wallet).await?;

    let tx = entry.into_completed(wallet_id, r#type, amount, balance);
    uow.save_transaction(&tx).await?;
    Ok(tx)
}

async fn transfer_in(
    uow: &mut dyn UnitOfWork,
    from_wallet_id: &str,
    to_wallet_id: &str,
    amount: Amount,
    memo: TransferMemo,
) -> Result<Transfer> {
    let mut source = load_wallet(uow, from_wallet_id).await?;
    source.ensure_operable()?;
    let source_balance = source.debit(amount)?;

    let mut destination = load_wallet(uow, to_wallet_id).await?;
    destination.ensure_operable()?;
    let destination_balance = destination.credit(amount)?;

    uow.update_wallet(&source).await?;
    uow.update_wallet(&destination).await?;

    let reference = generate_id();
    let debit = Entry {
        description: format!("{} (Transfer to {})", memo.description, to_wallet_id),
        note: memo.note.clone(),
        reference: reference.clone(),
        data: memo.data.clone(),
    }
    .into_completed(from_wallet_id, TransactionType::Debit, amount, source_balance);
    let credit = Entry {
        description: format!("{} (Transfer from {})", memo.description, from_wallet_id),
        note: memo.note,
        reference: reference.clone(),
        data: memo.data,
    }
    .into_completed(to_wallet_id, TransactionType::Credit, amount, destination_balance);

    uow.save_transaction(&debit).await?;
    uow.save_transaction(&credit).await?;

    Ok(Transfer {
        reference,
        debit,
        credit,
    })
}

async fn complete_in(uow: &mut dyn UnitOfWork, transaction_id: &str) -> Result<Transaction> {
    let mut tx = load_pending(uow, transaction_id).await?;
    let amount = Amount::new(tx.amount)?;
    let mut wallet = load_wallet(uow, &tx.wallet_id).await?;
    let balance = apply(&mut wallet, tx.r#type, amount)?;
    uow.update_wallet(&wallet).await?;

    tx.status = TransactionStatus::Completed;
    tx.completed_at = Some(Utc::now());
    tx.balance = balance;
    uow.update_transaction(&tx).await?;
    Ok(tx)
}

async fn cancel_in(
    uow: &mut dyn UnitOfWork,
    transaction_id: &str,
    reason: &str,
) -> Result<Transaction> {
    let mut tx = load_pending(uow, transaction_id).await?;
    tx.status = TransactionStatus::Cancelled;
    tx.failed_reason = Some(reason.to_string());
    uow.update_transaction(&tx).await?;
    Ok(tx)
}
