use super::transaction::Amount;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A per-user, balance-holding account.
///
/// Balances are unit-less signed integers. Engine-mediated debits never take
/// a balance below zero.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Wallet {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    /// External correlation key, unique per `(user_id, reference)`.
    pub reference: String,
    pub balance: i64,
    /// At most one wallet per user carries this flag.
    pub primary: bool,
    pub active: bool,
    pub frozen: bool,
    pub risk_flagged: bool,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// A fresh, active, empty wallet.
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        reference: impl Into<String>,
        primary: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: crate::domain::id::generate_id(),
            user_id: user_id.into(),
            name: name.into(),
            description: description.into(),
            reference: reference.into(),
            balance: 0,
            primary,
            active: true,
            frozen: false,
            risk_flagged: false,
            closed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fails unless the wallet accepts balance changes.
    pub fn ensure_operable(&self) -> Result<(), LedgerError> {
        if !self.active {
            return Err(LedgerError::WalletInactive(self.id.clone()));
        }
        if self.frozen {
            return Err(LedgerError::WalletFrozen(self.id.clone()));
        }
        Ok(())
    }

    /// Adds `amount` and returns the new balance.
    pub fn credit(&mut self, amount: Amount) -> Result<i64, LedgerError> {
        let balance = self
            .balance
            .checked_add(amount.value())
            .ok_or_else(|| LedgerError::BalanceOverflow(self.id.clone()))?;
        self.balance = balance;
        self.touch();
        Ok(balance)
    }

    /// Removes `amount` if the balance covers it and returns the new balance.
    pub fn debit(&mut self, amount: Amount) -> Result<i64, LedgerError> {
        if self.balance < amount.value() {
            return Err(LedgerError::InsufficientBalance {
                wallet_id: self.id.clone(),
                available: self.balance,
                requested: amount.value(),
            });
        }
        self.balance -= amount.value();
        self.touch();
        Ok(self.balance)
    }

    /// Refreshes `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether the wallet counts towards the user's spendable summary.
    pub fn is_spendable(&self) -> bool {
        self.active && !self.frozen
    }
}
