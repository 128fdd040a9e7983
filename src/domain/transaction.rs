use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Caller-defined metadata attached to a transaction.
pub type TransactionData = serde_json::Map<String, serde_json::Value>;

/// A strictly positive amount of ledger units.
///
/// The ledger is unit-less: callers decide whether a unit is a cent, a
/// point or anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: i64) -> Result<Self, LedgerError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(LedgerError::InvalidAmount(value))
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = LedgerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Credit => f.write_str("credit"),
            TransactionType::Debit => f.write_str("debit"),
        }
    }
}

/// Lifecycle of a transaction record.
///
/// `Pending` resolves to `Completed` or `Cancelled`, both terminal. `Failed`
/// is a storable state that no engine operation produces.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => f.write_str("pending"),
            TransactionStatus::Completed => f.write_str("completed"),
            TransactionStatus::Cancelled => f.write_str("cancelled"),
            TransactionStatus::Failed => f.write_str("failed"),
        }
    }
}

/// One balance-affecting event recorded against a wallet.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: String,
    pub wallet_id: String,
    pub r#type: TransactionType,
    /// Always positive; the direction comes from `type`.
    pub amount: i64,
    /// Wallet balance right after this transaction was applied.
    pub balance: i64,
    pub description: String,
    pub note: String,
    pub reference: String,
    pub status: TransactionStatus,
    #[serde(default, deserialize_with = "deserialize_data")]
    pub data: TransactionData,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed_reason: Option<String>,
}

fn deserialize_data<'de, D>(deserializer: D) -> Result<TransactionData, D::Error>
where
    D: Deserializer<'de>,
{
    let data = Option::<TransactionData>::deserialize(deserializer)?;
    Ok(data.unwrap_or_default())
}

impl Transaction {
    /// Builds a transaction that still has to be settled through
    /// `complete_transaction` or `cancel_transaction`.
    pub fn pending(
        wallet_id: impl Into<String>,
        r#type: TransactionType,
        amount: Amount,
        description: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            id: crate::domain::id::generate_id(),
            wallet_id: wallet_id.into(),
            r#type,
            amount: amount.value(),
            balance: 0,
            description: description.into(),
            note: String::new(),
            reference: reference.into(),
            status: TransactionStatus::Pending,
            data: TransactionData::new(),
            created_at: Utc::now(),
            completed_at: None,
            failed_reason: None,
        }
    }

    /// Signed effect on the wallet balance once completed.
    pub fn signed_amount(&self) -> i64 {
        match self.r#type {
            TransactionType::Credit => self.amount,
            TransactionType::Debit => -self.amount,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }
}
