use crate::domain::transaction::{
    Amount, Transaction, TransactionData, TransactionStatus, TransactionType,
};
use chrono::Utc;

/// Caller metadata recorded with a credit or debit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    pub description: String,
    pub note: String,
    pub reference: String,
    pub data: TransactionData,
}

impl Entry {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn data(mut self, data: TransactionData) -> Self {
        self.data = data;
        self
    }

    /// The settled transaction this entry produces once applied.
    pub(crate) fn into_completed(
        self,
        wallet_id: &str,
        r#type: TransactionType,
        amount: Amount,
        balance: i64,
    ) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: crate::domain::id::generate_id(),
            wallet_id: wallet_id.to_string(),
            r#type,
            amount: amount.value(),
            balance,
            description: self.description,
            note: self.note,
            reference: self.reference,
            status: TransactionStatus::Completed,
            data: self.data,
            created_at: now,
            completed_at: Some(now),
            failed_reason: None,
        }
    }
}

/// Caller metadata shared by both legs of a transfer. The legs' reference is
/// generated by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferMemo {
    pub description: String,
    pub note: String,
    pub data: TransactionData,
}

impl TransferMemo {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn data(mut self, data: TransactionData) -> Self {
        self.data = data;
        self
    }
}

/// The linked pair of records written by a transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    /// Correlation reference carried by both legs.
    pub reference: String,
    pub debit: Transaction,
    pub credit: Transaction,
}
