//! Application layer containing the ledger business rules.
//!
//! `LedgerEngine` is the entry point: every balance-affecting operation runs
//! inside one unit of work obtained from the configured store and is either
//! committed as a whole or rolled back.

pub mod config;
pub mod engine;
pub mod entry;
