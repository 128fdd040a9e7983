//! Storage adapters implementing the persistence port.

pub mod in_memory;
pub mod query;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
