//! Storage backends implementing [`crate::domain::ports::LedgerStore`].

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
