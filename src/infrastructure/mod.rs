//! Wallet store backends.
//!
//! The in-memory store is always available; RocksDB and PostgreSQL are
//! behind the `storage-rocksdb` and `storage-postgres` features.

pub mod in_memory;
#[cfg(feature = "storage-postgres")]
pub mod postgres;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod row_lock;
