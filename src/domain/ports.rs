use super::wallet::{Wallet, WalletId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// How a point read treats the row it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Latest committed value, no lock taken.
    Committed,
    /// Exclusive row lock held until the transaction ends.
    ForUpdate,
}

/// A transactional, durable wallet store with row-level locking.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> Result<TransactionBox>;
}

/// One open store transaction.
///
/// Writes become visible to other transactions only after `commit`. Dropping
/// a transaction without committing rolls it back and releases its locks.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn get(&mut self, id: &WalletId, mode: ReadMode) -> Result<Option<Wallet>>;

    /// Stages a new row. Fails with `DuplicateWallet` if the id is taken,
    /// either here or at commit.
    async fn insert(&mut self, wallet: &Wallet) -> Result<()>;

    /// Stages a balance update for a row this transaction holds locked.
    async fn update(&mut self, wallet: &Wallet) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

pub type WalletStoreRef = Arc<dyn WalletStore>;
pub type TransactionBox = Box<dyn StoreTransaction>;
