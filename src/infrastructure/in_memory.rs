use super::row_lock::{HeldLocks, RowLocks};
use crate::domain::ports::{ReadMode, StoreTransaction, TransactionBox, WalletStore};
use crate::domain::wallet::{Wallet, WalletId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

type Balances = Arc<RwLock<HashMap<WalletId, i64>>>;

/// A thread-safe in-memory wallet store.
///
/// Committed balances live in `Arc<RwLock<HashMap<WalletId, i64>>>`; row locks
/// come from a shared [`RowLocks`] table. Transactions stage their writes and
/// publish them in one step at commit, so readers never see uncommitted state.
/// Ideal for testing or single-process runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryWalletStore {
    wallets: Balances,
    locks: RowLocks,
}

impl InMemoryWalletStore {
    /// Creates a new, empty in-memory wallet store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed wallets.
    pub async fn len(&self) -> usize {
        self.wallets.read().await.len()
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn begin(&self) -> Result<TransactionBox> {
        Ok(Box::new(InMemoryTransaction {
            wallets: Arc::clone(&self.wallets),
            locks: self.locks.clone(),
            held: HeldLocks::default(),
            inserts: HashMap::new(),
            updates: HashMap::new(),
        }))
    }
}

struct InMemoryTransaction {
    wallets: Balances,
    locks: RowLocks,
    held: HeldLocks,
    inserts: HashMap<WalletId, i64>,
    updates: HashMap<WalletId, i64>,
}

impl InMemoryTransaction {
    fn staged(&self, id: &WalletId) -> Option<i64> {
        self.updates
            .get(id)
            .or_else(|| self.inserts.get(id))
            .copied()
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn get(&mut self, id: &WalletId, mode: ReadMode) -> Result<Option<Wallet>> {
        if mode == ReadMode::ForUpdate {
            self.held.lock(&self.locks, *id).await;
        }

        let balance = match self.staged(id) {
            Some(balance) => Some(balance),
            None => self.wallets.read().await.get(id).copied(),
        };
        Ok(balance.map(|balance| Wallet { id: *id, balance }))
    }

    async fn insert(&mut self, wallet: &Wallet) -> Result<()> {
        self.held.lock(&self.locks, wallet.id).await;

        if self.staged(&wallet.id).is_some() || self.wallets.read().await.contains_key(&wallet.id)
        {
            return Err(LedgerError::DuplicateWallet(wallet.id));
        }
        self.inserts.insert(wallet.id, wallet.balance);
        Ok(())
    }

    async fn update(&mut self, wallet: &Wallet) -> Result<()> {
        self.held.lock(&self.locks, wallet.id).await;

        if let Some(staged) = self.inserts.get_mut(&wallet.id) {
            *staged = wallet.balance;
            return Ok(());
        }
        if !self.wallets.read().await.contains_key(&wallet.id) {
            return Err(LedgerError::NotFound(wallet.id));
        }
        self.updates.insert(wallet.id, wallet.balance);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        let shared = Arc::clone(&this.wallets);
        {
            let mut wallets = shared.write().await;
            // Inserted rows have been locked by this transaction since the
            // existence check, so nobody can have committed them meanwhile.
            for (id, balance) in this.inserts.drain() {
                wallets.insert(id, balance);
            }
            for (id, balance) in this.updates.drain() {
                wallets.insert(id, balance);
            }
        }
        this.held.release();
        trace!("in-memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.inserts.clear();
        this.updates.clear();
        this.held.release();
        trace!("in-memory transaction rolled back");
        Ok(())
    }
}
