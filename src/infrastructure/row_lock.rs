use crate::domain::wallet::WalletId;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-row exclusive locks shared by every transaction of one store.
///
/// Locks on different rows never contend. Entries are kept for the lifetime
/// of the store, one per wallet that has ever been locked.
#[derive(Clone, Default)]
pub struct RowLocks {
    rows: Arc<DashMap<WalletId, Arc<Mutex<()>>>>,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the row is free and returns a guard that releases it on drop.
    pub async fn acquire(&self, id: WalletId) -> OwnedMutexGuard<()> {
        let row = self.rows.entry(id).or_default().clone();
        row.lock_owned().await
    }

    /// Number of rows with a lock slot; used by tests.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The row locks held by a single transaction.
#[derive(Default)]
pub struct HeldLocks {
    held: HashMap<WalletId, OwnedMutexGuard<()>>,
}

impl HeldLocks {
    /// Locks `id` unless this transaction already holds it.
    pub async fn lock(&mut self, locks: &RowLocks, id: WalletId) {
        if !self.held.contains_key(&id) {
            let guard = locks.acquire(id).await;
            self.held.insert(id, guard);
        }
    }

    pub fn holds(&self, id: &WalletId) -> bool {
        self.held.contains_key(id)
    }

    /// Releases every lock.
    pub fn release(&mut self) {
        self.held.clear();
    }
}
