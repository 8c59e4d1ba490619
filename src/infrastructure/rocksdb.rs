use super::row_lock::{HeldLocks, RowLocks};
use crate::domain::ports::{ReadMode, StoreTransaction, TransactionBox, WalletStore};
use crate::domain::wallet::{Wallet, WalletId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Column Family for storing wallet records.
pub const CF_WALLETS: &str = "wallets";

/// A persistent wallet store implementation using RocksDB.
///
/// RocksDB has no row locks of its own, and a database directory can only be
/// opened by one process at a time, so the store keeps its row locks in an
/// in-process [`RowLocks`] table. Each transaction buffers its writes into a
/// single `WriteBatch` that is applied atomically on commit.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbWalletStore {
    db: Arc<DB>,
    locks: RowLocks,
}

impl RocksDbWalletStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the `wallets` column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_wallets = ColumnFamilyDescriptor::new(CF_WALLETS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path.as_ref(), vec![cf_wallets])
            .map_err(LedgerError::store)?;

        info!(path = %path.as_ref().display(), "opened RocksDB wallet store");
        Ok(Self {
            db: Arc::new(db),
            locks: RowLocks::new(),
        })
    }
}

fn wallets_cf(db: &DB) -> Result<&ColumnFamily> {
    db.cf_handle(CF_WALLETS)
        .ok_or_else(|| LedgerError::store("wallets column family not found"))
}

fn read_wallet(db: &DB, id: &WalletId) -> Result<Option<Wallet>> {
    let cf = wallets_cf(db)?;
    match db.get_pinned_cf(cf, id.as_bytes()).map_err(LedgerError::store)? {
        Some(bytes) => {
            let wallet = serde_json::from_slice(&bytes).map_err(LedgerError::store)?;
            Ok(Some(wallet))
        }
        None => Ok(None),
    }
}

#[async_trait]
impl WalletStore for RocksDbWalletStore {
    async fn begin(&self) -> Result<TransactionBox> {
        Ok(Box::new(RocksDbTransaction {
            db: Arc::clone(&self.db),
            locks: self.locks.clone(),
            held: HeldLocks::default(),
            inserts: HashMap::new(),
            updates: HashMap::new(),
        }))
    }
}

struct RocksDbTransaction {
    db: Arc<DB>,
    locks: RowLocks,
    held: HeldLocks,
    inserts: HashMap<WalletId, i64>,
    updates: HashMap<WalletId, i64>,
}

impl RocksDbTransaction {
    fn staged(&self, id: &WalletId) -> Option<i64> {
        self.updates
            .get(id)
            .or_else(|| self.inserts.get(id))
            .copied()
    }
}

#[async_trait]
impl StoreTransaction for RocksDbTransaction {
    async fn get(&mut self, id: &WalletId, mode: ReadMode) -> Result<Option<Wallet>> {
        if mode == ReadMode::ForUpdate {
            self.held.lock(&self.locks, *id).await;
        }

        if let Some(balance) = self.staged(id) {
            return Ok(Some(Wallet { id: *id, balance }));
        }
        read_wallet(&self.db, id)
    }

    async fn insert(&mut self, wallet: &Wallet) -> Result<()> {
        self.held.lock(&self.locks, wallet.id).await;

        if self.staged(&wallet.id).is_some() || read_wallet(&self.db, &wallet.id)?.is_some() {
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
        if read_wallet(&self.db, &wallet.id)?.is_none() {
            return Err(LedgerError::NotFound(wallet.id));
        }
        self.updates.insert(wallet.id, wallet.balance);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        let cf = wallets_cf(&this.db)?;

        let mut batch = WriteBatch::default();
        for (id, balance) in this.inserts.iter().chain(this.updates.iter()) {
            let record = Wallet {
                id: *id,
                balance: *balance,
            };
            let value = serde_json::to_vec(&record).map_err(LedgerError::store)?;
            batch.put_cf(cf, id.as_bytes(), value);
        }
        let writes = batch.len();
        this.db.write(batch).map_err(LedgerError::store)?;

        this.held.release();
        debug!(writes, "RocksDB transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.inserts.clear();
        this.updates.clear();
        this.held.release();
        Ok(())
    }
}
