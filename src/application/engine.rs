use crate::config::LedgerConfig;
use crate::domain::operation::{Operation, OperationKind};
use crate::domain::ports::{
    ReadMode, StoreTransaction, TransactionBox, WalletStore, WalletStoreRef,
};
use crate::domain::wallet::{Amount, Wallet, WalletId};
use crate::error::{LedgerError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// The wallet ledger: creates wallets, reads balances and applies
/// deposits/withdrawals.
///
/// The engine keeps no balances of its own. Every call runs in its own store
/// transaction, and `apply` holds the wallet's row lock from the read of the
/// current balance until commit, so concurrent operations on one wallet
/// serialize while different wallets proceed in parallel. Cloning is cheap;
/// clones share the store handle.
///
/// The transaction timeout bounds everything up to the commit: opening the
/// transaction, waiting for the row lock and staging the write. The commit
/// itself runs to completion, since abandoning it midway could report a
/// change the store already made as a retryable failure.
#[derive(Clone)]
pub struct LedgerEngine {
    store: WalletStoreRef,
    config: LedgerConfig,
}

impl LedgerEngine {
    /// Creates a new `LedgerEngine` over an already constructed store.
    ///
    /// # Arguments
    ///
    /// * `store` - The transactional wallet store.
    /// * `config` - Timeouts and retry limits.
    pub fn new(store: WalletStoreRef, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Persists a new wallet with a zero balance and returns its id.
    ///
    /// A store-reported id collision is retried with a fresh id; an existing
    /// wallet is never overwritten.
    #[instrument(skip(self))]
    pub async fn create(&self) -> Result<WalletId> {
        let mut attempt = 1;
        loop {
            let wallet = Wallet::open();
            match self.insert_wallet(&wallet).await {
                Ok(()) => {
                    info!(wallet = %wallet.id, "wallet created");
                    return Ok(wallet.id);
                }
                Err(LedgerError::DuplicateWallet(id)) if attempt < self.config.create_attempts => {
                    warn!(wallet = %id, attempt, "wallet id collision, retrying with a new id");
                    attempt += 1;
                }
                Err(err) => {
                    warn!(error = %err, "failed to create wallet");
                    return Err(err);
                }
            }
        }
    }

    /// Returns the latest committed balance without waiting on row locks.
    #[instrument(skip(self, id), fields(wallet = %id))]
    pub async fn balance(&self, id: &WalletId) -> Result<i64> {
        bounded(self.config.read_timeout, self.read_committed(id)).await
    }

    /// Applies a deposit or withdrawal and returns the committed balance.
    ///
    /// Either the whole operation commits or the wallet is left exactly as it
    /// was: validation failures, store errors and timeouts all roll back.
    #[instrument(
        skip(self, op),
        fields(wallet = %op.wallet_id, kind = %op.kind, amount = op.amount.value())
    )]
    pub async fn apply(&self, op: Operation) -> Result<i64> {
        let result = self.apply_locked(op).await;
        match &result {
            Ok(balance) => info!(balance, "wallet updated"),
            Err(err) if err.is_transient() => warn!(error = %err, "operation aborted"),
            Err(err) => debug!(error = %err, "operation rejected"),
        }
        result
    }

    /// Normalizes a raw request and applies it.
    pub async fn apply_request(&self, wallet_id: &str, kind: &str, amount: i64) -> Result<i64> {
        let op = Operation::parse(wallet_id, kind, amount)?;
        self.apply(op).await
    }

    pub async fn deposit(&self, id: WalletId, amount: i64) -> Result<i64> {
        self.apply(Operation::deposit(id, Amount::new(amount)?)).await
    }

    pub async fn withdraw(&self, id: WalletId, amount: i64) -> Result<i64> {
        self.apply(Operation::withdraw(id, Amount::new(amount)?)).await
    }

    async fn insert_wallet(&self, wallet: &Wallet) -> Result<()> {
        let tx = bounded(self.config.transaction_timeout, self.stage_insert(wallet)).await?;
        tx.commit().await
    }

    async fn stage_insert(&self, wallet: &Wallet) -> Result<TransactionBox> {
        let mut tx = self.store.begin().await?;
        match tx.insert(wallet).await {
            Ok(()) => Ok(tx),
            Err(err) => abort(tx, err).await,
        }
    }

    async fn read_committed(&self, id: &WalletId) -> Result<i64> {
        let mut tx = self.store.begin().await?;
        match tx.get(id, ReadMode::Committed).await {
            Ok(Some(wallet)) => {
                tx.commit().await?;
                Ok(wallet.balance)
            }
            Ok(None) => abort(tx, LedgerError::NotFound(*id)).await,
            Err(err) => abort(tx, err).await,
        }
    }

    async fn apply_locked(&self, op: Operation) -> Result<i64> {
        let (tx, wallet) = bounded(self.config.transaction_timeout, self.stage_update(op)).await?;
        tx.commit().await?;
        Ok(wallet.balance)
    }

    async fn stage_update(&self, op: Operation) -> Result<(TransactionBox, Wallet)> {
        let mut tx = self.store.begin().await?;
        match mutate(&mut *tx, &op).await {
            Ok(wallet) => Ok((tx, wallet)),
            Err(err) => abort(tx, err).await,
        }
    }
}

/// Lock, compute and stage the new balance. Nothing is visible until commit.
async fn mutate(tx: &mut dyn StoreTransaction, op: &Operation) -> Result<Wallet> {
    let mut wallet = tx
        .get(&op.wallet_id, ReadMode::ForUpdate)
        .await?
        .ok_or(LedgerError::NotFound(op.wallet_id))?;

    match op.kind {
        OperationKind::Deposit => wallet.deposit(op.amount)?,
        OperationKind::Withdraw => wallet.withdraw(op.amount)?,
    }

    tx.update(&wallet).await?;
    Ok(wallet)
}

/// Rolls back and returns `err`. A failed rollback is logged; the store
/// discards the transaction either way once it is dropped.
async fn abort<T>(tx: TransactionBox, err: LedgerError) -> Result<T> {
    if let Err(rollback_err) = tx.rollback().await {
        warn!(error = %rollback_err, "rollback failed");
    }
    Err(err)
}

/// Runs `work` under a wall-clock deadline. On expiry the future is dropped,
/// which drops its transaction and releases any row lock it holds.
async fn bounded<T, F>(limit: Duration, work: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, work)
        .await
        .map_err(|_| LedgerError::Timeout(limit))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryWalletStore;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    fn engine() -> LedgerEngine {
        LedgerEngine::new(
            Arc::new(InMemoryWalletStore::new()),
            LedgerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_create_starts_at_zero() {
        let engine = engine();
        let id = engine.create().await.unwrap();
        assert_eq!(engine.balance(&id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deposit_then_withdraw() {
        let engine = engine();
        let id = engine.create().await.unwrap();

        assert_eq!(engine.deposit(id, 5000).await.unwrap(), 5000);
        assert_eq!(engine.balance(&id).await.unwrap(), 5000);
        assert_eq!(engine.withdraw(id, 2000).await.unwrap(), 3000);
        assert_eq!(engine.balance(&id).await.unwrap(), 3000);
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_balance() {
        let engine = engine();
        let id = engine.create().await.unwrap();

        let err = engine.withdraw(id, 1).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(engine.balance(&id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_wallet() {
        let engine = engine();
        let missing = WalletId::new();

        assert!(matches!(
            engine.balance(&missing).await,
            Err(LedgerError::NotFound(id)) if id == missing
        ));
        assert!(matches!(
            engine.deposit(missing, 10).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_apply_request_validation() {
        let engine = engine();
        let id = engine.create().await.unwrap().to_string();

        assert!(matches!(
            engine.apply_request(&id, "TRANSFER", 10).await,
            Err(LedgerError::InvalidOperation(_))
        ));
        assert!(matches!(
            engine.apply_request(&id, "DEPOSIT", -10).await,
            Err(LedgerError::InvalidAmount(-10))
        ));
        assert_eq!(engine.apply_request(&id, "deposit", 10).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_failed_withdraw_releases_lock() {
        let engine = engine();
        let id = engine.create().await.unwrap();

        engine.withdraw(id, 100).await.unwrap_err();
        // The row lock must be free again, otherwise this would time out.
        assert_eq!(engine.deposit(id, 100).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_apply_times_out_on_held_lock() {
        let store = Arc::new(InMemoryWalletStore::new());
        let config = LedgerConfig::default().with_transaction_timeout(Duration::from_millis(100));
        let engine = LedgerEngine::new(store.clone(), config);
        let id = engine.create().await.unwrap();
        engine.deposit(id, 50).await.unwrap();

        let mut holder = store.begin().await.unwrap();
        holder.get(&id, ReadMode::ForUpdate).await.unwrap();

        let err = engine.deposit(id, 10).await.unwrap_err();
        assert!(matches!(err, LedgerError::Timeout(_)));
        assert!(err.is_transient());

        // Reads never wait on the lock.
        assert_eq!(engine.balance(&id).await.unwrap(), 50);

        holder.rollback().await.unwrap();
        assert_eq!(engine.deposit(id, 10).await.unwrap(), 60);
    }

    /// Wraps the in-memory store. Inserts retarget the ids queued in
    /// `collide_with` so the real store reports the collision, and commits
    /// are delayed by `commit_delay`.
    struct ScriptedStore {
        inner: Arc<InMemoryWalletStore>,
        collide_with: Arc<Mutex<Vec<WalletId>>>,
        commit_delay: Duration,
    }

    impl ScriptedStore {
        fn new(inner: Arc<InMemoryWalletStore>) -> Self {
            Self {
                inner,
                collide_with: Arc::default(),
                commit_delay: Duration::ZERO,
            }
        }
    }

    struct ScriptedTransaction {
        inner: TransactionBox,
        collide_with: Arc<Mutex<Vec<WalletId>>>,
        commit_delay: Duration,
    }

    #[async_trait]
    impl WalletStore for ScriptedStore {
        async fn begin(&self) -> Result<TransactionBox> {
            Ok(Box::new(ScriptedTransaction {
                inner: self.inner.begin().await?,
                collide_with: Arc::clone(&self.collide_with),
                commit_delay: self.commit_delay,
            }))
        }
    }

    #[async_trait]
    impl StoreTransaction for ScriptedTransaction {
        async fn get(&mut self, id: &WalletId, mode: ReadMode) -> Result<Option<Wallet>> {
            self.inner.get(id, mode).await
        }

        async fn insert(&mut self, wallet: &Wallet) -> Result<()> {
            let taken = self.collide_with.lock().unwrap().pop();
            match taken {
                Some(id) => {
                    let clash = Wallet {
                        id,
                        balance: wallet.balance,
                    };
                    self.inner.insert(&clash).await
                }
                None => self.inner.insert(wallet).await,
            }
        }

        async fn update(&mut self, wallet: &Wallet) -> Result<()> {
            self.inner.update(wallet).await
        }

        async fn commit(self: Box<Self>) -> Result<()> {
            tokio::time::sleep(self.commit_delay).await;
            self.inner.commit().await
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            self.inner.rollback().await
        }
    }

    #[tokio::test]
    async fn test_create_retries_id_collisions() {
        let inner = Arc::new(InMemoryWalletStore::new());
        let store = Arc::new(ScriptedStore::new(inner.clone()));
        let engine = LedgerEngine::new(store.clone(), LedgerConfig::default());
        let existing = engine.create().await.unwrap();
        engine.deposit(existing, 100).await.unwrap();

        store.collide_with.lock().unwrap().extend([existing, existing]);
        let created = engine.create().await.unwrap();

        assert_ne!(created, existing);
        assert!(store.collide_with.lock().unwrap().is_empty());
        assert_eq!(engine.balance(&created).await.unwrap(), 0);
        assert_eq!(engine.balance(&existing).await.unwrap(), 100);
        assert_eq!(inner.len().await, 2);
    }

    #[tokio::test]
    async fn test_create_gives_up_after_configured_attempts() {
        let inner = Arc::new(InMemoryWalletStore::new());
        let store = Arc::new(ScriptedStore::new(inner.clone()));
        let config = LedgerConfig::default().with_create_attempts(3);
        let engine = LedgerEngine::new(store.clone(), config);
        let existing = engine.create().await.unwrap();
        engine.deposit(existing, 100).await.unwrap();

        store.collide_with.lock().unwrap().extend([existing; 4]);
        let err = engine.create().await.unwrap_err();

        assert!(matches!(err, LedgerError::DuplicateWallet(id) if id == existing));
        assert!(err.is_transient());
        // Three attempts consumed three queued collisions, one is left.
        assert_eq!(store.collide_with.lock().unwrap().len(), 1);
        assert_eq!(engine.balance(&existing).await.unwrap(), 100);
        assert_eq!(inner.len().await, 1);
    }

    #[tokio::test]
    async fn test_slow_commit_is_not_reported_as_timeout() {
        let inner = Arc::new(InMemoryWalletStore::new());
        let mut store = ScriptedStore::new(inner);
        store.commit_delay = Duration::from_millis(150);
        let config = LedgerConfig::default().with_transaction_timeout(Duration::from_millis(50));
        let engine = LedgerEngine::new(Arc::new(store), config);

        let id = engine.create().await.unwrap();
        assert_eq!(engine.deposit(id, 10).await.unwrap(), 10);
        assert_eq!(engine.withdraw(id, 4).await.unwrap(), 6);
        assert_eq!(engine.balance(&id).await.unwrap(), 6);
    }
}
