use crate::domain::ports::{ReadMode, StoreTransaction, TransactionBox, WalletStore};
use crate::domain::wallet::{Wallet, WalletId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::info;

/// SQLSTATE raised when `lock_timeout` expires while waiting for a row lock.
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE raised when `statement_timeout` cancels a query.
const QUERY_CANCELED: &str = "57014";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS wallets (
    id UUID PRIMARY KEY,
    balance BIGINT NOT NULL CHECK (balance >= 0)
)";

/// A wallet store backed by PostgreSQL.
///
/// Row locks are native `SELECT ... FOR UPDATE` locks; every transaction sets
/// a local `lock_timeout` so a stuck holder surfaces as `Timeout` rather than
/// an indefinite wait.
#[derive(Clone)]
pub struct PostgresWalletStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresWalletStore {
    /// Connects, checks the connection and creates the `wallets` table if missing.
    pub async fn connect(url: &str, max_connections: u32, lock_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(lock_timeout)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error(e, lock_timeout))?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| map_sqlx_error(e, lock_timeout))?;

        info!(max_connections, "connected to PostgreSQL wallet store");
        Ok(Self { pool, lock_timeout })
    }
}

fn map_sqlx_error(err: sqlx::Error, lock_timeout: Duration) -> LedgerError {
    if let sqlx::Error::Database(db) = &err
        && let Some(code) = db.code()
        && (code == LOCK_NOT_AVAILABLE || code == QUERY_CANCELED)
    {
        return LedgerError::Timeout(lock_timeout);
    }
    if matches!(err, sqlx::Error::PoolTimedOut) {
        return LedgerError::Timeout(lock_timeout);
    }
    LedgerError::store(err)
}

#[async_trait]
impl WalletStore for PostgresWalletStore {
    async fn begin(&self) -> Result<TransactionBox> {
        let lock_timeout = self.lock_timeout;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(e, lock_timeout))?;

        // SET LOCAL does not accept bind parameters.
        let statement = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            lock_timeout.as_millis().max(1)
        );
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, lock_timeout))?;

        Ok(Box::new(PostgresTransaction { tx, lock_timeout }))
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
    lock_timeout: Duration,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn get(&mut self, id: &WalletId, mode: ReadMode) -> Result<Option<Wallet>> {
        let sql = match mode {
            ReadMode::Committed => "SELECT balance FROM wallets WHERE id = $1",
            ReadMode::ForUpdate => "SELECT balance FROM wallets WHERE id = $1 FOR UPDATE",
        };
        let balance: Option<i64> = sqlx::query_scalar(sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(e, self.lock_timeout))?;
        Ok(balance.map(|balance| Wallet { id: *id, balance }))
    }

    async fn insert(&mut self, wallet: &Wallet) -> Result<()> {
        let result = sqlx::query("INSERT INTO wallets (id, balance) VALUES ($1, $2)")
            .bind(wallet.id.as_uuid())
            .bind(wallet.balance)
            .execute(&mut *self.tx)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(LedgerError::DuplicateWallet(wallet.id))
            }
            Err(err) => Err(map_sqlx_error(err, self.lock_timeout)),
        }
    }

    async fn update(&mut self, wallet: &Wallet) -> Result<()> {
        let updated = sqlx::query("UPDATE wallets SET balance = $1 WHERE id = $2")
            .bind(wallet.balance)
            .bind(wallet.id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(e, self.lock_timeout))?;

        if updated.rows_affected() == 0 {
            return Err(LedgerError::NotFound(wallet.id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let lock_timeout = self.lock_timeout;
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error(e, lock_timeout))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let lock_timeout = self.lock_timeout;
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error(e, lock_timeout))
    }
}
