#![allow(dead_code)]

use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wallet_ledger::application::engine::LedgerEngine;
use wallet_ledger::config::LedgerConfig;
use wallet_ledger::domain::wallet::WalletId;
use wallet_ledger::infrastructure::in_memory::InMemoryWalletStore;

pub fn engine() -> LedgerEngine {
    engine_on(Arc::new(InMemoryWalletStore::new()))
}

pub fn engine_on(store: Arc<InMemoryWalletStore>) -> LedgerEngine {
    LedgerEngine::new(store, LedgerConfig::default())
}

pub fn engine_with_timeout(store: Arc<InMemoryWalletStore>, timeout: Duration) -> LedgerEngine {
    LedgerEngine::new(
        store,
        LedgerConfig::default().with_transaction_timeout(timeout),
    )
}

/// Creates a wallet and deposits `balance` into it.
pub async fn seeded_wallet(engine: &LedgerEngine, balance: i64) -> WalletId {
    let id = engine.create().await.expect("create wallet");
    if balance > 0 {
        engine.deposit(id, balance).await.expect("seed wallet");
    }
    id
}

/// Writes `rows` deposits of 1 spread round-robin over `wallets` aliases
/// (`w0`, `w1`, ...).
pub fn generate_csv(path: &Path, wallets: usize, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["wallet", "kind", "amount"])?;

    for i in 0..rows {
        let alias = format!("w{}", i % wallets);
        wtr.write_record([alias.as_str(), "DEPOSIT", "1"])?;
    }

    wtr.flush()?;
    Ok(())
}
