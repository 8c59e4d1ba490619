use std::sync::Arc;
use wallet_ledger::application::engine::LedgerEngine;
use wallet_ledger::config::LedgerConfig;
use wallet_ledger::domain::ports::{ReadMode, StoreTransaction, WalletStore, WalletStoreRef};
use wallet_ledger::domain::wallet::Wallet;
use wallet_ledger::infrastructure::in_memory::InMemoryWalletStore;

#[tokio::test]
async fn test_store_as_trait_object() {
    let store: WalletStoreRef = Arc::new(InMemoryWalletStore::new());
    let wallet = Wallet::open();

    // Verify Send + Sync by spawning tasks
    let writer = {
        let store = Arc::clone(&store);
        let wallet = wallet.clone();
        tokio::spawn(async move {
            let mut tx = store.begin().await.unwrap();
            tx.insert(&wallet).await.unwrap();
            tx.commit().await.unwrap();
        })
    };
    writer.await.unwrap();

    let reader = {
        let store = Arc::clone(&store);
        let id = wallet.id;
        tokio::spawn(async move {
            let mut tx = store.begin().await.unwrap();
            tx.get(&id, ReadMode::Committed).await.unwrap().unwrap()
        })
    };
    assert_eq!(reader.await.unwrap(), wallet);
}

#[tokio::test]
async fn test_engine_moves_into_tasks() {
    let store: WalletStoreRef = Arc::new(InMemoryWalletStore::new());
    let engine = LedgerEngine::new(store, LedgerConfig::default());

    let handle = tokio::spawn({
        let engine = engine.clone();
        async move {
            let id = engine.create().await.unwrap();
            engine.deposit(id, 42).await.unwrap();
            id
        }
    });

    let id = handle.await.unwrap();
    assert_eq!(engine.balance(&id).await.unwrap(), 42);
}
