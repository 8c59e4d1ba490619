//! Application layer containing the ledger engine.
//!
//! `LedgerEngine` is the single entry point for creating wallets, reading
//! balances and applying operations. It owns no state besides the injected
//! store handle, so it can be cloned into as many tokio tasks as needed.

pub mod engine;
