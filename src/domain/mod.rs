//! Domain types and the storage port the ledger engine runs on.

pub mod operation;
pub mod ports;
pub mod wallet;
