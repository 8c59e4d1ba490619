use super::csv::balance_writer::WalletBalance;
use super::csv::operation_reader::OperationRecord;
use crate::application::engine::LedgerEngine;
use crate::domain::operation::Operation;
use crate::domain::wallet::{Amount, WalletId};
use crate::error::{LedgerError, Result};
use std::collections::HashMap;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Outcome counters and final balances of a replay.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Committed operations.
    pub applied: usize,
    /// Permanently refused: bad input, unknown wallet, insufficient funds.
    pub rejected: usize,
    /// Aborted by a timeout or store failure; retrying could succeed.
    pub failed: usize,
    /// One entry per wallet named in the input, in first-seen order.
    pub wallets: Vec<WalletBalance>,
}

impl ReplaySummary {
    fn count_error(&mut self, err: &LedgerError) {
        if err.is_transient() {
            self.failed += 1;
        } else {
            self.rejected += 1;
        }
    }
}

/// Maps the `wallet` column to wallet ids, creating one wallet per new alias.
#[derive(Default)]
struct WalletDirectory {
    ids: HashMap<String, WalletId>,
    order: Vec<(String, WalletId)>,
}

impl WalletDirectory {
    async fn resolve(&mut self, engine: &LedgerEngine, name: &str) -> Result<WalletId> {
        if let Some(id) = self.ids.get(name) {
            return Ok(*id);
        }
        let id = match name.parse::<WalletId>() {
            Ok(existing) => existing,
            Err(_) => engine.create().await?,
        };
        self.ids.insert(name.to_string(), id);
        self.order.push((name.to_string(), id));
        Ok(id)
    }
}

/// Applies every record concurrently, one tokio task per record.
///
/// Wallet aliases are resolved up front, in input order, so all operations
/// on one alias target the same wallet. Operations on the same wallet then
/// race for its row lock; the final balances do not depend on who wins.
pub async fn replay<I>(engine: &LedgerEngine, records: I) -> Result<ReplaySummary>
where
    I: IntoIterator<Item = OperationRecord>,
{
    let mut directory = WalletDirectory::default();
    let mut summary = ReplaySummary::default();
    let mut tasks = JoinSet::new();

    for record in records {
        let wallet_id = match directory.resolve(engine, &record.wallet).await {
            Ok(id) => id,
            Err(err) => {
                warn!(wallet = %record.wallet, error = %err, "could not resolve wallet");
                summary.count_error(&err);
                continue;
            }
        };
        let op = match normalize(wallet_id, &record) {
            Ok(op) => op,
            Err(err) => {
                warn!(wallet = %record.wallet, error = %err, "skipping invalid operation");
                summary.rejected += 1;
                continue;
            }
        };

        let engine = engine.clone();
        tasks.spawn(async move { engine.apply(op).await });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(_)) => summary.applied += 1,
            Ok(Err(err)) => summary.count_error(&err),
            Err(join_err) => {
                warn!(error = %join_err, "operation task did not finish");
                summary.failed += 1;
            }
        }
    }

    for (wallet, id) in directory.order {
        match engine.balance(&id).await {
            Ok(balance) => summary.wallets.push(WalletBalance {
                wallet,
                id,
                balance,
            }),
            Err(LedgerError::NotFound(_)) => {
                warn!(%wallet, "wallet does not exist, leaving it out of the report");
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        applied = summary.applied,
        rejected = summary.rejected,
        failed = summary.failed,
        "replay finished"
    );
    Ok(summary)
}

fn normalize(wallet_id: WalletId, record: &OperationRecord) -> Result<Operation> {
    Ok(Operation::new(
        wallet_id,
        record.kind.parse()?,
        Amount::new(record.amount)?,
    ))
}
