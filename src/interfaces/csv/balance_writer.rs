use crate::domain::wallet::WalletId;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// Final balance of one wallet touched by a replay.
#[derive(Debug, Serialize, PartialEq, Eq, Clone)]
pub struct WalletBalance {
    /// The alias or id the input used for this wallet.
    pub wallet: String,
    pub id: WalletId,
    pub balance: i64,
}

/// Writes `wallet,id,balance` rows.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes the header and every row, then flushes.
    pub fn write_balances<I>(&mut self, balances: I) -> Result<()>
    where
        I: IntoIterator<Item = WalletBalance>,
    {
        let mut wrote_any = false;
        for balance in balances {
            self.writer.serialize(balance)?;
            wrote_any = true;
        }
        if !wrote_any {
            self.writer.write_record(["wallet", "id", "balance"])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
