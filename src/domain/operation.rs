use super::wallet::{Amount, WalletId};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Deposit,
    Withdraw,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Deposit => "DEPOSIT",
            OperationKind::Withdraw => "WITHDRAW",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("DEPOSIT") {
            Ok(OperationKind::Deposit)
        } else if trimmed.eq_ignore_ascii_case("WITHDRAW") {
            Ok(OperationKind::Withdraw)
        } else {
            Err(LedgerError::InvalidOperation(s.to_string()))
        }
    }
}

/// A normalized balance-mutation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub wallet_id: WalletId,
    pub kind: OperationKind,
    pub amount: Amount,
}

impl Operation {
    pub fn new(wallet_id: WalletId, kind: OperationKind, amount: Amount) -> Self {
        Self {
            wallet_id,
            kind,
            amount,
        }
    }

    pub fn deposit(wallet_id: WalletId, amount: Amount) -> Self {
        Self::new(wallet_id, OperationKind::Deposit, amount)
    }

    pub fn withdraw(wallet_id: WalletId, amount: Amount) -> Self {
        Self::new(wallet_id, OperationKind::Withdraw, amount)
    }

    /// Normalizes a raw `{walletId, operationType, amount}` request.
    ///
    /// The wallet id is checked first, then the kind, then the amount, so a
    /// request with several problems reports the earliest one.
    pub fn parse(wallet_id: &str, kind: &str, amount: i64) -> Result<Self, LedgerError> {
        let wallet_id = wallet_id.parse()?;
        let kind = kind.parse()?;
        let amount = Amount::new(amount)?;
        Ok(Self::new(wallet_id, kind, amount))
    }
}
