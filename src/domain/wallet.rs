use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier of a wallet.
///
/// Random (v4) UUIDs; collisions are still detected by the stores and
/// surfaced as `LedgerError::DuplicateWallet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(Uuid);

impl WalletId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Key bytes used by byte-oriented stores.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for WalletId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WalletId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| LedgerError::InvalidWalletId(s.to_string()))
    }
}

/// A strictly positive amount in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: i64) -> Result<Self, LedgerError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(LedgerError::InvalidAmount(value))
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// The persisted wallet record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    /// Minor units; never negative in a committed state.
    pub balance: i64,
}

impl Wallet {
    /// A fresh wallet with a new id and zero balance.
    pub fn open() -> Self {
        Self {
            id: WalletId::new(),
            balance: 0,
        }
    }

    /// Adds `amount`, failing instead of wrapping on overflow.
    pub fn deposit(&mut self, amount: Amount) -> Result<(), LedgerError> {
        self.balance = self
            .balance
            .checked_add(amount.value())
            .ok_or(LedgerError::BalanceOverflow {
                wallet: self.id,
                balance: self.balance,
                requested: amount.value(),
            })?;
        Ok(())
    }

    /// Subtracts `amount` if the balance covers it; leaves the wallet untouched otherwise.
    pub fn withdraw(&mut self, amount: Amount) -> Result<(), LedgerError> {
        if amount.value() > self.balance {
            return Err(LedgerError::InsufficientFunds {
                wallet: self.id,
                balance: self.balance,
                requested: amount.value(),
            });
        }
        self.balance -= amount.value();
        Ok(())
    }
}
