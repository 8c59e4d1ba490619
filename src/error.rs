use crate::domain::wallet::WalletId;
use miette::Diagnostic;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Boxed source error kept behind `StoreUnavailable`.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Diagnostic, Debug)]
pub enum LedgerError {
    #[error("wallet {0} not found")]
    #[diagnostic(code(ledger::not_found))]
    NotFound(WalletId),

    #[error("invalid operation type: {0}")]
    #[diagnostic(
        code(ledger::invalid_operation),
        help("operation type must be DEPOSIT or WITHDRAW")
    )]
    InvalidOperation(String),

    #[error("insufficient funds in wallet {wallet}: have {balance}, need {requested}")]
    #[diagnostic(code(ledger::insufficient_funds))]
    InsufficientFunds {
        wallet: WalletId,
        balance: i64,
        requested: i64,
    },

    #[error("balance of wallet {wallet} would overflow: {balance} + {requested}")]
    #[diagnostic(code(ledger::balance_overflow))]
    BalanceOverflow {
        wallet: WalletId,
        balance: i64,
        requested: i64,
    },

    #[error("transaction did not complete within {0:?}")]
    #[diagnostic(code(ledger::timeout), help("the operation is safe to retry"))]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    #[diagnostic(code(ledger::store_unavailable), help("the operation is safe to retry"))]
    StoreUnavailable(#[source] StoreError),

    #[error("wallet {0} already exists")]
    #[diagnostic(code(ledger::duplicate_wallet))]
    DuplicateWallet(WalletId),

    #[error("amount must be positive, got {0}")]
    #[diagnostic(code(ledger::invalid_amount))]
    InvalidAmount(i64),

    #[error("malformed wallet id: {0:?}")]
    #[diagnostic(code(ledger::invalid_wallet_id))]
    InvalidWalletId(String),

    #[error("CSV error: {0}")]
    #[diagnostic(code(ledger::csv))]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(ledger::io))]
    Io(#[from] std::io::Error),
}

/// Coarse classification handed to callers; routing layers map it to their
/// own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    InvalidOperation,
    InsufficientFunds,
    Timeout,
    StoreUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::InvalidOperation => "InvalidOperation",
            ErrorKind::InsufficientFunds => "InsufficientFunds",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::StoreUnavailable => "StoreUnavailable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LedgerError {
    /// Wraps any backend failure as `StoreUnavailable`.
    pub fn store<E>(err: E) -> Self
    where
        E: Into<StoreError>,
    {
        LedgerError::StoreUnavailable(err.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::InvalidOperation(_) | LedgerError::BalanceOverflow { .. } => {
                ErrorKind::InvalidOperation
            }
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::Timeout(_) => ErrorKind::Timeout,
            LedgerError::StoreUnavailable(_) | LedgerError::DuplicateWallet(_) => {
                ErrorKind::StoreUnavailable
            }
            LedgerError::InvalidAmount(_)
            | LedgerError::InvalidWalletId(_)
            | LedgerError::Csv(_)
            | LedgerError::Io(_) => ErrorKind::InvalidInput,
        }
    }

    /// Transient failures may succeed when retried with the same arguments.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Timeout | ErrorKind::StoreUnavailable
        )
    }
}
