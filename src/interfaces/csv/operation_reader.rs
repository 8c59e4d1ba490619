use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::io::Read;

/// One raw CSV row: `wallet, kind, amount`.
///
/// `wallet` is either an existing wallet id or a free-form alias; `kind` and
/// `amount` are validated later by the ledger, so a row with an unknown kind
/// or a non-positive amount still reads successfully.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
pub struct OperationRecord {
    pub wallet: String,
    pub kind: String,
    pub amount: i64,
}

/// Reads operation records from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<OperationRecord>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    /// Creates a new `OperationReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes records.
    pub fn operations(self) -> impl Iterator<Item = Result<OperationRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_valid_stream() {
        let data = "wallet, kind, amount\nalice, DEPOSIT, 5000\nalice, WITHDRAW, 2000";
        let reader = OperationReader::new(data.as_bytes());
        let results: Vec<Result<OperationRecord>> = reader.operations().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.wallet, "alice");
        assert_eq!(first.kind, "DEPOSIT");
        assert_eq!(first.amount, 5000);
    }

    #[test]
    fn test_reader_keeps_unvalidated_fields() {
        let data = "wallet, kind, amount\nbob, REFUND, -3";
        let reader = OperationReader::new(data.as_bytes());
        let record = reader.operations().next().unwrap().unwrap();
        assert_eq!(record.kind, "REFUND");
        assert_eq!(record.amount, -3);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "wallet, kind, amount\nbob, DEPOSIT, lots";
        let reader = OperationReader::new(data.as_bytes());
        let results: Vec<Result<OperationRecord>> = reader.operations().collect();

        assert!(matches!(results[0], Err(LedgerError::Csv(_))));
    }
}
