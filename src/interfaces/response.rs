use crate::error::{ErrorKind, LedgerError};
use serde::Serialize;
use serde_json::{Value, json};

/// The response envelope rendered for every command:
/// `{"success": bool, "error"?: string, "kind"?: string, "data"?: object}`.
#[derive(Debug, Serialize, PartialEq)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            error: None,
            kind: None,
            data: Some(data),
        }
    }

    pub fn created(wallet_id: impl ToString) -> Self {
        Self::ok(json!({ "walletId": wallet_id.to_string() }))
    }

    pub fn balance(balance: i64) -> Self {
        Self::ok(json!({ "balance": balance }))
    }

    pub fn failure(err: &LedgerError) -> Self {
        Self::rejected(err.kind(), err.to_string())
    }

    /// A failure that did not come from the engine, such as an unreadable request body.
    pub fn rejected(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            kind: Some(kind.as_str()),
            data: None,
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing plain strings, bools and a `Value` cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| String::from(r#"{"success":false}"#))
    }
}

/// Process exit code for a failed command; each error kind gets its own.
pub fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::NotFound => 2,
        ErrorKind::InvalidInput => 3,
        ErrorKind::InvalidOperation => 4,
        ErrorKind::InsufficientFunds => 5,
        ErrorKind::Timeout => 6,
        ErrorKind::StoreUnavailable => 7,
    }
}
