//! Error types for script and transaction processing

use thiserror::Error;

use crate::script::ScriptKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unsupported script kind: {0:?}")]
    UnsupportedScriptKind(ScriptKind),

    #[error("Key mismatch: {0}")]
    KeyMismatch(String),

    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),

    #[error("Previous transaction not found: {0}")]
    UnresolvedPrevious(String),

    #[error("Output index {index} out of range: previous transaction has {count} outputs")]
    OutputIndexOutOfRange { index: u32, count: usize },

    #[error("Insufficient funds: {available} available, {required} required")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TxError>;
