//! Chain-specific types and error definitions.

use thiserror::Error;

// Re-export ChainConfig from config module to avoid duplication
pub use crate::config::schema::ChainConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors that can occur during chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// No receipt arrived within any attempt's wait window.
    #[error("{method} timed out after {attempts} attempt(s)")]
    Timeout { method: String, attempts: u32 },

    /// Receipt reported execution failure; payload is the hex return data.
    #[error("{method} execution failed: {payload}")]
    ExecutionFailed { method: String, payload: String },

    /// Return data or log data did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(#[from] crate::blockchain::contract::DecodeError),

    /// Invalid private key format or signing error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_wei} wei exceeds maximum {max_wei} wei")]
    GasPriceTooHigh { current_wei: u128, max_wei: u128 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

impl ChainError {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ChainError::Rpc(_) => "rpc_error",
            ChainError::Timeout { .. } => "timeout",
            ChainError::ExecutionFailed { .. } => "execution_failed",
            ChainError::Decode(_) => "decode_error",
            ChainError::Wallet(_) => "wallet_error",
            ChainError::GasPriceTooHigh { .. } => "gas_price_too_high",
            ChainError::ChainMismatch { .. } => "chain_mismatch",
        }
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
