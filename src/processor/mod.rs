//! Card processor integration.
//!
//! # Data Flow
//! ```text
//! ChargeRequest handler
//!     → types.rs (ChargeOrder, payload layout, validation)
//!     → client.rs (POST charge, classify body)
//!     → ChargeOutcome (Success | Processing | Failed)
//! Monitor task → client.rs (POST status poll)
//! ```

pub mod client;
pub mod types;

use thiserror::Error;

pub use client::{charge_outcome, classify_charge, CardProcessor, HttpProcessor};
pub use types::{CardData, ChargeOrder, ChargeOutcome, ProcessorReply};

/// Errors that can occur talking to the processor.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Request could not be sent or the body could not be read.
    #[error("processor transport error: {0}")]
    Transport(String),

    /// Processor answered with a server error.
    #[error("processor returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// Card rejected before sending.
    #[error("invalid card: {0}")]
    InvalidCard(String),

    /// Amount does not fit the processor's integer range.
    #[error("amount {0} does not fit a signed 64-bit integer")]
    InvalidAmount(String),

    /// Reply body could not be parsed.
    #[error("unparseable processor reply: {0}")]
    Parse(String),
}

impl ProcessorError {
    /// Whether the charge may have reached the processor.
    ///
    /// Validation errors are raised before anything is sent.
    pub fn is_inconclusive(&self) -> bool {
        !matches!(
            self,
            ProcessorError::InvalidCard(_) | ProcessorError::InvalidAmount(_)
        )
    }
}

/// Result type for processor operations.
pub type ProcessorResult<T> = Result<T, ProcessorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inconclusive_classification() {
        assert!(ProcessorError::Transport("reset".into()).is_inconclusive());
        assert!(ProcessorError::Parse("eof".into()).is_inconclusive());
        assert!(!ProcessorError::InvalidCard("year".into()).is_inconclusive());
        assert!(!ProcessorError::InvalidAmount("1e30".into()).is_inconclusive());
    }
}
