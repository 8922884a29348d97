//! Settlement state machine.
//!
//! # Data Flow
//! ```text
//! event queue
//!     → dispatcher.rs (decode, route by topic0)
//!     → handlers.rs (vault, crypto, processor, gateway)
//!     → monitor.rs (processing charges, cancellable)
//!     → followup.rs (MintUTXO → getPoolInfo, reported on a channel)
//! ```
//!
//! # Design Decisions
//! - One event is handled at a time, in arrival order
//! - Handler errors are logged at the dispatcher and never stop the loop
//! - At most one monitor per processor tx id; a newer one cancels the older

pub mod dispatcher;
pub mod followup;
pub mod handlers;
pub mod monitor;
pub mod registry;

use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::blockchain::contract::DecodeError;
use crate::blockchain::types::ChainError;
use crate::crypto::CryptoError;
use crate::processor::ProcessorError;
use crate::vault::VaultError;

pub use dispatcher::Dispatcher;
pub use followup::{run_reporter, FollowUpReport, FollowUpRunner, SettlementFollowUp};
pub use handlers::{ChargeHandled, Settlement, StatusReconciled};
pub use monitor::{ChargeMonitor, MonitorContext, MonitorExit};
pub use registry::{MonitorRegistry, MonitorTicket};

/// Errors that abort a single event handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Decrypted payload is not card JSON.
    #[error("invalid card payload: {0}")]
    CardPayload(String),

    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("processor error: {0}")]
    Processor(#[from] ProcessorError),
}

impl HandlerError {
    /// Label used in metrics.
    pub fn label(&self) -> &'static str {
        match self {
            HandlerError::Decode(_) => "decode_error",
            HandlerError::Crypto(_) => "crypto_error",
            HandlerError::CardPayload(_) => "card_payload_error",
            HandlerError::Vault(_) => "vault_error",
            HandlerError::Chain(_) => "chain_error",
            HandlerError::Processor(_) => "processor_error",
        }
    }
}

/// Result type for event handlers.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Seconds since the Unix epoch, as written to `UpdateTxStatus.atTime`.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
