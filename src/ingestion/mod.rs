//! Event ingestion subsystem.
//!
//! # Data Flow
//! ```text
//! checkpoint ("lastBlock" in the vault)
//!     → listener.rs (head poll, per-topic log fetch)
//!     → bounded queue (blocks when full)
//!     → settlement dispatcher
//! ```
//!
//! # Design Decisions
//! - First run starts at the current head; history is never replayed
//! - Each topic keeps its own cursor; the checkpoint is the lowest one
//! - A failed topic is retried next cycle without re-delivering the others

pub mod listener;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::blockchain::transport::ChainEvent;
use crate::blockchain::types::ChainError;
use crate::vault::VaultError;

pub use listener::{CycleOutcome, EventListener};

/// Errors that stop an ingestion cycle.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("checkpoint error: {0}")]
    Vault(#[from] VaultError),

    /// The dispatcher dropped its end of the queue.
    #[error("event queue closed")]
    QueueClosed,
}

/// Result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Bounded queue between the listener and the dispatcher.
pub fn event_queue(capacity: usize) -> (mpsc::Sender<ChainEvent>, mpsc::Receiver<ChainEvent>) {
    mpsc::channel(capacity.max(1))
}
