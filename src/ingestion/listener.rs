//! Event listener: polls the chain for contract logs and feeds the dispatch queue.

use alloy::primitives::Address;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;

use crate::blockchain::contract::EventKind;
use crate::blockchain::transport::{ChainEvent, ChainTransport};
use crate::config::schema::IngestionConfig;
use crate::ingestion::{IngestionError, IngestionResult};
use crate::observability::metrics;
use crate::resilience::calculate_backoff;
use crate::vault::TokenVault;

/// What a single polling cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Head has not moved past the checkpoint.
    Idle { head: u64 },
    /// Logs up to `head` were fetched for every topic except `failed_topics`.
    Advanced {
        head: u64,
        delivered: usize,
        failed_topics: Vec<EventKind>,
        checkpoint: u64,
    },
}

/// Service that polls the card contract for events.
pub struct EventListener {
    transport: Arc<dyn ChainTransport>,
    vault: TokenVault,
    contract: Address,
    config: IngestionConfig,
    queue: mpsc::Sender<ChainEvent>,
    /// Last block whose logs were delivered, per topic.
    cursors: HashMap<EventKind, u64>,
    /// Minimum cursor; the value persisted as the checkpoint.
    from_block: u64,
    persisted: Option<u64>,
    initialized: bool,
}

impl EventListener {
    pub fn new(
        transport: Arc<dyn ChainTransport>,
        vault: TokenVault,
        contract: Address,
        config: IngestionConfig,
        queue: mpsc::Sender<ChainEvent>,
    ) -> Self {
        Self {
            transport,
            vault,
            contract,
            config,
            queue,
            cursors: HashMap::new(),
            from_block: 0,
            persisted: None,
            initialized: false,
        }
    }

    /// Current checkpoint held in memory.
    pub fn from_block(&self) -> u64 {
        self.from_block
    }

    /// Load the checkpoint, or seed it with the current head on first run.
    pub async fn initialize(&mut self) -> IngestionResult<u64> {
        let start = match self.vault.load_checkpoint()? {
            Some(block) => {
                tracing::info!(block = block, "Resuming ingestion from checkpoint");
                block
            }
            None => {
                let head = self.transport.latest_block_number().await?;
                self.vault.store_checkpoint(head)?;
                tracing::info!(block = head, "No checkpoint found, starting at head");
                head
            }
        };

        let mut cursors = HashMap::new();
        for kind in EventKind::ALL {
            let cursor = self.vault.load_cursor(kind.name())?.unwrap_or(start).max(start);
            if cursor > start {
                tracing::info!(topic = kind.name(), block = cursor, "Topic cursor ahead of checkpoint");
            }
            cursors.insert(kind, cursor);
        }

        self.from_block = start;
        self.persisted = Some(start);
        self.cursors = cursors;
        self.initialized = true;
        Ok(start)
    }

    /// Run one polling cycle.
    pub async fn poll_once(&mut self) -> IngestionResult<CycleOutcome> {
        if !self.initialized {
            self.initialize().await?;
        }

        let head = self.transport.latest_block_number().await?;
        if head <= self.from_block {
            return Ok(CycleOutcome::Idle { head });
        }

        let mut delivered = 0;
        let mut failed_topics = Vec::new();

        for kind in EventKind::ALL {
            let cursor = self.cursors.get(&kind).copied().unwrap_or(self.from_block);
            if cursor >= head {
                continue;
            }

            let events = match self
                .transport
                .get_logs(cursor + 1, head, self.contract, kind.topic())
                .await
            {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(
                        topic = kind.name(),
                        from = cursor + 1,
                        to = head,
                        error = %e,
                        "Log fetch failed; range retried next cycle"
                    );
                    failed_topics.push(kind);
                    continue;
                }
            };

            for event in events {
                self.queue
                    .send(event)
                    .await
                    .map_err(|_| IngestionError::QueueClosed)?;
                metrics::record_event_ingested(kind.name());
                delivered += 1;
            }
            self.advance_cursor(kind, head);
        }

        let checkpoint = self.cursors.values().copied().min().unwrap_or(self.from_block);
        self.from_block = self.from_block.max(checkpoint);
        self.persist_checkpoint();

        Ok(CycleOutcome::Advanced {
            head,
            delivered,
            failed_topics,
            checkpoint: self.from_block,
        })
    }

    /// Record that `kind` is delivered up to `block`, in memory and in the vault.
    fn advance_cursor(&mut self, kind: EventKind, block: u64) {
        self.cursors.insert(kind, block);
        if let Err(e) = self.vault.store_cursor(kind.name(), block) {
            tracing::error!(topic = kind.name(), block = block, error = %e, "Failed to persist topic cursor");
        }
    }

    fn persist_checkpoint(&mut self) {
        if self.persisted == Some(self.from_block) {
            return;
        }
        match self.vault.store_checkpoint(self.from_block) {
            Ok(()) => self.persisted = Some(self.from_block),
            Err(e) => {
                tracing::error!(block = self.from_block, error = %e, "Failed to persist checkpoint");
            }
        }
    }

    /// Run the polling loop until shutdown.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(contract = %self.contract, "Starting event listener");

        let idle = Duration::from_millis(self.config.idle_interval_ms);
        let mut failures: u32 = 0;

        loop {
            let delay = match self.poll_once().await {
                Ok(CycleOutcome::Idle { .. }) => {
                    failures = 0;
                    idle
                }
                Ok(CycleOutcome::Advanced {
                    head,
                    delivered,
                    failed_topics,
                    checkpoint,
                }) => {
                    failures = 0;
                    tracing::debug!(
                        head = head,
                        delivered = delivered,
                        failed_topics = failed_topics.len(),
                        checkpoint = checkpoint,
                        "Ingestion cycle complete"
                    );
                    idle
                }
                Err(IngestionError::QueueClosed) => {
                    tracing::info!("Event queue closed, stopping listener");
                    break;
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = calculate_backoff(
                        failures,
                        self.config.error_backoff_ms,
                        self.config.max_backoff_ms,
                    );
                    tracing::warn!(
                        error = %e,
                        consecutive_failures = failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "Ingestion cycle failed"
                    );
                    delay
                }
            };

            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(checkpoint = self.from_block, "Event listener shutting down");
                    break;
                }
                _ = sleep(delay) => {}
            }
        }
    }
}

impl std::fmt::Debug for EventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListener")
            .field("contract", &self.contract)
            .field("from_block", &self.from_block)
            .finish()
    }
}
