//! Charge monitor: polls the processor for one in-flight charge.

use alloy::primitives::{Address, B256, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::blockchain::contract::TransactionStatus;
use crate::blockchain::gateway::ChainGateway;
use crate::config::schema::MonitorConfig;
use crate::processor::client::{status_is_missing, status_is_success, CardProcessor};
use crate::settlement::followup::{FollowUpRunner, SettlementFollowUp};
use crate::settlement::registry::{MonitorRegistry, MonitorTicket};
use crate::settlement::unix_now;

/// Shared dependencies of every monitor.
#[derive(Clone)]
pub struct MonitorContext {
    pub gateway: ChainGateway,
    pub processor: Arc<dyn CardProcessor>,
    pub registry: MonitorRegistry,
    pub followups: FollowUpRunner,
    pub config: MonitorConfig,
}

/// How a monitor ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorExit {
    /// Cancelled; nothing was written.
    Cancelled,
    /// Processor reported success; `Success` written and follow-up run.
    Settled,
    /// Processor has no record; `Failed` written.
    Missing,
    /// Every poll was inconclusive; the charge stays `Processing`.
    Exhausted,
    /// A terminal status write failed.
    WriteFailed,
}

impl MonitorExit {
    pub fn label(&self) -> &'static str {
        match self {
            MonitorExit::Cancelled => "cancelled",
            MonitorExit::Settled => "settled",
            MonitorExit::Missing => "missing",
            MonitorExit::Exhausted => "exhausted",
            MonitorExit::WriteFailed => "write_failed",
        }
    }
}

/// One monitor for one processor tx id.
pub struct ChargeMonitor {
    ctx: MonitorContext,
    ticket: MonitorTicket,
    token_id: B256,
    amount: U256,
    merchant: Address,
}

impl ChargeMonitor {
    pub fn new(
        ctx: MonitorContext,
        ticket: MonitorTicket,
        token_id: B256,
        amount: U256,
        merchant: Address,
    ) -> Self {
        Self {
            ctx,
            ticket,
            token_id,
            amount,
            merchant,
        }
    }

    /// Poll until a terminal status, cancellation, or the poll budget runs out.
    ///
    /// The registry entry is removed on every exit unless a newer monitor owns it.
    pub async fn run(self) -> MonitorExit {
        let exit = self.poll_loop().await;
        self.ctx.registry.remove_if_current(&self.ticket);
        tracing::info!(
            tx_id = %self.ticket.tx_id,
            exit = exit.label(),
            "Charge monitor finished"
        );
        exit
    }

    async fn poll_loop(&self) -> MonitorExit {
        let token = &self.ticket.token;
        let tx_id = self.ticket.tx_id.as_str();
        let interval = Duration::from_millis(self.ctx.config.poll_interval_ms);

        for poll in 1..=self.ctx.config.max_polls {
            tokio::select! {
                biased;
                _ = token.cancelled() => return MonitorExit::Cancelled,
                _ = sleep(interval) => {}
            }

            let status = tokio::select! {
                biased;
                _ = token.cancelled() => return MonitorExit::Cancelled,
                polled = self.ctx.processor.poll_status(tx_id) => polled,
            };

            // A cancellation that lands during the poll still suppresses the write.
            if token.is_cancelled() {
                return MonitorExit::Cancelled;
            }

            let status = match status {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(tx_id = %tx_id, poll = poll, error = %e, "Status poll failed");
                    continue;
                }
            };

            if status_is_success(&status) {
                return self.settle().await;
            }
            if status_is_missing(&status) {
                return self.mark_missing().await;
            }
            tracing::debug!(tx_id = %tx_id, poll = poll, status = %status, "Charge still processing");
        }

        MonitorExit::Exhausted
    }

    async fn settle(&self) -> MonitorExit {
        let tx_id = &self.ticket.tx_id;
        if let Err(e) = self
            .ctx
            .gateway
            .update_tx_status(
                self.token_id,
                tx_id,
                TransactionStatus::Success,
                unix_now(),
                "success",
            )
            .await
        {
            tracing::error!(tx_id = %tx_id, error = %e, "Failed to record settled charge");
            return MonitorExit::WriteFailed;
        }

        self.ctx
            .followups
            .run(SettlementFollowUp {
                tx_id: tx_id.clone(),
                parent_value: self.amount,
                owner_pool: self.merchant,
            })
            .await;
        MonitorExit::Settled
    }

    async fn mark_missing(&self) -> MonitorExit {
        let tx_id = &self.ticket.tx_id;
        match self
            .ctx
            .gateway
            .update_tx_status(
                self.token_id,
                tx_id,
                TransactionStatus::Failed,
                unix_now(),
                "fail",
            )
            .await
        {
            Ok(_) => MonitorExit::Missing,
            Err(e) => {
                tracing::error!(tx_id = %tx_id, error = %e, "Failed to record missing charge");
                MonitorExit::WriteFailed
            }
        }
    }
}

impl std::fmt::Debug for ChargeMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargeMonitor")
            .field("tx_id", &self.ticket.tx_id)
            .field("token_id", &self.token_id)
            .finish()
    }
}
