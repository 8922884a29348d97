//! Per-event handlers.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::blockchain::contract::{
    ChargeRejection, ChargeRequested, StatusUpdateRequested, TokenRequested, TransactionStatus,
};
use crate::blockchain::gateway::ChainGateway;
use crate::config::schema::MonitorConfig;
use crate::crypto::{card_hash, generate_token_id, open_card_blob, ServerKey, TokenId};
use crate::observability::metrics;
use crate::processor::client::{charge_outcome, status_is_success, CardProcessor};
use crate::processor::types::{CardData, ChargeOrder, ChargeOutcome};
use crate::settlement::followup::{FollowUpRunner, SettlementFollowUp};
use crate::settlement::monitor::{ChargeMonitor, MonitorContext, MonitorExit};
use crate::settlement::registry::MonitorRegistry;
use crate::settlement::{unix_now, HandlerError, HandlerResult};
use crate::vault::{token_key, TokenVault};

/// Reason written while a charge waits on the processor.
pub const PROCESSING_REASON: &str = "being processed";

/// Result of a handled `ChargeRequest`.
#[derive(Debug)]
pub struct ChargeHandled {
    pub tx_id: String,
    pub outcome: ChargeOutcome,
    /// Monitor started for a processing charge.
    pub monitor: Option<JoinHandle<MonitorExit>>,
    /// Follow-up started for a settled charge.
    pub followup: Option<JoinHandle<()>>,
}

/// Result of a handled `RequestUpdateTxStatus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReconciled {
    /// The on-chain status was already terminal; nothing written.
    Terminal(TransactionStatus),
    /// A status was re-proposed on-chain.
    Proposed(TransactionStatus),
}

/// Everything a handler needs. Cheap to clone.
#[derive(Clone)]
pub struct Settlement {
    vault: TokenVault,
    server_key: Arc<ServerKey>,
    gateway: ChainGateway,
    processor: Arc<dyn CardProcessor>,
    registry: MonitorRegistry,
    followups: FollowUpRunner,
    monitor_config: MonitorConfig,
    region: String,
}

impl Settlement {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vault: TokenVault,
        server_key: Arc<ServerKey>,
        gateway: ChainGateway,
        processor: Arc<dyn CardProcessor>,
        registry: MonitorRegistry,
        followups: FollowUpRunner,
        monitor_config: MonitorConfig,
        region: impl Into<String>,
    ) -> Self {
        Self {
            vault,
            server_key,
            gateway,
            processor,
            registry,
            followups,
            monitor_config,
            region: region.into(),
        }
    }

    pub fn registry(&self) -> &MonitorRegistry {
        &self.registry
    }

    fn monitor_context(&self) -> MonitorContext {
        MonitorContext {
            gateway: self.gateway.clone(),
            processor: self.processor.clone(),
            registry: self.registry.clone(),
            followups: self.followups.clone(),
            config: self.monitor_config.clone(),
        }
    }

    fn open_card(&self, blob: &[u8]) -> HandlerResult<CardData> {
        let plaintext = open_card_blob(blob, &self.server_key)?;
        CardData::from_json(&plaintext).map_err(|e| HandlerError::CardPayload(e.to_string()))
    }

    /// Tokenize an encrypted card: vault first, then `submitToken`.
    ///
    /// The vault entry is removed again if the submission fails.
    pub async fn handle_token_request(&self, event: &TokenRequested) -> HandlerResult<TokenId> {
        let card = self.open_card(&event.encrypted_card_data)?;
        let token_id = generate_token_id();
        let hash = card_hash(&card);

        self.vault.store_token(&token_id, &event.encrypted_card_data)?;

        match self
            .gateway
            .submit_token(event.user, token_id, &self.region, event.request_id, hash)
            .await
        {
            Ok(output) => {
                tracing::info!(
                    user = %event.user,
                    token_id = %token_id,
                    request_id = %event.request_id,
                    output = %output,
                    "Token submitted"
                );
                Ok(token_id)
            }
            Err(e) => {
                if let Err(cleanup) = self.vault.remove(&token_key(&token_id)) {
                    tracing::error!(
                        token_id = %token_id,
                        error = %cleanup,
                        "Failed to remove vault entry after rejected submission"
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Charge a tokenized card and record the outcome on-chain.
    pub async fn handle_charge_request(&self, event: &ChargeRequested) -> HandlerResult<ChargeHandled> {
        let blob = self.vault.load_token(&event.token_id)?;
        let card = self.open_card(&blob)?;
        let order = ChargeOrder::new(card, event.amount, event.merchant);
        let at_time = unix_now();

        let (tx_id, outcome) = match self.processor.charge(&order).await {
            Ok(reply) => {
                let tx_id = if reply.transaction_id.is_empty() {
                    order.tx_id.clone()
                } else {
                    reply.transaction_id.clone()
                };
                (tx_id, charge_outcome(&reply))
            }
            Err(e) if e.is_inconclusive() => {
                tracing::warn!(
                    tx_id = %order.tx_id,
                    error = %e,
                    "Charge result unknown, monitoring"
                );
                (
                    order.tx_id.clone(),
                    ChargeOutcome::Processing {
                        reason: PROCESSING_REASON.to_string(),
                    },
                )
            }
            Err(e) => return Err(e.into()),
        };
        metrics::record_charge(outcome.label());
        tracing::info!(
            token_id = %event.token_id,
            tx_id = %tx_id,
            outcome = outcome.label(),
            "Charge submitted"
        );

        let mut handled = ChargeHandled {
            tx_id: tx_id.clone(),
            outcome: outcome.clone(),
            monitor: None,
            followup: None,
        };

        match outcome {
            ChargeOutcome::Failed { reason } => {
                self.gateway
                    .update_tx_status(event.token_id, &tx_id, TransactionStatus::Failed, at_time, &reason)
                    .await?;
            }
            ChargeOutcome::Success => {
                if let Err(e) = self
                    .gateway
                    .update_tx_status(event.token_id, &tx_id, TransactionStatus::Success, at_time, "success")
                    .await
                {
                    tracing::error!(tx_id = %tx_id, error = %e, "Failed to record settled charge");
                }
                handled.followup = Some(self.followups.spawn(SettlementFollowUp {
                    tx_id,
                    parent_value: event.amount,
                    owner_pool: event.merchant,
                }));
            }
            ChargeOutcome::Processing { reason } => {
                self.gateway
                    .update_tx_status(
                        event.token_id,
                        &tx_id,
                        TransactionStatus::Processing,
                        at_time,
                        &reason,
                    )
                    .await?;

                let ticket = self.registry.register(&tx_id);
                let monitor = ChargeMonitor::new(
                    self.monitor_context(),
                    ticket,
                    event.token_id,
                    event.amount,
                    event.merchant,
                );
                handled.monitor = Some(tokio::spawn(monitor.run()));
            }
        }

        Ok(handled)
    }

    /// Log a rejection. The contract has already refused the charge.
    pub fn handle_charge_rejected(&self, event: &ChargeRejection) {
        tracing::warn!(
            user = %event.user,
            token_id = %event.token_id,
            reason = %event.reason,
            "Charge rejected on-chain"
        );
    }

    /// Reconcile a charge on request: stop its monitor and poll once.
    pub async fn handle_update_request(
        &self,
        event: &StatusUpdateRequested,
    ) -> HandlerResult<StatusReconciled> {
        let tx_id = event.transaction_id.as_str();
        if self.registry.cancel(tx_id) {
            tracing::info!(tx_id = %tx_id, "Cancelled monitor for status update request");
        }

        let record = self.gateway.get_tx(tx_id).await?;
        if record.status != TransactionStatus::Processing {
            return Ok(StatusReconciled::Terminal(record.status));
        }

        let polled = self.processor.poll_status(tx_id).await;
        let (status, reason) = match polled {
            Ok(status) if status_is_success(&status) => {
                (TransactionStatus::Success, "success".to_string())
            }
            Ok(_) => (record.status, record.reason),
            Err(e) => {
                tracing::warn!(tx_id = %tx_id, error = %e, "Status poll failed; re-proposing");
                (record.status, record.reason)
            }
        };

        self.gateway
            .update_tx_status(event.token_id, tx_id, status, unix_now(), &reason)
            .await?;
        Ok(StatusReconciled::Proposed(status))
    }
}

impl std::fmt::Debug for Settlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settlement")
            .field("gateway", &self.gateway)
            .field("region", &self.region)
            .field("active_monitors", &self.registry.len())
            .finish()
    }
}
