//! Single consumer of the event queue.

use tokio::sync::mpsc;

use crate::blockchain::contract::{decode_event, BridgeEvent};
use crate::blockchain::transport::ChainEvent;
use crate::observability::metrics;
use crate::settlement::handlers::Settlement;
use crate::settlement::HandlerResult;

/// Routes decoded events to their handlers, one at a time.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    settlement: Settlement,
}

impl Dispatcher {
    pub fn new(settlement: Settlement) -> Self {
        Self { settlement }
    }

    pub fn settlement(&self) -> &Settlement {
        &self.settlement
    }

    /// Decode and handle one event.
    pub async fn dispatch(&self, event: &ChainEvent) -> HandlerResult<()> {
        let decoded = decode_event(event)?;
        match &decoded {
            BridgeEvent::TokenRequest(request) => {
                self.settlement.handle_token_request(request).await?;
            }
            BridgeEvent::ChargeRequest(request) => {
                self.settlement.handle_charge_request(request).await?;
            }
            BridgeEvent::ChargeRejected(rejection) => {
                self.settlement.handle_charge_rejected(rejection);
            }
            BridgeEvent::RequestUpdateTxStatus(request) => {
                let reconciled = self.settlement.handle_update_request(request).await?;
                tracing::info!(
                    tx_id = %request.transaction_id,
                    result = ?reconciled,
                    "Status update request handled"
                );
            }
        }
        Ok(())
    }

    /// Handle one event, logging instead of propagating failures.
    pub async fn dispatch_logged(&self, event: &ChainEvent) {
        let name = event
            .topic0()
            .and_then(crate::blockchain::contract::EventKind::from_topic)
            .map(|kind| kind.name())
            .unwrap_or("unknown");

        match self.dispatch(event).await {
            Ok(()) => metrics::record_event_handled(name, "ok"),
            Err(e) => {
                metrics::record_event_handled(name, e.label());
                tracing::error!(
                    event = name,
                    block = event.block_number,
                    tx_hash = ?event.tx_hash,
                    log_index = ?event.log_index,
                    error = %e,
                    "Event handler failed"
                );
            }
        }
    }

    /// Consume the queue until every sender is gone.
    ///
    /// Shutdown reaches the dispatcher only through the listener dropping its
    /// sender, so events already queued (and checkpointed) are still handled.
    pub async fn run(self, mut queue: mpsc::Receiver<ChainEvent>) {
        tracing::info!("Starting event dispatcher");
        let mut handled: u64 = 0;
        while let Some(event) = queue.recv().await {
            self.dispatch_logged(&event).await;
            handled += 1;
        }
        tracing::info!(handled = handled, "Event queue drained, stopping dispatcher");
    }
}
