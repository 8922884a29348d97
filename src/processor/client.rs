//! HTTP client for the card processor.
//!
//! # Responsibilities
//! - Submit charges and classify the raw reply
//! - Poll the status of a charge by processor tx id
//! - Surface transport failures as `ProcessorError` so callers can treat
//!   them as inconclusive

use async_trait::async_trait;
use std::time::Duration;

use crate::config::schema::ProcessorConfig;
use crate::processor::types::{
    ChargeOrder, ChargeOutcome, ChargePayload, ProcessorReply, StatusQuery, StatusReply,
};
use crate::processor::{ProcessorError, ProcessorResult};

/// Marker the processor puts in a failure message that is really a pending charge.
pub const PENDING_FAILURE_MARKER: &str = "Transaction failed, pending";

/// Status text meaning the processor has no record of the charge.
pub const NOT_EXISTS_MARKER: &str = "transaction not exists";

/// The card processor as seen by settlement.
#[async_trait]
pub trait CardProcessor: Send + Sync {
    /// Submit a charge. Returns the classified reply.
    async fn charge(&self, order: &ChargeOrder) -> ProcessorResult<ProcessorReply>;

    /// Query the processor-side status text of a charge.
    async fn poll_status(&self, tx_id: &str) -> ProcessorResult<String>;
}

/// Turn a raw charge body into a reply.
///
/// A body mentioning `success` wins over one mentioning `being processed`;
/// anything else must be the JSON reply shape. An unparseable body says
/// nothing about the charge and comes back as `ProcessorError::Parse`.
pub fn classify_charge(body: &str, tx_id: &str) -> ProcessorResult<ProcessorReply> {
    if body.contains("success") {
        return Ok(ProcessorReply {
            message: body.to_string(),
            status: "success".to_string(),
            transaction_id: tx_id.to_string(),
        });
    }
    if body.contains("being processed") {
        return Ok(ProcessorReply {
            message: body.to_string(),
            status: "being processed".to_string(),
            transaction_id: tx_id.to_string(),
        });
    }
    let mut reply: ProcessorReply = serde_json::from_str(body)
        .map_err(|e| ProcessorError::Parse(format!("{}: {}", e, body)))?;
    if reply.transaction_id.is_empty() {
        reply.transaction_id = tx_id.to_string();
    }
    Ok(reply)
}

/// Map a reply onto the settlement decision.
pub fn charge_outcome(reply: &ProcessorReply) -> ChargeOutcome {
    if reply.status == "failed" && !reply.message.contains(PENDING_FAILURE_MARKER) {
        return ChargeOutcome::Failed {
            reason: reply.message.clone(),
        };
    }
    if reply.status == "success" {
        return ChargeOutcome::Success;
    }
    ChargeOutcome::Processing {
        reason: "being processed".to_string(),
    }
}

/// Whether a polled status means the charge settled.
pub fn status_is_success(status: &str) -> bool {
    status.contains("success")
}

/// Whether a polled status means the processor never saw the charge.
pub fn status_is_missing(status: &str) -> bool {
    status.contains(NOT_EXISTS_MARKER)
}

/// reqwest-backed processor client.
#[derive(Debug, Clone)]
pub struct HttpProcessor {
    client: reqwest::Client,
    config: ProcessorConfig,
}

impl HttpProcessor {
    /// Build a client with the configured timeout and user agent.
    pub fn new(config: ProcessorConfig) -> ProcessorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ProcessorError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> ProcessorResult<String> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ProcessorError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProcessorError::Transport(e.to_string()))?;

        if status.is_server_error() {
            return Err(ProcessorError::Status {
                code: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl CardProcessor for HttpProcessor {
    async fn charge(&self, order: &ChargeOrder) -> ProcessorResult<ProcessorReply> {
        let payload = ChargePayload::from_order(order, &self.config.merchant_id)?;
        tracing::info!(
            tx_id = %order.tx_id,
            amount = payload.amount,
            merchant = %order.merchant,
            card = %order.card.last_four(),
            "Submitting charge"
        );

        let body = self.post_json(&self.config.charge_url, &payload).await?;
        let reply = classify_charge(&body, &order.tx_id)?;
        tracing::debug!(tx_id = %order.tx_id, status = %reply.status, "Charge reply received");
        Ok(reply)
    }

    async fn poll_status(&self, tx_id: &str) -> ProcessorResult<String> {
        let query = StatusQuery {
            tx_id,
            m_id: &self.config.merchant_id,
        };
        let body = self.post_json(&self.config.status_url, &query).await?;
        let reply: StatusReply =
            serde_json::from_str(&body).map_err(|e| ProcessorError::Parse(e.to_string()))?;
        tracing::debug!(tx_id = %tx_id, status = %reply.status, "Processor status polled");
        Ok(reply.status)
    }
}
