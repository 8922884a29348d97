//! Card processor request and response types.

use alloy::primitives::{Address, U256};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::processor::{ProcessorError, ProcessorResult};

/// Decrypted card payload.
///
/// Lives in memory only. `Debug` never prints the card fields.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardData {
    #[serde(alias = "CardNumber", alias = "card_number")]
    pub card_number: String,
    #[serde(alias = "ExpMonth", alias = "exp_month")]
    pub exp_month: String,
    #[serde(alias = "ExpYear", alias = "exp_year")]
    pub exp_year: String,
    #[serde(alias = "CVV", alias = "Cvv")]
    pub cvv: String,
}

impl CardData {
    /// Parse a decrypted JSON payload.
    pub fn from_json(plaintext: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(plaintext)
    }

    /// Expiry in processor format: `YYYY-MM`, month zero-padded.
    pub fn exp_date(&self) -> String {
        format!("{}-{:0>2}", self.exp_year, self.exp_month)
    }

    /// Last four digits, for log lines that need to tell cards apart.
    pub fn last_four(&self) -> &str {
        let len = self.card_number.len();
        self.card_number.get(len.saturating_sub(4)..).unwrap_or("")
    }
}

impl std::fmt::Debug for CardData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardData")
            .field("card_number", &"<redacted>")
            .field("exp_month", &"<redacted>")
            .field("exp_year", &"<redacted>")
            .field("cvv", &"<redacted>")
            .finish()
    }
}

/// Reject cards the processor would refuse.
pub fn validate_card(card: &CardData) -> ProcessorResult<()> {
    if card.exp_year.chars().count() != 4 {
        return Err(ProcessorError::InvalidCard(
            "expYear must be exactly 4 characters".to_string(),
        ));
    }
    Ok(())
}

/// Processor transaction id: `"tx_"` followed by 11 random hex characters.
pub fn generate_processor_tx_id() -> String {
    let mut bytes = [0u8; 6];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let mut hex = alloy::hex::encode(bytes);
    hex.truncate(11);
    format!("tx_{}", hex)
}

/// A charge to run against a vaulted card.
#[derive(Debug, Clone)]
pub struct ChargeOrder {
    /// Processor transaction id chosen by the bridge.
    pub tx_id: String,
    pub card: CardData,
    pub amount: U256,
    pub merchant: Address,
}

impl ChargeOrder {
    /// Build an order with a fresh processor tx id.
    pub fn new(card: CardData, amount: U256, merchant: Address) -> Self {
        Self {
            tx_id: generate_processor_tx_id(),
            card,
            amount,
            merchant,
        }
    }

    /// Amount as the signed 64-bit integer the processor expects.
    pub fn amount_i64(&self) -> ProcessorResult<i64> {
        i64::try_from(self.amount)
            .map_err(|_| ProcessorError::InvalidAmount(self.amount.to_string()))
    }
}

/// Wire body of a charge request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChargePayload {
    pub m_id: String,
    pub tx_id: String,
    pub card_number: String,
    pub exp_date: String,
    pub amount: i64,
    pub wallet_to: String,
    pub fee_payer: u8,
    pub cvv: String,
}

impl ChargePayload {
    /// Validate the order and lay it out for the wire.
    pub fn from_order(order: &ChargeOrder, merchant_id: &str) -> ProcessorResult<Self> {
        validate_card(&order.card)?;
        let checksummed = order.merchant.to_checksum(None);
        Ok(Self {
            m_id: merchant_id.to_string(),
            tx_id: order.tx_id.clone(),
            card_number: order.card.card_number.clone(),
            exp_date: order.card.exp_date(),
            amount: order.amount_i64()?,
            wallet_to: checksummed.trim_start_matches("0x").to_string(),
            fee_payer: 1,
            cvv: order.card.cvv.clone(),
        })
    }
}

/// Wire body of a status query.
#[derive(Debug, Clone, Serialize)]
pub struct StatusQuery<'a> {
    pub tx_id: &'a str,
    pub m_id: &'a str,
}

/// Processor answer to a charge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProcessorReply {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "transactionId", alias = "TransactionID", alias = "transactionID")]
    pub transaction_id: String,
}

/// Body of a status poll response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusReply {
    #[serde(default)]
    pub status: String,
}

/// What the bridge does with a charge reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// Charge settled.
    Success,
    /// Charge accepted but not settled; needs a monitor.
    Processing { reason: String },
    /// Charge refused.
    Failed { reason: String },
}

impl ChargeOutcome {
    /// Label used in metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ChargeOutcome::Success => "success",
            ChargeOutcome::Processing { .. } => "processing",
            ChargeOutcome::Failed { .. } => "failed",
        }
    }
}
