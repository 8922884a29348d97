//! The chain as seen by the bridge: read logs, send a transaction, read its receipt.

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;

use crate::blockchain::types::ChainResult;

/// A raw contract log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEvent {
    /// Log topics, event signature first.
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed fields.
    pub data: Bytes,
    pub block_number: u64,
    pub tx_hash: Option<B256>,
    pub log_index: Option<u64>,
}

impl ChainEvent {
    /// Event signature topic, if the log has one.
    pub fn topic0(&self) -> Option<B256> {
        self.topics.first().copied()
    }
}

/// A transaction to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    /// Addresses the call touches, for chains that schedule by account.
    pub related_addresses: Vec<Address>,
    pub max_gas: u64,
    pub max_gas_price: u128,
    /// Wait window of this attempt in milliseconds.
    pub time_use: u64,
}

/// How a submitted transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Executed; return data is the function's output.
    Returned,
    /// Reverted or otherwise failed; return data is the failure payload.
    Failed,
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub status: ReceiptStatus,
    pub return_data: Bytes,
    pub tx_hash: Option<B256>,
}

impl Receipt {
    pub fn returned(return_data: impl Into<Bytes>) -> Self {
        Self {
            status: ReceiptStatus::Returned,
            return_data: return_data.into(),
            tx_hash: None,
        }
    }

    pub fn failed(return_data: impl Into<Bytes>) -> Self {
        Self {
            status: ReceiptStatus::Failed,
            return_data: return_data.into(),
            tx_hash: None,
        }
    }
}

/// Chain access used by ingestion and the gateway.
///
/// `send_transaction` resolves once the receipt is available; callers bound
/// the wait themselves.
#[async_trait]
pub trait ChainTransport: Send + Sync {
    /// Current head block number.
    async fn latest_block_number(&self) -> ChainResult<u64>;

    /// Logs emitted by `contract` with signature `topic0` in `[from, to]`.
    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        contract: Address,
        topic0: B256,
    ) -> ChainResult<Vec<ChainEvent>>;

    /// Submit a transaction and wait for its receipt.
    async fn send_transaction(&self, request: TxRequest) -> ChainResult<Receipt>;
}
