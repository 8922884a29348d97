//! Contract call gateway.
//!
//! # Responsibilities
//! - Pack contract calls and submit them through a `ChainTransport`
//! - Bound each attempt by a wait window; resubmit a fresh transaction on expiry
//! - Classify receipts: typed return, raw hex return, or execution failure
//!
//! Transport errors are returned as-is and never retried here.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::blockchain::contract::{
    methods, BackendPubKey, CardContract, MintReceipt, ReturnShape, TransactionStatus, TxRecord,
};
use crate::blockchain::transport::{ChainTransport, ReceiptStatus, TxRequest};
use crate::blockchain::types::{ChainError, ChainResult};
use crate::config::schema::GatewayConfig;
use crate::observability::metrics;

/// One packed contract call.
#[derive(Debug, Clone)]
pub struct ContractCall {
    pub method: &'static str,
    pub calldata: Bytes,
    pub related_addresses: Vec<Address>,
}

impl ContractCall {
    pub fn new<C: SolCall>(method: &'static str, call: &C) -> Self {
        Self {
            method,
            calldata: call.abi_encode().into(),
            related_addresses: Vec::new(),
        }
    }

    pub fn with_related(mut self, addresses: impl IntoIterator<Item = Address>) -> Self {
        self.related_addresses.extend(addresses);
        self
    }
}

/// Submits card contract calls with at-least-once retry.
#[derive(Clone)]
pub struct ChainGateway {
    transport: Arc<dyn ChainTransport>,
    contract: Address,
    config: GatewayConfig,
}

impl ChainGateway {
    pub fn new(transport: Arc<dyn ChainTransport>, contract: Address, config: GatewayConfig) -> Self {
        Self {
            transport,
            contract,
            config,
        }
    }

    /// Contract address calls are sent to.
    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Transport shared with ingestion.
    pub fn transport(&self) -> Arc<dyn ChainTransport> {
        Arc::clone(&self.transport)
    }

    fn wait_window(&self) -> Duration {
        Duration::from_secs(self.config.receipt_timeout_secs)
    }

    fn tx_request(&self, call: &ContractCall) -> TxRequest {
        let mut related_addresses = vec![self.contract];
        related_addresses.extend(call.related_addresses.iter().copied());
        TxRequest {
            to: self.contract,
            value: U256::ZERO,
            data: call.calldata.clone(),
            related_addresses,
            max_gas: self.config.max_gas,
            max_gas_price: u128::from(self.config.max_gas_price),
            time_use: self.wait_window().as_millis() as u64,
        }
    }

    /// Submit `call` and wait for its receipt, resubmitting on wait-window expiry.
    ///
    /// Returns the raw return data of the first receipt that arrives.
    pub async fn call_and_wait(&self, call: ContractCall, max_attempts: u32) -> ChainResult<Bytes> {
        let attempts = max_attempts.max(1);
        let wait = self.wait_window();

        for attempt in 1..=attempts {
            let request = self.tx_request(&call);
            match timeout(wait, self.transport.send_transaction(request)).await {
                Ok(Ok(receipt)) => match receipt.status {
                    ReceiptStatus::Returned => {
                        metrics::record_chain_call(call.method, "returned");
                        tracing::debug!(
                            method = call.method,
                            attempt = attempt,
                            tx_hash = ?receipt.tx_hash,
                            "Contract call returned"
                        );
                        return Ok(receipt.return_data);
                    }
                    ReceiptStatus::Failed => {
                        metrics::record_chain_call(call.method, "execution_failed");
                        return Err(ChainError::ExecutionFailed {
                            method: call.method.to_string(),
                            payload: alloy::hex::encode_prefixed(&receipt.return_data),
                        });
                    }
                },
                Ok(Err(e)) => {
                    metrics::record_chain_call(call.method, e.label());
                    return Err(e);
                }
                Err(_) => {
                    tracing::warn!(
                        method = call.method,
                        attempt = attempt,
                        max_attempts = attempts,
                        wait_secs = wait.as_secs(),
                        "No receipt within wait window"
                    );
                    if attempt < attempts {
                        sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                    }
                }
            }
        }

        metrics::record_chain_call(call.method, "timeout");
        Err(ChainError::Timeout {
            method: call.method.to_string(),
            attempts,
        })
    }

    /// Call and decode the return data into `R`.
    pub async fn call_decoded<R: ReturnShape>(
        &self,
        call: ContractCall,
        max_attempts: u32,
    ) -> ChainResult<R> {
        let data = self.call_and_wait(call, max_attempts).await?;
        Ok(R::decode_return(&data)?)
    }

    /// Call a method with no declared return shape; the output is surfaced as hex.
    pub async fn call_hex(&self, call: ContractCall, max_attempts: u32) -> ChainResult<String> {
        let data = self.call_and_wait(call, max_attempts).await?;
        Ok(alloy::hex::encode_prefixed(&data))
    }

    pub async fn submit_token(
        &self,
        user: Address,
        token_id: B256,
        region: &str,
        request_id: B256,
        card_hash: B256,
    ) -> ChainResult<String> {
        let call = ContractCall::new(
            methods::SUBMIT_TOKEN,
            &CardContract::submitTokenCall {
                user,
                tokenId: token_id,
                region: region.to_string(),
                requestId: request_id,
                cardHash: card_hash,
            },
        )
        .with_related([user]);
        self.call_hex(call, self.config.submit_token_attempts).await
    }

    pub async fn update_tx_status(
        &self,
        token_id: B256,
        tx_id: &str,
        status: TransactionStatus,
        at_time: u64,
        reason: &str,
    ) -> ChainResult<String> {
        let call = ContractCall::new(
            methods::UPDATE_TX_STATUS,
            &CardContract::UpdateTxStatusCall {
                tokenId: token_id,
                txId: tx_id.to_string(),
                status: status.as_u8(),
                atTime: at_time,
                reason: reason.to_string(),
            },
        );
        self.call_hex(call, self.config.default_attempts).await
    }

    pub async fn get_tx(&self, tx_id: &str) -> ChainResult<TxRecord> {
        let call = ContractCall::new(
            methods::GET_TX,
            &CardContract::getTxCall {
                txId: tx_id.to_string(),
            },
        );
        self.call_decoded(call, self.config.default_attempts).await
    }

    pub async fn mint_utxo(
        &self,
        parent_value: U256,
        owner_pool: Address,
        tx_id: &str,
    ) -> ChainResult<MintReceipt> {
        let call = ContractCall::new(
            methods::MINT_UTXO,
            &CardContract::MintUTXOCall {
                parentValue: parent_value,
                ownerPool: owner_pool,
                txId: tx_id.to_string(),
            },
        )
        .with_related([owner_pool]);
        self.call_decoded(call, self.config.default_attempts).await
    }

    pub async fn get_pool_info(&self, tx_id: &str) -> ChainResult<String> {
        let call = ContractCall::new(
            methods::GET_POOL_INFO,
            &CardContract::getPoolInfoCall {
                txId: tx_id.to_string(),
            },
        );
        self.call_hex(call, self.config.default_attempts).await
    }

    pub async fn get_backend_pub_key(&self) -> ChainResult<Bytes> {
        let call = ContractCall::new(
            methods::GET_BACKEND_PUB_KEY,
            &CardContract::getBackendPubKeyCall {},
        );
        let key: BackendPubKey = self.call_decoded(call, self.config.default_attempts).await?;
        Ok(key.0)
    }
}

impl std::fmt::Debug for ChainGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainGateway")
            .field("contract", &self.contract)
            .field("config", &self.config)
            .finish()
    }
}
