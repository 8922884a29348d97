//! EVM JSON-RPC transport.
//!
//! # Responsibilities
//! - Read heads and logs through the failover client
//! - Enforce the gas price ceiling before signing
//! - Capture return data with `eth_call`, then sign and broadcast
//! - Map the mined receipt onto `Receipt`

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, TransactionRequest};
use async_trait::async_trait;
use std::sync::Arc;

use crate::blockchain::client::ChainClient;
use crate::blockchain::transport::{ChainEvent, ChainTransport, Receipt, ReceiptStatus, TxRequest};
use crate::blockchain::types::{ChainError, ChainResult};
use crate::blockchain::wallet::Wallet;

/// Chain transport over alloy HTTP providers.
#[derive(Clone)]
pub struct EvmTransport {
    client: ChainClient,
    signer: Arc<dyn Provider + Send + Sync>,
    from: Address,
    chain_id: u64,
}

impl EvmTransport {
    /// Build a transport signing with `wallet` against the client's primary endpoint.
    pub fn new(client: ChainClient, wallet: &Wallet) -> ChainResult<Self> {
        let url: url::Url = client.config().rpc_url.parse().map_err(|e| {
            ChainError::Rpc(format!("Invalid RPC URL '{}': {}", client.config().rpc_url, e))
        })?;
        let signer = ProviderBuilder::new()
            .wallet(wallet.to_network_wallet())
            .connect_http(url);

        Ok(Self {
            client,
            signer: Arc::new(signer),
            from: wallet.address(),
            chain_id: wallet.chain_id(),
        })
    }

    /// The read client behind this transport.
    pub fn client(&self) -> &ChainClient {
        &self.client
    }

    async fn build(&self, request: &TxRequest) -> ChainResult<TransactionRequest> {
        let gas_price = self.client.get_gas_price().await?;
        if gas_price > request.max_gas_price {
            return Err(ChainError::GasPriceTooHigh {
                current_wei: gas_price,
                max_wei: request.max_gas_price,
            });
        }

        Ok(TransactionRequest::default()
            .with_from(self.from)
            .with_to(request.to)
            .with_value(request.value)
            .with_input(request.data.clone())
            .with_gas_limit(request.max_gas)
            .with_gas_price(gas_price)
            .with_chain_id(self.chain_id))
    }
}

#[async_trait]
impl ChainTransport for EvmTransport {
    async fn latest_block_number(&self) -> ChainResult<u64> {
        self.client.get_block_number().await
    }

    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        contract: Address,
        topic0: B256,
    ) -> ChainResult<Vec<ChainEvent>> {
        let filter = Filter::new()
            .address(contract)
            .from_block(from)
            .to_block(to)
            .event_signature(topic0);

        let mut events: Vec<ChainEvent> = self
            .client
            .get_logs(&filter)
            .await?
            .into_iter()
            .map(|log| ChainEvent {
                topics: log.topics().to_vec(),
                data: log.data().data.clone(),
                block_number: log.block_number.unwrap_or(to),
                tx_hash: log.transaction_hash,
                log_index: log.log_index,
            })
            .collect();
        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }

    async fn send_transaction(&self, request: TxRequest) -> ChainResult<Receipt> {
        let tx = self.build(&request).await?;

        // Receipts carry no return data, so the output comes from a call at
        // the same state. A revert here means the transaction would fail too.
        let return_data = match self.signer.call(tx.clone()).await {
            Ok(output) => output,
            Err(e) => {
                if let Some(revert) = e.as_error_resp().and_then(|payload| payload.as_revert_data()) {
                    tracing::debug!(to = %request.to, "Call reverted during simulation");
                    return Ok(Receipt::failed(revert));
                }
                return Err(ChainError::Rpc(format!("eth_call failed: {}", e)));
            }
        };

        let pending = self
            .signer
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::Rpc(format!("broadcast failed: {}", e)))?;
        let tx_hash = *pending.tx_hash();
        tracing::debug!(tx_hash = %tx_hash, "Transaction broadcast");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ChainError::Rpc(format!("receipt unavailable for {}: {}", tx_hash, e)))?;

        let status = if receipt.status() {
            ReceiptStatus::Returned
        } else {
            ReceiptStatus::Failed
        };
        Ok(Receipt {
            status,
            return_data,
            tx_hash: Some(tx_hash),
        })
    }
}

impl std::fmt::Debug for EvmTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmTransport")
            .field("client", &self.client)
            .field("from", &self.from)
            .finish()
    }
}
