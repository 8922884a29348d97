//! Shared fakes for integration tests: an in-memory chain and processor.

#![allow(dead_code)]

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolEvent, SolValue};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use card_bridge::blockchain::contract::CardContract;
use card_bridge::blockchain::{
    ChainError, ChainEvent, ChainGateway, ChainResult, ChainTransport, Receipt, TxRequest,
};
use card_bridge::config::schema::{GatewayConfig, MonitorConfig};
use card_bridge::crypto::{seal_card_blob, ServerKey};
use card_bridge::processor::{CardProcessor, ChargeOrder, ProcessorError, ProcessorReply};
use card_bridge::processor::ProcessorResult;
use card_bridge::settlement::{
    Dispatcher, FollowUpReport, FollowUpRunner, MonitorRegistry, Settlement,
};
use card_bridge::vault::TokenVault;

pub const CARD_JSON: &str =
    r#"{"cardNumber":"4111111111111111","expMonth":"3","expYear":"2030","cvv":"123"}"#;

pub fn contract() -> Address {
    Address::repeat_byte(0xc0)
}

pub fn user() -> Address {
    Address::repeat_byte(0x01)
}

pub fn merchant() -> Address {
    Address::repeat_byte(0x02)
}

/// Encrypt `CARD_JSON` for `server_key` the way a client would.
pub fn sealed_card(server_key: &ServerKey) -> Bytes {
    seal_card_blob(&server_key.public_key_bytes(), CARD_JSON.as_bytes(), &[7u8; 16])
        .unwrap()
        .into()
}

fn event<E: SolEvent>(raw: &E, block: u64, log_index: u64) -> ChainEvent {
    let log = raw.encode_log_data();
    ChainEvent {
        topics: log.topics().to_vec(),
        data: log.data,
        block_number: block,
        tx_hash: Some(B256::with_last_byte(block as u8)),
        log_index: Some(log_index),
    }
}

pub fn token_request_event(blob: Bytes, request_id: B256, block: u64) -> ChainEvent {
    event(
        &CardContract::TokenRequest {
            user: user(),
            encryptedCardData: blob,
            requestId: request_id,
        },
        block,
        0,
    )
}

pub fn charge_request_event(token_id: B256, amount: u64, block: u64) -> ChainEvent {
    event(
        &CardContract::ChargeRequest {
            tokenId: token_id,
            user: user(),
            merchant: merchant(),
            amount: U256::from(amount),
        },
        block,
        0,
    )
}

pub fn charge_rejected_event(token_id: B256, block: u64) -> ChainEvent {
    event(
        &CardContract::ChargeRejected {
            user: user(),
            tokenId: token_id,
            reason: "limit exceeded".to_string(),
        },
        block,
        0,
    )
}

pub fn update_request_event(tx_id: &str, token_id: B256, block: u64) -> ChainEvent {
    event(
        &CardContract::RequestUpdateTxStatus {
            transactionID: tx_id.to_string(),
            tokenId: token_id,
        },
        block,
        0,
    )
}

/// How the fake chain answers one transaction.
pub enum Scripted {
    Reply(Receipt),
    /// Never produce a receipt.
    Hang,
    /// Default reply after a delay.
    Slow(Duration),
    Fail(String),
}

/// A decoded `UpdateTxStatus` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusWrite {
    pub token_id: B256,
    pub tx_id: String,
    pub status: u8,
    pub reason: String,
}

/// In-memory chain: scripted receipts per method, logs per block.
#[derive(Default)]
pub struct FakeChain {
    head: AtomicU64,
    head_failures: AtomicUsize,
    logs: Mutex<Vec<ChainEvent>>,
    failing_topics: Mutex<HashSet<B256>>,
    log_queries: Mutex<Vec<(u64, u64, B256)>>,
    sent: Mutex<Vec<TxRequest>>,
    scripts: Mutex<HashMap<[u8; 4], VecDeque<Scripted>>>,
}

impl FakeChain {
    pub fn new(head: u64) -> Arc<Self> {
        let chain = Self::default();
        chain.head.store(head, Ordering::SeqCst);
        Arc::new(chain)
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    /// Fail the next `n` head reads.
    pub fn fail_head_reads(&self, n: usize) {
        self.head_failures.store(n, Ordering::SeqCst);
    }

    pub fn push_log(&self, event: ChainEvent) {
        self.logs.lock().unwrap().push(event);
    }

    pub fn fail_topic(&self, topic: B256) {
        self.failing_topics.lock().unwrap().insert(topic);
    }

    pub fn heal_topic(&self, topic: B256) {
        self.failing_topics.lock().unwrap().remove(&topic);
    }

    pub fn log_queries(&self) -> Vec<(u64, u64, B256)> {
        self.log_queries.lock().unwrap().clone()
    }

    pub fn script(&self, selector: [u8; 4], reply: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry(selector)
            .or_default()
            .push_back(reply);
    }

    pub fn sent(&self) -> Vec<TxRequest> {
        self.sent.lock().unwrap().clone()
    }

    /// Sent transactions calling `selector`.
    pub fn calls_to(&self, selector: [u8; 4]) -> Vec<TxRequest> {
        self.sent()
            .into_iter()
            .filter(|tx| tx.data.len() >= 4 && tx.data[..4] == selector)
            .collect()
    }

    pub fn status_writes(&self) -> Vec<StatusWrite> {
        self.calls_to(CardContract::UpdateTxStatusCall::SELECTOR)
            .iter()
            .map(|tx| {
                let call = CardContract::UpdateTxStatusCall::abi_decode(&tx.data).unwrap();
                StatusWrite {
                    token_id: call.tokenId,
                    tx_id: call.txId,
                    status: call.status,
                    reason: call.reason,
                }
            })
            .collect()
    }

    fn default_reply(selector: [u8; 4]) -> Receipt {
        if selector == CardContract::MintUTXOCall::SELECTOR {
            Receipt::returned((Address::repeat_byte(0xaa), B256::repeat_byte(0xbb)).abi_encode_params())
        } else if selector == CardContract::getTxCall::SELECTOR {
            Receipt::returned(<(alloy::sol_types::sol_data::Uint<8>, alloy::sol_types::sol_data::String) as alloy::sol_types::SolType>::abi_encode_params(&(1u8, "being processed".to_string())))
        } else {
            Receipt::returned(Bytes::new())
        }
    }
}

#[async_trait]
impl ChainTransport for FakeChain {
    async fn latest_block_number(&self) -> ChainResult<u64> {
        let remaining = self.head_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.head_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ChainError::Rpc("head unavailable".to_string()));
        }
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        contract: Address,
        topic0: B256,
    ) -> ChainResult<Vec<ChainEvent>> {
        self.log_queries.lock().unwrap().push((from, to, topic0));
        if self.failing_topics.lock().unwrap().contains(&topic0) {
            return Err(ChainError::Rpc("log query failed".to_string()));
        }
        if contract != self::contract() {
            return Ok(Vec::new());
        }
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.block_number >= from && e.block_number <= to)
            .filter(|e| e.topic0() == Some(topic0))
            .cloned()
            .collect())
    }

    async fn send_transaction(&self, request: TxRequest) -> ChainResult<Receipt> {
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&request.data[..4]);
        self.sent.lock().unwrap().push(request);

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&selector)
            .and_then(|queue| queue.pop_front());
        match scripted {
            Some(Scripted::Reply(receipt)) => Ok(receipt),
            Some(Scripted::Hang) => std::future::pending().await,
            Some(Scripted::Slow(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(Self::default_reply(selector))
            }
            Some(Scripted::Fail(message)) => Err(ChainError::Rpc(message)),
            None => Ok(Self::default_reply(selector)),
        }
    }
}

type PollHook = Box<dyn Fn() + Send + Sync>;

/// Scripted card processor.
#[derive(Default)]
pub struct FakeProcessor {
    charge_replies: Mutex<VecDeque<ProcessorResult<ProcessorReply>>>,
    statuses: Mutex<VecDeque<ProcessorResult<String>>>,
    on_poll: Mutex<Option<PollHook>>,
    charges: Mutex<Vec<(String, U256)>>,
    polls: AtomicUsize,
}

impl FakeProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply_with(&self, status: &str, message: &str, transaction_id: &str) {
        self.charge_replies.lock().unwrap().push_back(Ok(ProcessorReply {
            message: message.to_string(),
            status: status.to_string(),
            transaction_id: transaction_id.to_string(),
        }));
    }

    pub fn fail_charge(&self, error: ProcessorError) {
        self.charge_replies.lock().unwrap().push_back(Err(error));
    }

    pub fn poll_returns(&self, status: &str) {
        self.statuses.lock().unwrap().push_back(Ok(status.to_string()));
    }

    /// Run `hook` inside every status poll.
    pub fn on_poll(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_poll.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn charges(&self) -> Vec<(String, U256)> {
        self.charges.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CardProcessor for FakeProcessor {
    async fn charge(&self, order: &ChargeOrder) -> ProcessorResult<ProcessorReply> {
        self.charges
            .lock()
            .unwrap()
            .push((order.tx_id.clone(), order.amount));
        self.charge_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ProcessorReply {
                    message: "being processed".to_string(),
                    status: "being processed".to_string(),
                    transaction_id: order.tx_id.clone(),
                })
            })
    }

    async fn poll_status(&self, _tx_id: &str) -> ProcessorResult<String> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_poll.lock().unwrap().as_ref() {
            hook();
        }
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("pending".to_string()))
    }
}

/// A settlement stack over the fakes.
pub struct Harness {
    pub chain: Arc<FakeChain>,
    pub processor: Arc<FakeProcessor>,
    pub vault: TokenVault,
    pub server_key: Arc<ServerKey>,
    pub registry: MonitorRegistry,
    pub gateway: ChainGateway,
    pub settlement: Settlement,
    pub dispatcher: Dispatcher,
    pub reports: mpsc::Receiver<FollowUpReport>,
}

impl Harness {
    pub fn new() -> Self {
        let chain = FakeChain::new(100);
        let processor = FakeProcessor::new();
        let vault = TokenVault::temporary().unwrap();
        let server_key = Arc::new(ServerKey::random());
        let registry = MonitorRegistry::new();
        let gateway = ChainGateway::new(chain.clone(), contract(), GatewayConfig::default());
        let (report_tx, reports) = mpsc::channel(16);

        let settlement = Settlement::new(
            vault.clone(),
            server_key.clone(),
            gateway.clone(),
            processor.clone(),
            registry.clone(),
            FollowUpRunner::new(gateway.clone(), report_tx),
            MonitorConfig::default(),
            "VN",
        );
        let dispatcher = Dispatcher::new(settlement.clone());

        Self {
            chain,
            processor,
            vault,
            server_key,
            registry,
            gateway,
            settlement,
            dispatcher,
            reports,
        }
    }

    /// Tokenize the test card and return its token id.
    pub async fn tokenize(&self) -> B256 {
        let request = card_bridge::blockchain::contract::TokenRequested {
            user: user(),
            encrypted_card_data: sealed_card(&self.server_key),
            request_id: B256::repeat_byte(0x42),
        };
        self.settlement.handle_token_request(&request).await.unwrap()
    }
}
