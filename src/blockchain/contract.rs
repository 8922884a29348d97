//! Card contract ABI and typed decoding.
//!
//! Every event field is non-indexed, so logs carry exactly one topic and all
//! values live in the data section.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol;
use alloy::sol_types::{sol_data, SolEvent, SolType, SolValue};
use serde::Serialize;
use thiserror::Error;

use crate::blockchain::transport::ChainEvent;

sol! {
    contract CardContract {
        event TokenRequest(address user, bytes encryptedCardData, bytes32 requestId);
        event ChargeRequest(bytes32 tokenId, address user, address merchant, uint256 amount);
        event ChargeRejected(address user, bytes32 tokenId, string reason);
        event RequestUpdateTxStatus(string transactionID, bytes32 tokenId);

        function submitToken(address user, bytes32 tokenId, string region, bytes32 requestId, bytes32 cardHash);
        function UpdateTxStatus(bytes32 tokenId, string txId, uint8 status, uint64 atTime, string reason);
        function getTx(string txId) returns (uint8 status, string reason);
        function MintUTXO(uint256 parentValue, address ownerPool, string txId) returns (address newPool, bytes32 parentHash);
        function getPoolInfo(string txId);
        function getBackendPubKey() returns (bytes);
    }
}

/// Contract method names, as used in logs and metrics.
pub mod methods {
    pub const SUBMIT_TOKEN: &str = "submitToken";
    pub const UPDATE_TX_STATUS: &str = "UpdateTxStatus";
    pub const GET_TX: &str = "getTx";
    pub const MINT_UTXO: &str = "MintUTXO";
    pub const GET_POOL_INFO: &str = "getPoolInfo";
    pub const GET_BACKEND_PUB_KEY: &str = "getBackendPubKey";
}

/// Log or return data that does not fit its declared shape.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot decode {target}.{field}: {reason}")]
pub struct DecodeError {
    /// Event or return shape being decoded.
    pub target: &'static str,
    /// Offending field, or `data` when the whole payload is unreadable.
    pub field: &'static str,
    pub reason: String,
}

impl DecodeError {
    pub fn new(target: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            target,
            field,
            reason: reason.into(),
        }
    }
}

/// On-chain settlement status of a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum TransactionStatus {
    Failed = 0,
    Processing = 1,
    Success = 2,
}

impl TransactionStatus {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for TransactionStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TransactionStatus::Failed),
            1 => Ok(TransactionStatus::Processing),
            2 => Ok(TransactionStatus::Success),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TransactionStatus::Failed => "failed",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Success => "success",
        };
        f.write_str(label)
    }
}

/// Events the bridge listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TokenRequest,
    ChargeRequest,
    ChargeRejected,
    RequestUpdateTxStatus,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::TokenRequest,
        EventKind::ChargeRequest,
        EventKind::ChargeRejected,
        EventKind::RequestUpdateTxStatus,
    ];

    /// Event signature hash (`topic0`).
    pub fn topic(self) -> B256 {
        match self {
            EventKind::TokenRequest => CardContract::TokenRequest::SIGNATURE_HASH,
            EventKind::ChargeRequest => CardContract::ChargeRequest::SIGNATURE_HASH,
            EventKind::ChargeRejected => CardContract::ChargeRejected::SIGNATURE_HASH,
            EventKind::RequestUpdateTxStatus => {
                CardContract::RequestUpdateTxStatus::SIGNATURE_HASH
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EventKind::TokenRequest => "TokenRequest",
            EventKind::ChargeRequest => "ChargeRequest",
            EventKind::ChargeRejected => "ChargeRejected",
            EventKind::RequestUpdateTxStatus => "RequestUpdateTxStatus",
        }
    }

    pub fn from_topic(topic: B256) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.topic() == topic)
    }
}

/// Decoded `TokenRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequested {
    pub user: Address,
    pub encrypted_card_data: Bytes,
    pub request_id: B256,
}

/// Decoded `ChargeRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequested {
    pub token_id: B256,
    pub user: Address,
    pub merchant: Address,
    pub amount: U256,
}

/// Decoded `ChargeRejected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRejection {
    pub user: Address,
    pub token_id: B256,
    pub reason: String,
}

/// Decoded `RequestUpdateTxStatus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdateRequested {
    pub transaction_id: String,
    pub token_id: B256,
}

/// A contract event with typed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    TokenRequest(TokenRequested),
    ChargeRequest(ChargeRequested),
    ChargeRejected(ChargeRejection),
    RequestUpdateTxStatus(StatusUpdateRequested),
}

impl BridgeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BridgeEvent::TokenRequest(_) => EventKind::TokenRequest,
            BridgeEvent::ChargeRequest(_) => EventKind::ChargeRequest,
            BridgeEvent::ChargeRejected(_) => EventKind::ChargeRejected,
            BridgeEvent::RequestUpdateTxStatus(_) => EventKind::RequestUpdateTxStatus,
        }
    }
}

fn decode_log<E: SolEvent>(event: &ChainEvent, target: &'static str) -> Result<E, DecodeError> {
    E::decode_raw_log(event.topics.iter().copied(), &event.data)
        .map_err(|e| DecodeError::new(target, "data", e.to_string()))
}

/// Decode a raw log into a typed event, routing on `topic0`.
pub fn decode_event(event: &ChainEvent) -> Result<BridgeEvent, DecodeError> {
    let topic = event
        .topic0()
        .ok_or_else(|| DecodeError::new("event", "topic0", "log has no topics"))?;
    let kind = EventKind::from_topic(topic)
        .ok_or_else(|| DecodeError::new("event", "topic0", format!("unknown topic {}", topic)))?;

    match kind {
        EventKind::TokenRequest => {
            let raw: CardContract::TokenRequest = decode_log(event, kind.name())?;
            if raw.encryptedCardData.is_empty() {
                return Err(DecodeError::new(kind.name(), "encryptedCardData", "empty"));
            }
            Ok(BridgeEvent::TokenRequest(TokenRequested {
                user: raw.user,
                encrypted_card_data: raw.encryptedCardData,
                request_id: raw.requestId,
            }))
        }
        EventKind::ChargeRequest => {
            let raw: CardContract::ChargeRequest = decode_log(event, kind.name())?;
            Ok(BridgeEvent::ChargeRequest(ChargeRequested {
                token_id: raw.tokenId,
                user: raw.user,
                merchant: raw.merchant,
                amount: raw.amount,
            }))
        }
        EventKind::ChargeRejected => {
            let raw: CardContract::ChargeRejected = decode_log(event, kind.name())?;
            Ok(BridgeEvent::ChargeRejected(ChargeRejection {
                user: raw.user,
                token_id: raw.tokenId,
                reason: raw.reason,
            }))
        }
        EventKind::RequestUpdateTxStatus => {
            let raw: CardContract::RequestUpdateTxStatus = decode_log(event, kind.name())?;
            if raw.transactionID.is_empty() {
                return Err(DecodeError::new(kind.name(), "transactionID", "empty"));
            }
            Ok(BridgeEvent::RequestUpdateTxStatus(StatusUpdateRequested {
                transaction_id: raw.transactionID,
                token_id: raw.tokenId,
            }))
        }
    }
}

/// A typed view of a call's return data.
pub trait ReturnShape: Sized {
    /// Shape name used in decode errors.
    const NAME: &'static str;

    fn decode_return(data: &[u8]) -> Result<Self, DecodeError>;
}

/// Return of `getTx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxRecord {
    pub status: TransactionStatus,
    pub reason: String,
}

impl ReturnShape for TxRecord {
    const NAME: &'static str = "getTx";

    fn decode_return(data: &[u8]) -> Result<Self, DecodeError> {
        let (status, reason) = <(sol_data::Uint<8>, sol_data::String) as SolType>::abi_decode_params(data)
            .map_err(|e| DecodeError::new(Self::NAME, "data", e.to_string()))?;
        let status = TransactionStatus::try_from(status).map_err(|raw| {
            DecodeError::new(Self::NAME, "status", format!("unknown status {}", raw))
        })?;
        Ok(Self { status, reason })
    }
}

/// Return of `MintUTXO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintReceipt {
    pub new_pool: Address,
    pub parent_hash: B256,
}

impl ReturnShape for MintReceipt {
    const NAME: &'static str = "MintUTXO";

    fn decode_return(data: &[u8]) -> Result<Self, DecodeError> {
        let (new_pool, parent_hash) = <(Address, B256)>::abi_decode_params(data)
            .map_err(|e| DecodeError::new(Self::NAME, "data", e.to_string()))?;
        Ok(Self {
            new_pool,
            parent_hash,
        })
    }
}

/// Return of `getBackendPubKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendPubKey(pub Bytes);

impl ReturnShape for BackendPubKey {
    const NAME: &'static str = "getBackendPubKey";

    fn decode_return(data: &[u8]) -> Result<Self, DecodeError> {
        let (key,) = <(Bytes,)>::abi_decode_params(data)
            .map_err(|e| DecodeError::new(Self::NAME, "data", e.to_string()))?;
        if key.is_empty() {
            return Err(DecodeError::new(Self::NAME, "key", "empty"));
        }
        Ok(Self(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::LogData;

    fn chain_event(log: LogData) -> ChainEvent {
        ChainEvent {
            topics: log.topics().to_vec(),
            data: log.data,
            block_number: 10,
            tx_hash: None,
            log_index: Some(0),
        }
    }

    #[test]
    fn test_topics_are_distinct() {
        let topics: std::collections::HashSet<B256> =
            EventKind::ALL.iter().map(|k| k.topic()).collect();
        assert_eq!(topics.len(), 4);
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_topic(kind.topic()), Some(kind));
        }
    }

    #[test]
    fn test_decode_charge_request() {
        let raw = CardContract::ChargeRequest {
            tokenId: B256::repeat_byte(1),
            user: Address::repeat_byte(2),
            merchant: Address::repeat_byte(3),
            amount: U256::from(1500u64),
        };
        let event = chain_event(raw.encode_log_data());

        match decode_event(&event).unwrap() {
            BridgeEvent::ChargeRequest(decoded) => {
                assert_eq!(decoded.token_id, B256::repeat_byte(1));
                assert_eq!(decoded.merchant, Address::repeat_byte(3));
                assert_eq!(decoded.amount, U256::from(1500u64));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_decode_token_request_rejects_empty_blob() {
        let raw = CardContract::TokenRequest {
            user: Address::ZERO,
            encryptedCardData: Bytes::new(),
            requestId: B256::ZERO,
        };
        let err = decode_event(&chain_event(raw.encode_log_data())).unwrap_err();
        assert_eq!(err.field, "encryptedCardData");
    }

    #[test]
    fn test_decode_truncated_data() {
        let raw = CardContract::ChargeRejected {
            user: Address::ZERO,
            tokenId: B256::ZERO,
            reason: "insufficient allowance".to_string(),
        };
        let mut event = chain_event(raw.encode_log_data());
        event.data = Bytes::copy_from_slice(&event.data[..40]);

        let err = decode_event(&event).unwrap_err();
        assert_eq!(err.target, "ChargeRejected");
        assert_eq!(err.field, "data");
    }

    #[test]
    fn test_unknown_topic() {
        let event = ChainEvent {
            topics: vec![B256::repeat_byte(0xee)],
            data: Bytes::new(),
            block_number: 1,
            tx_hash: None,
            log_index: None,
        };
        assert_eq!(decode_event(&event).unwrap_err().field, "topic0");
    }

    #[test]
    fn test_tx_record_shape() {
        let data = <(alloy::sol_types::sol_data::Uint<8>, alloy::sol_types::sol_data::String) as alloy::sol_types::SolType>::abi_encode_params(&(1u8, "being processed".to_string()));
        let record = TxRecord::decode_return(&data).unwrap();
        assert_eq!(record.status, TransactionStatus::Processing);
        assert_eq!(record.reason, "being processed");

        let bad = <(alloy::sol_types::sol_data::Uint<8>, alloy::sol_types::sol_data::String) as alloy::sol_types::SolType>::abi_encode_params(&(7u8, String::new()));
        assert_eq!(TxRecord::decode_return(&bad).unwrap_err().field, "status");
    }

    #[test]
    fn test_mint_receipt_shape() {
        let data = (Address::repeat_byte(9), B256::repeat_byte(8)).abi_encode_params();
        let receipt = MintReceipt::decode_return(&data).unwrap();
        assert_eq!(receipt.new_pool, Address::repeat_byte(9));
        assert!(MintReceipt::decode_return(&data[..20]).is_err());
    }

    #[test]
    fn test_backend_pub_key_shape() {
        let key = Bytes::from(vec![4u8; 65]);
        let data = (key.clone(),).abi_encode_params();
        assert_eq!(BackendPubKey::decode_return(&data).unwrap().0, key);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TransactionStatus::Failed,
            TransactionStatus::Processing,
            TransactionStatus::Success,
        ] {
            assert_eq!(TransactionStatus::try_from(status.as_u8()), Ok(status));
        }
        assert_eq!(TransactionStatus::try_from(3), Err(3));
    }
}
