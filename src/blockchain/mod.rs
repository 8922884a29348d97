//! Chain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (signing key) + [chain] config
//!     → wallet.rs (key loading)
//!     → client.rs (read RPC with timeouts and failover)
//!     → rpc.rs (EvmTransport: logs, eth_call, sign, broadcast, receipt)
//!     → transport.rs (ChainTransport trait seen by the rest of the bridge)
//!     → gateway.rs (packed contract calls, wait windows, resubmission)
//!     → contract.rs (ABI, typed event and return decoding)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or card data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod contract;
pub mod gateway;
pub mod rpc;
pub mod transport;
pub mod types;
pub mod wallet;

pub use client::ChainClient;
pub use contract::{BridgeEvent, DecodeError, EventKind, TransactionStatus};
pub use gateway::ChainGateway;
pub use rpc::EvmTransport;
pub use transport::{ChainEvent, ChainTransport, Receipt, ReceiptStatus, TxRequest};
pub use types::{ChainConfig, ChainError, ChainId, ChainResult};
pub use wallet::Wallet;
