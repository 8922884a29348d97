//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the card bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Chain RPC connection.
    pub chain: ChainConfig,

    /// Contract call submission.
    pub gateway: GatewayConfig,

    /// Event polling and queueing.
    pub ingestion: IngestionConfig,

    /// Card processor endpoints.
    pub processor: ProcessorConfig,

    /// Charge status monitoring.
    pub monitor: MonitorConfig,

    /// Token vault storage.
    pub vault: VaultConfig,

    /// Key material locations.
    pub keys: KeysConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Chain connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Address of the card contract.
    pub contract_address: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 1,
            rpc_timeout_secs: 10,
            contract_address: String::new(),
        }
    }
}

/// Contract call submission settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gas budget per transaction.
    pub max_gas: u64,

    /// Gas price ceiling in wei.
    pub max_gas_price: u64,

    /// How long one attempt waits for its receipt.
    pub receipt_timeout_secs: u64,

    /// Pause before resubmitting after a timed-out attempt.
    pub retry_delay_ms: u64,

    /// Attempts for `submitToken`.
    pub submit_token_attempts: u32,

    /// Attempts for every other contract call.
    pub default_attempts: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_gas: 5_000_000,
            max_gas_price: 1_000_000_000,
            receipt_timeout_secs: 60,
            retry_delay_ms: 1000,
            submit_token_attempts: 3,
            default_attempts: 1,
        }
    }
}

/// Event ingestion settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Capacity of the event queue between ingestion and dispatch.
    pub queue_capacity: usize,

    /// Sleep when no new block is available, in milliseconds.
    pub idle_interval_ms: u64,

    /// Base delay after a failed head read, in milliseconds.
    pub error_backoff_ms: u64,

    /// Upper bound for the head-read backoff, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            idle_interval_ms: 1000,
            error_backoff_ms: 2000,
            max_backoff_ms: 30_000,
        }
    }
}

/// Card processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Charge endpoint.
    pub charge_url: String,

    /// Status poll endpoint.
    pub status_url: String,

    /// Merchant id sent as `m_id`.
    pub merchant_id: String,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,

    /// User-Agent header value.
    pub user_agent: String,

    /// Region submitted with every new token.
    pub default_region: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            charge_url: "http://localhost:3000/transaction".to_string(),
            status_url: "http://localhost:3000/transaction/detail".to_string(),
            merchant_id: "pos123".to_string(),
            timeout_secs: 10,
            user_agent: concat!("card-bridge/", env!("CARGO_PKG_VERSION")).to_string(),
            default_region: "VN".to_string(),
        }
    }
}

/// Charge monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Status polls before a monitor gives up.
    pub max_polls: u32,

    /// Delay before each poll, in milliseconds.
    pub poll_interval_ms: u64,

    /// Capacity of the settlement follow-up report channel.
    pub followup_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_polls: 5,
            poll_interval_ms: 1000,
            followup_capacity: 256,
        }
    }
}

/// Token vault configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Directory of the embedded store.
    pub path: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: "data/vault".to_string(),
        }
    }
}

/// Key material configuration.
///
/// Secrets themselves come from the environment; only file locations live here.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct KeysConfig {
    /// Hex key file used when `BRIDGE_SERVER_PRIVATE_KEY` is unset.
    pub server_key_path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

/// Placeholder key that validation refuses when the admin API is enabled.
pub const ADMIN_KEY_PLACEHOLDER: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: ADMIN_KEY_PLACEHOLDER.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
