//! Startup orchestration.
//!
//! # Responsibilities
//! - Open storage, connect to the chain, load key material
//! - Verify the contract holds this bridge's public key
//! - Start ingestion, dispatch, follow-up reporting and the admin API
//! - Stop them again in order on shutdown

use alloy::primitives::Address;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::admin::{serve_admin, AdminState};
use crate::blockchain::{ChainClient, ChainError, ChainGateway, ChainTransport, EvmTransport, Wallet};
use crate::config::{BridgeConfig, ConfigError};
use crate::crypto::{CryptoError, ServerKey};
use crate::ingestion::{event_queue, EventListener, IngestionError};
use crate::lifecycle::Shutdown;
use crate::processor::{CardProcessor, HttpProcessor, ProcessorError};
use crate::settlement::{run_reporter, Dispatcher, FollowUpRunner, MonitorRegistry, Settlement};
use crate::vault::{TokenVault, VaultError};

/// How long `stop` waits for each task to wind down.
const TASK_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `stop` lets the dispatcher work through the remaining queue.
const QUEUE_DRAIN_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors that abort startup or shutdown.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("key error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("processor client error: {0}")]
    Processor(#[from] ProcessorError),

    #[error("ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("invalid contract address '{0}'")]
    InvalidContract(String),
}

/// Fully wired bridge, not yet running.
pub struct Bridge {
    config: BridgeConfig,
    vault: TokenVault,
    transport: Arc<dyn ChainTransport>,
    gateway: ChainGateway,
    server_key: Arc<ServerKey>,
    processor: Arc<dyn CardProcessor>,
    registry: MonitorRegistry,
}

/// Build the bridge from configuration and environment secrets.
pub async fn build_bridge(config: BridgeConfig) -> Result<Bridge, StartupError> {
    let vault = TokenVault::open(&config.vault.path)?;
    tracing::info!(path = %config.vault.path, tokens = vault.token_count(), "Vault opened");

    let client = ChainClient::new(config.chain.clone()).await?;
    check_chain_id(&client).await?;
    if !client.is_healthy().await {
        tracing::warn!(rpc_url = %config.chain.rpc_url, "Chain RPC unhealthy at startup");
    }

    let wallet = Wallet::from_env(config.chain.chain_id)?;
    tracing::info!(address = %wallet.address(), "Transaction signer loaded");
    let transport: Arc<dyn ChainTransport> = Arc::new(EvmTransport::new(client, &wallet)?);

    let server_key = ServerKey::from_env_or_file(
        config.keys.server_key_path.as_deref().map(Path::new),
    )?;
    let processor: Arc<dyn CardProcessor> = Arc::new(HttpProcessor::new(config.processor.clone())?);

    Bridge::from_parts(config, vault, transport, Arc::new(server_key), processor)
}

/// Refuse to start against the wrong network.
///
/// A chain ID mismatch is fatal since every transaction is signed for the
/// configured chain. An unreachable endpoint only warns; ingestion retries.
async fn check_chain_id(client: &ChainClient) -> Result<(), StartupError> {
    match client.verify_chain_id().await {
        Ok(()) => {
            tracing::info!("Chain ID verified");
            Ok(())
        }
        Err(e @ ChainError::ChainMismatch { .. }) => Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, "Could not verify chain ID at startup");
            Ok(())
        }
    }
}

impl Bridge {
    /// Wire a bridge from already-built parts.
    pub fn from_parts(
        config: BridgeConfig,
        vault: TokenVault,
        transport: Arc<dyn ChainTransport>,
        server_key: Arc<ServerKey>,
        processor: Arc<dyn CardProcessor>,
    ) -> Result<Self, StartupError> {
        let contract: Address = config
            .chain
            .contract_address
            .parse()
            .map_err(|_| StartupError::InvalidContract(config.chain.contract_address.clone()))?;
        let gateway = ChainGateway::new(transport.clone(), contract, config.gateway.clone());

        Ok(Self {
            config,
            vault,
            transport,
            gateway,
            server_key,
            processor,
            registry: MonitorRegistry::new(),
        })
    }

    pub fn gateway(&self) -> &ChainGateway {
        &self.gateway
    }

    /// Compare the contract's backend key with ours. A mismatch is logged, not fatal.
    pub async fn verify_backend_key(&self) -> bool {
        let expected = self.server_key.public_key_bytes();
        match self.gateway.get_backend_pub_key().await {
            Ok(on_chain) if on_chain[..] == expected[..] => {
                tracing::info!("Backend public key matches contract");
                true
            }
            Ok(on_chain) => {
                tracing::error!(
                    on_chain = %alloy::hex::encode_prefixed(&on_chain),
                    local = %alloy::hex::encode_prefixed(&expected),
                    "Backend public key does not match contract"
                );
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read backend public key");
                false
            }
        }
    }

    /// Start every long-lived task. Ingestion is initialized before returning.
    pub async fn start(self, shutdown: &Shutdown) -> Result<RunningBridge, StartupError> {
        let (queue_tx, queue_rx) = event_queue(self.config.ingestion.queue_capacity);
        let (report_tx, report_rx) = mpsc::channel(self.config.monitor.followup_capacity.max(1));

        let mut listener = EventListener::new(
            self.transport.clone(),
            self.vault.clone(),
            self.gateway.contract(),
            self.config.ingestion.clone(),
            queue_tx,
        );
        listener.initialize().await?;

        let settlement = Settlement::new(
            self.vault.clone(),
            self.server_key.clone(),
            self.gateway.clone(),
            self.processor.clone(),
            self.registry.clone(),
            FollowUpRunner::new(self.gateway.clone(), report_tx),
            self.config.monitor.clone(),
            self.config.processor.default_region.clone(),
        );

        let reporter = tokio::spawn(run_reporter(report_rx));
        let dispatcher = tokio::spawn(Dispatcher::new(settlement).run(queue_rx));
        let listener = tokio::spawn(listener.run(shutdown.subscribe()));

        let admin = if self.config.admin.enabled {
            let state = AdminState::new(
                &self.config.admin.api_key,
                self.registry.clone(),
                self.vault.clone(),
                self.gateway.contract(),
            );
            let admin_config = self.config.admin.clone();
            let admin_shutdown = shutdown.signalled();
            Some(tokio::spawn(async move {
                if let Err(e) = serve_admin(admin_config, state, admin_shutdown).await {
                    tracing::error!(error = %e, "Admin API failed");
                }
            }))
        } else {
            None
        };

        tracing::info!(
            contract = %self.gateway.contract(),
            admin = self.config.admin.enabled,
            "Bridge started"
        );

        Ok(RunningBridge {
            shutdown: shutdown.clone(),
            registry: self.registry,
            vault: self.vault,
            listener,
            dispatcher,
            reporter,
            admin,
        })
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("gateway", &self.gateway)
            .field("vault", &self.vault)
            .finish()
    }
}

/// Handle to a started bridge.
#[derive(Debug)]
pub struct RunningBridge {
    shutdown: Shutdown,
    registry: MonitorRegistry,
    vault: TokenVault,
    listener: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
    reporter: JoinHandle<()>,
    admin: Option<JoinHandle<()>>,
}

impl RunningBridge {
    pub fn registry(&self) -> &MonitorRegistry {
        &self.registry
    }

    /// Stop in dependency order and flush the vault.
    ///
    /// The listener stops first and drops the queue sender. The dispatcher then
    /// handles whatever is still queued before monitors are cancelled, so every
    /// event behind the persisted checkpoint is consumed.
    pub async fn stop(self) -> Result<(), StartupError> {
        self.shutdown.trigger();
        tracing::info!("Shutting down");

        drain("listener", self.listener, TASK_DRAIN_TIMEOUT).await;
        drain("dispatcher", self.dispatcher, QUEUE_DRAIN_TIMEOUT).await;

        let cancelled = self.registry.cancel_all();
        tracing::info!(cancelled_monitors = cancelled, "Monitors cancelled");

        drain("reporter", self.reporter, TASK_DRAIN_TIMEOUT).await;
        if let Some(admin) = self.admin {
            drain("admin", admin, TASK_DRAIN_TIMEOUT).await;
        }

        self.vault.flush().await?;
        tracing::info!("Shutdown complete");
        Ok(())
    }
}

async fn drain(task: &'static str, handle: JoinHandle<()>, limit: Duration) {
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(())) => tracing::debug!(task = task, "Task stopped"),
        Ok(Err(e)) => tracing::error!(task = task, error = %e, "Task ended abnormally"),
        Err(_) => tracing::warn!(task = task, "Task did not stop in time"),
    }
}
