//! Admin HTTP surface.
//!
//! Read-only views of the running bridge behind a bearer token.

pub mod auth;
pub mod handlers;

use alloy::primitives::Address;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

use crate::config::schema::AdminConfig;
use crate::settlement::MonitorRegistry;
use crate::vault::TokenVault;

use self::auth::admin_auth_middleware;
use self::handlers::{get_checkpoint, get_monitors, get_status};

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub(crate) api_key: Arc<str>,
    pub(crate) registry: MonitorRegistry,
    pub(crate) vault: TokenVault,
    pub(crate) contract: Address,
    pub(crate) started_at: Instant,
}

impl AdminState {
    pub fn new(api_key: &str, registry: MonitorRegistry, vault: TokenVault, contract: Address) -> Self {
        Self {
            api_key: Arc::from(api_key),
            registry,
            vault,
            contract,
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/monitors", get(get_monitors))
        .route("/admin/checkpoint", get(get_checkpoint))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until `shutdown` resolves.
pub async fn serve_admin(
    config: AdminConfig,
    state: AdminState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(&config.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
