use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::admin::AdminState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub contract: String,
    pub uptime_secs: u64,
    pub active_monitors: usize,
    pub stored_tokens: usize,
}

#[derive(Debug, Serialize)]
pub struct MonitorList {
    pub count: usize,
    pub tx_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckpointStatus {
    /// `None` until ingestion has run once.
    pub last_block: Option<u64>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        contract: state.contract.to_checksum(None),
        uptime_secs: state.started_at.elapsed().as_secs(),
        active_monitors: state.registry.len(),
        stored_tokens: state.vault.token_count(),
    })
}

pub async fn get_monitors(State(state): State<AdminState>) -> Json<MonitorList> {
    let tx_ids = state.registry.tx_ids();
    Json(MonitorList {
        count: tx_ids.len(),
        tx_ids,
    })
}

pub async fn get_checkpoint(
    State(state): State<AdminState>,
) -> Result<Json<CheckpointStatus>, StatusCode> {
    let last_block = state.vault.load_checkpoint().map_err(|e| {
        tracing::error!(error = %e, "Failed to read checkpoint");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(CheckpointStatus { last_block }))
}

#[cfg(test)]
mod tests {
    use crate::admin::{setup_admin_router, AdminState};
    use crate::settlement::MonitorRegistry;
    use crate::vault::TokenVault;
    use alloy::primitives::Address;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn state() -> AdminState {
        AdminState::new(
            "secret",
            MonitorRegistry::new(),
            TokenVault::temporary().unwrap(),
            Address::repeat_byte(0x11),
        )
    }

    async fn get(state: AdminState, path: &str, key: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(path);
        if let Some(key) = key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        let response = setup_admin_router(state)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_requires_bearer_token() {
        let (status, _) = get(state(), "/admin/status", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = get(state(), "/admin/status", Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status() {
        let (status, body) = get(state(), "/admin/status", Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "operational");
        assert_eq!(body["active_monitors"], 0);
    }

    #[tokio::test]
    async fn test_monitors_lists_registered_ids() {
        let state = state();
        let _ticket = state.registry.register("tx_abc");

        let (status, body) = get(state, "/admin/monitors", Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["tx_ids"][0], "tx_abc");
    }

    #[tokio::test]
    async fn test_checkpoint() {
        let state = state();
        let (_, body) = get(state.clone(), "/admin/checkpoint", Some("secret")).await;
        assert_eq!(body["last_block"], Value::Null);

        state.vault.store_checkpoint(1234).unwrap();
        let (_, body) = get(state, "/admin/checkpoint", Some("secret")).await;
        assert_eq!(body["last_block"], 1234);
    }
}
