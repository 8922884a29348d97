//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and URLs parse
//! - Validate value ranges (timeouts > 0, attempts >= 1)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use thiserror::Error;

use crate::config::schema::{BridgeConfig, ADMIN_KEY_PLACEHOLDER};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every problem.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = url::Url::parse(&config.chain.rpc_url) {
        errors.push(ValidationError::new("chain.rpc_url", e.to_string()));
    }
    for failover in &config.chain.failover_urls {
        if url::Url::parse(failover).is_err() {
            errors.push(ValidationError::new(
                "chain.failover_urls",
                format!("invalid URL '{}'", failover),
            ));
        }
    }
    if config.chain.chain_id == 0 {
        errors.push(ValidationError::new("chain.chain_id", "must be non-zero"));
    }
    if config.chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("chain.rpc_timeout_secs", "must be > 0"));
    }
    if config.chain.contract_address.parse::<Address>().is_err() {
        errors.push(ValidationError::new(
            "chain.contract_address",
            format!("'{}' is not an address", config.chain.contract_address),
        ));
    }

    if config.gateway.max_gas == 0 {
        errors.push(ValidationError::new("gateway.max_gas", "must be > 0"));
    }
    if config.gateway.receipt_timeout_secs == 0 {
        errors.push(ValidationError::new("gateway.receipt_timeout_secs", "must be > 0"));
    }
    if config.gateway.submit_token_attempts == 0 {
        errors.push(ValidationError::new("gateway.submit_token_attempts", "must be >= 1"));
    }
    if config.gateway.default_attempts == 0 {
        errors.push(ValidationError::new("gateway.default_attempts", "must be >= 1"));
    }

    if config.ingestion.queue_capacity == 0 {
        errors.push(ValidationError::new("ingestion.queue_capacity", "must be > 0"));
    }
    if config.ingestion.max_backoff_ms < config.ingestion.error_backoff_ms {
        errors.push(ValidationError::new(
            "ingestion.max_backoff_ms",
            "must be >= ingestion.error_backoff_ms",
        ));
    }

    for (field, value) in [
        ("processor.charge_url", &config.processor.charge_url),
        ("processor.status_url", &config.processor.status_url),
    ] {
        if let Err(e) = url::Url::parse(value) {
            errors.push(ValidationError::new(field, e.to_string()));
        }
    }
    if config.processor.merchant_id.trim().is_empty() {
        errors.push(ValidationError::new("processor.merchant_id", "must not be empty"));
    }
    if config.processor.default_region.trim().is_empty() {
        errors.push(ValidationError::new("processor.default_region", "must not be empty"));
    }

    if config.monitor.max_polls == 0 {
        errors.push(ValidationError::new("monitor.max_polls", "must be >= 1"));
    }
    if config.monitor.followup_capacity == 0 {
        errors.push(ValidationError::new("monitor.followup_capacity", "must be > 0"));
    }

    if config.vault.path.trim().is_empty() {
        errors.push(ValidationError::new("vault.path", "must not be empty"));
    }

    if config.admin.enabled && config.admin.api_key == ADMIN_KEY_PLACEHOLDER {
        errors.push(ValidationError::new(
            "admin.api_key",
            "placeholder key must be replaced when the admin API is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
