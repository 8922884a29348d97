//! Card bridge library.
//!
//! Reconciles an on-chain card contract with an off-chain card processor,
//! custodying encrypted card data behind opaque tokens.

// Core subsystems
pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod ingestion;
pub mod processor;
pub mod settlement;
pub mod vault;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::BridgeConfig;
pub use lifecycle::{build_bridge, Bridge, Shutdown};
