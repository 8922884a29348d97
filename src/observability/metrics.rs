//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define bridge metrics (events, chain calls, charges, monitors)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `bridge_events_ingested_total` (counter): logs enqueued, by topic
//! - `bridge_events_handled_total` (counter): dispatched events, by event and outcome
//! - `bridge_chain_calls_total` (counter): contract calls, by method and outcome
//! - `bridge_processor_charges_total` (counter): charges, by outcome
//! - `bridge_active_monitors` (gauge): registered charge monitors
//! - `bridge_checkpoint_block` (gauge): last persisted ingestion checkpoint
//! - `bridge_rpc_health` (gauge): 1=healthy, 0=unhealthy
//!
//! Recording before `init_metrics` is a no-op, so library code and tests can
//! record freely.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter");
        }
    }
}

fn describe_metrics() {
    describe_counter!("bridge_events_ingested_total", "Contract logs enqueued for dispatch");
    describe_counter!("bridge_events_handled_total", "Contract events handled by the dispatcher");
    describe_counter!("bridge_chain_calls_total", "Contract calls submitted through the gateway");
    describe_counter!("bridge_processor_charges_total", "Charges submitted to the card processor");
    describe_gauge!("bridge_active_monitors", "Charge monitors currently registered");
    describe_gauge!("bridge_checkpoint_block", "Last persisted ingestion checkpoint");
    describe_gauge!("bridge_rpc_health", "Chain RPC reachability (1=healthy)");
}

pub fn record_event_ingested(topic: &'static str) {
    counter!("bridge_events_ingested_total", "topic" => topic).increment(1);
}

pub fn record_event_handled(event: &'static str, outcome: &'static str) {
    counter!("bridge_events_handled_total", "event" => event, "outcome" => outcome).increment(1);
}

pub fn record_chain_call(method: &'static str, outcome: &'static str) {
    counter!("bridge_chain_calls_total", "method" => method, "outcome" => outcome).increment(1);
}

pub fn record_charge(outcome: &'static str) {
    counter!("bridge_processor_charges_total", "outcome" => outcome).increment(1);
}

pub fn record_active_monitors(count: usize) {
    gauge!("bridge_active_monitors").set(count as f64);
}

pub fn record_checkpoint(block: u64) {
    gauge!("bridge_checkpoint_block").set(block as f64);
}

pub fn record_rpc_health(healthy: bool) {
    gauge!("bridge_rpc_health").set(if healthy { 1.0 } else { 0.0 });
}
