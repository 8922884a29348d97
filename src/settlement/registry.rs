//! Registry of in-flight charge monitors.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;

#[derive(Debug)]
struct MonitorHandle {
    id: u64,
    token: CancellationToken,
}

/// Handed to a newly registered monitor.
#[derive(Debug, Clone)]
pub struct MonitorTicket {
    pub tx_id: String,
    /// Registration id; distinguishes a monitor from the one that replaced it.
    pub id: u64,
    pub token: CancellationToken,
}

/// Processor tx id → cancellation token of its monitor.
///
/// At most one monitor per tx id is live. Registering again cancels the
/// previous monitor, and a monitor only removes its own entry.
#[derive(Debug, Clone, Default)]
pub struct MonitorRegistry {
    inner: Arc<DashMap<String, MonitorHandle>>,
    next_id: Arc<AtomicU64>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a monitor for `tx_id`, cancelling any existing one.
    pub fn register(&self, tx_id: &str) -> MonitorTicket {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let previous = self.inner.insert(
            tx_id.to_string(),
            MonitorHandle {
                id,
                token: token.clone(),
            },
        );
        if let Some(old) = previous {
            old.token.cancel();
            tracing::info!(tx_id = %tx_id, replaced = old.id, "Superseded existing monitor");
        }
        metrics::record_active_monitors(self.inner.len());

        MonitorTicket {
            tx_id: tx_id.to_string(),
            id,
            token,
        }
    }

    /// Cancel and remove the monitor for `tx_id`. Returns whether one existed.
    pub fn cancel(&self, tx_id: &str) -> bool {
        let removed = self.inner.remove(tx_id);
        metrics::record_active_monitors(self.inner.len());
        match removed {
            Some((_, handle)) => {
                handle.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `ticket` unless a newer monitor has replaced it.
    pub fn remove_if_current(&self, ticket: &MonitorTicket) -> bool {
        let removed = self
            .inner
            .remove_if(&ticket.tx_id, |_, handle| handle.id == ticket.id)
            .is_some();
        metrics::record_active_monitors(self.inner.len());
        removed
    }

    /// Cancel every registered monitor. Used at shutdown.
    pub fn cancel_all(&self) -> usize {
        let keys: Vec<String> = self.inner.iter().map(|entry| entry.key().clone()).collect();
        keys.iter().filter(|tx_id| self.cancel(tx_id)).count()
    }

    pub fn contains(&self, tx_id: &str) -> bool {
        self.inner.contains_key(tx_id)
    }

    /// Tx ids with a live monitor, sorted.
    pub fn tx_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
