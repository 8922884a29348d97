//! Settlement follow-ups after a charge succeeds: `MintUTXO`, then `getPoolInfo`.

use alloy::primitives::{Address, U256};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::blockchain::contract::MintReceipt;
use crate::blockchain::gateway::ChainGateway;

/// Work to do once a charge settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementFollowUp {
    pub tx_id: String,
    pub parent_value: U256,
    pub owner_pool: Address,
}

/// How a follow-up ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUpReport {
    Settled {
        tx_id: String,
        receipt: MintReceipt,
        pool_info: String,
    },
    MintFailed {
        tx_id: String,
        error: String,
    },
    PoolInfoFailed {
        tx_id: String,
        receipt: MintReceipt,
        error: String,
    },
}

impl FollowUpReport {
    pub fn tx_id(&self) -> &str {
        match self {
            FollowUpReport::Settled { tx_id, .. }
            | FollowUpReport::MintFailed { tx_id, .. }
            | FollowUpReport::PoolInfoFailed { tx_id, .. } => tx_id,
        }
    }
}

/// Mint the settlement UTXO, then read back the pool.
pub async fn settle(gateway: &ChainGateway, job: &SettlementFollowUp) -> FollowUpReport {
    let receipt = match gateway
        .mint_utxo(job.parent_value, job.owner_pool, &job.tx_id)
        .await
    {
        Ok(receipt) => receipt,
        Err(e) => {
            return FollowUpReport::MintFailed {
                tx_id: job.tx_id.clone(),
                error: e.to_string(),
            }
        }
    };

    match gateway.get_pool_info(&job.tx_id).await {
        Ok(pool_info) => FollowUpReport::Settled {
            tx_id: job.tx_id.clone(),
            receipt,
            pool_info,
        },
        Err(e) => FollowUpReport::PoolInfoFailed {
            tx_id: job.tx_id.clone(),
            receipt,
            error: e.to_string(),
        },
    }
}

/// Runs follow-ups and reports their results on a channel.
#[derive(Debug, Clone)]
pub struct FollowUpRunner {
    gateway: ChainGateway,
    reports: mpsc::Sender<FollowUpReport>,
}

impl FollowUpRunner {
    pub fn new(gateway: ChainGateway, reports: mpsc::Sender<FollowUpReport>) -> Self {
        Self { gateway, reports }
    }

    /// Run `job` on its own task.
    pub fn spawn(&self, job: SettlementFollowUp) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move { runner.run(job).await })
    }

    /// Run `job` on the current task.
    pub async fn run(&self, job: SettlementFollowUp) {
        let report = settle(&self.gateway, &job).await;
        if self.reports.send(report).await.is_err() {
            tracing::warn!(tx_id = %job.tx_id, "Follow-up reporter gone; report dropped");
        }
    }
}

/// Drain follow-up reports into the log until every runner is dropped.
pub async fn run_reporter(mut reports: mpsc::Receiver<FollowUpReport>) {
    while let Some(report) = reports.recv().await {
        match &report {
            FollowUpReport::Settled {
                tx_id,
                receipt,
                pool_info,
            } => tracing::info!(
                tx_id = %tx_id,
                new_pool = %receipt.new_pool,
                parent_hash = %receipt.parent_hash,
                pool_info = %pool_info,
                "Settlement follow-up complete"
            ),
            FollowUpReport::MintFailed { tx_id, error } => {
                tracing::error!(tx_id = %tx_id, error = %error, "MintUTXO failed")
            }
            FollowUpReport::PoolInfoFailed { tx_id, receipt, error } => tracing::error!(
                tx_id = %tx_id,
                new_pool = %receipt.new_pool,
                error = %error,
                "getPoolInfo failed after mint"
            ),
        }
    }
    tracing::debug!("Follow-up reporter stopped");
}
