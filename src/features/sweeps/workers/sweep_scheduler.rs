use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::core::config::RetentionConfig;
use crate::features::sweeps::models::SweepKind;
use crate::features::sweeps::services::SweepService;

/// The trash purge runs right after the expiration sweep on the same timer
const EXPIRATION_CHAIN: &[SweepKind] = &[SweepKind::Expiration, SweepKind::TrashPurge];
const FILE_REQUEST_CHAIN: &[SweepKind] = &[SweepKind::FileRequestPurge];
const ACCOUNT_CHAIN: &[SweepKind] = &[SweepKind::AccountPurge];
const AUDIT_CHAIN: &[SweepKind] = &[SweepKind::AuditPurge];

/// Background workers, one independent timer per chain of sweeps.
///
/// Workers keep no state between runs: each tick re-queries everything
/// that is due, so a restart loses nothing.
pub struct SweepScheduler {
    sweeps: Arc<SweepService>,
    expiration_interval: Duration,
    maintenance_interval: Duration,
}

impl SweepScheduler {
    pub fn new(sweeps: Arc<SweepService>, config: &RetentionConfig) -> Self {
        Self {
            sweeps,
            expiration_interval: config.expiration_sweep_interval,
            maintenance_interval: config.maintenance_sweep_interval,
        }
    }

    /// Spawn every worker. The first run of each happens immediately.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let schedules = [
            (self.expiration_interval, EXPIRATION_CHAIN),
            (self.maintenance_interval, FILE_REQUEST_CHAIN),
            (self.maintenance_interval, ACCOUNT_CHAIN),
            (self.maintenance_interval, AUDIT_CHAIN),
        ];

        schedules
            .into_iter()
            .map(|(period, chain)| {
                let sweeps = Arc::clone(&self.sweeps);
                tokio::spawn(async move { run_schedule(sweeps, period, chain).await })
            })
            .collect()
    }
}

async fn run_schedule(sweeps: Arc<SweepService>, period: Duration, chain: &'static [SweepKind]) {
    tracing::info!("Starting sweep worker {:?} every {:?}", chain, period);

    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        // A failed sweep never stops the ones chained after it
        for &kind in chain {
            if let Err(e) = sweeps.run(kind).await {
                tracing::error!("Error running sweep {}: {:?}", kind, e);
            }
        }
    }
}
