use std::sync::Arc;
use std::time::Duration;

use launchpad_common::{EntityKind, LaunchpadError, Shutdown};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::reconciler::{ReconcileReport, Reconciler};

/// Outcome of one full cycle, per kind in the order synchronized.
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub results: Vec<(EntityKind, Result<ReconcileReport, LaunchpadError>)>,
}

impl SyncSummary {
    pub fn enriched(&self) -> usize {
        self.results
            .iter()
            .filter_map(|(_, r)| r.as_ref().ok())
            .map(|r| r.enriched)
            .sum()
    }

    pub fn report(&self, kind: EntityKind) -> Option<&ReconcileReport> {
        self.results
            .iter()
            .find(|(k, _)| *k == kind)
            .and_then(|(_, r)| r.as_ref().ok())
    }
}

/// Exclusive right to run a cycle. At most one exists per scheduler.
pub struct CycleGuard(OwnedMutexGuard<()>);

/// Runs every kind through the reconciler on a fixed interval.
///
/// Clones share one cycle lock, so periodic and manually triggered cycles
/// never overlap.
#[derive(Clone)]
pub struct SyncScheduler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
    cycle: Arc<Mutex<()>>,
}

impl SyncScheduler {
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
            cycle: Arc::new(Mutex::new(())),
        }
    }

    /// Claim the cycle lock without waiting. `None` while a cycle is running.
    pub fn try_claim(&self) -> Option<CycleGuard> {
        self.cycle.clone().try_lock_owned().ok().map(CycleGuard)
    }

    pub fn is_running(&self) -> bool {
        self.cycle.try_lock().is_err()
    }

    /// Wait for any running cycle to finish, then run one.
    pub async fn sync_all(&self, shutdown: &mut Shutdown) -> SyncSummary {
        let guard = CycleGuard(self.cycle.clone().lock_owned().await);
        self.run_cycle(guard, shutdown).await
    }

    /// One cycle: people, vehicles, then events. A failing kind is logged and
    /// does not stop the others. Stops early only on shutdown.
    pub async fn run_cycle(&self, _guard: CycleGuard, shutdown: &mut Shutdown) -> SyncSummary {
        let mut summary = SyncSummary::default();

        for kind in EntityKind::ALL {
            let result = self.reconciler.reconcile(kind, shutdown).await;
            let cancelled = matches!(result, Err(LaunchpadError::Cancelled));
            match &result {
                Ok(_) => {}
                Err(LaunchpadError::Cancelled) => info!(%kind, "Sync cancelled by shutdown"),
                Err(e) if e.is_upstream() => {
                    warn!(%kind, error = %e, "Upstream unavailable, skipping kind this cycle")
                }
                Err(e) => error!(%kind, error = %e, "Sync failed for kind"),
            }
            summary.results.push((kind, result));
            if cancelled {
                break;
            }
        }

        info!(enriched = summary.enriched(), "Sync cycle finished");
        summary
    }

    /// Spawn the periodic loop. The first cycle starts immediately.
    pub fn spawn(self, mut shutdown: Shutdown) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "Sync scheduler started");
            loop {
                if shutdown.is_triggered() {
                    break;
                }
                self.sync_all(&mut shutdown).await;
                if !shutdown.sleep(self.interval).await {
                    break;
                }
            }
            info!("Sync scheduler stopped");
        })
    }
}
