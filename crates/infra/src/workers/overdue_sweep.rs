use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::lifecycle::ReceivableLifecycle;
use crate::store::ReceivableStore;

/// Handle to control and join a running sweep.
#[derive(Debug)]
pub struct SweepHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
    runs: Arc<AtomicU64>,
}

impl SweepHandle {
    /// Number of completed sweeps.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Request graceful shutdown and wait for the task to stop.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

/// Periodic ABERTO → VENCIDO reclassification.
///
/// Each tick calls [`ReceivableLifecycle::refresh_overdue`] with today's UTC
/// date. Failures are logged and the next tick tries again.
#[derive(Debug, Clone, Copy)]
pub struct OverdueSweep {
    pub interval: Duration,
}

impl OverdueSweep {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Spawn the sweep on the current tokio runtime.
    ///
    /// The first sweep runs immediately.
    pub fn spawn<S>(self, lifecycle: Arc<ReceivableLifecycle<S>>) -> SweepHandle
    where
        S: ReceivableStore + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let runs = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&runs);
        let period = self.interval.max(Duration::from_millis(10));

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let today = Utc::now().date_naive();
                        match lifecycle.refresh_overdue(today).await {
                            Ok(0) => debug!(%today, "overdue sweep: nothing to mark"),
                            Ok(changed) => info!(changed, %today, "overdue sweep marked receivables"),
                            Err(err) => warn!(error = %err, "overdue sweep failed"),
                        }
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            debug!("overdue sweep stopped");
        });

        SweepHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
            runs,
        }
    }
}
