use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::probe::{ProbeExecutor, Prober};
use crate::store::ResultStore;

/// Bounded-concurrency gate for probe admission.
///
/// `admit()` blocks until a slot is free and returns an owned permit, so the
/// slot is released on every exit path of the holder's scope.
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
}

impl AdmissionGate {
    pub fn new(budget: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(budget.clamp(1, Semaphore::MAX_PERMITS))),
        }
    }

    pub async fn admit(&self) -> OwnedSemaphorePermit {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .expect("admission gate is never closed")
    }
}

/// Fan out one task per host and drain them all.
///
/// Every task awaits the gate, probes, drops its permit, then records the
/// outcome and bumps the completed counter exactly once. Tasks are spawned
/// eagerly; parallelism is capped by the gate, not by the spawn loop. A panic
/// inside one task is logged and never breaks the drain barrier or other
/// hosts' records. On cancellation, tasks not yet past the gate return
/// without probing; in-flight probes are abandoned, not awaited.
pub async fn probe_all<P: Prober>(
    hosts: &[String],
    executor: Arc<ProbeExecutor<P>>,
    gate: Arc<AdmissionGate>,
    store: Arc<ResultStore>,
    cancel: CancellationToken,
) {
    let mut set = JoinSet::new();

    for host in hosts {
        let host = host.clone();
        let executor = executor.clone();
        let gate = gate.clone();
        let store = store.clone();
        let cancel = cancel.clone();

        set.spawn(async move {
            let permit = gate.admit().await;
            if cancel.is_cancelled() {
                return;
            }
            let outcome = executor.execute(&host).await;
            drop(permit);
            store.record_outcome(&host, outcome).await;
        });
    }

    while let Some(res) = set.join_next().await {
        if let Err(e) = res {
            warn!(error = %e, "probe task aborted");
        }
    }
    debug!(hosts = hosts.len(), "scheduler drained");
}
