use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::probe::{ProbeExecutor, Prober};
use crate::report::{run_reporter, DisplaySink};
use crate::scheduler::{probe_all, AdmissionGate};
use crate::store::ResultStore;
use crate::types::RunReport;

pub struct RunOptions {
    /// Max probes in flight at once.
    pub concurrency: usize,
    /// Ranking length in each snapshot.
    pub top_k: usize,
    /// Snapshot reporter period.
    pub period: Duration,
    /// Stop the reporter once every host has completed. When false the
    /// reporter keeps ticking after drain so the display stays live.
    pub stop_reporter_on_drain: bool,
}

/// Run a full probing pass: start the reporter and the scheduler, drain every
/// host, and return the final report. Returning is the drain-completion
/// event.
///
/// An operator interrupt (Ctrl-C) cancels the run token and terminates the
/// process immediately; in-flight probes are abandoned, not awaited.
pub async fn run<P: Prober>(
    hosts: Vec<String>,
    executor: ProbeExecutor<P>,
    sink: Arc<dyn DisplaySink>,
    opts: RunOptions,
) -> RunReport {
    let store = Arc::new(ResultStore::new(hosts.len() as u64));
    let cancel = CancellationToken::new();

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, aborting run");
            interrupt.cancel();
            std::process::exit(130);
        }
    });

    let reporter_cancel = cancel.child_token();
    let reporter = tokio::spawn(run_reporter(
        store.clone(),
        sink,
        opts.top_k,
        opts.period,
        reporter_cancel.clone(),
    ));

    let gate = Arc::new(AdmissionGate::new(opts.concurrency));
    let executor = Arc::new(executor);
    probe_all(&hosts, executor, gate, store.clone(), cancel.clone()).await;
    let completed = store.completed().await;
    info!(completed, total = store.total(), "all hosts drained");

    if opts.stop_reporter_on_drain {
        reporter_cancel.cancel();
        let _ = reporter.await;
    }

    store.run_report().await
}
