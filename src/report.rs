use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::store::ResultStore;
use crate::types::Snapshot;

/// Receives the three rendered text blocks of each reporting tick.
/// Rendering beyond these strings is the sink's concern.
pub trait DisplaySink: Send + Sync {
    fn present(&self, ranking: &str, progress: &str, probing: &str);

    /// Receives the structured snapshot behind the rendered tick. Sinks that
    /// only show text can ignore it.
    fn retain_snapshot(&self, _snapshot: &Snapshot) {}
}

/// Prints each tick to stdout.
pub struct ConsoleSink;

impl DisplaySink for ConsoleSink {
    fn present(&self, ranking: &str, progress: &str, probing: &str) {
        println!("{ranking}");
        println!("{progress}");
        println!("{probing}");
        println!();
    }
}

/// Forwards each tick to every wrapped sink.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn DisplaySink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn DisplaySink>>) -> Self {
        Self { sinks }
    }
}

impl DisplaySink for FanoutSink {
    fn present(&self, ranking: &str, progress: &str, probing: &str) {
        for sink in &self.sinks {
            sink.present(ranking, progress, probing);
        }
    }

    fn retain_snapshot(&self, snapshot: &Snapshot) {
        for sink in &self.sinks {
            sink.retain_snapshot(snapshot);
        }
    }
}

pub fn render_ranking(snapshot: &Snapshot, top_k: usize) -> String {
    let mut out = format!("Top {top_k} fastest hosts:");
    for entry in &snapshot.top {
        out.push_str(&format!("\n{}: {} ms", entry.host, entry.latency_ms));
    }
    out
}

pub fn render_progress(snapshot: &Snapshot) -> String {
    format!("Progress: {}/{}", snapshot.completed, snapshot.total)
}

pub fn render_probing(snapshot: &Snapshot) -> String {
    match &snapshot.probing {
        Some(host) => format!("Probing: {host}"),
        None => String::from("Probing: <none>"),
    }
}

/// Periodic snapshot loop: every `period`, take a consistent top-K view of
/// the store and push the rendered tick to the sink. Runs until the token is
/// cancelled; by default that only happens at process shutdown, so the
/// display stays live after the run drains.
pub async fn run_reporter(
    store: Arc<ResultStore>,
    sink: Arc<dyn DisplaySink>,
    top_k: usize,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let snapshot = store.snapshot(top_k).await;
        sink.retain_snapshot(&snapshot);
        sink.present(
            &render_ranking(&snapshot, top_k),
            &render_progress(&snapshot),
            &render_probing(&snapshot),
        );
    }
    debug!("snapshot reporter stopped");
}
