use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::types::{now_rfc3339, ProbeOutcome, RankedHost, ResultRecord, RunReport, Snapshot};

/// Thread-safe store for probe results: one record per distinct host
/// (last write wins), plus run-wide progress counters.
///
/// `total` is fixed at construction; `completed` is bumped exactly once per
/// finished probe, so with duplicate hosts in the input it can exceed the
/// number of records. All mutation goes through a single lock so a record
/// write is atomic to snapshot readers.
pub struct ResultStore {
    total: u64,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    records: Vec<ResultRecord>,
    index: HashMap<String, usize>,
    completed: u64,
    last_host: Option<String>,
}

impl ResultStore {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Record one finished probe. First completion for a host claims a slot in
    /// enumeration order; a later completion for the same host overwrites the
    /// slot in place. The completed counter always advances.
    pub async fn record_outcome(&self, host: &str, outcome: ProbeOutcome) {
        let record = ResultRecord {
            host: host.to_string(),
            outcome,
            finished_at: now_rfc3339(),
        };
        let mut inner = self.inner.lock().await;
        match inner.index.get(host).copied() {
            Some(slot) => inner.records[slot] = record,
            None => {
                let slot = inner.records.len();
                inner.index.insert(host.to_string(), slot);
                inner.records.push(record);
            }
        }
        inner.completed += 1;
        inner.last_host = Some(host.to_string());
    }

    pub async fn completed(&self) -> u64 {
        self.inner.lock().await.completed
    }

    /// Build an immutable ranked view: successes sorted ascending by latency
    /// (stable, so ties keep enumeration order), truncated to `k`. Failures
    /// are excluded from the ranking entirely but still count as completed.
    pub async fn snapshot(&self, k: usize) -> Snapshot {
        let inner = self.inner.lock().await;
        let mut ranked: Vec<(&str, Duration)> = inner
            .records
            .iter()
            .filter_map(|r| match &r.outcome {
                ProbeOutcome::Success { latency } => Some((r.host.as_str(), *latency)),
                ProbeOutcome::Failure { .. } => None,
            })
            .collect();
        ranked.sort_by_key(|&(_, latency)| latency);
        ranked.truncate(k);

        Snapshot {
            total: self.total,
            completed: inner.completed,
            probing: inner.last_host.clone(),
            top: ranked
                .into_iter()
                .map(|(host, latency)| RankedHost {
                    host: host.to_string(),
                    latency_ms: latency.as_millis() as u64,
                })
                .collect(),
        }
    }

    /// Full dump of the run for the final report / JSON output.
    pub async fn run_report(&self) -> RunReport {
        let inner = self.inner.lock().await;
        RunReport {
            total: self.total,
            completed: inner.completed,
            records: inner.records.clone(),
        }
    }
}
