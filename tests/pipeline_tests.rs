use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use ping_rank_rs::lifecycle::{self, RunOptions};
use ping_rank_rs::probe::{ProbeExecutor, Prober};
use ping_rank_rs::report::DisplaySink;
use ping_rank_rs::scheduler::{probe_all, AdmissionGate};
use ping_rank_rs::store::ResultStore;
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Clone)]
enum Script {
    Reply(u64),
    Zero,
    Fail,
}

/// Prober that answers from a fixed per-host script.
struct ScriptedProber {
    scripts: HashMap<&'static str, Script>,
}

impl Prober for ScriptedProber {
    fn probe(&self, host: &str) -> impl Future<Output = Result<Option<Duration>>> + Send {
        let script = self.scripts.get(host).cloned();
        async move {
            match script {
                Some(Script::Reply(ms)) => Ok(Some(Duration::from_millis(ms))),
                Some(Script::Zero) => Ok(Some(Duration::ZERO)),
                Some(Script::Fail) => Err(anyhow::anyhow!("probe init failed")),
                None => Ok(None),
            }
        }
    }
}

/// Prober that records its concurrent-call high-water mark.
struct InstrumentedProber {
    in_flight: Arc<AtomicUsize>,
    high_water: Arc<AtomicUsize>,
    hold: Duration,
}

impl Prober for InstrumentedProber {
    fn probe(&self, _host: &str) -> impl Future<Output = Result<Option<Duration>>> + Send {
        let in_flight = self.in_flight.clone();
        let high_water = self.high_water.clone();
        let hold = self.hold;
        async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            high_water.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(hold).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(Duration::from_millis(1)))
        }
    }
}

/// Prober that panics for one designated host.
struct PanickyProber {
    bad_host: &'static str,
}

impl Prober for PanickyProber {
    fn probe(&self, host: &str) -> impl Future<Output = Result<Option<Duration>>> + Send {
        let explode = host == self.bad_host;
        async move {
            if explode {
                panic!("prober blew up");
            }
            Ok(Some(Duration::from_millis(5)))
        }
    }
}

/// Sink that captures every tick for later assertions.
#[derive(Clone, Default)]
struct CaptureSink {
    ticks: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl DisplaySink for CaptureSink {
    fn present(&self, ranking: &str, progress: &str, probing: &str) {
        self.ticks.lock().unwrap().push((
            ranking.to_string(),
            progress.to_string(),
            probing.to_string(),
        ));
    }
}

fn hosts(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn ranking_scenario_with_failure_and_zero_latency() {
    let scripts = HashMap::from([
        ("alpha", Script::Reply(50)),
        ("beta", Script::Reply(10)),
        ("gamma", Script::Fail),
        ("delta", Script::Zero),
    ]);
    let executor = Arc::new(ProbeExecutor::new(ScriptedProber { scripts }, 2, TIMEOUT));

    let list = hosts(&["alpha", "beta", "gamma", "delta"]);
    let store = Arc::new(ResultStore::new(list.len() as u64));
    let gate = Arc::new(AdmissionGate::new(300));
    probe_all(&list, executor, gate, store.clone(), CancellationToken::new()).await;

    let snap = store.snapshot(3).await;
    let ranked: Vec<(&str, u64)> = snap
        .top
        .iter()
        .map(|r| (r.host.as_str(), r.latency_ms))
        .collect();
    assert_eq!(ranked, vec![("beta", 10), ("alpha", 50), ("delta", 3000)]);
    assert_eq!(snap.completed, 4);
    assert_eq!(snap.total, 4);
    assert!(!snap.top.iter().any(|r| r.host == "gamma"));
}

#[tokio::test]
async fn concurrency_never_exceeds_budget() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let high_water = Arc::new(AtomicUsize::new(0));
    let prober = InstrumentedProber {
        in_flight: in_flight.clone(),
        high_water: high_water.clone(),
        hold: Duration::from_millis(20),
    };
    let executor = Arc::new(ProbeExecutor::new(prober, 1, TIMEOUT));

    let list = hosts(&["a", "b", "c", "d", "e"]);
    let store = Arc::new(ResultStore::new(list.len() as u64));
    let gate = Arc::new(AdmissionGate::new(2));
    probe_all(&list, executor, gate, store.clone(), CancellationToken::new()).await;

    assert!(high_water.load(Ordering::SeqCst) <= 2);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    assert_eq!(store.completed().await, 5);
}

#[tokio::test]
async fn completed_reaches_n_despite_failures() {
    let scripts = HashMap::from([
        ("ok1", Script::Reply(5)),
        ("bad1", Script::Fail),
        ("bad2", Script::Fail),
        ("ok2", Script::Reply(9)),
    ]);
    let executor = Arc::new(ProbeExecutor::new(ScriptedProber { scripts }, 2, TIMEOUT));

    let list = hosts(&["ok1", "bad1", "bad2", "ok2"]);
    let store = Arc::new(ResultStore::new(list.len() as u64));
    let gate = Arc::new(AdmissionGate::new(2));
    probe_all(&list, executor, gate, store.clone(), CancellationToken::new()).await;

    let snap = store.snapshot(20).await;
    assert_eq!(snap.completed, 4);
    assert_eq!(snap.top.len(), 2);
}

#[tokio::test]
async fn panicking_probe_does_not_break_drain_or_other_records() {
    let executor = Arc::new(ProbeExecutor::new(
        PanickyProber { bad_host: "bad" },
        1,
        TIMEOUT,
    ));

    let list = hosts(&["a", "bad", "b"]);
    let store = Arc::new(ResultStore::new(list.len() as u64));
    let gate = Arc::new(AdmissionGate::new(2));
    // Must return: the panicked task may not satisfy the barrier by hanging it.
    probe_all(&list, executor, gate, store.clone(), CancellationToken::new()).await;

    let report = store.run_report().await;
    assert_eq!(report.completed, 2);
    assert_eq!(report.records.len(), 2);
    assert!(report.records.iter().all(|r| r.host != "bad"));
    let snap = store.snapshot(20).await;
    assert_eq!(snap.top.len(), 2);
}

#[tokio::test]
async fn duplicate_hosts_probed_once_per_occurrence() {
    let scripts = HashMap::from([("dup", Script::Reply(5))]);
    let executor = Arc::new(ProbeExecutor::new(ScriptedProber { scripts }, 1, TIMEOUT));

    let list = hosts(&["dup", "dup", "dup"]);
    let store = Arc::new(ResultStore::new(list.len() as u64));
    let gate = Arc::new(AdmissionGate::new(300));
    probe_all(&list, executor, gate, store.clone(), CancellationToken::new()).await;

    let report = store.run_report().await;
    assert_eq!(report.completed, 3);
    assert_eq!(report.total, 3);
    assert_eq!(report.records.len(), 1);
}

#[tokio::test]
async fn lifecycle_drains_and_keeps_reporting() {
    let scripts = HashMap::from([
        ("a", Script::Reply(5)),
        ("b", Script::Reply(3)),
        ("c", Script::Reply(8)),
    ]);
    let executor = ProbeExecutor::new(ScriptedProber { scripts }, 1, TIMEOUT);
    let capture = CaptureSink::default();

    let report = lifecycle::run(
        hosts(&["a", "b", "c"]),
        executor,
        Arc::new(capture.clone()),
        RunOptions {
            concurrency: 2,
            top_k: 2,
            period: Duration::from_millis(10),
            stop_reporter_on_drain: false,
        },
    )
    .await;

    assert_eq!(report.completed, 3);
    assert_eq!(report.total, 3);

    // Reporter keeps ticking after drain; the next ticks must show the final counts.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let ticks = capture.ticks.lock().unwrap();
    let (ranking, progress, probing) = ticks.last().expect("at least one tick").clone();
    assert_eq!(progress, "Progress: 3/3");
    assert!(ranking.starts_with("Top 2 fastest hosts:"));
    // Header plus at most top_k entries.
    assert_eq!(ranking.lines().count(), 3);
    assert!(probing.starts_with("Probing: "));
}

#[tokio::test]
async fn lifecycle_stops_reporter_on_drain_when_asked() {
    let scripts = HashMap::from([("a", Script::Reply(5))]);
    let executor = ProbeExecutor::new(ScriptedProber { scripts }, 1, TIMEOUT);
    let capture = CaptureSink::default();

    let report = lifecycle::run(
        hosts(&["a"]),
        executor,
        Arc::new(capture.clone()),
        RunOptions {
            concurrency: 1,
            top_k: 20,
            period: Duration::from_millis(10),
            stop_reporter_on_drain: true,
        },
    )
    .await;
    assert_eq!(report.completed, 1);

    let seen = capture.ticks.lock().unwrap().len();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(capture.ticks.lock().unwrap().len(), seen);
}
