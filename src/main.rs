use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ping_rank_rs::lifecycle::{self, RunOptions};
use ping_rank_rs::probe::{ProbeExecutor, TcpConnectProber};
use ping_rank_rs::report::{ConsoleSink, DisplaySink, FanoutSink};
use ping_rank_rs::server::HttpSink;
use ping_rank_rs::types::{ProbeOutcome, RunReport};
use ping_rank_rs::{hosts, server};
use std::fs::File;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

/// ping-rank-rs — Concurrent host latency prober with a live top-K ranking.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ping-rank-rs",
    version,
    about = "Concurrent host latency prober with a live top-K ranking.",
    long_about = None
)]
struct Cli {
    /// CSV file of hosts to probe (first column is the host).
    hosts: PathBuf,

    /// Max concurrent probes. Invalid or missing values fall back to 300.
    concurrency: Option<String>,

    /// Number of fastest hosts shown in the live ranking.
    #[arg(long, default_value_t = 20)]
    top: usize,

    /// Snapshot/report interval in milliseconds.
    #[arg(long = "interval-ms", default_value_t = 1000)]
    interval_ms: u64,

    /// Per-host probe attempt timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 3000)]
    timeout_ms: u64,

    /// Echo requests per probe attempt.
    #[arg(long, default_value_t = 2)]
    count: u32,

    /// TCP port probed for connect latency.
    #[arg(long = "probe-port", default_value_t = 80)]
    probe_port: u16,

    /// Write the full run report as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Start the embedded HTTP status UI.
    #[arg(long = "serve-ui", default_value_t = false)]
    serve_ui: bool,

    /// Exit once every host has completed instead of staying live until Ctrl+C.
    #[arg(long = "exit-on-drain", default_value_t = false)]
    exit_on_drain: bool,

    /// Logging verbosity (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;
    fmt().with_env_filter(filter).init();

    let host_list = hosts::load_hosts_from_path(&cli.hosts)?;
    if host_list.is_empty() {
        anyhow::bail!("no hosts found in {}", cli.hosts.display());
    }
    let concurrency = hosts::parse_concurrency(cli.concurrency.as_deref());

    println!("ping-rank-rs configuration:");
    println!("  hosts        : {} ({} entries)", cli.hosts.display(), host_list.len());
    println!("  concurrency  : {}", concurrency);
    println!("  top          : {}", cli.top);
    println!("  interval_ms  : {}", cli.interval_ms);
    println!("  timeout_ms   : {}", cli.timeout_ms);
    println!("  count        : {}", cli.count);
    println!("  probe_port   : {}", cli.probe_port);
    println!(
        "  output       : {}",
        cli.output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );
    println!("  serve_ui     : {}", cli.serve_ui);

    let executor = ProbeExecutor::new(
        TcpConnectProber::new(cli.probe_port),
        cli.count,
        Duration::from_millis(cli.timeout_ms.max(1)),
    );

    let console: Arc<dyn DisplaySink> = Arc::new(ConsoleSink);
    let sink: Arc<dyn DisplaySink> = if cli.serve_ui {
        let http = HttpSink::new();
        let bind = "127.0.0.1:8080";
        let server_sink = http.clone();
        tokio::spawn(async move {
            if let Err(e) = server::spawn_server(bind, server_sink).await {
                error!("HTTP UI server error: {e}");
            }
        });
        println!("UI server starting at http://{} (Ctrl+C to stop)", bind);
        Arc::new(FanoutSink::new(vec![
            console,
            Arc::new(http) as Arc<dyn DisplaySink>,
        ]))
    } else {
        console
    };

    let report = lifecycle::run(
        host_list,
        executor,
        sink,
        RunOptions {
            concurrency,
            top_k: cli.top,
            period: Duration::from_millis(cli.interval_ms.max(1)),
            stop_reporter_on_drain: cli.exit_on_drain,
        },
    )
    .await;

    if cli.exit_on_drain {
        print_report_table(&report);
    }

    if let Some(path) = cli.output.as_deref() {
        if let Err(e) = write_report_json(path, &report) {
            error!("failed to write JSON to {}: {}", path.display(), e);
        } else {
            println!("Wrote JSON report to {}", path.display());
        }
    }

    // The display stays live after drain so the operator can inspect the
    // final ranking; Ctrl+C ends the process.
    if !cli.exit_on_drain {
        println!("All hosts probed. Press Ctrl+C to exit...");
        let _ = tokio::signal::ctrl_c().await;
    }

    Ok(())
}

fn print_report_table(report: &RunReport) {
    let mut host_w = 4usize.max("host".len());
    let mut detail_w = 6usize.max("detail".len());
    for r in &report.records {
        host_w = host_w.max(r.host.len());
        if let ProbeOutcome::Failure { reason } = &r.outcome {
            detail_w = detail_w.max(reason.chars().count().min(60));
        }
    }
    let status_w = 6usize.max("status".len());
    let lat_w = 10usize.max("latency_ms".len());

    println!(
        "\nProbed hosts: {} (completed: {})",
        report.total, report.completed
    );
    println!(
        "{:<host_w$}  {:<status_w$}  {:>lat_w$}  {:<detail_w$}",
        "host",
        "status",
        "latency_ms",
        "detail",
        host_w = host_w,
        status_w = status_w,
        lat_w = lat_w,
        detail_w = detail_w
    );
    println!(
        "{:-<host_w$}  {:-<status_w$}  {:-<lat_w$}  {:-<detail_w$}",
        "",
        "",
        "",
        "",
        host_w = host_w,
        status_w = status_w,
        lat_w = lat_w,
        detail_w = detail_w
    );
    for r in &report.records {
        let (status, latency, detail) = match &r.outcome {
            ProbeOutcome::Success { latency } => {
                ("ok", latency.as_millis().to_string(), String::new())
            }
            ProbeOutcome::Failure { reason } => ("failed", "-".to_string(), clip_chars(reason, 60)),
        };
        println!(
            "{:<host_w$}  {:<status_w$}  {:>lat_w$}  {:<detail_w$}",
            r.host,
            status,
            latency,
            detail,
            host_w = host_w,
            status_w = status_w,
            lat_w = lat_w,
            detail_w = detail_w
        );
    }
}

fn write_report_json(path: &std::path::Path, report: &RunReport) -> anyhow::Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}

/// Clip to at most `max` characters on a char boundary.
fn clip_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
