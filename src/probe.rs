use anyhow::{anyhow, Result};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::debug;

use crate::types::ProbeOutcome;

/// Probe capability injected into the executor.
///
/// - `Ok(Some(rtt))`: an echo reply was received after `rtt`.
/// - `Ok(None)`: the request was lost without a hard error from the mechanism.
/// - `Err(..)`: the probe mechanism itself failed (initialization, transport).
pub trait Prober: Send + Sync + 'static {
    fn probe(&self, host: &str) -> impl Future<Output = Result<Option<Duration>>> + Send;
}

/// Default probe capability: measures TCP connect round-trip time against a
/// fixed port. Refused or unreachable connects are hard failures; an OS-level
/// connect timeout counts as a lost request.
pub struct TcpConnectProber {
    port: u16,
}

impl TcpConnectProber {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl Prober for TcpConnectProber {
    fn probe(&self, host: &str) -> impl Future<Output = Result<Option<Duration>>> + Send {
        let addr = format!("{}:{}", host, self.port);
        async move {
            let start = Instant::now();
            match TcpStream::connect(addr.as_str()).await {
                Ok(_stream) => Ok(Some(start.elapsed())),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
                Err(e) => Err(anyhow!("connect {addr}: {e}")),
            }
        }
    }
}

/// Runs one probe attempt per host: a fixed number of echo requests under a
/// single attempt timeout, averaged into a [`ProbeOutcome`].
pub struct ProbeExecutor<P> {
    prober: P,
    echo_count: u32,
    timeout: Duration,
}

impl<P: Prober> ProbeExecutor<P> {
    pub fn new(prober: P, echo_count: u32, timeout: Duration) -> Self {
        Self {
            prober,
            echo_count: echo_count.max(1),
            timeout,
        }
    }

    /// Perform exactly one probe attempt against `host`.
    ///
    /// All echoes share one attempt deadline. Replies received before the
    /// deadline are kept and averaged even if later echoes run out of budget;
    /// echoes cut off by the deadline count as lost. A hard error from the
    /// probe mechanism is a `Failure`. An attempt with no replies or a zero
    /// average is recorded as `Success` with the timeout substituted for the
    /// latency, so dead hosts rank last instead of first.
    pub async fn execute(&self, host: &str) -> ProbeOutcome {
        let deadline = Instant::now() + self.timeout;
        let mut replies = Vec::with_capacity(self.echo_count as usize);

        for _ in 0..self.echo_count {
            let budget = deadline.saturating_duration_since(Instant::now());
            if budget.is_zero() {
                break;
            }
            match time::timeout(budget, self.prober.probe(host)).await {
                Ok(Ok(Some(rtt))) => replies.push(rtt),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    debug!(host, error = %e, "probe failed");
                    return ProbeOutcome::Failure {
                        reason: e.to_string(),
                    };
                }
                // Attempt budget exhausted; remaining echoes count as lost.
                Err(_elapsed) => break,
            }
        }

        self.average(replies)
    }

    fn average(&self, replies: Vec<Duration>) -> ProbeOutcome {
        if replies.is_empty() {
            return ProbeOutcome::Success {
                latency: self.timeout,
            };
        }
        let total: Duration = replies.iter().sum();
        let avg = total / replies.len() as u32;
        if avg == Duration::ZERO {
            // All requests "answered" with no measurable latency: treat as lost.
            return ProbeOutcome::Success {
                latency: self.timeout,
            };
        }
        ProbeOutcome::Success { latency: avg }
    }
}
