use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::{format_description::well_known, OffsetDateTime};

/// Outcome of one probe attempt against one host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Success { latency: Duration },
    Failure { reason: String },
}

/// One completed probe result for a host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub host: String,
    pub outcome: ProbeOutcome,
    pub finished_at: String,
}

/// One entry in a ranked snapshot, latency rounded to milliseconds for display.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RankedHost {
    pub host: String,
    pub latency_ms: u64,
}

/// Immutable point-in-time view of a run: progress counters plus the top-K
/// fastest hosts ascending by latency. Failed hosts never appear in `top`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub total: u64,
    pub completed: u64,
    pub probing: Option<String>,
    pub top: Vec<RankedHost>,
}

/// Full run dump: every record plus final counters.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RunReport {
    pub total: u64,
    pub completed: u64,
    pub records: Vec<ResultRecord>,
}

/// RFC3339 UTC timestamp using the `time` crate.
pub fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
