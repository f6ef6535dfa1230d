use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Concurrency budget used when none is supplied or the supplied value is invalid.
pub const DEFAULT_CONCURRENCY: usize = 300;

/// Parse host-list file content into an ordered list of hosts.
///
/// The format is CSV-ish and deliberately lenient:
/// - the first comma-separated field on each line is the host
/// - everything after `#` is ignored
/// - whitespace and blank lines are ignored
///
/// Duplicates are kept: each occurrence gets its own probe.
pub fn parse_hosts_str(s: &str) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        // Strip comments and trim
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        if line.is_empty() {
            continue;
        }

        let host = line.split(',').next().map(str::trim).unwrap_or("");
        if host.is_empty() {
            bail!("line {line_no}: empty host field: {raw_line}");
        }
        out.push(host.to_string());
    }

    Ok(out)
}

/// Load a host list from a file path. Errors if the file cannot be read or parsed.
pub fn load_hosts_from_path(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read hosts file: {}", path.as_ref().display()))?;
    parse_hosts_str(&content)
}

/// Parse a concurrency budget leniently: absent, non-numeric, or non-positive
/// values fall back to [`DEFAULT_CONCURRENCY`] instead of aborting the run.
pub fn parse_concurrency(raw: Option<&str>) -> usize {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return DEFAULT_CONCURRENCY;
    };
    match s.parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            warn!(value = s, default = DEFAULT_CONCURRENCY, "invalid concurrency value, using default");
            DEFAULT_CONCURRENCY
        }
    }
}
