use std::sync::{Arc, RwLock};

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::report::DisplaySink;
use crate::types::{now_rfc3339, Snapshot};

/// Display sink backed by shared state the HTTP server reads from.
///
/// The reporter pushes each tick in — the rendered text plus the structured
/// snapshot behind it. `GET /api/status` serves the text, `GET /api/snapshot`
/// the snapshot. A std lock is fine here: writers and readers hold it only to
/// swap/clone small values.
#[derive(Clone)]
pub struct HttpSink {
    inner: Arc<RwLock<UiState>>,
}

#[derive(Debug, Default)]
struct UiState {
    status: UiStatus,
    snapshot: Option<Snapshot>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct UiStatus {
    pub ranking: String,
    pub progress: String,
    pub probing: String,
    pub updated_at: String,
}

impl HttpSink {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(UiState::default())),
        }
    }
}

impl Default for HttpSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for HttpSink {
    fn present(&self, ranking: &str, progress: &str, probing: &str) {
        let mut state = self.inner.write().expect("ui state lock poisoned");
        state.status = UiStatus {
            ranking: ranking.to_string(),
            progress: progress.to_string(),
            probing: probing.to_string(),
            updated_at: now_rfc3339(),
        };
    }

    fn retain_snapshot(&self, snapshot: &Snapshot) {
        let mut state = self.inner.write().expect("ui state lock poisoned");
        state.snapshot = Some(snapshot.clone());
    }
}

pub async fn spawn_server(bind: &str, sink: HttpSink) -> Result<()> {
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/snapshot", get(get_snapshot))
        .with_state(sink);

    let static_svc = ServeDir::new("ui").append_index_html_on_directories(true);

    let app = Router::new()
        .nest("/api", api)
        .fallback_service(static_svc)
        .layer(TraceLayer::new_for_http());

    info!("serving status UI on http://{bind}");
    axum::serve(tokio::net::TcpListener::bind(bind).await?, app).await?;
    Ok(())
}

async fn get_status(State(sink): State<HttpSink>) -> impl IntoResponse {
    let status = sink
        .inner
        .read()
        .expect("ui state lock poisoned")
        .status
        .clone();
    (StatusCode::OK, Json(status))
}

async fn get_snapshot(State(sink): State<HttpSink>) -> impl IntoResponse {
    let snapshot = sink
        .inner
        .read()
        .expect("ui state lock poisoned")
        .snapshot
        .clone();
    match snapshot {
        Some(snap) => (StatusCode::OK, Json(snap)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RankedHost;

    #[test]
    fn sink_retains_latest_tick() {
        let sink = HttpSink::new();
        sink.present("top", "Progress: 1/2", "Probing: a");
        sink.present("top2", "Progress: 2/2", "Probing: b");
        let status = sink.inner.read().unwrap().status.clone();
        assert_eq!(status.ranking, "top2");
        assert_eq!(status.progress, "Progress: 2/2");
        assert_eq!(status.probing, "Probing: b");
        assert!(!status.updated_at.is_empty());
    }

    #[test]
    fn sink_retains_latest_snapshot() {
        let sink = HttpSink::new();
        assert!(sink.inner.read().unwrap().snapshot.is_none());

        let snap = Snapshot {
            total: 2,
            completed: 1,
            probing: Some("a".into()),
            top: vec![RankedHost {
                host: "a".into(),
                latency_ms: 7,
            }],
        };
        sink.retain_snapshot(&snap);
        let retained = sink.inner.read().unwrap().snapshot.clone();
        assert_eq!(retained, Some(snap));
    }
}
