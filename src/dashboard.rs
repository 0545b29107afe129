use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use parking_lot::RwLock;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::{config::Settings, report::Report, utils::now_ts};

#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshStatus {
    pub status: String,
    pub last_ok_ts: Option<f64>,
    pub last_error: Option<String>,
    pub last_error_ts: Option<f64>,
}

#[derive(Default)]
struct Inner {
    latest: Option<Arc<Report>>,
    status: RefreshStatus,
}

/// Latest finished report plus refresh health, shared between the
/// refresh loop (writer) and the HTTP handlers (readers).
#[derive(Clone)]
pub struct ReportState {
    inner: Arc<RwLock<Inner>>,
}

impl Default for ReportState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportState {
    pub fn new() -> Self {
        let mut inner = Inner::default();
        inner.status.status = "starting".to_string();
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    pub fn publish(&self, report: Arc<Report>) {
        let mut g = self.inner.write();
        g.status.status = "ok".to_string();
        g.status.last_ok_ts = Some(report.generated_ts);
        g.latest = Some(report);
    }

    pub fn record_error(&self, err: &str) {
        let mut g = self.inner.write();
        g.status.status = "error".to_string();
        g.status.last_error = Some(err.to_string());
        g.status.last_error_ts = Some(now_ts());
    }

    pub fn latest(&self) -> Option<Arc<Report>> {
        self.inner.read().latest.clone()
    }

    pub fn status(&self) -> RefreshStatus {
        self.inner.read().status.clone()
    }
}

pub fn router(state: ReportState) -> Router {
    Router::new()
        .route("/api/report", get(api_report))
        .route("/api/health", get(api_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve_reports(settings: Settings, state: ReportState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.server_host, settings.server_port)
        .parse()
        .with_context(|| {
            format!(
                "server addr {}:{}",
                settings.server_host, settings.server_port
            )
        })?;

    log::info!("server.start url=http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn api_report(State(st): State<ReportState>) -> impl IntoResponse {
    match st.latest() {
        Some(report) => Json(report.as_ref().clone()).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "no report yet", "status": st.status() })),
        )
            .into_response(),
    }
}

async fn api_health(State(st): State<ReportState>) -> impl IntoResponse {
    Json(serde_json::json!({ "ts": now_ts(), "refresh": st.status() }))
}
