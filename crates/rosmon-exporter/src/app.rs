use crate::exposition;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use rosmon_collector::CollectorRegistry;
use rosmon_common::types::Device;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CollectorRegistry>,
    pub devices: Arc<Vec<Device>>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Runs one scrape cycle over every configured device.
async fn metrics(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let report = state.registry.scrape(&state.devices).await;
    let descs = state.registry.describe();

    match exposition::render(&descs, &report) {
        Ok(body) => {
            tracing::debug!(
                devices = state.devices.len(),
                samples = report.samples.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Served scrape"
            );
            ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}
