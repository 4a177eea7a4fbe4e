//! Prometheus metrics HTTP server.
//!
//! When `--metrics-addr` is set, serves the engine's node and counter
//! metrics on `GET /metrics`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use deepsleep_engine::EnergySaver;

pub fn router(saver: Arc<EnergySaver>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(saver)
}

/// Start the metrics server.
pub async fn run(saver: Arc<EnergySaver>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(saver);
    tracing::info!(%addr, "prometheus metrics server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_handler(State(saver): State<Arc<EnergySaver>>) -> impl IntoResponse {
    let body = deepsleep_engine::metrics::render_prometheus(
        &saver.snapshots(),
        &saver.counters(),
        saver.config().report.energy_reduction_percent,
    );
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}
