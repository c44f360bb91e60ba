//! HTTP exporter for the Prometheus registry.

use crate::config::MetricsConfig;
use crate::metrics::{MetricsError, MetricsRegistry};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// A bound `/metrics` + `/health` endpoint.
///
/// Prometheus metrics are internally synchronized, so the registry is
/// shared as-is and updated by the caller while the server runs.
pub struct MetricsServer {
    listener: TcpListener,
    registry: Arc<MetricsRegistry>,
}

impl MetricsServer {
    /// Binds all interfaces on the configured port.
    pub async fn bind(
        config: &MetricsConfig,
        registry: Arc<MetricsRegistry>,
    ) -> Result<Self, MetricsError> {
        Self::bind_addr(([0, 0, 0, 0], config.port).into(), registry).await
    }

    pub async fn bind_addr(
        addr: SocketAddr,
        registry: Arc<MetricsRegistry>,
    ) -> Result<Self, MetricsError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, MetricsError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves requests until the task is cancelled.
    pub async fn serve(self) -> Result<(), MetricsError> {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, "Metrics server listening");
        }
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(|| async { (StatusCode::OK, "OK") }))
            .layer(CorsLayer::permissive())
            .with_state(self.registry);

        axum::serve(self.listener, app).await?;
        Ok(())
    }
}

async fn metrics_handler(State(registry): State<Arc<MetricsRegistry>>) -> impl IntoResponse {
    match registry.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics encoding failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; charset=utf-8")],
                e.to_string(),
            )
        }
    }
}
