use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;

use crate::service::ReadinessFlag;

/// Liveness/readiness surface, bound to `http_port`.
pub fn health_router(readiness: ReadinessFlag) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(readiness)
}

/// Prometheus scrape surface, bound to its own `prometheus_port` so
/// metrics traffic doesn't share a listener with liveness probes.
pub fn metrics_router(metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz(State(readiness): State<ReadinessFlag>) -> impl IntoResponse {
    if readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics_handler(State(metrics_handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics_handle.render(),
    )
}

/// Binds `preferred_port`; if it's already taken, falls back to an
/// ephemeral free port and logs the fallback, per the port-selection
/// contract. Returns the listener and the port actually bound.
pub async fn bind_with_fallback(preferred_port: u16) -> std::io::Result<(TcpListener, u16)> {
    let preferred_addr = format!("0.0.0.0:{preferred_port}");
    match TcpListener::bind(&preferred_addr).await {
        Ok(listener) => Ok((listener, preferred_port)),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            tracing::warn!(preferred_port, error = %err, "preferred HTTP port unavailable, falling back to an ephemeral port");
            let listener = TcpListener::bind("0.0.0.0:0").await?;
            let actual_port = listener.local_addr()?.port();
            tracing::warn!(actual_port, "bound HTTP surface to fallback port");
            Ok((listener, actual_port))
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_when_preferred_port_is_taken() {
        let (held, held_port) = bind_with_fallback(0).await.unwrap();
        let (fallback, fallback_port) = bind_with_fallback(held_port).await.unwrap();
        assert_ne!(held_port, fallback_port);
        drop(held);
        drop(fallback);
    }

    #[tokio::test]
    async fn readyz_reflects_readiness_flag() {
        let readiness = ReadinessFlag::new();

        let response = readyz(State(readiness.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        readiness.set_ready();
        let response = readyz(State(readiness)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
