use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::mpsc;

use crate::ids::next_batch_id;
use crate::liveness::LivenessReader;
use crate::model::Batch;
use crate::routing::RoutingTable;

#[derive(Clone)]
pub struct IngressState {
    pub routing: Arc<RoutingTable>,
    pub ingress_tx: mpsc::Sender<Batch>,
    /// The operator-configured capacity (may be 0). The channel backing
    /// `ingress_tx` always has room for at least one message — tokio's
    /// `mpsc` rejects a zero-size buffer — so a configured cap of 0 is
    /// special-cased here to always take the 200-drop path rather than
    /// silently rounding up to a capacity-1 queue.
    pub ingress_cap: usize,
    pub api_key_header: String,
    pub liveness: LivenessReader,
}

pub fn router(state: IngressState) -> Router {
    Router::new()
        .route("/write", post(write_handler))
        .route("/health", get(health_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

fn remote_host(headers: &HeaderMap, connect_info: Option<&SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        return forwarded.to_string();
    }
    connect_info.map(|a| a.to_string()).unwrap_or_else(|| "unknown".to_string())
}

async fn write_handler(
    State(state): State<IngressState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    method: axum::http::Method,
    uri: axum::http::Uri,
    body: Bytes,
) -> impl IntoResponse {
    let api_key = headers
        .get(state.api_key_header.as_str())
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let Some(tenant) = state.routing.get(&api_key) else {
        tracing::info!(api_key = %api_key, "rejecting write: unknown api key");
        return (StatusCode::UNAUTHORIZED, "").into_response();
    };

    if headers
        .get("content-encoding")
        .and_then(|v| v.to_str().ok())
        != Some("gzip")
    {
        return (StatusCode::BAD_REQUEST, "").into_response();
    }

    let batch_id = next_batch_id();
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info!(
        batch = %batch_id,
        remote = %remote_host(&headers, Some(&addr)),
        method = %method,
        uri = %uri,
        api_key = %api_key,
        user_agent,
        "ingress receipt"
    );

    tenant.record_hit();

    if state.ingress_cap == 0 {
        tracing::warn!(batch = %batch_id, api_key = %api_key, "ingress queue capacity is 0, dropping batch");
        return (StatusCode::OK, "").into_response();
    }

    let batch = Batch::new(batch_id.clone(), body, api_key.clone());
    match state.ingress_tx.try_send(batch) {
        Ok(()) => (StatusCode::NO_CONTENT, "").into_response(),
        Err(_) => {
            tracing::warn!(batch = %batch_id, api_key = %api_key, "ingress queue full, dropping batch");
            (StatusCode::OK, "").into_response()
        }
    }
}

async fn health_handler(State(state): State<IngressState>) -> impl IntoResponse {
    if state.liveness.is_serving() {
        (StatusCode::OK, "Ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_host_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(remote_host(&headers, Some(&addr)), "203.0.113.9");
    }

    #[test]
    fn remote_host_falls_back_to_connect_info() {
        let headers = HeaderMap::new();
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(remote_host(&headers, Some(&addr)), "127.0.0.1:9999");
    }
}
