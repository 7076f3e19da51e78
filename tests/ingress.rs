use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use tsdb_router::config::auth::AuthMode;
use tsdb_router::config::{CustomerToml, TomlConfig};
use tsdb_router::ingress::{self, IngressState};
use tsdb_router::liveness::LivenessGate;
use tsdb_router::routing;

const HEADER: &str = "Service-API-Key";

fn single_tenant_config() -> TomlConfig {
    TomlConfig {
        customers: vec![CustomerToml {
            name: "acme".into(),
            api_key: "KA".into(),
            influx_db_name: "dbA".into(),
            influx_hosts: vec!["http://b1".into(), "http://b2".into()],
            outgoing_queue_cap: None,
            retry_queue_cap: None,
            auth: None,
        }],
    }
}

fn connect_request(method: &str, uri: &str, headers: &[(&str, &str)], body: &'static str) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let mut request = builder.body(Body::from(body)).unwrap();
    let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

async fn build_app(ingress_cap: usize) -> (axum::Router, tokio::sync::mpsc::Receiver<tsdb_router::model::Batch>) {
    let toml = single_tenant_config();
    let (table, _handles) = routing::build(&toml, AuthMode::FromConfig, false).unwrap();
    let routing = Arc::new(table);
    let (tx, rx) = tokio::sync::mpsc::channel(ingress_cap.max(1));
    let (_gate, reader) = LivenessGate::new();
    let state = IngressState {
        routing,
        ingress_tx: tx,
        ingress_cap,
        api_key_header: HEADER.to_string(),
        liveness: reader,
    };
    (ingress::router(state), rx)
}

#[tokio::test]
async fn happy_path_accepts_and_enqueues() {
    let (app, mut rx) = build_app(8).await;
    let request = connect_request("POST", "/write", &[(HEADER, "KA"), ("content-encoding", "gzip")], "XX");
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let batch = rx.recv().await.unwrap();
    assert_eq!(batch.api_key, "KA");
    assert_eq!(&batch.body[..], b"XX");
}

#[tokio::test]
async fn unknown_key_is_rejected_without_enqueue() {
    let (app, mut rx) = build_app(8).await;
    let request = connect_request("POST", "/write", &[(HEADER, "KZ"), ("content-encoding", "gzip")], "XX");
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn missing_encoding_is_rejected_without_enqueue() {
    let (app, mut rx) = build_app(8).await;
    let request = connect_request("POST", "/write", &[(HEADER, "KA")], "XX");
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn full_ingress_queue_drops_with_200() {
    let (app, mut rx) = build_app(1).await;

    let first = connect_request("POST", "/write", &[(HEADER, "KA"), ("content-encoding", "gzip")], "XX");
    let response = app.clone().oneshot(first).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let second = connect_request("POST", "/write", &[(HEADER, "KA"), ("content-encoding", "gzip")], "YY");
    let response = app.clone().oneshot(second).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // only the first batch made it onto the queue
    let batch = rx.recv().await.unwrap();
    assert_eq!(&batch.body[..], b"XX");
}

#[tokio::test]
async fn zero_capacity_queue_drops_every_batch() {
    let (app, mut rx) = build_app(0).await;

    for body in ["XX", "YY", "ZZ"] {
        let request = connect_request("POST", "/write", &[(HEADER, "KA"), ("content-encoding", "gzip")], body);
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert!(rx.try_recv().is_err(), "no batch should ever reach the queue");
}

#[tokio::test]
async fn health_reports_serving_by_default() {
    let (app, _rx) = build_app(8).await;
    let request = Request::builder().method("GET").uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
