pub mod admin;
pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod ingress;
pub mod liveness;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod prober;
pub mod routing;
pub mod writer;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};

use crate::config::auth::AuthMode;
use crate::config::cli::Cli;
use crate::config::TomlConfig;
use crate::logging::LogFormat;

/// Races SIGINT/SIGTERM, grounded in the axum server's own
/// `ctrl_c`/SIGTERM-race shutdown pattern.
async fn wait_for_os_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.changed().await;
}

pub async fn run(cli: Cli) -> Result<()> {
    let log_format: LogFormat = cli.log_format.parse().unwrap_or(LogFormat::Text);
    logging::init_tracing(log_format, &cli.log_level);

    if cli.https_enabled() {
        tracing::warn!(
            "ssl-cert/ssl-key configured; this build expects TLS termination in a front-door proxy, not in-process on listen-https-port"
        );
    }

    let toml_config = TomlConfig::load_from_path(&cli.config_file)
        .with_context(|| format!("loading config file {}", cli.config_file.display()))?;
    let auth_mode: AuthMode = cli.auth_mode.parse()?;

    let (routing_table, backend_handles) = routing::build(&toml_config, auth_mode, cli.auth_enabled)?;
    let routing = Arc::new(routing_table);

    tracing::info!(
        tenants = routing.len(),
        backends = backend_handles.len(),
        "routing table built"
    );

    // tokio's mpsc rejects a zero-size buffer, so the channel itself always
    // has room for at least one message; a configured cap of 0 is enforced
    // separately in the ingress handler via `IngressState::ingress_cap`.
    let (ingress_tx, ingress_rx) = mpsc::channel(cli.incoming_queue_cap.max(1));
    let tasks = metrics::TaskTracker::new();

    tokio::spawn(dispatcher::run_dispatcher(
        ingress_rx,
        Arc::clone(&routing),
        tasks.clone(),
    ));

    for handle in backend_handles {
        let routing::BackendHandle {
            backend,
            queues,
            tenant_name: _,
            database,
            credentials,
        } = handle;
        let backend::BackendQueues { outgoing_rx, retry_rx } = queues;

        let write_client = writer::build_http_client().context("building backend http client")?;
        let probe_client = reqwest::Client::new();

        tokio::spawn(prober::run_prober(Arc::clone(&backend), probe_client));
        tokio::spawn(writer::run_writer(
            Arc::clone(&backend),
            outgoing_rx,
            database.clone(),
            credentials.clone(),
            write_client.clone(),
            tasks.clone(),
        ));
        tokio::spawn(writer::run_retry_worker(
            backend,
            retry_rx,
            database,
            credentials,
            write_client,
            tasks.clone(),
        ));
    }

    let (gate, liveness_reader) = liveness::LivenessGate::new();
    let (shutdown_tx, shutdown_rx1) = watch::channel(false);
    let shutdown_rx2 = shutdown_rx1.clone();

    let grace = Duration::from_secs(cli.wait_before_shutdown);
    tokio::spawn(async move {
        wait_for_os_signal().await;
        tracing::info!("shutdown signal received, draining");
        gate.drain();
        tokio::time::sleep(grace).await;
        let _ = shutdown_tx.send(true);
    });

    tokio::spawn(metrics::run_exporter(
        metrics::ExporterConfig {
            interval: Duration::from_secs(cli.stats_interval),
            statsd_addr: cli.statsd_server.clone(),
            ingress_cap: cli.incoming_queue_cap,
        },
        Arc::clone(&routing),
        ingress_tx.clone(),
        tasks.clone(),
    ));

    let ingress_state = ingress::IngressState {
        routing: Arc::clone(&routing),
        ingress_tx,
        ingress_cap: cli.incoming_queue_cap,
        api_key_header: cli.api_key_header_name.clone(),
        liveness: liveness_reader,
    };
    let ingress_addr: SocketAddr = format!("{}:{}", cli.listen_addr, cli.listen_http_port)
        .parse()
        .context("parsing ingress listen address")?;
    let ingress_listener = tokio::net::TcpListener::bind(ingress_addr)
        .await
        .map_err(|source| error::StartupError::Bind { addr: ingress_addr, source })?;
    tracing::info!(addr = %ingress_addr, "ingress listener bound");

    let admin_state = admin::AdminState {
        config: Arc::new(toml_config),
    };
    let admin_addr: SocketAddr = format!("{}:{}", cli.api_listen_addr, cli.api_listen_http_port)
        .parse()
        .context("parsing admin listen address")?;
    let admin_listener = tokio::net::TcpListener::bind(admin_addr)
        .await
        .map_err(|source| error::StartupError::Bind { addr: admin_addr, source })?;
    tracing::info!(addr = %admin_addr, "admin listener bound");

    let ingress_app = ingress::router(ingress_state).into_make_service_with_connect_info::<SocketAddr>();
    let admin_app = admin::router(admin_state);

    let ingress_server = axum::serve(ingress_listener, ingress_app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx1));
    let admin_server = axum::serve(admin_listener, admin_app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx2));

    tokio::try_join!(
        async { ingress_server.await.context("ingress server error") },
        async { admin_server.await.context("admin server error") },
    )?;

    Ok(())
}
