use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::Batch;
use crate::routing::RoutingTable;

/// Approximates a live async task count by incrementing/decrementing a
/// shared counter around the lifetime of every tracked worker/delivery
/// task (§4.9), the way the original approximates the same thing with
/// `runtime.NumGoroutine()`. Tokio has no equivalent introspection hook,
/// so this is tracked explicitly at each spawn site that uses it.
#[derive(Clone, Default)]
pub struct TaskTracker(Arc<AtomicI64>);

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Spawn `fut`, counting it as live from spawn until completion.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let counter = Arc::clone(&self.0);
        counter.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(async move {
            let result = fut.await;
            counter.fetch_sub(1, Ordering::Relaxed);
            result
        })
    }
}

/// Hand-rolled statsd-over-UDP client. No crate in the reachable dependency
/// set speaks statsd; the wire format is three lines of text, so this
/// follows the pack's convention of writing small wire protocols directly
/// rather than inventing a dependency (grounded in the original's
/// `stats/stats.go`, which does the same over a raw UDP `net.Conn`).
pub struct StatsdClient {
    socket: UdpSocket,
}

impl StatsdClient {
    pub async fn connect(addr: &str) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(addr).await?;
        Ok(Self { socket })
    }

    pub async fn gauge(&self, name: &str, value: i64) {
        self.send(&format!("{name}:{value}|g")).await;
    }

    pub async fn counter(&self, name: &str, value: u64) {
        self.send(&format!("{name}:{value}|c")).await;
    }

    async fn send(&self, line: &str) {
        if let Err(err) = self.socket.send(line.as_bytes()).await {
            tracing::debug!(error = %err, line, "statsd send failed");
        }
    }
}

/// Metric-name-safe rendering of a backend URL: strip the scheme, replace
/// `.`/`:` with `_`, mirroring the original's sanitization so dashboards
/// built against it keep working.
fn sanitize_url(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .replace(['.', ':'], "_")
}

/// Resident set size in bytes, read from `/proc/self/statm` (field 2,
/// pages) the way the original reads `runtime.MemStats`. No pack crate
/// wraps this cheaply on Linux, so it's read directly; returns `None` on
/// any non-Linux host or parse failure rather than erroring the exporter.
#[cfg(target_os = "linux")]
fn resident_set_bytes() -> Option<i64> {
    let contents = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: i64 = contents.split_whitespace().nth(1)?.parse().ok()?;
    let page_size = 4096i64;
    Some(pages * page_size)
}

#[cfg(not(target_os = "linux"))]
fn resident_set_bytes() -> Option<i64> {
    None
}

pub struct ExporterConfig {
    pub interval: Duration,
    pub statsd_addr: String,
    pub ingress_cap: usize,
}

/// Periodic tick: emits ingress queue depth, per-tenant per-backend queue
/// depths and health, per-tenant hit counters, process uptime, and live
/// task count (§4.9).
pub async fn run_exporter(
    config: ExporterConfig,
    routing: Arc<RoutingTable>,
    ingress_tx: mpsc::Sender<Batch>,
    tasks: TaskTracker,
) {
    let client = match StatsdClient::connect(&config.statsd_addr).await {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(error = %err, addr = %config.statsd_addr, "failed to connect statsd client, metrics disabled");
            return;
        }
    };
    let started_at = Instant::now();
    let mut ticker = tokio::time::interval(config.interval);

    loop {
        ticker.tick().await;

        let ingress_len = config.ingress_cap.saturating_sub(ingress_tx.capacity());
        client.gauge("influx_router.incoming_queue.size", ingress_len as i64).await;
        client.gauge("influx_router.incoming_queue.limit", config.ingress_cap as i64).await;

        for (api_key, tenant) in routing.iter() {
            let key_metric = api_key.replace('-', "_");
            let hits = tenant.take_hits();
            if hits > 0 {
                client.counter(&format!("influx_router.{key_metric}.hits"), hits).await;
            }
            for backend in tenant.backends.values() {
                let host_metric = sanitize_url(&backend.url);
                let prefix = format!("influx_router.{key_metric}.{host_metric}");
                client.gauge(&format!("{prefix}.outgoing_queue.size"), backend.outgoing_len() as i64).await;
                client.gauge(&format!("{prefix}.outgoing_queue.limit"), backend.outgoing_cap as i64).await;
                client.gauge(&format!("{prefix}.retry_queue.size"), backend.retry_len() as i64).await;
                client.gauge(&format!("{prefix}.retry_queue.limit"), backend.retry_cap as i64).await;
                let healthy = backend.is_healthy().await as i64;
                client.gauge(&format!("{prefix}.backend_health"), healthy).await;
            }
        }

        client.gauge("influx_router.uptime_seconds", started_at.elapsed().as_secs() as i64).await;
        client.gauge("influx_router.internal_stats.live_tasks", tasks.count()).await;
        if let Some(rss) = resident_set_bytes() {
            client.gauge("influx_router.internal_stats.rss_bytes", rss).await;
        }
    }
}
