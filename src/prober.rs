use std::sync::Arc;

use crate::backend::Backend;

/// Periodically HEADs the backend's probe URL and feeds the outcome into
/// the health state machine. Runs for the lifetime of the process; there
/// is no way to stop an individual prober short of process exit, matching
/// the original's one-goroutine-per-backend-forever design.
pub async fn run_prober(backend: Arc<Backend>, client: reqwest::Client) {
    let probe = backend.probe.clone();
    let mut ticker = tokio::time::interval(probe.interval);
    // first tick fires immediately; skip it so we don't probe twice at t=0
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let success = probe_once(&client, &probe.url, probe.timeout).await;
        if let Some((old, new)) = backend.record_probe(success).await {
            tracing::info!(
                backend = %backend.url,
                was_healthy = old,
                now_healthy = new,
                "backend health transition"
            );
        }
    }
}

async fn probe_once(client: &reqwest::Client, url: &str, timeout: std::time::Duration) -> bool {
    match client.head(url).timeout(timeout).send().await {
        Ok(response) => response.status() == reqwest::StatusCode::NO_CONTENT,
        Err(err) => {
            tracing::debug!(url, error = %err, "health probe transport error");
            false
        }
    }
}
