use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::backend::Backend;
use crate::config::auth::Credentials;
use crate::metrics::TaskTracker;
use crate::model::Batch;

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_IDLE_PER_HOST: usize = 10;

/// Substrings that mark a TSDB rejection as a known, non-retryable schema or
/// retention error rather than a transient failure. Grounded in the
/// original's error classification (`writer/client/http_client.go`).
const KNOWN_NONRETRYABLE_SUBSTRINGS: &[&str] = &[
    "database not found",
    "field type conflict",
    "points beyond retention policy",
    "unable to parse",
    "hinted handoff queue not empty",
];

#[derive(Debug, Deserialize)]
struct WriteErrorEnvelope {
    error: String,
}

pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_WRITE_TIMEOUT)
        .pool_max_idle_per_host(DEFAULT_MAX_IDLE_PER_HOST)
        .build()
}

fn write_url(backend_url: &str, database: &str) -> String {
    format!("{}/write?db={}", backend_url.trim_end_matches('/'), database)
}

fn is_known_nonretryable(message: &str) -> bool {
    KNOWN_NONRETRYABLE_SUBSTRINGS.iter().any(|needle| message.contains(needle))
}

/// One fire-and-forget delivery attempt. No retry on HTTP failure — the
/// only retry path is via the retry queue, driven by health, not by this
/// function's outcome (§9: keep the two signals separate).
pub async fn attempt_write(
    client: &reqwest::Client,
    backend_url: &str,
    database: &str,
    credentials: &Credentials,
    batch: &Batch,
) {
    let url = write_url(backend_url, database);
    let mut req = client
        .post(&url)
        .header("Content-Type", "text/plain")
        .header("Content-Encoding", "gzip")
        .body(batch.body.clone());
    if let (Some(user), Some(pass)) = (&credentials.username, &credentials.password) {
        req = req.basic_auth(user, Some(pass));
    }

    let response = match req.send().await {
        Ok(resp) => resp,
        Err(err) => {
            tracing::error!(backend = %backend_url, batch = %batch.id, error = %err, "write request failed");
            return;
        }
    };

    if response.status() == reqwest::StatusCode::NO_CONTENT {
        return;
    }

    let status = response.status();
    let body_text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<WriteErrorEnvelope>(&body_text)
        .map(|envelope| envelope.error)
        .unwrap_or(body_text);

    if is_known_nonretryable(&message) {
        tracing::warn!(
            backend = %backend_url,
            batch = %batch.id,
            status = %status,
            error = %message,
            "tsdb rejected batch, dropping (non-retryable)"
        );
    } else {
        tracing::error!(
            backend = %backend_url,
            batch = %batch.id,
            status = %status,
            error = %message,
            "tsdb write error, dropping"
        );
    }
}

/// Drains the outgoing queue. Healthy backends get a fire-and-forget write
/// task per batch; unhealthy ones divert the batch to the retry queue.
pub async fn run_writer(
    backend: Arc<Backend>,
    mut outgoing_rx: mpsc::Receiver<Batch>,
    database: String,
    credentials: Credentials,
    client: reqwest::Client,
    tasks: TaskTracker,
) {
    while let Some(batch) = outgoing_rx.recv().await {
        if backend.is_healthy().await {
            let client = client.clone();
            let backend_url = backend.url.clone();
            let database = database.clone();
            let credentials = credentials.clone();
            tasks.spawn(async move {
                attempt_write(&client, &backend_url, &database, &credentials, &batch).await;
            });
        } else if !backend.offer_retry(batch.clone()) {
            tracing::warn!(backend = %backend.url, batch = %batch.id, "retry queue full, dropping batch");
        }
    }
}

/// Drains the retry queue only while the backend is healthy; otherwise
/// sleeps a random [1, 3)s interval to decorrelate retry storms (§4.4, §9).
pub async fn run_retry_worker(
    backend: Arc<Backend>,
    mut retry_rx: mpsc::Receiver<Batch>,
    database: String,
    credentials: Credentials,
    client: reqwest::Client,
    tasks: TaskTracker,
) {
    loop {
        if backend.is_healthy().await {
            match retry_rx.try_recv() {
                Ok(batch) => {
                    let client = client.clone();
                    let backend_url = backend.url.clone();
                    let database = database.clone();
                    let credentials = credentials.clone();
                    tasks.spawn(async move {
                        attempt_write(&client, &backend_url, &database, &credentials, &batch).await;
                    });
                    continue;
                }
                Err(mpsc::error::TryRecvError::Empty) => {}
                Err(mpsc::error::TryRecvError::Disconnected) => return,
            }
        }
        let jitter_ms = rand::thread_rng().gen_range(1_000..3_000);
        tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
    }
}
