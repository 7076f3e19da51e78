use std::time::Duration;

use tokio::sync::{mpsc, RwLock};

use crate::model::Batch;

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub url: String,
    pub timeout: Duration,
    pub interval: Duration,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
}

impl ProbeConfig {
    pub fn defaults_for(base_url: &str) -> Self {
        Self {
            url: format!("{}/ping", base_url.trim_end_matches('/')),
            timeout: Duration::from_secs(3),
            interval: Duration::from_secs(5),
            healthy_threshold: 1,
            unhealthy_threshold: 2,
        }
    }
}

#[derive(Debug, Default)]
struct HealthState {
    healthy: bool,
    healthy_streak: u32,
    unhealthy_streak: u32,
}

/// One downstream TSDB host. Owns its bounded outgoing/retry queues (the
/// receiving ends are handed to the writer/retry workers at construction
/// time, see [`Backend::new`]) and a reader/writer-locked health flag
/// mutated only by the health prober.
pub struct Backend {
    pub url: String,
    pub outgoing_cap: usize,
    pub retry_cap: usize,
    pub probe: ProbeConfig,
    outgoing_tx: mpsc::Sender<Batch>,
    retry_tx: mpsc::Sender<Batch>,
    health: RwLock<HealthState>,
}

/// The receiving halves of a backend's queues, owned by the writer/retry
/// worker tasks spawned for this backend.
pub struct BackendQueues {
    pub outgoing_rx: mpsc::Receiver<Batch>,
    pub retry_rx: mpsc::Receiver<Batch>,
}

impl Backend {
    pub fn new(url: String, outgoing_cap: usize, retry_cap: usize, probe: ProbeConfig) -> (Self, BackendQueues) {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(outgoing_cap.max(1));
        let (retry_tx, retry_rx) = mpsc::channel(retry_cap.max(1));
        let backend = Self {
            url,
            outgoing_cap,
            retry_cap,
            probe,
            outgoing_tx,
            retry_tx,
            health: RwLock::new(HealthState::default()),
        };
        (backend, BackendQueues { outgoing_rx, retry_rx })
    }

    /// Offer a batch to the outgoing queue without blocking. Returns `false`
    /// (and drops the batch) if the queue is full.
    pub fn offer_outgoing(&self, batch: Batch) -> bool {
        self.outgoing_tx.try_send(batch).is_ok()
    }

    /// Offer a batch to the retry queue without blocking.
    pub fn offer_retry(&self, batch: Batch) -> bool {
        self.retry_tx.try_send(batch).is_ok()
    }

    pub fn outgoing_len(&self) -> usize {
        self.outgoing_cap.saturating_sub(self.outgoing_tx.capacity())
    }

    pub fn retry_len(&self) -> usize {
        self.retry_cap.saturating_sub(self.retry_tx.capacity())
    }

    pub async fn is_healthy(&self) -> bool {
        self.health.read().await.healthy
    }

    /// Record one probe outcome and apply the compare-then-reset streak
    /// state machine (§4.5). Returns `Some((old, new))` when the flag
    /// actually flips, for logging by the caller.
    pub async fn record_probe(&self, success: bool) -> Option<(bool, bool)> {
        let mut state = self.health.write().await;
        let old = state.healthy;
        if success {
            state.unhealthy_streak = 0;
            if !state.healthy {
                state.healthy_streak += 1;
                if state.healthy_streak >= self.probe.healthy_threshold {
                    state.healthy = true;
                    state.healthy_streak = 0;
                }
            }
        } else {
            state.healthy_streak = 0;
            if state.healthy {
                state.unhealthy_streak += 1;
                if state.unhealthy_streak >= self.probe.unhealthy_threshold {
                    state.healthy = false;
                    state.unhealthy_streak = 0;
                }
            }
        }
        let new = state.healthy;
        if old != new {
            Some((old, new))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(h: u32, u: u32) -> ProbeConfig {
        ProbeConfig {
            url: "http://x/ping".into(),
            timeout: Duration::from_secs(1),
            interval: Duration::from_secs(1),
            healthy_threshold: h,
            unhealthy_threshold: u,
        }
    }

    #[tokio::test]
    async fn starts_unhealthy() {
        let (b, _q) = Backend::new("http://x".into(), 4, 4, probe(1, 2));
        assert!(!b.is_healthy().await);
    }

    #[tokio::test]
    async fn h1_u1_toggles_every_probe() {
        let (b, _q) = Backend::new("http://x".into(), 4, 4, probe(1, 1));
        assert_eq!(b.record_probe(true).await, Some((false, true)));
        assert_eq!(b.record_probe(false).await, Some((true, false)));
        assert_eq!(b.record_probe(true).await, Some((false, true)));
    }

    #[tokio::test]
    async fn u2_requires_two_consecutive_failures() {
        let (b, _q) = Backend::new("http://x".into(), 4, 4, probe(1, 2));
        assert_eq!(b.record_probe(true).await, Some((false, true)));
        // one failure between successes: does not flip
        assert_eq!(b.record_probe(false).await, None);
        assert!(b.is_healthy().await);
        assert_eq!(b.record_probe(true).await, None);
        assert!(b.is_healthy().await);
        // two consecutive failures: flips
        assert_eq!(b.record_probe(false).await, None);
        assert_eq!(b.record_probe(false).await, Some((true, false)));
        assert!(!b.is_healthy().await);
    }

    #[tokio::test]
    async fn offers_respect_capacity() {
        let (b, _q) = Backend::new("http://x".into(), 1, 1, probe(1, 2));
        let batch = Batch::new("1".into(), bytes::Bytes::new(), "K".into());
        assert!(b.offer_outgoing(batch.clone()));
        assert!(!b.offer_outgoing(batch));
        assert_eq!(b.outgoing_len(), 1);
    }
}
