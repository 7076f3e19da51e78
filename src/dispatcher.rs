use std::sync::Arc;

use tokio::sync::mpsc;

use crate::metrics::TaskTracker;
use crate::model::Batch;
use crate::routing::RoutingTable;

/// Single consumer of the ingress queue. For each batch, offers a copy to
/// every backend of its tenant; a full backend queue only drops that one
/// copy, never the others (§4.2). One transient task per (batch, backend)
/// keeps a full queue on one backend from delaying the offer to another.
pub async fn run_dispatcher(
    mut ingress_rx: mpsc::Receiver<Batch>,
    routing: Arc<RoutingTable>,
    tasks: TaskTracker,
) {
    while let Some(batch) = ingress_rx.recv().await {
        let Some(tenant) = routing.get(&batch.api_key) else {
            // The key was validated at ingress; a miss here means the
            // routing table changed shape between validation and dispatch,
            // which cannot happen since it is immutable after startup.
            tracing::error!(api_key = %batch.api_key, "dispatched batch for unknown tenant");
            continue;
        };
        for backend in tenant.backends.values() {
            let backend = Arc::clone(backend);
            let batch = batch.clone();
            tasks.spawn(async move {
                if !backend.offer_outgoing(batch.clone()) {
                    tracing::warn!(backend = %backend.url, batch = %batch.id, "outgoing queue full, dropping copy");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::auth::AuthMode;
    use crate::config::{CustomerToml, TomlConfig};

    fn single_tenant_two_backends() -> (RoutingTable, Vec<crate::routing::BackendHandle>) {
        let toml = TomlConfig {
            customers: vec![CustomerToml {
                name: "acme".into(),
                api_key: "KA".into(),
                influx_db_name: "dbA".into(),
                influx_hosts: vec!["http://b1".into(), "http://b2".into()],
                outgoing_queue_cap: Some(4),
                retry_queue_cap: Some(4),
                auth: None,
            }],
        };
        crate::routing::build(&toml, AuthMode::FromConfig, false).unwrap()
    }

    #[tokio::test]
    async fn fans_out_to_every_backend() {
        let (table, handles) = single_tenant_two_backends();
        let table = Arc::new(table);
        let (tx, rx) = mpsc::channel(8);
        let dispatcher = tokio::spawn(run_dispatcher(
            rx,
            Arc::clone(&table),
            crate::metrics::TaskTracker::new(),
        ));

        let batch = crate::model::Batch::new("1".into(), bytes::Bytes::from_static(b"XX"), "KA".into());
        tx.send(batch).await.unwrap();
        drop(tx);
        dispatcher.await.unwrap();

        // give the spawned per-(batch,backend) tasks a moment to run
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let tenant = table.get("KA").unwrap();
        for handle in &handles {
            let backend = tenant.backends.get(&handle.backend.url).unwrap();
            assert_eq!(backend.outgoing_len(), 1, "backend {} should have one queued batch", backend.url);
        }
    }
}
