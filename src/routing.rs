use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::backend::{Backend, BackendQueues, ProbeConfig};
use crate::config::auth::{self, AuthMode, Credentials};
use crate::config::{TomlConfig, DEFAULT_OUTGOING_QUEUE_CAP, DEFAULT_RETRY_QUEUE_CAP};

/// Everything a writer/retry task needs about the backend it was spawned
/// for, plus the queue receiving halves it owns exclusively.
pub struct BackendHandle {
    pub backend: Arc<Backend>,
    pub queues: BackendQueues,
    pub tenant_name: String,
    pub database: String,
    pub credentials: Credentials,
}

pub struct TenantConfig {
    pub name: String,
    pub database: String,
    pub credentials: Credentials,
    /// Keyed by backend URL. Per §9 design notes, independent even when two
    /// tenants share a URL — the URL string itself is the map key, a pure
    /// function with no need for a separate hash.
    pub backends: HashMap<String, Arc<Backend>>,
    pub hits: AtomicU64,
}

impl TenantConfig {
    /// Reset and return the hit count accumulated since the last export
    /// tick, for the metrics exporter's counter-delta semantics.
    pub fn take_hits(&self) -> u64 {
        self.hits.swap(0, Ordering::Relaxed)
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }
}

/// Immutable API-key -> tenant mapping. Built once at startup; never
/// mutated afterward, so no synchronization is needed to read it.
pub struct RoutingTable {
    tenants: HashMap<String, TenantConfig>,
}

impl RoutingTable {
    pub fn get(&self, api_key: &str) -> Option<&TenantConfig> {
        self.tenants.get(api_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TenantConfig)> {
        self.tenants.iter()
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

/// Materialize the routing table and one [`Backend`] per (tenant, URL) pair.
/// Returns the table plus the backend handles the caller must spawn
/// writer/retry/prober tasks for.
pub fn build(
    toml: &TomlConfig,
    auth_mode: AuthMode,
    auth_enabled: bool,
) -> Result<(RoutingTable, Vec<BackendHandle>)> {
    let mut tenants = HashMap::with_capacity(toml.customers.len());
    let mut handles = Vec::new();

    for customer in &toml.customers {
        let credentials = auth::resolve(auth_mode, auth_enabled, customer)?;
        let outgoing_cap = customer.outgoing_queue_cap.unwrap_or(DEFAULT_OUTGOING_QUEUE_CAP);
        let retry_cap = customer.retry_queue_cap.unwrap_or(DEFAULT_RETRY_QUEUE_CAP);

        let mut backends = HashMap::with_capacity(customer.influx_hosts.len());
        for host in &customer.influx_hosts {
            let probe = ProbeConfig::defaults_for(host);
            let (backend, queues) = Backend::new(host.clone(), outgoing_cap, retry_cap, probe);
            let backend = Arc::new(backend);
            backends.insert(host.clone(), Arc::clone(&backend));
            handles.push(BackendHandle {
                backend,
                queues,
                tenant_name: customer.name.clone(),
                database: customer.influx_db_name.clone(),
                credentials: credentials.clone(),
            });
        }

        tenants.insert(
            customer.api_key.clone(),
            TenantConfig {
                name: customer.name.clone(),
                database: customer.influx_db_name.clone(),
                credentials,
                backends,
                hits: AtomicU64::new(0),
            },
        );
    }

    Ok((RoutingTable { tenants }, handles))
}
