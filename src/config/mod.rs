pub mod auth;
pub mod cli;

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level shape of the tenant configuration file: an array of
/// `[[customers]]` tables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TomlConfig {
    #[serde(rename = "customers")]
    pub customers: Vec<CustomerToml>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomerToml {
    pub name: String,
    pub api_key: String,
    pub influx_db_name: String,
    pub influx_hosts: Vec<String>,
    pub outgoing_queue_cap: Option<usize>,
    pub retry_queue_cap: Option<usize>,
    pub auth: Option<AuthToml>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthToml {
    pub username: String,
    pub password: String,
}

pub const DEFAULT_OUTGOING_QUEUE_CAP: usize = 4096;
pub const DEFAULT_RETRY_QUEUE_CAP: usize = 4096;

impl TomlConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let parsed: TomlConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<()> {
        if self.customers.is_empty() {
            bail!("config must declare at least one [[customers]] entry");
        }
        let mut seen_keys = std::collections::HashSet::new();
        for customer in &self.customers {
            if customer.name.trim().is_empty() {
                bail!("customer entry is missing a non-empty `name`");
            }
            if customer.api_key.trim().is_empty() {
                bail!("customer `{}` is missing a non-empty `api_key`", customer.name);
            }
            if !seen_keys.insert(customer.api_key.clone()) {
                bail!("duplicate api_key for customer `{}`", customer.name);
            }
            if customer.influx_db_name.trim().is_empty() {
                bail!(
                    "customer `{}` is missing a non-empty `influx_db_name`",
                    customer.name
                );
            }
            if customer.influx_hosts.is_empty() {
                bail!(
                    "customer `{}` must declare at least one host in `influx_hosts`",
                    customer.name
                );
            }
            for host in &customer.influx_hosts {
                url::Url::parse(host)
                    .with_context(|| format!("customer `{}` has an unparseable host `{host}`", customer.name))?;
            }
        }
        Ok(())
    }
}
