use std::path::PathBuf;

use clap::Parser;

/// Process-wide settings. Tenant data lives in the TOML file pointed to by
/// `config_file`; everything here is topology/ops knobs. Every flag is also
/// readable as an `INFLUX_`-prefixed environment variable (e.g.
/// `INFLUX_LISTEN_ADDR`), with CLI taking precedence when both are set.
#[derive(Debug, Clone, Parser)]
#[command(name = "tsdb-router", about = "Multi-tenant TSDB ingestion router")]
pub struct Cli {
    #[arg(long, env = "INFLUX_LISTEN_ADDR", default_value = "0.0.0.0")]
    pub listen_addr: String,

    #[arg(long, env = "INFLUX_LISTEN_HTTP_PORT", default_value_t = 80)]
    pub listen_http_port: u16,

    #[arg(long, env = "INFLUX_LISTEN_HTTPS_PORT", default_value_t = 443)]
    pub listen_https_port: u16,

    #[arg(long, env = "INFLUX_SSL_CERT", default_value = "")]
    pub ssl_cert: String,

    #[arg(long, env = "INFLUX_SSL_KEY", default_value = "")]
    pub ssl_key: String,

    #[arg(long, env = "INFLUX_API_LISTEN_ADDR", default_value = "127.0.0.1")]
    pub api_listen_addr: String,

    #[arg(long, env = "INFLUX_API_LISTEN_HTTP_PORT", default_value_t = 8080)]
    pub api_listen_http_port: u16,

    #[arg(long, env = "INFLUX_INCOMING_QUEUE_CAP", default_value_t = 500_000)]
    pub incoming_queue_cap: usize,

    #[arg(long, env = "INFLUX_CONFIG_FILE", default_value = "config.toml")]
    pub config_file: PathBuf,

    #[arg(long, env = "INFLUX_API_KEY_HEADER_NAME", default_value = "Service-API-Key")]
    pub api_key_header_name: String,

    #[arg(long, env = "INFLUX_AUTH_ENABLED", default_value_t = false)]
    pub auth_enabled: bool,

    #[arg(long, env = "INFLUX_AUTH_MODE", default_value = "from-config")]
    pub auth_mode: String,

    #[arg(long, env = "INFLUX_WAIT_BEFORE_SHUTDOWN", default_value_t = 1)]
    pub wait_before_shutdown: u64,

    #[arg(long, env = "INFLUX_STATSD_SERVER", default_value = "localhost:8125")]
    pub statsd_server: String,

    #[arg(long, env = "INFLUX_STATS_INTERVAL", default_value_t = 30)]
    pub stats_interval: u64,

    #[arg(long, env = "INFLUX_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    #[arg(long, env = "INFLUX_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn https_enabled(&self) -> bool {
        !self.ssl_cert.is_empty() && !self.ssl_key.is_empty()
    }
}
