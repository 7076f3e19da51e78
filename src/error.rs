/// Fatal, startup-only error taxonomy (§7). Anything that happens after a
/// listener is bound is resolved inline as an HTTP status or a log-and-drop,
/// never surfaced through this enum. Config parsing/validation errors flow
/// through `anyhow::Error` directly (via `?`/`.context` in `run()`) rather
/// than through this enum, since they already carry rich field-level
/// context from `TomlConfig::load_from_path`/`config::auth::resolve`.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
