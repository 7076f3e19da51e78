use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::config::TomlConfig;

/// Read-only admin listener (C9), independent of the ingress listener and
/// bound by default to localhost. Per §9's documented deviation from the
/// original, the password field is masked before serialization; operators
/// must still firewall this interface since backend topology and usernames
/// remain visible.
#[derive(Clone)]
pub struct AdminState {
    pub config: Arc<TomlConfig>,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/api/v1/config", get(config_handler))
        .with_state(state)
}

async fn config_handler(State(state): State<AdminState>) -> Json<TomlConfig> {
    Json(mask_passwords(&state.config))
}

fn mask_passwords(config: &TomlConfig) -> TomlConfig {
    let mut masked = config.clone();
    for customer in &mut masked.customers {
        if let Some(auth) = &mut customer.auth {
            auth.password = "***".to_string();
        }
    }
    masked
}
