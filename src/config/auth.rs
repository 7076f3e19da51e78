use anyhow::{bail, Result};

use super::CustomerToml;

/// Resolved downstream TSDB credentials for one tenant.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    FromConfig,
    FromEnv,
}

impl std::str::FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "from-config" => Ok(AuthMode::FromConfig),
            "from-env" => Ok(AuthMode::FromEnv),
            other => bail!(
                "unknown auth-mode `{other}`, expected `from-config` or `from-env`"
            ),
        }
    }
}

/// Resolve a tenant's downstream credentials per the configured auth mode.
/// When `auth_enabled` is false the router writes without basic auth
/// regardless of mode.
pub fn resolve(mode: AuthMode, auth_enabled: bool, customer: &CustomerToml) -> Result<Credentials> {
    if !auth_enabled {
        return Ok(Credentials::default());
    }
    match mode {
        AuthMode::FromConfig => {
            let auth = customer.auth.as_ref().ok_or_else(|| {
                anyhow::anyhow!(
                    "customer `{}` uses auth-mode from-config but has no [customers.auth] block",
                    customer.name
                )
            })?;
            Ok(Credentials {
                username: Some(auth.username.clone()),
                password: Some(auth.password.clone()),
            })
        }
        AuthMode::FromEnv => {
            // Tenants are keyed by API key (§4.7), not by display name — a
            // tenant's `name` and `api_key` may differ.
            let user_var = format!("username_{}", customer.api_key);
            let pass_var = format!("password_{}", customer.api_key);
            let username = std::env::var(&user_var).ok();
            let password = std::env::var(&pass_var).ok();
            if username.is_none() || password.is_none() {
                bail!(
                    "customer `{}` uses auth-mode from-env but {user_var}/{pass_var} are not both set",
                    customer.name
                );
            }
            Ok(Credentials { username, password })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustomerToml;

    fn customer(auth: Option<crate::config::AuthToml>) -> CustomerToml {
        CustomerToml {
            name: "acme".into(),
            api_key: "KA".into(),
            influx_db_name: "dbA".into(),
            influx_hosts: vec!["http://b1".into()],
            outgoing_queue_cap: None,
            retry_queue_cap: None,
            auth,
        }
    }

    #[test]
    fn disabled_auth_yields_no_credentials() {
        let creds = resolve(AuthMode::FromConfig, false, &customer(None)).unwrap();
        assert!(creds.username.is_none());
        assert!(creds.password.is_none());
    }

    #[test]
    fn from_config_reads_inline_block() {
        let c = customer(Some(crate::config::AuthToml {
            username: "u".into(),
            password: "p".into(),
        }));
        let creds = resolve(AuthMode::FromConfig, true, &c).unwrap();
        assert_eq!(creds.username.as_deref(), Some("u"));
        assert_eq!(creds.password.as_deref(), Some("p"));
    }

    #[test]
    fn from_config_without_block_is_an_error() {
        assert!(resolve(AuthMode::FromConfig, true, &customer(None)).is_err());
    }

    #[test]
    fn unknown_auth_mode_is_rejected() {
        assert!("bogus".parse::<AuthMode>().is_err());
    }

    #[test]
    fn from_env_keys_on_api_key_not_name() {
        // name and api_key deliberately differ to catch resolution by the
        // wrong field.
        let mut c = customer(None);
        c.name = "acme-display-name".into();
        c.api_key = "ENVTEST_APIKEY".into();
        std::env::set_var("username_ENVTEST_APIKEY", "envuser");
        std::env::set_var("password_ENVTEST_APIKEY", "envpass");

        let creds = resolve(AuthMode::FromEnv, true, &c).unwrap();

        std::env::remove_var("username_ENVTEST_APIKEY");
        std::env::remove_var("password_ENVTEST_APIKEY");

        assert_eq!(creds.username.as_deref(), Some("envuser"));
        assert_eq!(creds.password.as_deref(), Some("envpass"));
    }
}
