//! Relay configuration.
//!
//! Loaded from environment variables:
//!
//! | Variable             | Meaning                                            |
//! |----------------------|----------------------------------------------------|
//! | `N8N_BASE_URL`       | Base for workflow URLs given as a path (`/webhook/x`) |
//! | `N8N_API_KEY`        | Sent as `X-N8N-API-KEY` when set                   |
//! | `RELAY_TIMEOUT_SECS` | Per-request timeout (default 10)                   |
//! | `PUBLIC_BASE_URL`    | Where n8n reaches this API for callbacks           |

use std::env;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use leadforge_core::defaults::{RELAY_TIMEOUT_SECS, SERVER_PORT};

use crate::error::{RelayError, RelayResult};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub public_base_url: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: RELAY_TIMEOUT_SECS,
            public_base_url: format!("http://localhost:{SERVER_PORT}"),
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let base_url = non_empty("N8N_BASE_URL")
            .map(|u| {
                check_http_url(&u).map_err(|reason| ConfigError::Invalid {
                    var: "N8N_BASE_URL",
                    reason,
                })?;
                Ok(u.trim_end_matches('/').to_string())
            })
            .transpose()?;

        let timeout_secs = match non_empty("RELAY_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "RELAY_TIMEOUT_SECS",
                        reason: format!("expected a positive integer, got {raw:?}"),
                    })
                }
            },
            None => defaults.timeout_secs,
        };

        let public_base_url = match non_empty("PUBLIC_BASE_URL") {
            Some(u) => {
                check_http_url(&u).map_err(|reason| ConfigError::Invalid {
                    var: "PUBLIC_BASE_URL",
                    reason,
                })?;
                u.trim_end_matches('/').to_string()
            }
            None => defaults.public_base_url,
        };

        let config = Self {
            base_url,
            api_key: non_empty("N8N_API_KEY"),
            timeout_secs,
            public_base_url,
        };
        debug!(
            subsystem = "relay",
            component = "config",
            base_url = ?config.base_url,
            timeout_secs = config.timeout_secs,
            public_base_url = %config.public_base_url,
            "Relay configuration loaded"
        );
        Ok(config)
    }

    /// URL the workflow tool should POST a run's outcome to.
    pub fn callback_url(&self, run_id: Uuid) -> String {
        format!("{}/api/v1/hooks/runs/{run_id}/callback", self.public_base_url)
    }

    /// Resolve a registered webhook URL. Absolute http(s) URLs pass through;
    /// a path is joined onto `N8N_BASE_URL`.
    pub fn resolve_webhook_url(&self, webhook_url: &str) -> RelayResult<String> {
        let url = webhook_url.trim();
        if url.starts_with('/') {
            return match &self.base_url {
                Some(base) => Ok(format!("{base}{url}")),
                None => Err(RelayError::InvalidUrl(format!(
                    "{url} is a path but N8N_BASE_URL is not set"
                ))),
            };
        }
        check_http_url(url).map_err(RelayError::InvalidUrl)?;
        Ok(url.to_string())
    }
}

/// Accept only `http://` / `https://` URLs with a host.
pub fn check_http_url(url: &str) -> Result<(), String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| format!("{url}: {e}"))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        "http" | "https" => Err(format!("{url}: missing host")),
        other => Err(format!("{url}: unsupported scheme {other}")),
    }
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_url() {
        let config = RelayConfig {
            public_base_url: "https://api.leadforge.io".into(),
            ..Default::default()
        };
        let id = Uuid::nil();
        assert_eq!(
            config.callback_url(id),
            "https://api.leadforge.io/api/v1/hooks/runs/00000000-0000-0000-0000-000000000000/callback"
        );
    }

    #[test]
    fn test_resolve_absolute_and_path() {
        let config = RelayConfig {
            base_url: Some("https://n8n.internal".into()),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_webhook_url("https://hooks.example.com/a").unwrap(),
            "https://hooks.example.com/a"
        );
        assert_eq!(
            config.resolve_webhook_url("/webhook/launch").unwrap(),
            "https://n8n.internal/webhook/launch"
        );
    }

    #[test]
    fn test_resolve_path_without_base_fails() {
        let config = RelayConfig::default();
        assert!(matches!(
            config.resolve_webhook_url("/webhook/launch"),
            Err(RelayError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_check_http_url() {
        assert!(check_http_url("http://localhost:5678/webhook/x").is_ok());
        assert!(check_http_url("ftp://example.com").is_err());
        assert!(check_http_url("not a url").is_err());
    }
}
