//! Outbound HTTP client for workflow webhooks.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::signing;

pub const EVENT_HEADER: &str = "X-Leadforge-Event";
pub const RUN_HEADER: &str = "X-Leadforge-Run";
pub const SIGNATURE_HEADER: &str = "X-Leadforge-Signature";
const API_KEY_HEADER: &str = "X-N8N-API-KEY";

/// Longest webhook response body kept for diagnostics.
const MAX_ERROR_BODY: usize = 2048;

/// JSON body POSTed to a workflow webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayRequest {
    pub run_id: Uuid,
    pub company_id: Uuid,
    /// Event type, `"manual"`, or `"campaign.launch"`.
    pub trigger: String,
    pub payload: serde_json::Value,
    pub callback_url: String,
}

/// One webhook call.
#[derive(Debug, Clone)]
pub struct Dispatch<'a> {
    pub url: &'a str,
    pub secret: Option<&'a str>,
    pub request: &'a RelayRequest,
}

/// Successful webhook answer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub status: u16,
    /// Parsed JSON body when the webhook returned one.
    pub body: Option<serde_json::Value>,
}

/// Relay client. Cheap to clone; shares one connection pool.
#[derive(Clone)]
pub struct RelayClient {
    client: Client,
    config: RelayConfig,
}

impl RelayClient {
    pub fn new(config: RelayConfig) -> RelayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Transport(format!("Failed to create HTTP client: {e}")))?;

        info!(
            subsystem = "relay",
            component = "client",
            timeout_secs = config.timeout_secs,
            "Initializing workflow relay client"
        );
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn callback_url(&self, run_id: Uuid) -> String {
        self.config.callback_url(run_id)
    }

    /// POST a signed relay request. Any non-2xx answer is an error.
    pub async fn send(&self, dispatch: Dispatch<'_>) -> RelayResult<Delivery> {
        let url = self.config.resolve_webhook_url(dispatch.url)?;
        let body = serde_json::to_vec(dispatch.request)?;
        let run_id = dispatch.request.run_id;

        let mut req = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(EVENT_HEADER, dispatch.request.trigger.as_str())
            .header(RUN_HEADER, run_id.to_string());

        if let Some(secret) = dispatch.secret {
            req = req.header(SIGNATURE_HEADER, signing::sign(secret, &body));
        }
        if let Some(ref api_key) = self.config.api_key {
            req = req.header(API_KEY_HEADER, api_key);
        }

        let start = Instant::now();
        let response = req.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                RelayError::Timeout(self.config.timeout_secs)
            } else {
                RelayError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let duration_ms = start.elapsed().as_millis() as u64;

        if !(200..300).contains(&status) {
            warn!(
                subsystem = "relay",
                component = "client",
                op = "send",
                run_id = %run_id,
                http_status = status,
                duration_ms,
                "Workflow webhook rejected the run"
            );
            return Err(RelayError::Status {
                status,
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        debug!(
            subsystem = "relay",
            component = "client",
            op = "send",
            run_id = %run_id,
            http_status = status,
            duration_ms,
            "Workflow webhook accepted the run"
        );
        Ok(Delivery {
            status,
            body: serde_json::from_str(&text).ok(),
        })
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        // 'é' is two bytes; cutting inside it backs off.
        assert_eq!(truncate("aé", 2), "a");
    }

    #[test]
    fn test_request_serializes_all_fields() {
        let req = RelayRequest {
            run_id: Uuid::nil(),
            company_id: Uuid::nil(),
            trigger: "manual".into(),
            payload: serde_json::json!({"k": 1}),
            callback_url: "http://x/cb".into(),
        };
        let v = serde_json::to_value(&req).unwrap();
        for key in ["run_id", "company_id", "trigger", "payload", "callback_url"] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
    }
}
