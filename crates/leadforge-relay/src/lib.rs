//! # leadforge-relay
//!
//! Outbound half of the workflow relay: POSTs signed run requests to n8n
//! webhooks, and the signature check the API uses on the inbound callback.
//!
//! ```rust
//! use leadforge_relay::signing;
//!
//! let body = br#"{"status":"success"}"#;
//! let header = signing::sign("workflow-secret", body);
//! assert!(signing::verify("workflow-secret", body, &header));
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod signing;

pub use client::{
    Delivery, Dispatch, RelayClient, RelayRequest, EVENT_HEADER, RUN_HEADER, SIGNATURE_HEADER,
};
pub use config::{check_http_url, ConfigError, RelayConfig};
pub use error::{RelayError, RelayResult};
