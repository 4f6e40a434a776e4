//! Relay errors.

use thiserror::Error;

/// Failures talking to the workflow tool.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Connection refused, DNS failure, TLS failure, and the like.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// The webhook answered with a non-2xx status.
    #[error("Webhook returned HTTP {status}")]
    Status { status: u16, body: String },

    /// The workflow URL cannot be used.
    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    /// HTTP status the webhook answered with, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            RelayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<RelayError> for leadforge_core::Error {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::InvalidUrl(msg) => leadforge_core::Error::InvalidInput(msg),
            other => leadforge_core::Error::Relay(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accessor() {
        let err = RelayError::Status {
            status: 503,
            body: "down".into(),
        };
        assert_eq!(err.status(), Some(503));
        assert_eq!(RelayError::Timeout(10).status(), None);
    }

    #[test]
    fn test_core_error_mapping() {
        let core: leadforge_core::Error = RelayError::Timeout(10).into();
        assert!(matches!(core, leadforge_core::Error::Relay(_)));

        let core: leadforge_core::Error = RelayError::InvalidUrl("ftp://x".into()).into();
        assert!(matches!(core, leadforge_core::Error::InvalidInput(_)));
    }
}
