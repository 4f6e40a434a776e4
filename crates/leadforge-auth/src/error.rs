//! Error types for authentication primitives.

use thiserror::Error;

/// Authentication errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Password hashing failed.
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    /// Stored password hash could not be parsed.
    #[error("Malformed password hash: {0}")]
    MalformedHash(String),

    /// Password shorter than the accepted minimum.
    #[error("Password too short (minimum {0} characters required)")]
    PasswordTooShort(usize),

    /// Signing secret too short for HS256.
    #[error("JWT secret too short (minimum {0} bytes required)")]
    WeakSecret(usize),

    /// Access token expired.
    #[error("Access token expired")]
    TokenExpired,

    /// Access token invalid (bad signature, issuer, or shape).
    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    /// Refresh token not in the expected format.
    #[error("Malformed refresh token")]
    MalformedRefreshToken,
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl From<AuthError> for leadforge_core::Error {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::PasswordTooShort(_) => leadforge_core::Error::InvalidInput(e.to_string()),
            AuthError::TokenExpired
            | AuthError::InvalidToken(_)
            | AuthError::MalformedRefreshToken => leadforge_core::Error::Unauthorized(e.to_string()),
            AuthError::WeakSecret(_) => leadforge_core::Error::Config(e.to_string()),
            AuthError::Hashing(_) | AuthError::MalformedHash(_) => {
                leadforge_core::Error::Internal(e.to_string())
            }
        }
    }
}
