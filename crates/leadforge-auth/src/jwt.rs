//! HS256 access tokens.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use leadforge_core::defaults::{JWT_LEEWAY_SECS, JWT_SECRET_MIN_BYTES};
use leadforge_core::{Principal, UserRole};

use crate::error::{AuthError, AuthResult};

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub company_id: Uuid,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    /// Unique token id.
    pub jti: Uuid,
}

impl Claims {
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.sub,
            company_id: self.company_id,
            role: self.role,
        }
    }
}

/// Signing and verification keys plus token policy.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl_secs: i64,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl JwtKeys {
    /// Build keys from an HMAC secret of at least 32 bytes.
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl_secs: i64) -> AuthResult<Self> {
        if secret.len() < JWT_SECRET_MIN_BYTES {
            return Err(AuthError::WeakSecret(JWT_SECRET_MIN_BYTES));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            ttl_secs,
        })
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Issue an access token for a principal.
    pub fn issue(&self, principal: &Principal) -> AuthResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: principal.user_id,
            company_id: principal.company_id,
            role: principal.role,
            iat: now,
            exp: now + self.ttl_secs,
            iss: self.issuer.clone(),
            jti: leadforge_core::new_v7(),
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Verify signature, issuer, and expiry (with leeway).
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = JWT_LEEWAY_SECS;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }
}
