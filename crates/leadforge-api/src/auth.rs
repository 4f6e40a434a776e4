//! Request authentication.
//!
//! Handlers that need a caller take [`RequireAuth`] as an argument. The
//! extractor verifies the Bearer access token and yields the
//! [`Principal`]; the tenant of every request comes from here.
//!
//! ```rust,ignore
//! async fn handler(auth: RequireAuth, State(state): State<AppState>) -> Result<_, ApiError> {
//!     auth.require_role(UserRole::Admin)?;
//!     let company = state.db.companies.get(auth.principal.company_id).await?;
//!     // ...
//! }
//! ```

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use leadforge_core::{Principal, UserRole};

use crate::{ApiError, AppState};

/// Extractor that requires a valid access token.
#[derive(Debug, Clone, Copy)]
pub struct RequireAuth {
    pub principal: Principal,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

        let claims = state.jwt.verify(token).map_err(|e| {
            tracing::debug!(
                subsystem = "api",
                component = "auth",
                error = %e,
                "Rejected access token"
            );
            ApiError::from(e)
        })?;

        Ok(RequireAuth {
            principal: claims.principal(),
        })
    }
}

impl RequireAuth {
    /// Forbidden unless the caller's role is at least `min`.
    pub fn require_role(&self, min: UserRole) -> Result<(), ApiError> {
        self.principal.require(min).map_err(ApiError::from)
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }

    #[test]
    fn test_require_role() {
        let auth = RequireAuth {
            principal: Principal {
                user_id: Uuid::nil(),
                company_id: Uuid::nil(),
                role: UserRole::Member,
            },
        };
        assert!(auth.require_role(UserRole::Member).is_ok());
        assert!(matches!(
            auth.require_role(UserRole::Admin),
            Err(ApiError::Forbidden(_))
        ));
    }
}
