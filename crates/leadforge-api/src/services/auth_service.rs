//! Account registration, login, and refresh-token sessions.
//!
//! ## Refresh rotation
//!
//! Every refresh revokes the presented session and links it to its
//! successor through `replaced_by`. A presented token whose session was
//! already rotated means the token leaked (or a client replayed it), so
//! every live session of that user is revoked and the caller must log in
//! again.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use leadforge_auth::{
    generate_refresh_token, hash_presented_token, validate_password, JwtKeys,
    PasswordHasherService,
};
use leadforge_core::{
    normalize_email, AuthResponse, Company, Error, LoginRequest, Principal, RegisterRequest,
    Result, TokenPair, User, UserRole,
};
use leadforge_db::{Database, NewUser};

/// Login failures never say which half of the credentials was wrong.
const BAD_CREDENTIALS: &str = "Invalid email or password";

#[derive(Clone)]
pub struct AuthService {
    db: Database,
    jwt: JwtKeys,
    passwords: PasswordHasherService,
    refresh_ttl: Duration,
}

impl AuthService {
    pub fn new(
        db: Database,
        jwt: JwtKeys,
        passwords: PasswordHasherService,
        refresh_ttl_days: i64,
    ) -> Self {
        Self {
            db,
            jwt,
            passwords,
            refresh_ttl: Duration::days(refresh_ttl_days),
        }
    }

    pub fn passwords(&self) -> &PasswordHasherService {
        &self.passwords
    }

    /// Create a company and its owner, then sign the owner in.
    pub async fn register(
        &self,
        req: &RegisterRequest,
        user_agent: Option<&str>,
    ) -> Result<AuthResponse> {
        let company_name = req.company_name.trim();
        if company_name.is_empty() {
            return Err(Error::InvalidInput("company_name cannot be empty".into()));
        }
        let email = normalize_email(&req.email)?;
        validate_password(&req.password)?;

        let owner = NewUser {
            email,
            password_hash: self.passwords.hash(&req.password)?,
            full_name: trimmed(req.full_name.as_deref()),
            role: UserRole::Owner,
        };
        let (company, user) = self.db.users.register(company_name, owner).await?;

        info!(
            subsystem = "auth",
            component = "service",
            op = "register",
            company_id = %company.id,
            user_id = %user.id,
            "Company registered"
        );
        let tokens = self.start_session(&user, user_agent).await?;
        Ok(AuthResponse {
            user,
            company,
            tokens,
        })
    }

    pub async fn login(&self, req: &LoginRequest, user_agent: Option<&str>) -> Result<AuthResponse> {
        let unauthorized = || Error::Unauthorized(BAD_CREDENTIALS.to_string());

        let Ok(email) = normalize_email(&req.email) else {
            return Err(unauthorized());
        };
        let Some(creds) = self.db.users.find_credentials(&email).await? else {
            return Err(unauthorized());
        };
        if !self.passwords.verify(&req.password, &creds.password_hash)? || !creds.user.is_active {
            warn!(
                subsystem = "auth",
                component = "service",
                op = "login",
                user_id = %creds.user.id,
                "Login rejected"
            );
            return Err(unauthorized());
        }

        self.db.users.touch_login(creds.user.id).await?;
        let company = self.db.companies.get(creds.user.company_id).await?;
        let tokens = self.start_session(&creds.user, user_agent).await?;

        info!(
            subsystem = "auth",
            component = "service",
            op = "login",
            company_id = %company.id,
            user_id = %creds.user.id,
            "User logged in"
        );
        Ok(AuthResponse {
            user: creds.user,
            company,
            tokens,
        })
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh(&self, refresh_token: &str, user_agent: Option<&str>) -> Result<TokenPair> {
        let hash = hash_presented_token(refresh_token)?;
        let session = self
            .db
            .sessions
            .find_by_hash(&hash)
            .await?
            .ok_or_else(|| Error::Unauthorized("Invalid refresh token".into()))?;

        if session.was_rotated() {
            let revoked = self.db.sessions.revoke_all_for_user(session.user_id).await?;
            warn!(
                subsystem = "auth",
                component = "service",
                op = "refresh",
                user_id = %session.user_id,
                session_id = %session.id,
                revoked,
                "Refresh token reuse detected, all sessions revoked"
            );
            return Err(Error::Unauthorized("Refresh token reuse detected".into()));
        }
        if !session.is_usable(Utc::now()) {
            return Err(Error::Unauthorized("Refresh token expired or revoked".into()));
        }

        let user = self
            .db
            .users
            .get_by_id(session.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| Error::Unauthorized("Account is disabled".into()))?;

        let next = generate_refresh_token();
        let expires_at = Utc::now() + self.refresh_ttl;
        let rotated = self
            .db
            .sessions
            .rotate(session.id, &next.hash, expires_at, user_agent)
            .await?;
        if rotated.is_none() {
            // A concurrent refresh with the same token won the race.
            return Err(Error::Unauthorized("Refresh token already used".into()));
        }

        Ok(TokenPair {
            access_token: self.jwt.issue(&principal_of(&user))?,
            refresh_token: next.plaintext,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.ttl_secs(),
        })
    }

    /// Revoke the session behind a refresh token. Unknown tokens are fine.
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        let Ok(hash) = hash_presented_token(refresh_token) else {
            return Ok(());
        };
        if let Some(session) = self.db.sessions.find_by_hash(&hash).await? {
            self.db.sessions.revoke(session.id).await?;
        }
        Ok(())
    }

    pub async fn logout_all(&self, principal: &Principal) -> Result<u64> {
        let revoked = self
            .db
            .sessions
            .revoke_all_for_user(principal.user_id)
            .await?;
        info!(
            subsystem = "auth",
            component = "service",
            op = "logout_all",
            user_id = %principal.user_id,
            revoked,
            "All sessions revoked"
        );
        Ok(revoked)
    }

    pub async fn me(&self, principal: &Principal) -> Result<(User, Company)> {
        let user = self.db.users.get(principal.company_id, principal.user_id).await?;
        let company = self.db.companies.get(principal.company_id).await?;
        Ok((user, company))
    }

    async fn start_session(&self, user: &User, user_agent: Option<&str>) -> Result<TokenPair> {
        let refresh = generate_refresh_token();
        let expires_at = Utc::now() + self.refresh_ttl;
        self.db
            .sessions
            .create(user.id, &refresh.hash, expires_at, user_agent)
            .await?;
        Ok(TokenPair {
            access_token: self.jwt.issue(&principal_of(user))?,
            refresh_token: refresh.plaintext,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.ttl_secs(),
        })
    }
}

fn principal_of(user: &User) -> Principal {
    Principal {
        user_id: user.id,
        company_id: user.company_id,
        role: user.role,
    }
}

pub(crate) fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
