//! Refresh-token session repository.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use leadforge_core::{AuthSession, Error, Result};

const SESSION_COLUMNS: &str =
    "id, user_id, refresh_token_hash, expires_at, revoked_at, replaced_by, user_agent, created_at";

/// PostgreSQL session repository.
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: Pool<Postgres>,
}

impl PgSessionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        user_agent: Option<&str>,
    ) -> Result<AuthSession> {
        let row = sqlx::query(&format!(
            "INSERT INTO auth_sessions (id, user_id, refresh_token_hash, expires_at, user_agent)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(leadforge_core::new_v7())
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(parse_session(&row))
    }

    pub async fn find_by_hash(&self, token_hash: &str) -> Result<Option<AuthSession>> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM auth_sessions WHERE refresh_token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(parse_session))
    }

    /// Replace a live session with a new one.
    ///
    /// Returns `None` when the old session was revoked in the meantime
    /// (a concurrent refresh won), in which case nothing is written.
    pub async fn rotate(
        &self,
        old_id: Uuid,
        new_hash: &str,
        expires_at: DateTime<Utc>,
        user_agent: Option<&str>,
    ) -> Result<Option<AuthSession>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let old_user: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions
             WHERE id = $1 AND revoked_at IS NULL
             FOR UPDATE",
        )
        .bind(old_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let Some(user_id) = old_user else {
            return Ok(None);
        };

        let new_id = leadforge_core::new_v7();
        let row = sqlx::query(&format!(
            "INSERT INTO auth_sessions (id, user_id, refresh_token_hash, expires_at, user_agent)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(new_id)
        .bind(user_id)
        .bind(new_hash)
        .bind(expires_at)
        .bind(user_agent)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("UPDATE auth_sessions SET revoked_at = now(), replaced_by = $2 WHERE id = $1")
            .bind(old_id)
            .bind(new_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(Some(parse_session(&row)))
    }

    /// Revoke one session. Idempotent.
    pub async fn revoke(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE auth_sessions SET revoked_at = now() WHERE id = $1 AND revoked_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Revoke every live session of a user. Returns how many were revoked.
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE auth_sessions SET revoked_at = now()
             WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    /// Delete sessions that expired more than `older_than_days` ago.
    pub async fn purge_expired(&self, older_than_days: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM auth_sessions WHERE expires_at < now() - make_interval(days => $1::int)",
        )
        .bind(older_than_days as i32)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}

fn parse_session(r: &PgRow) -> AuthSession {
    AuthSession {
        id: r.get("id"),
        user_id: r.get("user_id"),
        refresh_token_hash: r.get("refresh_token_hash"),
        expires_at: r.get("expires_at"),
        revoked_at: r.get("revoked_at"),
        replaced_by: r.get("replaced_by"),
        user_agent: r.get("user_agent"),
        created_at: r.get("created_at"),
    }
}
