//! User repository.

use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use leadforge_core::{Company, Error, NewAuditEntry, Plan, Result, User, UserRole};

use crate::companies::{parse_company, COMPANY_COLUMNS};
use crate::{audit, conflict_on_unique, text_enum};

const USER_COLUMNS: &str =
    "id, company_id, email, full_name, role, is_active, created_at, updated_at, last_login_at";

/// A user row to insert. `email` must already be normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: UserRole,
}

/// A user together with their stored password hash, for login only.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// PostgreSQL user repository.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create a company on the free plan and its owner in one transaction.
    pub async fn register(&self, company_name: &str, owner: NewUser) -> Result<(Company, User)> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let now = Utc::now();

        let company_row = sqlx::query(&format!(
            "INSERT INTO companies (id, name, plan, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING {COMPANY_COLUMNS}"
        ))
        .bind(leadforge_core::new_v7())
        .bind(company_name.trim())
        .bind(Plan::Free.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;
        let company = parse_company(&company_row)?;

        let user_row = insert_user(&mut tx, company.id, &owner).await?;
        let user = parse_user(&user_row)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok((company, user))
    }

    /// Add a user to an existing company, audited as `user.created`.
    pub async fn create(
        &self,
        company_id: Uuid,
        new_user: &NewUser,
        actor_id: Option<Uuid>,
    ) -> Result<User> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let user = parse_user(&insert_user(&mut tx, company_id, new_user).await?)?;

        let entry = NewAuditEntry::new(company_id, actor_id, "user.created", "user", Some(user.id))
            .with_details(serde_json::json!({ "role": user.role }));
        audit::insert_entry(&mut *tx, &entry).await?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(user)
    }

    pub async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(|r| {
            Ok(UserCredentials {
                user: parse_user(&r)?,
                password_hash: r.get("password_hash"),
            })
        })
        .transpose()
    }

    /// Fetch a user by id regardless of company; used for token refresh.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(parse_user).transpose()
    }

    pub async fn get(&self, company_id: Uuid, id: Uuid) -> Result<User> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE company_id = $1 AND id = $2"
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("user {id}")))?;
        parse_user(&row)
    }

    pub async fn list(&self, company_id: Uuid) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE company_id = $1 ORDER BY created_at, id"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(parse_user).collect()
    }

    pub async fn touch_login(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Change a user's role. Refuses to demote the company's last active owner.
    ///
    /// Owner rows are locked for the duration of the check so two concurrent
    /// demotions cannot both succeed. An actual change is audited as
    /// `user.role_changed` in the same transaction.
    pub async fn set_role(
        &self,
        company_id: Uuid,
        id: Uuid,
        role: UserRole,
        actor_id: Option<Uuid>,
    ) -> Result<User> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let owners: Vec<Uuid> = sqlx::query(
            "SELECT id FROM users
             WHERE company_id = $1 AND role = 'owner' AND is_active
             FOR UPDATE",
        )
        .bind(company_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?
        .iter()
        .map(|r| r.get("id"))
        .collect();

        if role != UserRole::Owner && owners.len() == 1 && owners[0] == id {
            return Err(Error::Conflict("cannot demote the last owner".into()));
        }

        let previous: UserRole = text_enum(
            &sqlx::query("SELECT role FROM users WHERE company_id = $1 AND id = $2 FOR UPDATE")
                .bind(company_id)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?
                .ok_or_else(|| Error::NotFound(format!("user {id}")))?,
            "role",
        )?;

        let row = sqlx::query(&format!(
            "UPDATE users SET role = $3, updated_at = now()
             WHERE company_id = $1 AND id = $2
             RETURNING {USER_COLUMNS}"
        ))
        .bind(company_id)
        .bind(id)
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if previous != role {
            let entry = NewAuditEntry::new(company_id, actor_id, "user.role_changed", "user", Some(id))
                .with_details(serde_json::json!({ "from": previous, "to": role }));
            audit::insert_entry(&mut *tx, &entry).await?;
        }

        tx.commit().await.map_err(Error::Database)?;
        parse_user(&row)
    }

    /// Deactivate a user and revoke all their sessions, audited as
    /// `user.deactivated`.
    pub async fn deactivate(&self, company_id: Uuid, id: Uuid, actor_id: Option<Uuid>) -> Result<User> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let target = sqlx::query("SELECT role FROM users WHERE company_id = $1 AND id = $2 FOR UPDATE")
            .bind(company_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("user {id}")))?;

        if text_enum::<UserRole>(&target, "role")? == UserRole::Owner {
            let owners: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM users WHERE company_id = $1 AND role = 'owner' AND is_active",
            )
            .bind(company_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;
            if owners <= 1 {
                return Err(Error::Conflict("cannot deactivate the last owner".into()));
            }
        }

        let row = sqlx::query(&format!(
            "UPDATE users SET is_active = false, updated_at = now()
             WHERE company_id = $1 AND id = $2
             RETURNING {USER_COLUMNS}"
        ))
        .bind(company_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "UPDATE auth_sessions SET revoked_at = now()
             WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let entry = NewAuditEntry::new(company_id, actor_id, "user.deactivated", "user", Some(id));
        audit::insert_entry(&mut *tx, &entry).await?;

        tx.commit().await.map_err(Error::Database)?;
        parse_user(&row)
    }
}

async fn insert_user(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    company_id: Uuid,
    new_user: &NewUser,
) -> Result<PgRow> {
    let now = Utc::now();
    sqlx::query(&format!(
        "INSERT INTO users (id, company_id, email, password_hash, full_name, role, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(leadforge_core::new_v7())
    .bind(company_id)
    .bind(&new_user.email)
    .bind(&new_user.password_hash)
    .bind(&new_user.full_name)
    .bind(new_user.role.as_str())
    .bind(now)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| conflict_on_unique(e, format!("email already registered: {}", new_user.email)))
}

fn parse_user(r: &PgRow) -> Result<User> {
    Ok(User {
        id: r.get("id"),
        company_id: r.get("company_id"),
        email: r.get("email"),
        full_name: r.get("full_name"),
        role: text_enum(r, "role")?,
        is_active: r.get("is_active"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
        last_login_at: r.get("last_login_at"),
    })
}
