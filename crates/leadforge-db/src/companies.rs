//! Company (tenant) repository.

use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use leadforge_core::{Company, Error, NewAuditEntry, Plan, Result, UpdateCompanyRequest};

use crate::{audit, text_enum};

pub(crate) const COMPANY_COLUMNS: &str =
    "id, name, domain, plan, settings, created_at, updated_at";

/// PostgreSQL company repository.
#[derive(Clone)]
pub struct PgCompanyRepository {
    pool: Pool<Postgres>,
}

impl PgCompanyRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Company> {
        let row = sqlx::query(&format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("company {id}")))?;
        parse_company(&row)
    }

    /// Update name, domain, or settings. Settings keys are merged into the
    /// existing object rather than replacing it.
    pub async fn update(&self, id: Uuid, req: &UpdateCompanyRequest) -> Result<Company> {
        if let Some(name) = &req.name {
            if name.trim().is_empty() {
                return Err(Error::InvalidInput("company name cannot be empty".into()));
            }
        }
        if let Some(settings) = &req.settings {
            if !settings.is_object() {
                return Err(Error::InvalidInput("settings must be a JSON object".into()));
            }
        }
        let domain = req
            .domain
            .as_ref()
            .map(|d| d.trim().to_lowercase())
            .map(|d| if d.is_empty() { None } else { Some(d) });

        let row = sqlx::query(&format!(
            "UPDATE companies SET
                name = COALESCE($2, name),
                domain = CASE WHEN $3 THEN $4 ELSE domain END,
                settings = COALESCE(settings, '{{}}'::jsonb) || COALESCE($5, '{{}}'::jsonb),
                updated_at = $6
             WHERE id = $1
             RETURNING {COMPANY_COLUMNS}"
        ))
        .bind(id)
        .bind(req.name.as_deref().map(str::trim))
        .bind(domain.is_some())
        .bind(domain.flatten())
        .bind(&req.settings)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("company {id}")))?;
        parse_company(&row)
    }

    /// Switch plans. Returns the company and the plan it had before; an
    /// actual change is audited as `company.plan_changed` in the same
    /// transaction.
    pub async fn set_plan(
        &self,
        id: Uuid,
        plan: Plan,
        actor_id: Option<Uuid>,
    ) -> Result<(Company, Plan)> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let previous: Plan = text_enum(
            &sqlx::query("SELECT plan FROM companies WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?
                .ok_or_else(|| Error::NotFound(format!("company {id}")))?,
            "plan",
        )?;

        let row = sqlx::query(&format!(
            "UPDATE companies SET plan = $2, updated_at = now()
             WHERE id = $1
             RETURNING {COMPANY_COLUMNS}"
        ))
        .bind(id)
        .bind(plan.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if previous != plan {
            let entry = NewAuditEntry::new(id, actor_id, "company.plan_changed", "company", Some(id))
                .with_details(serde_json::json!({ "from": previous, "to": plan }));
            audit::insert_entry(&mut *tx, &entry).await?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok((parse_company(&row)?, previous))
    }

    /// Plan of a company, used by quota checks.
    pub async fn plan(&self, id: Uuid) -> Result<Plan> {
        let row = sqlx::query("SELECT plan FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("company {id}")))?;
        text_enum(&row, "plan")
    }
}

pub(crate) fn parse_company(r: &PgRow) -> Result<Company> {
    Ok(Company {
        id: r.get("id"),
        name: r.get("name"),
        domain: r.get("domain"),
        plan: text_enum(r, "plan")?,
        settings: r.get("settings"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}
