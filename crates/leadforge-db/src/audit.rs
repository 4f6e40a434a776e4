//! Append-only audit trail.

use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Pool, Postgres, Row};
use uuid::Uuid;

use leadforge_core::{AuditEntry, AuditFilter, Error, NewAuditEntry, Result};

const AUDIT_COLUMNS: &str = "id, company_id, actor_id, action, entity_type, entity_id, details, created_at";

/// PostgreSQL audit repository.
#[derive(Clone)]
pub struct PgAuditRepository {
    pool: Pool<Postgres>,
}

impl PgAuditRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List entries newest first, with optional entity filters.
    pub async fn list(&self, company_id: Uuid, filter: &AuditFilter) -> Result<(Vec<AuditEntry>, i64)> {
        let where_clause = "company_id = $1
             AND ($2::text IS NULL OR entity_type = $2)
             AND ($3::uuid IS NULL OR entity_id = $3)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM audit_log WHERE {where_clause}"))
            .bind(company_id)
            .bind(filter.entity_type.as_deref())
            .bind(filter.entity_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        let rows = sqlx::query(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log
             WHERE {where_clause}
             ORDER BY created_at DESC, id DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(company_id)
        .bind(filter.entity_type.as_deref())
        .bind(filter.entity_id)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok((rows.iter().map(parse_entry).collect(), total))
    }
}

/// Insert an audit entry on any executor, so writes can join a caller's
/// transaction.
pub(crate) async fn insert_entry<'e, E>(executor: E, entry: &NewAuditEntry) -> Result<Uuid>
where
    E: PgExecutor<'e>,
{
    let id = leadforge_core::new_v7();
    sqlx::query(
        "INSERT INTO audit_log (id, company_id, actor_id, action, entity_type, entity_id, details)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(id)
    .bind(entry.company_id)
    .bind(entry.actor_id)
    .bind(&entry.action)
    .bind(&entry.entity_type)
    .bind(entry.entity_id)
    .bind(&entry.details)
    .execute(executor)
    .await
    .map_err(Error::Database)?;
    Ok(id)
}

fn parse_entry(r: &PgRow) -> AuditEntry {
    AuditEntry {
        id: r.get("id"),
        company_id: r.get("company_id"),
        actor_id: r.get("actor_id"),
        action: r.get("action"),
        entity_type: r.get("entity_type"),
        entity_id: r.get("entity_id"),
        details: r.get("details"),
        created_at: r.get("created_at"),
    }
}
