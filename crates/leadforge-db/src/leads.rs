//! Lead repository: tenant-scoped CRUD, filtering, and lifecycle writes.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use leadforge_core::{
    CreateLeadRequest, Error, Lead, LeadFilter, LeadGrade, LeadStatus, LeadStatusChange,
    NewAuditEntry, Result,
};

use crate::{audit, conflict_on_unique, escape_like, text_enum};

pub(crate) const LEAD_COLUMNS: &str = "id, company_id, email, first_name, last_name, title, organization,
    phone, linkedin_url, source, status, score, tags, notes, custom_fields, owner_id,
    reply_count, last_contacted_at, created_at, updated_at";

/// Filter clause shared by `list` and its count query. `$1` is the company.
const LIST_WHERE: &str = "company_id = $1
    AND ($2::text IS NULL OR status = $2)
    AND ($3::text IS NULL
         OR email ILIKE $3
         OR first_name ILIKE $3
         OR last_name ILIKE $3
         OR (coalesce(first_name, '') || ' ' || coalesce(last_name, '')) ILIKE $3
         OR organization ILIKE $3)
    AND ($4::text IS NULL OR $4 = ANY(tags))
    AND ($5::int IS NULL OR score >= $5)
    AND ($6::uuid IS NULL OR owner_id = $6)";

/// A requested lifecycle move, already validated by the state machine.
#[derive(Debug, Clone)]
pub struct StatusWrite {
    pub from: LeadStatus,
    pub to: LeadStatus,
    /// Score recomputed for the new status.
    pub score: i32,
    pub reason: Option<String>,
    pub actor_id: Option<Uuid>,
}

/// PostgreSQL lead repository.
#[derive(Clone)]
pub struct PgLeadRepository {
    pool: Pool<Postgres>,
}

impl PgLeadRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert one lead. The request must already be normalized.
    pub async fn insert(&self, company_id: Uuid, req: &CreateLeadRequest, score: i32) -> Result<Lead> {
        let row = insert_one(&self.pool, company_id, req, score).await?;
        parse_lead(&row)
    }

    /// Insert a batch of leads in one transaction; any failure rolls back all.
    pub async fn insert_bulk(
        &self,
        company_id: Uuid,
        leads: &[(CreateLeadRequest, i32)],
    ) -> Result<Vec<Uuid>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut ids = Vec::with_capacity(leads.len());
        for (req, score) in leads {
            let row = insert_one(&mut *tx, company_id, req, *score).await?;
            ids.push(row.get("id"));
        }
        tx.commit().await.map_err(Error::Database)?;
        debug!(
            subsystem = "db",
            component = "leads",
            op = "insert_bulk",
            company_id = %company_id,
            result_count = ids.len(),
            "Bulk lead import committed"
        );
        Ok(ids)
    }

    pub async fn get(&self, company_id: Uuid, id: Uuid) -> Result<Lead> {
        self.find(company_id, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("lead {id}")))
    }

    pub async fn find(&self, company_id: Uuid, id: Uuid) -> Result<Option<Lead>> {
        let row = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE company_id = $1 AND id = $2"
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(parse_lead).transpose()
    }

    /// Filtered, sorted page of leads plus the total matching count.
    pub async fn list(&self, company_id: Uuid, filter: &LeadFilter) -> Result<(Vec<Lead>, i64)> {
        let status = filter.status.map(|s| s.as_str());
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));
        let tag = filter.tag.as_deref().map(|t| t.trim().to_lowercase());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM leads WHERE {LIST_WHERE}"))
            .bind(company_id)
            .bind(status)
            .bind(&search)
            .bind(&tag)
            .bind(filter.min_score)
            .bind(filter.owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        // Sort column and direction come from closed enums, never from input text.
        let query = format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE {LIST_WHERE}
             ORDER BY {} {}, id {}
             LIMIT $7 OFFSET $8",
            filter.sort.column(),
            filter.order.sql(),
            filter.order.sql(),
        );
        let rows = sqlx::query(&query)
            .bind(company_id)
            .bind(status)
            .bind(&search)
            .bind(&tag)
            .bind(filter.min_score)
            .bind(filter.owner_id)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let leads = rows.iter().map(parse_lead).collect::<Result<Vec<_>>>()?;
        Ok((leads, total))
    }

    /// Persist editable fields and score of a lead loaded earlier.
    pub async fn save(&self, lead: &Lead) -> Result<Lead> {
        let row = sqlx::query(&format!(
            "UPDATE leads SET
                email = $3, first_name = $4, last_name = $5, title = $6,
                organization = $7, phone = $8, linkedin_url = $9, source = $10,
                tags = $11, notes = $12, custom_fields = $13, owner_id = $14,
                score = $15, updated_at = now()
             WHERE company_id = $1 AND id = $2
             RETURNING {LEAD_COLUMNS}"
        ))
        .bind(lead.company_id)
        .bind(lead.id)
        .bind(&lead.email)
        .bind(&lead.first_name)
        .bind(&lead.last_name)
        .bind(&lead.title)
        .bind(&lead.organization)
        .bind(&lead.phone)
        .bind(&lead.linkedin_url)
        .bind(&lead.source)
        .bind(&lead.tags)
        .bind(&lead.notes)
        .bind(&lead.custom_fields)
        .bind(lead.owner_id)
        .bind(lead.score)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, format!("lead with email {} already exists", lead.email)))?
        .ok_or_else(|| Error::NotFound(format!("lead {}", lead.id)))?;
        parse_lead(&row)
    }

    /// Delete a lead. Returns `false` if it did not exist in this company.
    pub async fn delete(&self, company_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM leads WHERE company_id = $1 AND id = $2")
            .bind(company_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply a validated status change, its history row, and its audit entry
    /// in one transaction.
    ///
    /// The update is conditional on the lead still being in `from`; if another
    /// writer moved it first this returns `Conflict` and writes nothing.
    pub async fn transition(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
        change: &StatusWrite,
    ) -> Result<Lead> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(&format!(
            "UPDATE leads SET status = $4, score = $5, updated_at = now()
             WHERE company_id = $1 AND id = $2 AND status = $3
             RETURNING {LEAD_COLUMNS}"
        ))
        .bind(company_id)
        .bind(lead_id)
        .bind(change.from.as_str())
        .bind(change.to.as_str())
        .bind(change.score)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| {
            Error::Conflict(format!("lead {lead_id} is no longer {}", change.from))
        })?;

        sqlx::query(
            "INSERT INTO lead_status_changes (id, company_id, lead_id, from_status, to_status, reason, actor_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(leadforge_core::new_v7())
        .bind(company_id)
        .bind(lead_id)
        .bind(change.from.as_str())
        .bind(change.to.as_str())
        .bind(&change.reason)
        .bind(change.actor_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let entry = NewAuditEntry::new(
            company_id,
            change.actor_id,
            "lead.status_changed",
            "lead",
            Some(lead_id),
        )
        .with_details(serde_json::json!({
            "from": change.from,
            "to": change.to,
            "reason": change.reason,
        }));
        audit::insert_entry(&mut *tx, &entry).await?;

        tx.commit().await.map_err(Error::Database)?;
        parse_lead(&row)
    }

    pub async fn history(&self, company_id: Uuid, lead_id: Uuid) -> Result<Vec<LeadStatusChange>> {
        let rows = sqlx::query(
            "SELECT id, lead_id, from_status, to_status, reason, actor_id, changed_at
             FROM lead_status_changes
             WHERE company_id = $1 AND lead_id = $2
             ORDER BY changed_at, id",
        )
        .bind(company_id)
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|r| {
                Ok(LeadStatusChange {
                    id: r.get("id"),
                    lead_id: r.get("lead_id"),
                    from_status: text_enum(r, "from_status")?,
                    to_status: text_enum(r, "to_status")?,
                    reason: r.get("reason"),
                    actor_id: r.get("actor_id"),
                    changed_at: r.get("changed_at"),
                })
            })
            .collect()
    }

    pub async fn mark_contacted(&self, company_id: Uuid, lead_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE leads SET last_contacted_at = GREATEST(coalesce(last_contacted_at, $3), $3),
                              updated_at = now()
             WHERE company_id = $1 AND id = $2",
        )
        .bind(company_id)
        .bind(lead_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Count one more reply and return the updated lead.
    pub async fn increment_replies(&self, company_id: Uuid, lead_id: Uuid) -> Result<Lead> {
        let row = sqlx::query(&format!(
            "UPDATE leads SET reply_count = reply_count + 1, updated_at = now()
             WHERE company_id = $1 AND id = $2
             RETURNING {LEAD_COLUMNS}"
        ))
        .bind(company_id)
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("lead {lead_id}")))?;
        parse_lead(&row)
    }

    pub async fn set_score(&self, company_id: Uuid, lead_id: Uuid, score: i32) -> Result<()> {
        sqlx::query("UPDATE leads SET score = $3 WHERE company_id = $1 AND id = $2")
            .bind(company_id)
            .bind(lead_id)
            .bind(score)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Lead count per status, including zero rows for absent statuses.
    pub async fn status_counts(&self, company_id: Uuid) -> Result<Vec<(LeadStatus, i64)>> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM leads WHERE company_id = $1 GROUP BY status",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut counts: Vec<(LeadStatus, i64)> = LeadStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for r in &rows {
            let status: LeadStatus = text_enum(r, "status")?;
            let n: i64 = r.get("n");
            if let Some(slot) = counts.iter_mut().find(|(s, _)| *s == status) {
                slot.1 = n;
            }
        }
        Ok(counts)
    }

    /// Average score and number of hot leads.
    pub async fn score_summary(&self, company_id: Uuid, hot_threshold: i32) -> Result<(f64, i64)> {
        let row = sqlx::query(
            "SELECT coalesce(AVG(score)::float8, 0) AS avg_score,
                    COUNT(*) FILTER (WHERE score >= $2) AS hot
             FROM leads WHERE company_id = $1",
        )
        .bind(company_id)
        .bind(hot_threshold)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        let avg: f64 = row.get("avg_score");
        Ok(((avg * 10.0).round() / 10.0, row.get("hot")))
    }
}

async fn insert_one<'e, E>(
    executor: E,
    company_id: Uuid,
    req: &CreateLeadRequest,
    score: i32,
) -> Result<PgRow>
where
    E: sqlx::PgExecutor<'e>,
{
    let now = Utc::now();
    sqlx::query(&format!(
        "INSERT INTO leads (id, company_id, email, first_name, last_name, title, organization,
                            phone, linkedin_url, source, status, score, tags, notes,
                            custom_fields, owner_id, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'new', $11, $12, $13, $14, $15, $16, $16)
         RETURNING {LEAD_COLUMNS}"
    ))
    .bind(leadforge_core::new_v7())
    .bind(company_id)
    .bind(&req.email)
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(&req.title)
    .bind(&req.organization)
    .bind(&req.phone)
    .bind(&req.linkedin_url)
    .bind(&req.source)
    .bind(score)
    .bind(&req.tags)
    .bind(&req.notes)
    .bind(
        req.custom_fields
            .clone()
            .unwrap_or_else(|| serde_json::json!({})),
    )
    .bind(req.owner_id)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(|e| conflict_on_unique(e, format!("lead with email {} already exists", req.email)))
}

pub(crate) fn parse_lead(r: &PgRow) -> Result<Lead> {
    let score: i32 = r.get("score");
    Ok(Lead {
        id: r.get("id"),
        company_id: r.get("company_id"),
        email: r.get("email"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        title: r.get("title"),
        organization: r.get("organization"),
        phone: r.get("phone"),
        linkedin_url: r.get("linkedin_url"),
        source: r.get("source"),
        status: text_enum(r, "status")?,
        score,
        grade: LeadGrade::from_score(score),
        tags: r.get("tags"),
        notes: r.get("notes"),
        custom_fields: r.get("custom_fields"),
        owner_id: r.get("owner_id"),
        reply_count: r.get("reply_count"),
        last_contacted_at: r.get("last_contacted_at"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}
