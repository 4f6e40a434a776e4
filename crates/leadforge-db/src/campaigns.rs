//! Campaign repository: campaigns, their enrolled leads, and counters.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use leadforge_core::{
    Campaign, CampaignCounter, CampaignStatus, EnrollResponse, Error, Lead, LeadStatus,
    NewAuditEntry, Result, UpdateCampaignRequest,
};

use crate::leads::{parse_lead, LEAD_COLUMNS};
use crate::{audit, text_enum};

const CAMPAIGN_COLUMNS: &str = "campaigns.id, campaigns.company_id, campaigns.persona_id,
    campaigns.name, campaigns.subject_template, campaigns.status,
    (SELECT COUNT(*) FROM campaign_leads cl WHERE cl.campaign_id = campaigns.id) AS lead_count,
    campaigns.sent_count, campaigns.reply_count, campaigns.booking_count,
    campaigns.created_at, campaigns.updated_at, campaigns.launched_at";

/// PostgreSQL campaign repository.
#[derive(Clone)]
pub struct PgCampaignRepository {
    pool: Pool<Postgres>,
}

impl PgCampaignRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create a draft campaign. The persona must belong to the same company.
    pub async fn create(
        &self,
        company_id: Uuid,
        persona_id: Uuid,
        name: &str,
        subject_template: Option<&str>,
    ) -> Result<Campaign> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("campaign name cannot be empty".into()));
        }
        self.ensure_persona(company_id, persona_id).await?;

        let row = sqlx::query(&format!(
            "INSERT INTO campaigns (id, company_id, persona_id, name, subject_template)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {CAMPAIGN_COLUMNS}"
        ))
        .bind(leadforge_core::new_v7())
        .bind(company_id)
        .bind(persona_id)
        .bind(name)
        .bind(subject_template)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        parse_campaign(&row)
    }

    /// Newest first, optionally narrowed to one status.
    pub async fn list(
        &self,
        company_id: Uuid,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Campaign>, i64)> {
        let status = status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM campaigns WHERE company_id = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(company_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let rows = sqlx::query(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns
             WHERE company_id = $1 AND ($2::text IS NULL OR status = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(company_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let campaigns = rows.iter().map(parse_campaign).collect::<Result<Vec<_>>>()?;
        Ok((campaigns, total))
    }

    pub async fn get(&self, company_id: Uuid, id: Uuid) -> Result<Campaign> {
        let row = sqlx::query(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE company_id = $1 AND id = $2"
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("campaign {id}")))?;
        parse_campaign(&row)
    }

    /// Edit a draft or paused campaign.
    pub async fn update(&self, company_id: Uuid, id: Uuid, req: &UpdateCampaignRequest) -> Result<Campaign> {
        let current = self.get(company_id, id).await?;
        if !current.status.is_editable() {
            return Err(Error::Conflict(format!(
                "campaign is {} and can no longer be edited",
                current.status
            )));
        }
        if let Some(name) = &req.name {
            if name.trim().is_empty() {
                return Err(Error::InvalidInput("campaign name cannot be empty".into()));
            }
        }
        if let Some(persona_id) = req.persona_id {
            self.ensure_persona(company_id, persona_id).await?;
        }
        let subject = req
            .subject_template
            .as_ref()
            .map(|s| s.trim().to_string())
            .map(|s| if s.is_empty() { None } else { Some(s) });

        // Re-check the status in the WHERE so a concurrent launch wins cleanly.
        let row = sqlx::query(&format!(
            "UPDATE campaigns SET
                name = COALESCE($3, name),
                persona_id = COALESCE($4, persona_id),
                subject_template = CASE WHEN $5 THEN $6 ELSE subject_template END,
                updated_at = now()
             WHERE company_id = $1 AND id = $2 AND status IN ('draft', 'paused')
             RETURNING {CAMPAIGN_COLUMNS}"
        ))
        .bind(company_id)
        .bind(id)
        .bind(req.name.as_deref().map(str::trim))
        .bind(req.persona_id)
        .bind(subject.is_some())
        .bind(subject.flatten())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::Conflict("campaign changed state during update".into()))?;
        parse_campaign(&row)
    }

    /// Move a campaign from `from` to `to` and audit it in one transaction.
    ///
    /// The caller validates the move with [`CampaignStatus::ensure_can_become`];
    /// this only guards against a concurrent change.
    pub async fn set_status(
        &self,
        company_id: Uuid,
        id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
        actor_id: Option<Uuid>,
    ) -> Result<Campaign> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(&format!(
            "UPDATE campaigns SET
                status = $4,
                launched_at = CASE WHEN $4 = 'active' THEN COALESCE(launched_at, now()) ELSE launched_at END,
                updated_at = now()
             WHERE company_id = $1 AND id = $2 AND status = $3
             RETURNING {CAMPAIGN_COLUMNS}"
        ))
        .bind(company_id)
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::Conflict(format!("campaign {id} is no longer {from}")))?;

        let entry = NewAuditEntry::new(company_id, actor_id, "campaign.status_changed", "campaign", Some(id))
            .with_details(serde_json::json!({ "from": from, "to": to }));
        audit::insert_entry(&mut *tx, &entry).await?;

        tx.commit().await.map_err(Error::Database)?;
        parse_campaign(&row)
    }

    /// Enroll leads into a draft or paused campaign.
    ///
    /// Leads of other companies, leads in a terminal or lost state, and leads
    /// already enrolled are skipped rather than rejected.
    pub async fn enroll(&self, company_id: Uuid, id: Uuid, lead_ids: &[Uuid]) -> Result<EnrollResponse> {
        let mut requested = lead_ids.to_vec();
        requested.sort_unstable();
        requested.dedup();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let status_row = sqlx::query("SELECT status FROM campaigns WHERE company_id = $1 AND id = $2 FOR UPDATE")
            .bind(company_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("campaign {id}")))?;
        let status: CampaignStatus = text_enum(&status_row, "status")?;
        if !status.is_editable() {
            return Err(Error::Conflict(format!("cannot enroll leads into a {status} campaign")));
        }

        let enrollable: Vec<&str> = LeadStatus::ALL
            .iter()
            .filter(|s| s.is_enrollable())
            .map(|s| s.as_str())
            .collect();

        let inserted = sqlx::query(
            "INSERT INTO campaign_leads (campaign_id, lead_id, company_id)
             SELECT $1, l.id, l.company_id FROM leads l
             WHERE l.company_id = $2 AND l.id = ANY($3) AND l.status = ANY($4)
             ON CONFLICT (campaign_id, lead_id) DO NOTHING",
        )
        .bind(id)
        .bind(company_id)
        .bind(&requested)
        .bind(&enrollable)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected() as i64;

        let lead_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM campaign_leads WHERE campaign_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(EnrollResponse {
            enrolled: inserted,
            skipped: requested.len() as i64 - inserted,
            lead_count,
        })
    }

    pub async fn enrolled_leads(&self, company_id: Uuid, id: Uuid) -> Result<Vec<Lead>> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads
             WHERE company_id = $1
               AND id IN (SELECT lead_id FROM campaign_leads WHERE campaign_id = $2)
             ORDER BY created_at, id"
        ))
        .bind(company_id)
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(parse_lead).collect()
    }

    /// Enrolled leads without a recorded send; these are what a launch meters.
    pub async fn count_uncontacted(&self, company_id: Uuid, id: Uuid) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM campaign_leads
             WHERE company_id = $1 AND campaign_id = $2 AND contacted_at IS NULL",
        )
        .bind(company_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)
    }

    /// Record the first send to an enrolled lead. Returns `false` when the
    /// lead is not enrolled or was already contacted.
    pub async fn mark_contacted(
        &self,
        company_id: Uuid,
        id: Uuid,
        lead_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE campaign_leads SET contacted_at = $4
             WHERE company_id = $1 AND campaign_id = $2 AND lead_id = $3 AND contacted_at IS NULL",
        )
        .bind(company_id)
        .bind(id)
        .bind(lead_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Add one to a campaign counter. Returns `false` if the campaign is
    /// not this company's.
    pub async fn bump_counter(&self, company_id: Uuid, id: Uuid, counter: CampaignCounter) -> Result<bool> {
        let column = counter.column();
        let result = sqlx::query(&format!(
            "UPDATE campaigns SET {column} = {column} + 1, updated_at = now()
             WHERE company_id = $1 AND id = $2"
        ))
        .bind(company_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn ensure_persona(&self, company_id: Uuid, persona_id: Uuid) -> Result<()> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM ai_personas WHERE company_id = $1 AND id = $2)",
        )
        .bind(company_id)
        .bind(persona_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        if exists {
            Ok(())
        } else {
            Err(Error::NotFound(format!("persona {persona_id}")))
        }
    }
}

fn parse_campaign(r: &PgRow) -> Result<Campaign> {
    Ok(Campaign {
        id: r.get("id"),
        company_id: r.get("company_id"),
        persona_id: r.get("persona_id"),
        name: r.get("name"),
        subject_template: r.get("subject_template"),
        status: text_enum(r, "status")?,
        lead_count: r.get("lead_count"),
        sent_count: r.get("sent_count"),
        reply_count: r.get("reply_count"),
        booking_count: r.get("booking_count"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
        launched_at: r.get("launched_at"),
    })
}
