//! In-app notifications (currently usage threshold alerts).

use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Pool, Postgres, Row};
use uuid::Uuid;

use leadforge_core::{Error, NewThresholdNotification, Notification, Result};

use crate::text_enum_opt;

const NOTIFICATION_COLUMNS: &str =
    "id, company_id, kind, metric, period, threshold, message, read_at, created_at";

pub const USAGE_THRESHOLD_KIND: &str = "usage_threshold";

/// PostgreSQL notification repository.
#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: Pool<Postgres>,
}

impl PgNotificationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Newest first, optionally only unread.
    pub async fn list(&self, company_id: Uuid, unread_only: bool, limit: i64, offset: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE company_id = $1 AND (NOT $2 OR read_at IS NULL)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(company_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(parse_notification).collect()
    }

    /// Mark one notification read. Idempotent; keeps the first read time.
    pub async fn mark_read(&self, company_id: Uuid, id: Uuid) -> Result<Notification> {
        let row = sqlx::query(&format!(
            "UPDATE notifications SET read_at = COALESCE(read_at, now())
             WHERE company_id = $1 AND id = $2
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("notification {id}")))?;
        parse_notification(&row)
    }

    /// Returns how many were newly marked.
    pub async fn mark_all_read(&self, company_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = now() WHERE company_id = $1 AND read_at IS NULL",
        )
        .bind(company_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    pub async fn unread_count(&self, company_id: Uuid) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE company_id = $1 AND read_at IS NULL")
            .bind(company_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }
}

/// Insert a threshold alert unless it already fired this period.
pub(crate) async fn insert_threshold<'e, E>(executor: E, n: &NewThresholdNotification) -> Result<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "INSERT INTO notifications (id, company_id, kind, metric, period, threshold, message)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (company_id, metric, period, threshold) DO NOTHING",
    )
    .bind(leadforge_core::new_v7())
    .bind(n.company_id)
    .bind(USAGE_THRESHOLD_KIND)
    .bind(n.metric.as_str())
    .bind(n.period.to_string())
    .bind(n.threshold)
    .bind(&n.message)
    .execute(executor)
    .await
    .map_err(Error::Database)?;
    Ok(result.rows_affected() > 0)
}

fn parse_notification(r: &PgRow) -> Result<Notification> {
    Ok(Notification {
        id: r.get("id"),
        company_id: r.get("company_id"),
        kind: r.get("kind"),
        metric: text_enum_opt(r, "metric")?,
        period: r.get("period"),
        threshold: r.get("threshold"),
        message: r.get("message"),
        read_at: r.get("read_at"),
        created_at: r.get("created_at"),
    })
}
