//! Usage counters backing quota enforcement.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use leadforge_core::{
    Error, Increment, NewThresholdNotification, Result, UsageCounter, UsageMetric, UsagePeriod,
    UsageStore,
};

use crate::{notifications, text_enum};

/// PostgreSQL usage repository.
#[derive(Clone)]
pub struct PgUsageRepository {
    pool: Pool<Postgres>,
}

impl PgUsageRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// All counters of one period. Metrics without a row are absent.
    pub async fn list_period(&self, company_id: Uuid, period: UsagePeriod) -> Result<Vec<UsageCounter>> {
        let rows = sqlx::query(
            "SELECT company_id, metric, period, count, updated_at FROM usage_counters
             WHERE company_id = $1 AND period = $2
             ORDER BY metric",
        )
        .bind(company_id)
        .bind(period.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(parse_counter).collect()
    }

    /// Counts of one metric for the given periods, zero-filled, in the
    /// order the periods were passed.
    pub async fn history(
        &self,
        company_id: Uuid,
        metric: UsageMetric,
        periods: &[UsagePeriod],
    ) -> Result<Vec<(UsagePeriod, i64)>> {
        let keys: Vec<String> = periods.iter().map(ToString::to_string).collect();
        let rows = sqlx::query(
            "SELECT period, count FROM usage_counters
             WHERE company_id = $1 AND metric = $2 AND period = ANY($3)",
        )
        .bind(company_id)
        .bind(metric.as_str())
        .bind(&keys)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let found: Vec<(String, i64)> = rows.iter().map(|r| (r.get("period"), r.get("count"))).collect();
        Ok(periods
            .iter()
            .zip(keys.iter())
            .map(|(period, key)| {
                let count = found
                    .iter()
                    .find(|(p, _)| p == key)
                    .map(|(_, c)| *c)
                    .unwrap_or(0);
                (*period, count)
            })
            .collect())
    }
}

#[async_trait]
impl UsageStore for PgUsageRepository {
    async fn current(&self, company_id: Uuid, metric: UsageMetric, period: UsagePeriod) -> Result<i64> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT count FROM usage_counters WHERE company_id = $1 AND metric = $2 AND period = $3",
        )
        .bind(company_id)
        .bind(metric.as_str())
        .bind(period.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count.unwrap_or(0))
    }

    async fn increment(
        &self,
        company_id: Uuid,
        metric: UsageMetric,
        period: UsagePeriod,
        amount: i64,
        limit: Option<i64>,
    ) -> Result<Increment> {
        if amount <= 0 {
            return Err(Error::InvalidInput(format!(
                "usage amount must be positive, got {amount}"
            )));
        }

        // Both the insert and the conflict update are gated on the limit, so a
        // request that does not fit writes nothing at all.
        let after: Option<i64> = sqlx::query_scalar(
            "INSERT INTO usage_counters (company_id, metric, period, count, updated_at)
             SELECT $1, $2, $3, $4, now()
             WHERE $5::bigint IS NULL OR $4 <= $5
             ON CONFLICT (company_id, metric, period) DO UPDATE
                SET count = usage_counters.count + EXCLUDED.count, updated_at = now()
                WHERE $5::bigint IS NULL OR usage_counters.count + EXCLUDED.count <= $5
             RETURNING count",
        )
        .bind(company_id)
        .bind(metric.as_str())
        .bind(period.to_string())
        .bind(amount)
        .bind(limit)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match (after, limit) {
            (Some(after), _) => {
                debug!(
                    subsystem = "db",
                    component = "usage",
                    op = "increment",
                    company_id = %company_id,
                    metric = metric.as_str(),
                    period = %period,
                    count = after,
                    "Usage counter incremented"
                );
                Ok(Increment {
                    before: after - amount,
                    after,
                })
            }
            (None, Some(limit)) => {
                let used = self.current(company_id, metric, period).await?;
                Err(Error::QuotaExceeded { metric, used, limit })
            }
            (None, None) => Err(Error::Internal(format!(
                "unlimited increment of {metric} returned no row"
            ))),
        }
    }

    async fn release(
        &self,
        company_id: Uuid,
        metric: UsageMetric,
        period: UsagePeriod,
        amount: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE usage_counters SET count = GREATEST(count - $4, 0), updated_at = now()
             WHERE company_id = $1 AND metric = $2 AND period = $3",
        )
        .bind(company_id)
        .bind(metric.as_str())
        .bind(period.to_string())
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn insert_threshold_notification(&self, notification: NewThresholdNotification) -> Result<bool> {
        notifications::insert_threshold(&self.pool, &notification).await
    }
}

fn parse_counter(r: &PgRow) -> Result<UsageCounter> {
    Ok(UsageCounter {
        company_id: r.get("company_id"),
        metric: text_enum(r, "metric")?,
        period: text_enum(r, "period")?,
        count: r.get("count"),
        updated_at: r.get("updated_at"),
    })
}
