//! Core traits for leadforge abstractions.
//!
//! The metering service is written against these traits so it can run
//! over Postgres in production and over an in-memory store in tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::NewThresholdNotification;
use crate::usage::{Increment, UsageMetric, UsagePeriod};

/// Storage for `(metric, company, period)` usage counters.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Current count, zero when no row exists yet.
    async fn current(&self, company_id: Uuid, metric: UsageMetric, period: UsagePeriod)
        -> Result<i64>;

    /// Atomically add `amount` to the counter.
    ///
    /// With `Some(limit)`, the increment is applied only if the new count
    /// stays within the limit; otherwise returns `Error::QuotaExceeded` and
    /// writes nothing.
    async fn increment(
        &self,
        company_id: Uuid,
        metric: UsageMetric,
        period: UsagePeriod,
        amount: i64,
        limit: Option<i64>,
    ) -> Result<Increment>;

    /// Give back units reserved by an `increment` whose guarded write then
    /// failed. Never takes the counter below zero.
    async fn release(
        &self,
        company_id: Uuid,
        metric: UsageMetric,
        period: UsagePeriod,
        amount: i64,
    ) -> Result<()>;

    /// Insert a threshold alert. Returns `false` when the alert for this
    /// `(company, metric, period, threshold)` already exists.
    async fn insert_threshold_notification(&self, notification: NewThresholdNotification)
        -> Result<bool>;
}
