//! Usage metering and quota enforcement.
//!
//! Counters live behind [`UsageStore`], so this service runs unchanged over
//! Postgres and over the in-memory store used in tests.
//!
//! ## Threshold alerts
//!
//! After every successful increment, each alert threshold crossed by that
//! increment produces one notification. The store's unique key on
//! `(company, metric, period, threshold)` keeps concurrent requests from
//! alerting twice; only the request that actually inserted the
//! notification emits [`DomainEvent::UsageThresholdReached`].

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use leadforge_core::{
    crossed_thresholds, threshold_message, DomainEvent, Error, EventActor, EventBus, Increment,
    NewThresholdNotification, Plan, QuotaStatus, Result, UsageMetric, UsagePeriod, UsageStore,
};

/// A successful increment and the period it landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metered {
    pub metric: UsageMetric,
    pub period: UsagePeriod,
    pub amount: i64,
    pub increment: Increment,
}

#[derive(Clone)]
pub struct Metering {
    store: Arc<dyn UsageStore>,
    events: Arc<EventBus>,
}

impl Metering {
    pub fn new(store: Arc<dyn UsageStore>, events: Arc<EventBus>) -> Self {
        Self { store, events }
    }

    /// Count usage that already happened and cannot be refused.
    ///
    /// `limit` is only used to decide which alerts fire.
    pub async fn record(
        &self,
        company_id: Uuid,
        metric: UsageMetric,
        amount: i64,
        limit: Option<i64>,
    ) -> Result<Metered> {
        let period = UsagePeriod::current();
        let increment = self
            .store
            .increment(company_id, metric, period, amount, None)
            .await?;
        if let Some(limit) = limit {
            self.alert_crossed(company_id, metric, period, increment, limit)
                .await;
        }
        Ok(Metered {
            metric,
            period,
            amount,
            increment,
        })
    }

    /// Atomically reserve `amount` units under `limit`.
    ///
    /// Fails with `QuotaExceeded` and writes nothing when the units do not
    /// fit. With no limit this is [`Metering::record`].
    pub async fn consume(
        &self,
        company_id: Uuid,
        metric: UsageMetric,
        amount: i64,
        limit: Option<i64>,
    ) -> Result<Metered> {
        let Some(limit) = limit else {
            return self.record(company_id, metric, amount, None).await;
        };

        let period = UsagePeriod::current();
        let increment = match self
            .store
            .increment(company_id, metric, period, amount, Some(limit))
            .await
        {
            Ok(inc) => inc,
            Err(e @ Error::QuotaExceeded { .. }) => {
                warn!(
                    subsystem = "metering",
                    component = "quota",
                    op = "consume",
                    company_id = %company_id,
                    metric = metric.as_str(),
                    period = %period,
                    amount,
                    limit,
                    "Quota exceeded"
                );
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        debug!(
            subsystem = "metering",
            component = "quota",
            op = "consume",
            company_id = %company_id,
            metric = metric.as_str(),
            period = %period,
            before = increment.before,
            after = increment.after,
            limit,
            "Usage consumed"
        );
        self.alert_crossed(company_id, metric, period, increment, limit)
            .await;
        Ok(Metered {
            metric,
            period,
            amount,
            increment,
        })
    }

    /// [`Metering::consume`] against a plan's limit for the metric.
    pub async fn consume_for_plan(
        &self,
        company_id: Uuid,
        plan: Plan,
        metric: UsageMetric,
        amount: i64,
    ) -> Result<Metered> {
        self.consume(company_id, metric, amount, plan.limit(metric))
            .await
    }

    /// Give back a reservation whose guarded write failed.
    ///
    /// Alerts already sent for the reservation stay sent.
    pub async fn release(&self, company_id: Uuid, metered: &Metered) {
        if let Err(e) = self
            .store
            .release(company_id, metered.metric, metered.period, metered.amount)
            .await
        {
            warn!(
                subsystem = "metering",
                component = "quota",
                op = "release",
                company_id = %company_id,
                metric = metered.metric.as_str(),
                error = %e,
                "Failed to release reserved usage"
            );
        }
    }

    /// Quota standing of every metric in the current period.
    pub async fn status(&self, company_id: Uuid, plan: Plan) -> Result<Vec<QuotaStatus>> {
        let period = UsagePeriod::current();
        let mut out = Vec::with_capacity(UsageMetric::ALL.len());
        for metric in UsageMetric::ALL {
            let used = self.store.current(company_id, metric, period).await?;
            out.push(QuotaStatus::new(metric, period, used, plan.limit(metric)));
        }
        Ok(out)
    }

    /// Store one notification per crossed threshold and announce the new
    /// ones. Failures are logged; the increment itself already committed.
    async fn alert_crossed(
        &self,
        company_id: Uuid,
        metric: UsageMetric,
        period: UsagePeriod,
        increment: Increment,
        limit: i64,
    ) {
        for threshold in crossed_thresholds(increment, limit) {
            let notification = NewThresholdNotification {
                company_id,
                metric,
                period,
                threshold,
                message: threshold_message(metric, period, threshold, limit),
            };
            match self.store.insert_threshold_notification(notification).await {
                Ok(true) => {
                    info!(
                        subsystem = "metering",
                        component = "alerts",
                        company_id = %company_id,
                        metric = metric.as_str(),
                        period = %period,
                        threshold,
                        used = increment.after,
                        limit,
                        "Usage threshold reached"
                    );
                    self.events.emit(
                        company_id,
                        EventActor::system(),
                        DomainEvent::UsageThresholdReached {
                            metric,
                            period: period.to_string(),
                            threshold,
                            used: increment.after,
                            limit,
                        },
                    );
                }
                Ok(false) => {
                    debug!(
                        subsystem = "metering",
                        component = "alerts",
                        company_id = %company_id,
                        metric = metric.as_str(),
                        threshold,
                        "Threshold already alerted this period"
                    );
                }
                Err(e) => {
                    warn!(
                        subsystem = "metering",
                        component = "alerts",
                        company_id = %company_id,
                        metric = metric.as_str(),
                        threshold,
                        error = %e,
                        "Failed to store threshold notification"
                    );
                }
            }
        }
    }
}

/// In-memory [`UsageStore`] for tests.
#[cfg(test)]
pub(crate) mod memory {
    use std::collections::{HashMap, HashSet};

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;

    type Key = (Uuid, UsageMetric, UsagePeriod);

    #[derive(Default)]
    pub struct MemoryUsageStore {
        counters: Mutex<HashMap<Key, i64>>,
        pub alerts: Mutex<HashSet<(Uuid, UsageMetric, UsagePeriod, i32)>>,
    }

    #[async_trait]
    impl UsageStore for MemoryUsageStore {
        async fn current(&self, company_id: Uuid, metric: UsageMetric, period: UsagePeriod) -> Result<i64> {
            let counters = self.counters.lock().await;
            Ok(*counters.get(&(company_id, metric, period)).unwrap_or(&0))
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
                return Err(Error::InvalidInput("amount must be positive".into()));
            }
            let mut counters = self.counters.lock().await;
            let count = counters.entry((company_id, metric, period)).or_insert(0);
            leadforge_core::check_quota(metric, *count, amount, limit)?;
            let before = *count;
            *count += amount;
            Ok(Increment {
                before,
                after: *count,
            })
        }

        async fn release(
            &self,
            company_id: Uuid,
            metric: UsageMetric,
            period: UsagePeriod,
            amount: i64,
        ) -> Result<()> {
            let mut counters = self.counters.lock().await;
            if let Some(count) = counters.get_mut(&(company_id, metric, period)) {
                *count = (*count - amount).max(0);
            }
            Ok(())
        }

        async fn insert_threshold_notification(&self, n: NewThresholdNotification) -> Result<bool> {
            let mut alerts = self.alerts.lock().await;
            Ok(alerts.insert((n.company_id, n.metric, n.period, n.threshold)))
        }
    }
}
