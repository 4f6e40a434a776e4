//! Usage metering: metrics, monthly periods, plan quotas, and alert thresholds.
//!
//! Counters are keyed by `(metric, company, period)` where the period is a
//! UTC calendar month. The storage layer performs the upsert-increment; this
//! module owns the pure rules around it (which bucket, which limit, which
//! alert thresholds a given increment crossed).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Percent-of-limit thresholds that raise a notification.
pub const ALERT_THRESHOLDS: [i32; 2] = [80, 100];

/// A metered quantity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum UsageMetric {
    LeadsCreated,
    EmailsSent,
    AiGenerations,
    WorkflowRuns,
}

impl UsageMetric {
    pub const ALL: [UsageMetric; 4] = [
        UsageMetric::LeadsCreated,
        UsageMetric::EmailsSent,
        UsageMetric::AiGenerations,
        UsageMetric::WorkflowRuns,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UsageMetric::LeadsCreated => "leads_created",
            UsageMetric::EmailsSent => "emails_sent",
            UsageMetric::AiGenerations => "ai_generations",
            UsageMetric::WorkflowRuns => "workflow_runs",
        }
    }

    /// Human label used in notification messages.
    pub fn label(&self) -> &'static str {
        match self {
            UsageMetric::LeadsCreated => "leads created",
            UsageMetric::EmailsSent => "emails sent",
            UsageMetric::AiGenerations => "AI generations",
            UsageMetric::WorkflowRuns => "workflow runs",
        }
    }
}

impl fmt::Display for UsageMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UsageMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "leads_created" => Ok(UsageMetric::LeadsCreated),
            "emails_sent" => Ok(UsageMetric::EmailsSent),
            "ai_generations" => Ok(UsageMetric::AiGenerations),
            "workflow_runs" => Ok(UsageMetric::WorkflowRuns),
            other => Err(Error::InvalidInput(format!("unknown usage metric: {other}"))),
        }
    }
}

/// Subscription plan of a company.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Starter,
    Growth,
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Starter => "starter",
            Plan::Growth => "growth",
            Plan::Enterprise => "enterprise",
        }
    }

    /// Monthly limit for a metric. `None` means unlimited.
    pub fn limit(&self, metric: UsageMetric) -> Option<i64> {
        use UsageMetric::*;
        match (self, metric) {
            (Plan::Free, LeadsCreated) => Some(100),
            (Plan::Free, EmailsSent) => Some(200),
            (Plan::Free, AiGenerations) => Some(50),
            (Plan::Free, WorkflowRuns) => Some(100),
            (Plan::Starter, LeadsCreated) => Some(1_000),
            (Plan::Starter, EmailsSent) => Some(5_000),
            (Plan::Starter, AiGenerations) => Some(2_000),
            (Plan::Starter, WorkflowRuns) => Some(2_000),
            (Plan::Growth, LeadsCreated) => Some(10_000),
            (Plan::Growth, EmailsSent) => Some(50_000),
            (Plan::Growth, AiGenerations) => Some(20_000),
            (Plan::Growth, WorkflowRuns) => Some(20_000),
            (Plan::Enterprise, _) => None,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "free" => Ok(Plan::Free),
            "starter" => Ok(Plan::Starter),
            "growth" => Ok(Plan::Growth),
            "enterprise" => Ok(Plan::Enterprise),
            other => Err(Error::InvalidInput(format!("unknown plan: {other}"))),
        }
    }
}

/// A UTC calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UsagePeriod {
    year: i32,
    month: u32,
}

impl UsagePeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidInput(format!("invalid month: {month}")));
        }
        Ok(Self { year, month })
    }

    /// The period containing `ts`.
    pub fn containing(ts: DateTime<Utc>) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }

    pub fn current() -> Self {
        Self::containing(Utc::now())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// This period and the `count - 1` before it, newest first.
    pub fn trailing(&self, count: usize) -> Vec<UsagePeriod> {
        let mut out = Vec::with_capacity(count);
        let mut period = *self;
        for _ in 0..count {
            out.push(period);
            period = period.previous();
        }
        out
    }
}

impl fmt::Display for UsagePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for UsagePeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidInput(format!("invalid usage period: {s}"));
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        UsagePeriod::new(year, month)
    }
}

impl Serialize for UsagePeriod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UsagePeriod {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Counter values on either side of one increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increment {
    pub before: i64,
    pub after: i64,
}

/// Thresholds (in percent) that the move from `before` to `after` crossed.
///
/// A threshold `t` is crossed when `before < t% of limit <= after`, so each
/// one fires exactly once per period no matter how the count grows.
pub fn crossed_thresholds(increment: Increment, limit: i64) -> Vec<i32> {
    if limit <= 0 {
        return Vec::new();
    }
    ALERT_THRESHOLDS
        .iter()
        .copied()
        .filter(|t| {
            let mark = i64::from(*t) * limit;
            increment.before * 100 < mark && increment.after * 100 >= mark
        })
        .collect()
}

/// Check whether `amount` more units fit under `limit`.
pub fn check_quota(metric: UsageMetric, used: i64, amount: i64, limit: Option<i64>) -> Result<()> {
    match limit {
        Some(limit) if used + amount > limit => Err(Error::QuotaExceeded {
            metric,
            used,
            limit,
        }),
        _ => Ok(()),
    }
}

/// Quota standing of one metric for one period.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct QuotaStatus {
    pub metric: UsageMetric,
    #[schema(value_type = String, example = "2026-10")]
    pub period: UsagePeriod,
    pub used: i64,
    /// None when the plan is unlimited for this metric.
    pub limit: Option<i64>,
    pub remaining: Option<i64>,
    pub percent: Option<f64>,
}

impl QuotaStatus {
    pub fn new(metric: UsageMetric, period: UsagePeriod, used: i64, limit: Option<i64>) -> Self {
        let remaining = limit.map(|l| (l - used).max(0));
        let percent = limit.filter(|l| *l > 0).map(|l| {
            let pct = used as f64 * 100.0 / l as f64;
            (pct * 10.0).round() / 10.0
        });
        Self {
            metric,
            period,
            used,
            limit,
            remaining,
            percent,
        }
    }
}

/// Notification text for a crossed threshold.
pub fn threshold_message(metric: UsageMetric, period: UsagePeriod, threshold: i32, limit: i64) -> String {
    if threshold >= 100 {
        format!(
            "Monthly limit reached: {} of {} {} used for {}",
            limit,
            limit,
            metric.label(),
            period
        )
    } else {
        format!(
            "{}% of monthly {} quota used ({} limit) for {}",
            threshold,
            metric.label(),
            limit,
            period
        )
    }
}
