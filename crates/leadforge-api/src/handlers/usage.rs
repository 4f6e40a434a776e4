//! Quota standing and usage history.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use leadforge_core::defaults::{USAGE_HISTORY_MONTHS, USAGE_HISTORY_MONTHS_MAX};
use leadforge_core::{Plan, QuotaStatus, UsageMetric, UsagePeriod};

use crate::query_types::empty_as_none;
use crate::{ApiError, AppState, RequireAuth};

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UsageResponse {
    pub plan: Plan,
    #[schema(value_type = String, example = "2026-10")]
    pub period: UsagePeriod,
    pub metrics: Vec<QuotaStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub months: Option<u32>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UsagePoint {
    #[schema(value_type = String, example = "2026-10")]
    pub period: UsagePeriod,
    pub used: i64,
    /// Limit of the current plan; history is not re-rated per month.
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UsageHistoryResponse {
    pub metric: UsageMetric,
    /// Oldest period first.
    pub history: Vec<UsagePoint>,
}

/// Quota standing of every metric in the current month.
#[utoipa::path(get, path = "/api/v1/usage", tag = "Usage",
    responses((status = 200, description = "Current quota status", body = UsageResponse)))]
pub async fn usage_status(
    auth: RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<UsageResponse>, ApiError> {
    let company_id = auth.principal.company_id;
    let plan = state.db.companies.plan(company_id).await?;
    let metrics = state.metering.status(company_id, plan).await?;
    Ok(Json(UsageResponse {
        plan,
        period: UsagePeriod::current(),
        metrics,
    }))
}

#[utoipa::path(get, path = "/api/v1/usage/{metric}/history", tag = "Usage",
    params(
        ("metric" = String, Path, description = "leads_created | emails_sent | ai_generations | workflow_runs"),
        ("months" = Option<u32>, Query, description = "Number of months (default 6, max 24)"),
    ),
    responses((status = 200, description = "Monthly usage", body = UsageHistoryResponse)))]
pub async fn usage_history(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(metric): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<UsageHistoryResponse>, ApiError> {
    let metric: UsageMetric = metric.parse()?;
    let months = query
        .months
        .unwrap_or(USAGE_HISTORY_MONTHS)
        .clamp(1, USAGE_HISTORY_MONTHS_MAX);

    let company_id = auth.principal.company_id;
    let plan = state.db.companies.plan(company_id).await?;
    let periods = UsagePeriod::current().trailing(months as usize);
    let mut rows = state.db.usage.history(company_id, metric, &periods).await?;
    rows.sort_by_key(|(period, _)| *period);

    let history = rows
        .into_iter()
        .map(|(period, used)| UsagePoint {
            period,
            used,
            limit: plan.limit(metric),
        })
        .collect();
    Ok(Json(UsageHistoryResponse { metric, history }))
}
