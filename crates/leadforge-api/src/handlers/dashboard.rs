//! Pipeline and engagement overview for the caller's company.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use chrono::{Duration, Utc};

use leadforge_core::defaults::{DASHBOARD_UPCOMING_LIMIT, DASHBOARD_WINDOW_DAYS};
use leadforge_core::scoring::HOT_THRESHOLD;
use leadforge_core::{DashboardSummary, LeadStatus};
use leadforge_db::BookingFilter;

use crate::{ApiError, AppState, RequireAuth};

/// Counts keyed by status name, with zero for statuses that have no leads.
fn by_status(counts: Vec<(LeadStatus, i64)>) -> (BTreeMap<String, i64>, i64) {
    let mut map: BTreeMap<String, i64> = LeadStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut total = 0;
    for (status, count) in counts {
        *map.entry(status.as_str().to_string()).or_insert(0) += count;
        total += count;
    }
    (map, total)
}

#[utoipa::path(get, path = "/api/v1/dashboard/summary", tag = "Dashboard",
    responses((status = 200, description = "Dashboard summary", body = DashboardSummary)))]
pub async fn dashboard_summary(
    auth: RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<DashboardSummary>, ApiError> {
    let company_id = auth.principal.company_id;
    let since = Utc::now() - Duration::days(DASHBOARD_WINDOW_DAYS);

    let (leads_by_status, total_leads) = by_status(state.db.leads.status_counts(company_id).await?);
    let (average_score, hot_leads) = state
        .db
        .leads
        .score_summary(company_id, HOT_THRESHOLD)
        .await?;
    let replies = state
        .db
        .engagement
        .count_replies_since(company_id, since)
        .await?;
    let bookings = state
        .db
        .engagement
        .count_bookings_since(company_id, since)
        .await?;
    let upcoming = BookingFilter {
        upcoming: true,
        limit: DASHBOARD_UPCOMING_LIMIT,
        ..Default::default()
    };
    let (upcoming_bookings, _) = state
        .db
        .engagement
        .list_bookings(company_id, &upcoming)
        .await?;
    let plan = state.db.companies.plan(company_id).await?;
    let quota = state.metering.status(company_id, plan).await?;
    let unread_notifications = state.db.notifications.unread_count(company_id).await?;

    Ok(Json(DashboardSummary {
        leads_by_status,
        total_leads,
        average_score,
        hot_leads,
        replies_last_30_days: replies,
        bookings_last_30_days: bookings,
        upcoming_bookings,
        quota,
        unread_notifications,
    }))
}
