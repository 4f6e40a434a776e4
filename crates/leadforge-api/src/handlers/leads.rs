//! Lead endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use leadforge_core::{
    clamp_page, BulkImportRequest, BulkImportResponse, CreateLeadRequest, Lead, LeadFilter,
    LeadSort, LeadStatus, LeadStatusChange, SortOrder, TransitionRequest, UpdateLeadRequest,
};

use crate::query_types::empty_as_none;
use crate::{ApiError, AppState, ListResponse, RequireAuth};

/// Query parameters for `GET /api/v1/leads`.
#[derive(Debug, Default, Deserialize)]
pub struct ListLeadsQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<LeadStatus>,
    /// Matches name, email, or organization.
    pub search: Option<String>,
    pub tag: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub min_score: Option<i32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub owner_id: Option<Uuid>,
    pub sort: Option<LeadSort>,
    pub order: Option<SortOrder>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<i64>,
}

impl ListLeadsQuery {
    fn into_filter(self) -> LeadFilter {
        let (limit, offset) = clamp_page(self.limit, self.offset);
        let non_blank = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        LeadFilter {
            status: self.status,
            search: non_blank(self.search),
            tag: non_blank(self.tag).map(|t| t.to_lowercase()),
            min_score: self.min_score,
            owner_id: self.owner_id,
            sort: self.sort.unwrap_or_default(),
            order: self.order.unwrap_or_default(),
            limit,
            offset,
        }
    }
}

#[utoipa::path(get, path = "/api/v1/leads", tag = "Leads",
    params(
        ("status" = Option<String>, Query, description = "Filter by lifecycle status"),
        ("search" = Option<String>, Query, description = "Search name, email, organization"),
        ("tag" = Option<String>, Query, description = "Filter by tag"),
        ("min_score" = Option<i32>, Query, description = "Minimum score"),
        ("owner_id" = Option<Uuid>, Query, description = "Filter by owner"),
        ("sort" = Option<String>, Query, description = "created_at | updated_at | score"),
        ("order" = Option<String>, Query, description = "asc | desc"),
        ("limit" = Option<i64>, Query, description = "Page size (default 50, max 200)"),
        ("offset" = Option<i64>, Query, description = "Page offset"),
    ),
    responses((status = 200, description = "Paginated leads")))]
pub async fn list_leads(
    auth: RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<ListLeadsQuery>,
) -> Result<Json<ListResponse<Lead>>, ApiError> {
    let filter = query.into_filter();
    let (leads, total) = state
        .db
        .leads
        .list(auth.principal.company_id, &filter)
        .await?;
    Ok(Json(ListResponse::new(leads, total, filter.limit, filter.offset)))
}

/// Create a lead. Counts against the monthly `leads_created` quota.
#[utoipa::path(post, path = "/api/v1/leads", tag = "Leads",
    request_body = CreateLeadRequest,
    responses(
        (status = 201, description = "Lead created", body = Lead),
        (status = 402, description = "Monthly lead quota exhausted"),
        (status = 409, description = "A lead with this email already exists"),
    ))]
pub async fn create_lead(
    auth: RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<CreateLeadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lead = state.leads.create(&auth.principal, req).await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

/// Import up to 500 leads at once. Nothing is imported if any row fails.
#[utoipa::path(post, path = "/api/v1/leads/bulk", tag = "Leads",
    request_body = BulkImportRequest,
    responses(
        (status = 201, description = "Leads imported", body = BulkImportResponse),
        (status = 402, description = "Batch does not fit in the remaining quota"),
    ))]
pub async fn bulk_import(
    auth: RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<BulkImportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.leads.bulk_import(&auth.principal, req.leads).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(get, path = "/api/v1/leads/{id}", tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Lead", body = Lead),
        (status = 404, description = "Not found"),
    ))]
pub async fn get_lead(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Lead>, ApiError> {
    let lead = state.db.leads.get(auth.principal.company_id, id).await?;
    Ok(Json(lead))
}

#[utoipa::path(patch, path = "/api/v1/leads/{id}", tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead ID")),
    request_body = UpdateLeadRequest,
    responses((status = 200, description = "Updated lead", body = Lead)))]
pub async fn update_lead(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLeadRequest>,
) -> Result<Json<Lead>, ApiError> {
    let lead = state.leads.update(&auth.principal, id, &req).await?;
    Ok(Json(lead))
}

#[utoipa::path(delete, path = "/api/v1/leads/{id}", tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ))]
pub async fn delete_lead(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.db.leads.delete(auth.principal.company_id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("lead {id} not found")))
    }
}

/// Move a lead through its lifecycle.
#[utoipa::path(post, path = "/api/v1/leads/{id}/status", tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead ID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Lead after the move", body = Lead),
        (status = 422, description = "Transition not allowed"),
    ))]
pub async fn transition_lead(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Lead>, ApiError> {
    let lead = state
        .leads
        .transition(&auth.principal, id, req.status, req.reason)
        .await?;
    Ok(Json(lead))
}

#[utoipa::path(get, path = "/api/v1/leads/{id}/history", tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead ID")),
    responses((status = 200, description = "Status changes, oldest first", body = [LeadStatusChange])))]
pub async fn lead_history(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<LeadStatusChange>>, ApiError> {
    let company_id = auth.principal.company_id;
    state.db.leads.get(company_id, id).await?;
    let history = state.db.leads.history(company_id, id).await?;
    Ok(Json(history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadforge_core::defaults::PAGE_LIMIT_MAX;

    #[test]
    fn test_query_to_filter() {
        let query: ListLeadsQuery = serde_json::from_value(serde_json::json!({
            "status": "replied",
            "search": "  ada ",
            "tag": " VIP ",
            "min_score": "40",
            "owner_id": "",
            "sort": "score",
            "order": "asc",
            "limit": "1000"
        }))
        .unwrap();
        let filter = query.into_filter();
        assert_eq!(filter.status, Some(LeadStatus::Replied));
        assert_eq!(filter.search.as_deref(), Some("ada"));
        assert_eq!(filter.tag.as_deref(), Some("vip"));
        assert_eq!(filter.min_score, Some(40));
        assert_eq!(filter.owner_id, None);
        assert_eq!(filter.sort, LeadSort::Score);
        assert_eq!(filter.order, SortOrder::Asc);
        assert_eq!(filter.limit, PAGE_LIMIT_MAX);
    }

    #[test]
    fn test_blank_search_is_dropped() {
        let filter = ListLeadsQuery {
            search: Some("   ".into()),
            ..Default::default()
        }
        .into_filter();
        assert_eq!(filter.search, None);
        assert_eq!(filter.sort, LeadSort::CreatedAt);
        assert_eq!(filter.order, SortOrder::Desc);
    }
}
