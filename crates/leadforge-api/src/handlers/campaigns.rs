//! Campaign endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use leadforge_core::{
    clamp_page, Campaign, CampaignStatus, CreateCampaignRequest, EnrollLeadsRequest,
    EnrollResponse, UpdateCampaignRequest,
};

use crate::query_types::empty_as_none;
use crate::{ApiError, AppState, ListResponse, RequireAuth};

#[derive(Debug, Default, Deserialize)]
pub struct ListCampaignsQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<CampaignStatus>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<i64>,
}

#[utoipa::path(get, path = "/api/v1/campaigns", tag = "Campaigns",
    params(
        ("status" = Option<String>, Query, description = "draft | active | paused | completed"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("offset" = Option<i64>, Query, description = "Page offset"),
    ),
    responses((status = 200, description = "Paginated campaigns")))]
pub async fn list_campaigns(
    auth: RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<ListCampaignsQuery>,
) -> Result<Json<ListResponse<Campaign>>, ApiError> {
    let (limit, offset) = clamp_page(query.limit, query.offset);
    let (campaigns, total) = state
        .db
        .campaigns
        .list(auth.principal.company_id, query.status, limit, offset)
        .await?;
    Ok(Json(ListResponse::new(campaigns, total, limit, offset)))
}

/// Create a draft campaign. Without `persona_id` the default persona is used.
#[utoipa::path(post, path = "/api/v1/campaigns", tag = "Campaigns",
    request_body = CreateCampaignRequest,
    responses(
        (status = 201, description = "Draft campaign", body = Campaign),
        (status = 400, description = "No persona given and no default persona"),
    ))]
pub async fn create_campaign(
    auth: RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let company_id = auth.principal.company_id;
    let persona = match req.persona_id {
        Some(id) => state.db.personas.get(company_id, id).await?,
        None => state
            .db
            .personas
            .get_default(company_id)
            .await?
            .ok_or_else(|| {
                ApiError::BadRequest("persona_id is required when no default persona exists".into())
            })?,
    };
    let campaign = state
        .db
        .campaigns
        .create(
            company_id,
            persona.id,
            &req.name,
            req.subject_template.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

#[utoipa::path(get, path = "/api/v1/campaigns/{id}", tag = "Campaigns",
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses((status = 200, description = "Campaign", body = Campaign)))]
pub async fn get_campaign(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Campaign>, ApiError> {
    let campaign = state.db.campaigns.get(auth.principal.company_id, id).await?;
    Ok(Json(campaign))
}

/// Edit a draft or paused campaign.
#[utoipa::path(patch, path = "/api/v1/campaigns/{id}", tag = "Campaigns",
    params(("id" = Uuid, Path, description = "Campaign ID")),
    request_body = UpdateCampaignRequest,
    responses(
        (status = 200, description = "Updated campaign", body = Campaign),
        (status = 409, description = "Campaign is active or completed"),
    ))]
pub async fn update_campaign(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCampaignRequest>,
) -> Result<Json<Campaign>, ApiError> {
    let campaign = state
        .db
        .campaigns
        .update(auth.principal.company_id, id, &req)
        .await?;
    Ok(Json(campaign))
}

/// Enroll leads. Closed and already-enrolled leads are skipped.
#[utoipa::path(post, path = "/api/v1/campaigns/{id}/leads", tag = "Campaigns",
    params(("id" = Uuid, Path, description = "Campaign ID")),
    request_body = EnrollLeadsRequest,
    responses(
        (status = 200, description = "Enrollment result", body = EnrollResponse),
        (status = 409, description = "Campaign is active or completed"),
    ))]
pub async fn enroll_leads(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<EnrollLeadsRequest>,
) -> Result<Json<EnrollResponse>, ApiError> {
    if req.lead_ids.is_empty() {
        return Err(ApiError::BadRequest("lead_ids cannot be empty".into()));
    }
    let response = state
        .db
        .campaigns
        .enroll(auth.principal.company_id, id, &req.lead_ids)
        .await?;
    Ok(Json(response))
}

#[utoipa::path(post, path = "/api/v1/campaigns/{id}/launch", tag = "Campaigns",
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Active campaign", body = Campaign),
        (status = 402, description = "AI generation quota exhausted"),
        (status = 409, description = "Campaign cannot be launched from its state"),
    ))]
pub async fn launch_campaign(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Campaign>, ApiError> {
    let campaign = state.campaigns.launch(&auth.principal, id).await?;
    Ok(Json(campaign))
}

#[utoipa::path(post, path = "/api/v1/campaigns/{id}/pause", tag = "Campaigns",
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses((status = 200, description = "Paused campaign", body = Campaign)))]
pub async fn pause_campaign(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Campaign>, ApiError> {
    let campaign = state.campaigns.pause(&auth.principal, id).await?;
    Ok(Json(campaign))
}

#[utoipa::path(post, path = "/api/v1/campaigns/{id}/complete", tag = "Campaigns",
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses((status = 200, description = "Completed campaign", body = Campaign)))]
pub async fn complete_campaign(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Campaign>, ApiError> {
    let campaign = state.campaigns.complete(&auth.principal, id).await?;
    Ok(Json(campaign))
}
