//! Usage alert notifications.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use leadforge_core::{clamp_page, Notification};

use crate::query_types::empty_as_none;
use crate::{ApiError, AppState, RequireAuth};

#[derive(Debug, Default, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub unread: Option<bool>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct NotificationsResponse {
    pub data: Vec<Notification>,
    pub unread: i64,
}

#[utoipa::path(get, path = "/api/v1/notifications", tag = "Notifications",
    params(
        ("unread" = Option<bool>, Query, description = "Only unread notifications"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("offset" = Option<i64>, Query, description = "Page offset"),
    ),
    responses((status = 200, description = "Newest first", body = NotificationsResponse)))]
pub async fn list_notifications(
    auth: RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<NotificationsResponse>, ApiError> {
    let company_id = auth.principal.company_id;
    let (limit, offset) = clamp_page(query.limit, query.offset);
    let data = state
        .db
        .notifications
        .list(company_id, query.unread.unwrap_or(false), limit, offset)
        .await?;
    let unread = state.db.notifications.unread_count(company_id).await?;
    Ok(Json(NotificationsResponse { data, unread }))
}

#[utoipa::path(post, path = "/api/v1/notifications/{id}/read", tag = "Notifications",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses((status = 200, description = "Notification marked read", body = Notification)))]
pub async fn mark_read(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    let notification = state
        .db
        .notifications
        .mark_read(auth.principal.company_id, id)
        .await?;
    Ok(Json(notification))
}

#[utoipa::path(post, path = "/api/v1/notifications/read-all", tag = "Notifications",
    responses((status = 200, description = "Number of notifications marked read")))]
pub async fn mark_all_read(
    auth: RequireAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .db
        .notifications
        .mark_all_read(auth.principal.company_id)
        .await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}
