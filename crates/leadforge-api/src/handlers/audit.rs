//! Company audit log. Admin and above.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use leadforge_core::{clamp_page, AuditEntry, AuditFilter, UserRole};

use crate::query_types::empty_as_none;
use crate::{ApiError, AppState, ListResponse, RequireAuth};

#[derive(Debug, Default, Deserialize)]
pub struct ListAuditQuery {
    pub entity_type: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub entity_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<i64>,
}

#[utoipa::path(get, path = "/api/v1/audit", tag = "Audit",
    params(
        ("entity_type" = Option<String>, Query, description = "lead | campaign | user | company"),
        ("entity_id" = Option<Uuid>, Query, description = "Filter by entity"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("offset" = Option<i64>, Query, description = "Page offset"),
    ),
    responses((status = 200, description = "Audit entries, newest first")))]
pub async fn list_audit(
    auth: RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<ListAuditQuery>,
) -> Result<Json<ListResponse<AuditEntry>>, ApiError> {
    auth.require_role(UserRole::Admin)?;
    let (limit, offset) = clamp_page(query.limit, query.offset);
    let filter = AuditFilter {
        entity_type: query
            .entity_type
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty()),
        entity_id: query.entity_id,
        limit,
        offset,
    };
    let (entries, total) = state
        .db
        .audit
        .list(auth.principal.company_id, &filter)
        .await?;
    Ok(Json(ListResponse::new(entries, total, limit, offset)))
}
