//! AI persona endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use leadforge_core::{AiPersona, CreatePersonaRequest, UpdatePersonaRequest};

use crate::{ApiError, AppState, RequireAuth};

#[utoipa::path(get, path = "/api/v1/personas", tag = "Personas",
    responses((status = 200, description = "Personas, default first", body = [AiPersona])))]
pub async fn list_personas(
    auth: RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<AiPersona>>, ApiError> {
    let personas = state.db.personas.list(auth.principal.company_id).await?;
    Ok(Json(personas))
}

/// Create a persona. The first persona of a company becomes its default.
#[utoipa::path(post, path = "/api/v1/personas", tag = "Personas",
    request_body = CreatePersonaRequest,
    responses((status = 201, description = "Persona created", body = AiPersona)))]
pub async fn create_persona(
    auth: RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<CreatePersonaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let persona = state
        .db
        .personas
        .create(auth.principal.company_id, &req)
        .await?;
    Ok((StatusCode::CREATED, Json(persona)))
}

#[utoipa::path(get, path = "/api/v1/personas/{id}", tag = "Personas",
    params(("id" = Uuid, Path, description = "Persona ID")),
    responses((status = 200, description = "Persona", body = AiPersona)))]
pub async fn get_persona(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AiPersona>, ApiError> {
    let persona = state.db.personas.get(auth.principal.company_id, id).await?;
    Ok(Json(persona))
}

#[utoipa::path(patch, path = "/api/v1/personas/{id}", tag = "Personas",
    params(("id" = Uuid, Path, description = "Persona ID")),
    request_body = UpdatePersonaRequest,
    responses((status = 200, description = "Updated persona", body = AiPersona)))]
pub async fn update_persona(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePersonaRequest>,
) -> Result<Json<AiPersona>, ApiError> {
    let persona = state
        .db
        .personas
        .update(auth.principal.company_id, id, &req)
        .await?;
    Ok(Json(persona))
}

/// Delete a persona. Refused while a campaign still uses it.
#[utoipa::path(delete, path = "/api/v1/personas/{id}", tag = "Personas",
    params(("id" = Uuid, Path, description = "Persona ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 409, description = "Persona is used by a campaign"),
    ))]
pub async fn delete_persona(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.db.personas.delete(auth.principal.company_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(post, path = "/api/v1/personas/{id}/default", tag = "Personas",
    params(("id" = Uuid, Path, description = "Persona ID")),
    responses((status = 200, description = "New default persona", body = AiPersona)))]
pub async fn set_default_persona(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AiPersona>, ApiError> {
    let persona = state
        .db
        .personas
        .set_default(auth.principal.company_id, id)
        .await?;
    Ok(Json(persona))
}
