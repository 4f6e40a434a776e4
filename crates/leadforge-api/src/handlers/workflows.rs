//! Workflow registrations and their runs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use leadforge_core::{
    clamp_page, CreateWorkflowRequest, TriggerWorkflowRequest, UpdateWorkflowRequest, UserRole,
    Workflow, WorkflowRun, SUBSCRIBABLE_EVENTS,
};
use leadforge_relay::check_http_url;

use crate::query_types::{empty_as_none, PageQuery};
use crate::{ApiError, AppState, ListResponse, RequireAuth};

/// A webhook is either an absolute http(s) URL or a path under `N8N_BASE_URL`.
fn validate_webhook_url(url: &str) -> Result<(), ApiError> {
    let url = url.trim();
    if url.starts_with('/') {
        return Ok(());
    }
    check_http_url(url).map_err(|reason| ApiError::BadRequest(format!("webhook_url: {reason}")))
}

fn validate_events(events: &[String]) -> Result<(), ApiError> {
    match events
        .iter()
        .find(|e| !SUBSCRIBABLE_EVENTS.contains(&e.as_str()))
    {
        Some(unknown) => Err(ApiError::BadRequest(format!(
            "unknown event '{unknown}', expected one of: {}",
            SUBSCRIBABLE_EVENTS.join(", ")
        ))),
        None => Ok(()),
    }
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("name cannot be empty".into()));
    }
    Ok(())
}

#[utoipa::path(get, path = "/api/v1/workflows", tag = "Workflows",
    responses((status = 200, description = "Registered workflows", body = [Workflow])))]
pub async fn list_workflows(
    auth: RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Workflow>>, ApiError> {
    auth.require_role(UserRole::Admin)?;
    let workflows = state.db.workflows.list(auth.principal.company_id).await?;
    Ok(Json(workflows))
}

/// Register a webhook. An empty `events` list subscribes to every event.
#[utoipa::path(post, path = "/api/v1/workflows", tag = "Workflows",
    request_body = CreateWorkflowRequest,
    responses(
        (status = 201, description = "Workflow registered", body = Workflow),
        (status = 400, description = "Invalid URL or unknown event"),
    ))]
pub async fn create_workflow(
    auth: RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<CreateWorkflowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(UserRole::Admin)?;
    validate_name(&req.name)?;
    validate_webhook_url(&req.webhook_url)?;
    validate_events(&req.events)?;

    let workflow = state
        .db
        .workflows
        .create(auth.principal.company_id, &req)
        .await?;
    tracing::info!(
        subsystem = "api",
        component = "workflows",
        op = "create",
        workflow_id = %workflow.id,
        kind = workflow.kind.as_str(),
        "Workflow registered"
    );
    Ok((StatusCode::CREATED, Json(workflow)))
}

#[utoipa::path(get, path = "/api/v1/workflows/{id}", tag = "Workflows",
    params(("id" = Uuid, Path, description = "Workflow ID")),
    responses((status = 200, description = "Workflow", body = Workflow)))]
pub async fn get_workflow(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Workflow>, ApiError> {
    auth.require_role(UserRole::Admin)?;
    let workflow = state.db.workflows.get(auth.principal.company_id, id).await?;
    Ok(Json(workflow))
}

#[utoipa::path(patch, path = "/api/v1/workflows/{id}", tag = "Workflows",
    params(("id" = Uuid, Path, description = "Workflow ID")),
    request_body = UpdateWorkflowRequest,
    responses((status = 200, description = "Updated workflow", body = Workflow)))]
pub async fn update_workflow(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateWorkflowRequest>,
) -> Result<Json<Workflow>, ApiError> {
    auth.require_role(UserRole::Admin)?;
    if let Some(name) = &req.name {
        validate_name(name)?;
    }
    if let Some(url) = &req.webhook_url {
        validate_webhook_url(url)?;
    }
    if let Some(events) = &req.events {
        validate_events(events)?;
    }
    let workflow = state
        .db
        .workflows
        .update(auth.principal.company_id, id, &req)
        .await?;
    Ok(Json(workflow))
}

#[utoipa::path(delete, path = "/api/v1/workflows/{id}", tag = "Workflows",
    params(("id" = Uuid, Path, description = "Workflow ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ))]
pub async fn delete_workflow(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.require_role(UserRole::Admin)?;
    if state.db.workflows.delete(auth.principal.company_id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("workflow {id} not found")))
    }
}

/// Fire a workflow by hand. Delivery failures come back as a failed run.
#[utoipa::path(post, path = "/api/v1/workflows/{id}/trigger", tag = "Workflows",
    params(("id" = Uuid, Path, description = "Workflow ID")),
    request_body = TriggerWorkflowRequest,
    responses(
        (status = 200, description = "Run record", body = WorkflowRun),
        (status = 402, description = "Workflow run quota exhausted"),
        (status = 409, description = "Workflow is disabled"),
        (status = 502, description = "Relay not configured"),
    ))]
pub async fn trigger_workflow(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TriggerWorkflowRequest>,
) -> Result<Json<WorkflowRun>, ApiError> {
    let workflow = state.db.workflows.get(auth.principal.company_id, id).await?;
    let run = state
        .relay
        .trigger(&workflow, "manual", req.payload, Some(auth.principal.user_id))
        .await?;
    Ok(Json(run))
}

#[utoipa::path(get, path = "/api/v1/workflows/{id}/runs", tag = "Workflows",
    params(
        ("id" = Uuid, Path, description = "Workflow ID"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("offset" = Option<i64>, Query, description = "Page offset"),
    ),
    responses((status = 200, description = "Runs of one workflow, newest first")))]
pub async fn list_workflow_runs(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<WorkflowRun>>, ApiError> {
    let company_id = auth.principal.company_id;
    state.db.workflows.get(company_id, id).await?;
    let (limit, offset) = page.resolve();
    let (runs, total) = state
        .db
        .workflows
        .list_runs(company_id, Some(id), limit, offset)
        .await?;
    Ok(Json(ListResponse::new(runs, total, limit, offset)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRunsQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub workflow_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<i64>,
}

#[utoipa::path(get, path = "/api/v1/workflow-runs", tag = "Workflows",
    params(
        ("workflow_id" = Option<Uuid>, Query, description = "Filter by workflow"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("offset" = Option<i64>, Query, description = "Page offset"),
    ),
    responses((status = 200, description = "Runs across all workflows, newest first")))]
pub async fn list_runs(
    auth: RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<ListRunsQuery>,
) -> Result<Json<ListResponse<WorkflowRun>>, ApiError> {
    let (limit, offset) = clamp_page(query.limit, query.offset);
    let (runs, total) = state
        .db
        .workflows
        .list_runs(auth.principal.company_id, query.workflow_id, limit, offset)
        .await?;
    Ok(Json(ListResponse::new(runs, total, limit, offset)))
}

#[utoipa::path(get, path = "/api/v1/workflow-runs/{id}", tag = "Workflows",
    params(("id" = Uuid, Path, description = "Run ID")),
    responses((status = 200, description = "Run", body = WorkflowRun)))]
pub async fn get_run(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowRun>, ApiError> {
    let run = state.db.workflows.get_run(auth.principal.company_id, id).await?;
    Ok(Json(run))
}
