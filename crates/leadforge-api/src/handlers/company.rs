//! The caller's company.

use axum::{extract::State, Json};

use leadforge_core::{ChangePlanRequest, Company, UpdateCompanyRequest, UserRole};

use crate::{ApiError, AppState, RequireAuth};

#[utoipa::path(get, path = "/api/v1/company", tag = "Company",
    responses((status = 200, description = "Current company", body = Company)))]
pub async fn get_company(
    auth: RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Company>, ApiError> {
    let company = state.db.companies.get(auth.principal.company_id).await?;
    Ok(Json(company))
}

/// Update name, domain, or settings. Admin and above.
#[utoipa::path(patch, path = "/api/v1/company", tag = "Company",
    request_body = UpdateCompanyRequest,
    responses((status = 200, description = "Updated company", body = Company)))]
pub async fn update_company(
    auth: RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<UpdateCompanyRequest>,
) -> Result<Json<Company>, ApiError> {
    auth.require_role(UserRole::Admin)?;
    let company = state
        .db
        .companies
        .update(auth.principal.company_id, &req)
        .await?;
    Ok(Json(company))
}

/// Switch the subscription plan. Owner only.
#[utoipa::path(put, path = "/api/v1/company/plan", tag = "Company",
    request_body = ChangePlanRequest,
    responses(
        (status = 200, description = "Plan changed", body = Company),
        (status = 403, description = "Caller is not an owner"),
    ))]
pub async fn change_plan(
    auth: RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<ChangePlanRequest>,
) -> Result<Json<Company>, ApiError> {
    auth.require_role(UserRole::Owner)?;
    let company_id = auth.principal.company_id;
    let (company, previous) = state
        .db
        .companies
        .set_plan(company_id, req.plan, Some(auth.principal.user_id))
        .await?;

    if previous != req.plan {
        tracing::info!(
            subsystem = "api",
            component = "company",
            op = "change_plan",
            company_id = %company_id,
            from = previous.as_str(),
            to = req.plan.as_str(),
            "Plan changed"
        );
    }
    Ok(Json(company))
}
