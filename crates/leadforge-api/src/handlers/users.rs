//! User management within the caller's company. Admin and above.
//!
//! Only owners may grant the owner role or touch another owner's account.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use leadforge_auth::validate_password;
use leadforge_core::{
    normalize_email, ChangeRoleRequest, CreateUserRequest, Principal, User, UserRole,
};
use leadforge_db::NewUser;

use crate::services::auth_service::trimmed;
use crate::{ApiError, AppState, RequireAuth};

/// Owners only may act on owners or hand out the owner role.
fn ensure_may_manage(principal: &Principal, target: UserRole) -> Result<(), ApiError> {
    if target == UserRole::Owner && principal.role != UserRole::Owner {
        return Err(ApiError::Forbidden(
            "only an owner can manage owners".to_string(),
        ));
    }
    Ok(())
}

#[utoipa::path(get, path = "/api/v1/users", tag = "Users",
    responses((status = 200, description = "Users of the company", body = [User])))]
pub async fn list_users(
    auth: RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ApiError> {
    auth.require_role(UserRole::Admin)?;
    let users = state.db.users.list(auth.principal.company_id).await?;
    Ok(Json(users))
}

#[utoipa::path(post, path = "/api/v1/users", tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 409, description = "Email already registered"),
    ))]
pub async fn create_user(
    auth: RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(UserRole::Admin)?;
    ensure_may_manage(&auth.principal, req.role)?;

    let email = normalize_email(&req.email)?;
    validate_password(&req.password)?;
    let new_user = NewUser {
        email,
        password_hash: state.auth.passwords().hash(&req.password)?,
        full_name: trimmed(req.full_name.as_deref()),
        role: req.role,
    };
    let user = state
        .db
        .users
        .create(
            auth.principal.company_id,
            &new_user,
            Some(auth.principal.user_id),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(patch, path = "/api/v1/users/{id}/role", tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = User),
        (status = 409, description = "Would leave the company without an owner"),
    ))]
pub async fn change_role(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<Json<User>, ApiError> {
    auth.require_role(UserRole::Admin)?;
    let company_id = auth.principal.company_id;
    let current = state.db.users.get(company_id, id).await?;
    ensure_may_manage(&auth.principal, current.role)?;
    ensure_may_manage(&auth.principal, req.role)?;

    if current.role == req.role {
        return Ok(Json(current));
    }
    let user = state
        .db
        .users
        .set_role(company_id, id, req.role, Some(auth.principal.user_id))
        .await?;
    Ok(Json(user))
}

/// Deactivate a user and revoke every session they hold.
#[utoipa::path(post, path = "/api/v1/users/{id}/deactivate", tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deactivated", body = User),
        (status = 409, description = "Last owner cannot be deactivated"),
    ))]
pub async fn deactivate_user(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    auth.require_role(UserRole::Admin)?;
    let company_id = auth.principal.company_id;
    let current = state.db.users.get(company_id, id).await?;
    ensure_may_manage(&auth.principal, current.role)?;

    let user = state
        .db
        .users
        .deactivate(company_id, id, Some(auth.principal.user_id))
        .await?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: UserRole) -> Principal {
        Principal {
            user_id: Uuid::nil(),
            company_id: Uuid::nil(),
            role,
        }
    }

    #[test]
    fn test_admin_cannot_manage_owners() {
        let admin = principal(UserRole::Admin);
        assert!(ensure_may_manage(&admin, UserRole::Member).is_ok());
        assert!(ensure_may_manage(&admin, UserRole::Admin).is_ok());
        assert!(matches!(
            ensure_may_manage(&admin, UserRole::Owner),
            Err(ApiError::Forbidden(_))
        ));
        assert!(ensure_may_manage(&principal(UserRole::Owner), UserRole::Owner).is_ok());
    }
}
