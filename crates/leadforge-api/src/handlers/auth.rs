//! Registration, login, and session endpoints.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use leadforge_core::{
    AuthResponse, LoginRequest, MeResponse, RefreshRequest, RegisterRequest, TokenPair,
};

use crate::{ApiError, AppState, RequireAuth};

fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok())
}

/// Create a company with its first (owner) user.
#[utoipa::path(post, path = "/api/v1/auth/register", tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Company and owner created", body = AuthResponse),
        (status = 409, description = "Email already registered"),
    ))]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.auth.register(&req, user_agent(&headers)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(post, path = "/api/v1/auth/login", tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid email or password"),
    ))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let response = state.auth.login(&req, user_agent(&headers)).await?;
    Ok(Json(response))
}

/// Rotate a refresh token.
#[utoipa::path(post, path = "/api/v1/auth/refresh", tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Token invalid, expired, or reused"),
    ))]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let tokens = state
        .auth
        .refresh(&req.refresh_token, user_agent(&headers))
        .await?;
    Ok(Json(tokens))
}

#[utoipa::path(post, path = "/api/v1/auth/logout", tag = "Auth",
    request_body = RefreshRequest,
    responses((status = 204, description = "Session revoked")))]
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<StatusCode, ApiError> {
    state.auth.logout(&req.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(post, path = "/api/v1/auth/logout-all", tag = "Auth",
    responses((status = 200, description = "Every session of the caller revoked")))]
pub async fn logout_all(
    auth: RequireAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = state.auth.logout_all(&auth.principal).await?;
    Ok(Json(serde_json::json!({ "revoked": revoked })))
}

#[utoipa::path(get, path = "/api/v1/auth/me", tag = "Auth",
    responses((status = 200, description = "Current user and company", body = MeResponse)))]
pub async fn me(
    auth: RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<MeResponse>, ApiError> {
    let (user, company) = state.auth.me(&auth.principal).await?;
    Ok(Json(MeResponse { user, company }))
}
