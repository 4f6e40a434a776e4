//! leadforge-api - multi-tenant lead management and outreach API.
//!
//! The binary in `main.rs` loads configuration, connects to Postgres and
//! serves [`build_router`]. Everything else lives here so integration tests
//! can drive the same router in-process.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod query_types;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, patch, post, put};
use axum::Router;
use serde::Serialize;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use leadforge_auth::{HashParams, JwtKeys, PasswordHasherService};
use leadforge_core::defaults::{CORS_MAX_AGE_SECS, EVENT_BUS_CAPACITY, MAX_BODY_SIZE_BYTES};
use leadforge_core::{EventBus, Result};
use leadforge_db::Database;
use leadforge_relay::RelayClient;

pub use auth::RequireAuth;
pub use config::AppConfig;
pub use error::ApiError;

use middleware::{build_rate_limiter, rate_limit_middleware, GlobalRateLimiter, MakeRequestUuidV7};
use services::{
    AuthService, CallbackService, CampaignService, LeadService, Metering, WorkflowRelay,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Access token keys; the [`RequireAuth`] extractor verifies with these.
    pub jwt: JwtKeys,
    pub auth: AuthService,
    pub metering: Metering,
    pub leads: LeadService,
    pub campaigns: CampaignService,
    pub relay: WorkflowRelay,
    pub callbacks: CallbackService,
    /// Domain events, consumed by the workflow dispatcher and the telemetry mirror.
    pub events: Arc<EventBus>,
    /// Global rate limiter (None if rate limiting is disabled).
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    pub fn new(db: Database, config: &AppConfig) -> Result<Self> {
        Self::with_hasher(db, config, PasswordHasherService::default())
    }

    /// State with cheap password hashing, for tests.
    pub fn for_tests(db: Database, config: &AppConfig) -> Result<Self> {
        Self::with_hasher(
            db,
            config,
            PasswordHasherService::new(HashParams::insecure_fast()),
        )
    }

    fn with_hasher(
        db: Database,
        config: &AppConfig,
        passwords: PasswordHasherService,
    ) -> Result<Self> {
        let jwt = JwtKeys::new(
            config.jwt_secret.as_bytes(),
            config.jwt_issuer.clone(),
            config.access_token_ttl_secs,
        )?;
        let events = Arc::new(EventBus::new(EVENT_BUS_CAPACITY));
        let metering = Metering::new(Arc::new(db.usage.clone()), events.clone());

        let client = if config.relay_enabled {
            Some(RelayClient::new(config.relay.clone())?)
        } else {
            None
        };
        let relay = WorkflowRelay::new(db.clone(), metering.clone(), client);
        let leads = LeadService::new(db.clone(), metering.clone(), events.clone());
        let campaigns =
            CampaignService::new(db.clone(), metering.clone(), relay.clone(), events.clone());
        let callbacks =
            CallbackService::new(db.clone(), metering.clone(), leads.clone(), events.clone());
        let auth = AuthService::new(
            db.clone(),
            jwt.clone(),
            passwords,
            config.refresh_token_ttl_days,
        );

        let rate_limiter = if config.rate_limit_enabled {
            build_rate_limiter(config.rate_limit_requests, config.rate_limit_period_secs)
        } else {
            None
        };

        Ok(Self {
            db,
            jwt,
            auth,
            metering,
            leads,
            campaigns,
            relay,
            callbacks,
            events,
            rate_limiter,
        })
    }
}

/// Pagination block of list responses.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

/// `{ data, pagination }` envelope for paginated lists.
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>, total: i64, limit: i64, offset: i64) -> Self {
        let has_more = offset + (data.len() as i64) < total;
        Self {
            data,
            pagination: PaginationMeta {
                total,
                limit,
                offset,
                has_more,
            },
        }
    }
}

fn parse_allowed_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect()
}

/// Build the full HTTP application.
pub fn build_router(state: AppState, config: &AppConfig) -> Router {
    use handlers::{
        audit, campaigns, company, dashboard, engagement, hooks, leads, notifications, personas,
        system, usage, users, workflows,
    };

    Router::new()
        // System
        .route("/health", get(system::health_check))
        .route("/health/ready", get(system::readiness_check))
        .route("/openapi.json", get(openapi::openapi_json))
        .route("/api/v1/rate-limit/status", get(system::rate_limit_status))
        // Auth
        .route("/api/v1/auth/register", post(handlers::auth::register))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/refresh", post(handlers::auth::refresh))
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route("/api/v1/auth/logout-all", post(handlers::auth::logout_all))
        .route("/api/v1/auth/me", get(handlers::auth::me))
        // Company and users
        .route(
            "/api/v1/company",
            get(company::get_company).patch(company::update_company),
        )
        .route("/api/v1/company/plan", put(company::change_plan))
        .route(
            "/api/v1/users",
            get(users::list_users).post(users::create_user),
        )
        .route("/api/v1/users/:id/role", patch(users::change_role))
        .route("/api/v1/users/:id/deactivate", post(users::deactivate_user))
        // Leads
        .route(
            "/api/v1/leads",
            get(leads::list_leads).post(leads::create_lead),
        )
        .route("/api/v1/leads/bulk", post(leads::bulk_import))
        .route(
            "/api/v1/leads/:id",
            get(leads::get_lead)
                .patch(leads::update_lead)
                .delete(leads::delete_lead),
        )
        .route("/api/v1/leads/:id/status", post(leads::transition_lead))
        .route("/api/v1/leads/:id/history", get(leads::lead_history))
        // Personas
        .route(
            "/api/v1/personas",
            get(personas::list_personas).post(personas::create_persona),
        )
        .route(
            "/api/v1/personas/:id",
            get(personas::get_persona)
                .patch(personas::update_persona)
                .delete(personas::delete_persona),
        )
        .route(
            "/api/v1/personas/:id/default",
            post(personas::set_default_persona),
        )
        // Campaigns
        .route(
            "/api/v1/campaigns",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route(
            "/api/v1/campaigns/:id",
            get(campaigns::get_campaign).patch(campaigns::update_campaign),
        )
        .route("/api/v1/campaigns/:id/leads", post(campaigns::enroll_leads))
        .route(
            "/api/v1/campaigns/:id/launch",
            post(campaigns::launch_campaign),
        )
        .route("/api/v1/campaigns/:id/pause", post(campaigns::pause_campaign))
        .route(
            "/api/v1/campaigns/:id/complete",
            post(campaigns::complete_campaign),
        )
        // Usage and notifications
        .route("/api/v1/usage", get(usage::usage_status))
        .route("/api/v1/usage/:metric/history", get(usage::usage_history))
        .route(
            "/api/v1/notifications",
            get(notifications::list_notifications),
        )
        .route(
            "/api/v1/notifications/read-all",
            post(notifications::mark_all_read),
        )
        .route(
            "/api/v1/notifications/:id/read",
            post(notifications::mark_read),
        )
        // Workflows
        .route(
            "/api/v1/workflows",
            get(workflows::list_workflows).post(workflows::create_workflow),
        )
        .route(
            "/api/v1/workflows/:id",
            get(workflows::get_workflow)
                .patch(workflows::update_workflow)
                .delete(workflows::delete_workflow),
        )
        .route(
            "/api/v1/workflows/:id/trigger",
            post(workflows::trigger_workflow),
        )
        .route(
            "/api/v1/workflows/:id/runs",
            get(workflows::list_workflow_runs),
        )
        .route("/api/v1/workflow-runs", get(workflows::list_runs))
        .route("/api/v1/workflow-runs/:id", get(workflows::get_run))
        .route("/api/v1/hooks/runs/:id/callback", post(hooks::run_callback))
        // Engagement
        .route("/api/v1/replies", get(engagement::list_replies))
        .route("/api/v1/bookings", get(engagement::list_bookings))
        .route("/api/v1/bookings/:id", patch(engagement::update_booking))
        // Audit and dashboard
        .route("/api/v1/audit", get(audit::list_audit))
        .route("/api/v1/dashboard/summary", get(dashboard::dashboard_summary))
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parse_allowed_origins(
                    &config.allowed_origins,
                )))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(Duration::from_secs(CORS_MAX_AGE_SECS)),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE_BYTES))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_response_has_more() {
        let page = ListResponse::new(vec![1, 2], 5, 2, 0);
        assert!(page.pagination.has_more);
        let last = ListResponse::new(vec![5], 5, 2, 4);
        assert!(!last.pagination.has_more);
        let empty: ListResponse<i32> = ListResponse::new(vec![], 0, 50, 0);
        assert!(!empty.pagination.has_more);
    }

    #[test]
    fn test_list_response_shape() {
        let json = serde_json::to_value(ListResponse::new(vec!["a"], 1, 50, 0)).unwrap();
        assert_eq!(json["data"][0], "a");
        assert_eq!(json["pagination"]["total"], 1);
        assert_eq!(json["pagination"]["has_more"], false);
    }

    #[test]
    fn test_invalid_origins_are_dropped() {
        let origins = vec![
            "https://app.leadforge.io".to_string(),
            "bad\norigin".to_string(),
        ];
        assert_eq!(parse_allowed_origins(&origins).len(), 1);
    }
}
