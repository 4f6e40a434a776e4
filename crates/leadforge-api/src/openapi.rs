//! OpenAPI document, generated from the handler annotations and served at
//! `/openapi.json`.

use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

use leadforge_core::*;

use crate::handlers::{
    audit, auth, campaigns, company, dashboard, engagement, hooks, leads, notifications,
    personas, system, usage, users, workflows,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leadforge API",
        description = "Multi-tenant lead pipeline with campaign automation through n8n workflows"
    ),
    paths(
        system::health_check,
        system::readiness_check,
        system::rate_limit_status,
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::logout_all,
        auth::me,
        company::get_company,
        company::update_company,
        company::change_plan,
        users::list_users,
        users::create_user,
        users::change_role,
        users::deactivate_user,
        leads::list_leads,
        leads::create_lead,
        leads::bulk_import,
        leads::get_lead,
        leads::update_lead,
        leads::delete_lead,
        leads::transition_lead,
        leads::lead_history,
        personas::list_personas,
        personas::create_persona,
        personas::get_persona,
        personas::update_persona,
        personas::delete_persona,
        personas::set_default_persona,
        campaigns::list_campaigns,
        campaigns::create_campaign,
        campaigns::get_campaign,
        campaigns::update_campaign,
        campaigns::enroll_leads,
        campaigns::launch_campaign,
        campaigns::pause_campaign,
        campaigns::complete_campaign,
        engagement::list_replies,
        engagement::list_bookings,
        engagement::update_booking,
        workflows::list_workflows,
        workflows::create_workflow,
        workflows::get_workflow,
        workflows::update_workflow,
        workflows::delete_workflow,
        workflows::trigger_workflow,
        workflows::list_workflow_runs,
        workflows::list_runs,
        workflows::get_run,
        hooks::run_callback,
        usage::usage_status,
        usage::usage_history,
        notifications::list_notifications,
        notifications::mark_read,
        notifications::mark_all_read,
        audit::list_audit,
        dashboard::dashboard_summary,
    ),
    components(schemas(
        Company, UpdateCompanyRequest, ChangePlanRequest, Plan, UserRole, User,
        TokenPair, RegisterRequest, LoginRequest, RefreshRequest, AuthResponse, MeResponse,
        CreateUserRequest, ChangeRoleRequest,
        Lead, LeadStatus, CreateLeadRequest, UpdateLeadRequest, BulkImportRequest,
        BulkImportResponse, TransitionRequest, LeadStatusChange, LeadSort, SortOrder,
        Tone, AiPersona, CreatePersonaRequest, UpdatePersonaRequest,
        CampaignStatus, Campaign, CreateCampaignRequest, UpdateCampaignRequest,
        EnrollLeadsRequest, EnrollResponse,
        Sentiment, EmailReply, BookingStatus, Booking, UpdateBookingRequest,
        WorkflowKind, Workflow, CreateWorkflowRequest, UpdateWorkflowRequest,
        TriggerWorkflowRequest, RunStatus, WorkflowRun, CallbackOutcome, RunCallback,
        CallbackEvent, CallbackSummary,
        AuditEntry, Notification, UsageMetric, QuotaStatus, UsageCounter, DashboardSummary,
        usage::UsageResponse, usage::UsagePoint, usage::UsageHistoryResponse,
        notifications::NotificationsResponse,
    )),
    tags(
        (name = "System", description = "Health and limits"),
        (name = "Auth", description = "Registration, login, and sessions"),
        (name = "Company", description = "Tenant settings and plan"),
        (name = "Users", description = "User management"),
        (name = "Leads", description = "Lead records and lifecycle"),
        (name = "Personas", description = "AI writing personas"),
        (name = "Campaigns", description = "Outreach campaigns"),
        (name = "Engagement", description = "Replies and bookings"),
        (name = "Workflows", description = "n8n workflow relay"),
        (name = "Usage", description = "Plan quotas"),
        (name = "Notifications", description = "Usage alerts"),
        (name = "Audit", description = "Audit log"),
        (name = "Dashboard", description = "Pipeline overview")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/leads"));
        assert!(doc.paths.paths.contains_key("/api/v1/hooks/runs/{id}/callback"));
        assert!(doc.paths.paths.contains_key("/health"));
    }
}
