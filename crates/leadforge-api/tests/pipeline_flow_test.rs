//! End-to-end flows through the router against a real database.
//!
//! Skipped unless `DATABASE_URL` points at a PostgreSQL instance; see
//! `leadforge_db::test_fixtures`.

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use leadforge_api::services::run_workflow_dispatcher;
use leadforge_api::{build_router, AppConfig, AppState};
use leadforge_core::{
    CreateWorkflowRequest, EventActor, LeadStatus, Plan, Principal, UsageMetric, UserRole,
    Workflow, WorkflowKind,
};
use leadforge_db::test_fixtures::{test_database, TestTenant};
use leadforge_relay::{signing, SIGNATURE_HEADER};

const SECRET: &str = "pipeline-test-secret-that-is-long-enough";

struct Harness {
    router: Router,
    state: AppState,
    tenant: TestTenant,
    token: String,
}

async fn harness(config: AppConfig) -> Option<Harness> {
    let db = test_database().await?;
    let tenant = TestTenant::create_in(db.clone()).await;
    let state = AppState::for_tests(db, &config).expect("state");
    let token = state
        .jwt
        .issue(&Principal {
            user_id: tenant.owner.id,
            company_id: tenant.company.id,
            role: UserRole::Owner,
        })
        .expect("token");
    Some(Harness {
        router: build_router(state.clone(), &config),
        state,
        tenant,
        token,
    })
}

impl Harness {
    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn callback(&self, run_id: &str, body: &Value, signature: Option<String>) -> StatusCode {
        self.callback_response(run_id, body, signature).await.0
    }

    async fn callback_response(
        &self,
        run_id: &str,
        body: &Value,
        signature: Option<String>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/v1/hooks/runs/{run_id}/callback"))
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        let response = self
            .router
            .clone()
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn used(&self, metric: UsageMetric) -> i64 {
        self.state
            .metering
            .status(self.tenant.company.id, Plan::Free)
            .await
            .unwrap()
            .into_iter()
            .find(|q| q.metric == metric)
            .unwrap()
            .used
    }

    async fn workflow(&self, kind: WorkflowKind, url: String, events: &[&str]) -> Workflow {
        self.tenant
            .db
            .workflows
            .create(
                self.tenant.company.id,
                &CreateWorkflowRequest {
                    name: format!("{kind:?}"),
                    kind,
                    webhook_url: url,
                    secret: None,
                    events: events.iter().map(|e| e.to_string()).collect(),
                },
            )
            .await
            .unwrap()
    }

    /// Start a manual run and return its id.
    async fn manual_run(&self, workflow: &Workflow) -> String {
        let (status, run) = self
            .call(
                Method::POST,
                &format!("/api/v1/workflows/{}/trigger", workflow.id),
                Some(json!({ "payload": {} })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        run["id"].as_str().unwrap().to_string()
    }

    async fn lead_status(&self, id: Uuid) -> Value {
        let (_, lead) = self
            .call(Method::GET, &format!("/api/v1/leads/{id}"), None)
            .await;
        lead["status"].clone()
    }
}

fn relay_config() -> AppConfig {
    let mut config = AppConfig::for_tests(SECRET);
    config.relay_enabled = true;
    config
}

async fn accepting_webhook(server: &MockServer, route: &str, hits: u64) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accepted": true })))
        .expect(hits)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_register_then_me() {
    let Some(db) = test_database().await else { return };
    let config = AppConfig::for_tests(SECRET);
    let router = build_router(AppState::for_tests(db, &config).unwrap(), &config);

    let email = format!("founder-{}@example.com", Uuid::new_v4().simple());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "company_name": "Acme",
                "email": email,
                "password": "correct horse battery"
            })
            .to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["user"]["role"], "owner");
    assert_eq!(body["company"]["plan"], "free");
    let access = body["access_token"].as_str().unwrap().to_string();

    let request = Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {access}"))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_lead_lifecycle_through_api() {
    let Some(h) = harness(AppConfig::for_tests(SECRET)).await else { return };

    let (status, lead) = h
        .call(
            Method::POST,
            "/api/v1/leads",
            Some(json!({
                "email": "  Ada@Example.com ",
                "first_name": "Ada",
                "title": "CTO"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(lead["email"], "ada@example.com");
    assert_eq!(lead["status"], "new");
    let id = lead["id"].as_str().unwrap().to_string();

    let (status, _) = h
        .call(
            Method::POST,
            "/api/v1/leads",
            Some(json!({ "email": "ada@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, moved) = h
        .call(
            Method::POST,
            &format!("/api/v1/leads/{id}/status"),
            Some(json!({ "status": "contacted", "reason": "intro sent" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["status"], "contacted");
    assert!(moved["score"].as_i64().unwrap() > lead["score"].as_i64().unwrap());

    let (status, _) = h
        .call(
            Method::POST,
            &format!("/api/v1/leads/{id}/status"),
            Some(json!({ "status": "won" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, history) = h
        .call(Method::GET, &format!("/api/v1/leads/{id}/history"), None)
        .await;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["from_status"], "new");
    assert_eq!(history[0]["to_status"], "contacted");

    let (_, summary) = h.call(Method::GET, "/api/v1/dashboard/summary", None).await;
    assert_eq!(summary["total_leads"], 1);
    assert_eq!(summary["leads_by_status"]["contacted"], 1);
    assert_eq!(summary["leads_by_status"]["won"], 0);

    let (_, usage) = h.call(Method::GET, "/api/v1/usage", None).await;
    let leads_created = usage["metrics"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["metric"] == "leads_created")
        .unwrap()
        .clone();
    assert_eq!(leads_created["used"], 1);
}

#[tokio::test]
async fn test_other_tenant_cannot_see_lead() {
    let Some(h) = harness(AppConfig::for_tests(SECRET)).await else { return };
    let other = TestTenant::create_in(h.tenant.db.clone()).await;
    let foreign = other.lead("grace@example.com").await;

    let (status, _) = h
        .call(Method::GET, &format!("/api/v1/leads/{}", foreign.id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trigger_and_signed_callback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook/enrich"))
        .and(header_exists(SIGNATURE_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accepted": true })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = AppConfig::for_tests(SECRET);
    config.relay_enabled = true;
    let Some(h) = harness(config).await else { return };

    let workflow = h
        .tenant
        .db
        .workflows
        .create(
            h.tenant.company.id,
            &CreateWorkflowRequest {
                name: "Enrich".into(),
                kind: WorkflowKind::LeadEnrichment,
                webhook_url: format!("{}/webhook/enrich", server.uri()),
                secret: Some("hook-secret".into()),
                events: vec![],
            },
        )
        .await
        .unwrap();
    let lead = h.tenant.lead("linus@example.com").await;

    let (status, run) = h
        .call(
            Method::POST,
            &format!("/api/v1/workflows/{}/trigger", workflow.id),
            Some(json!({ "payload": { "lead_id": lead.id } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "pending");
    assert_eq!(run["response_status"], 200);
    let run_id = run["id"].as_str().unwrap().to_string();

    let callback = json!({
        "status": "success",
        "result": { "enriched": true },
        "events": [
            { "type": "email_sent", "lead_id": lead.id },
            { "type": "reply", "lead_id": lead.id, "body": "Sounds great, let's talk" },
            { "type": "email_sent", "lead_id": Uuid::now_v7() }
        ]
    });
    let bytes = callback.to_string();

    assert_eq!(
        h.callback(&run_id, &callback, None).await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        h.callback(&run_id, &callback, Some(signing::sign("wrong", bytes.as_bytes())))
            .await,
        StatusCode::UNAUTHORIZED
    );

    let signature = signing::sign("hook-secret", bytes.as_bytes());
    assert_eq!(
        h.callback(&run_id, &callback, Some(signature.clone())).await,
        StatusCode::OK
    );
    assert_eq!(
        h.callback(&run_id, &callback, Some(signature)).await,
        StatusCode::CONFLICT
    );

    let (_, lead_after) = h
        .call(Method::GET, &format!("/api/v1/leads/{}", lead.id), None)
        .await;
    assert_eq!(lead_after["status"], "replied");
    assert_eq!(lead_after["reply_count"], 1);

    let (_, run_after) = h
        .call(Method::GET, &format!("/api/v1/workflow-runs/{run_id}"), None)
        .await;
    assert_eq!(run_after["status"], "success");

    let (_, replies) = h.call(Method::GET, "/api/v1/replies", None).await;
    assert_eq!(replies["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_launch_meters_uncontacted_leads_and_relays_once() {
    let server = MockServer::start().await;
    accepting_webhook(&server, "/webhook/launch", 1).await;

    let Some(h) = harness(relay_config()).await else { return };
    tokio::spawn(run_workflow_dispatcher(
        h.state.events.clone(),
        h.state.relay.clone(),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;

    // No event filter: subscribed to everything, campaign.launched included.
    h.workflow(
        WorkflowKind::CampaignLaunch,
        format!("{}/webhook/launch", server.uri()),
        &[],
    )
    .await;
    let persona = h.tenant.persona("Closer").await;
    let company = h.tenant.company.id;
    let campaign = h
        .tenant
        .db
        .campaigns
        .create(company, persona.id, "Q4 outbound", None)
        .await
        .unwrap();
    let fresh = h.tenant.lead("fresh@example.com").await;
    let reached = h.tenant.lead("reached@example.com").await;
    h.tenant
        .db
        .campaigns
        .enroll(company, campaign.id, &[fresh.id, reached.id])
        .await
        .unwrap();
    h.tenant
        .db
        .campaigns
        .mark_contacted(company, campaign.id, reached.id, chrono::Utc::now())
        .await
        .unwrap();

    let (status, launched) = h
        .call(
            Method::POST,
            &format!("/api/v1/campaigns/{}/launch", campaign.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(launched["status"], "active");
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(h.used(UsageMetric::AiGenerations).await, 1);
    assert_eq!(h.used(UsageMetric::WorkflowRuns).await, 1);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["trigger"], "campaign.launch");
    assert_eq!(body["payload"]["persona"]["name"], "Closer");
    assert_eq!(body["payload"]["campaign"]["id"], json!(campaign.id));
    assert_eq!(body["payload"]["leads"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_launch_over_quota_is_refused_without_side_effects() {
    let Some(h) = harness(AppConfig::for_tests(SECRET)).await else { return };
    let company = h.tenant.company.id;
    let persona = h.tenant.persona("Closer").await;
    let campaign = h
        .tenant
        .db
        .campaigns
        .create(company, persona.id, "Too big", None)
        .await
        .unwrap();
    let lead = h.tenant.lead("one@example.com").await;
    h.tenant
        .db
        .campaigns
        .enroll(company, campaign.id, &[lead.id])
        .await
        .unwrap();

    let limit = Plan::Free.limit(UsageMetric::AiGenerations).unwrap();
    h.state
        .metering
        .consume_for_plan(company, Plan::Free, UsageMetric::AiGenerations, limit)
        .await
        .unwrap();

    let (status, _) = h
        .call(
            Method::POST,
            &format!("/api/v1/campaigns/{}/launch", campaign.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(h.used(UsageMetric::AiGenerations).await, limit);

    let (_, after) = h
        .call(Method::GET, &format!("/api/v1/campaigns/{}", campaign.id), None)
        .await;
    assert_eq!(after["status"], "draft");
}

#[tokio::test]
async fn test_dispatcher_triggers_subscribed_workflows_only() {
    let server = MockServer::start().await;
    accepting_webhook(&server, "/webhook/created", 1).await;
    accepting_webhook(&server, "/webhook/usage", 0).await;

    let Some(h) = harness(relay_config()).await else { return };
    tokio::spawn(run_workflow_dispatcher(
        h.state.events.clone(),
        h.state.relay.clone(),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;

    h.workflow(
        WorkflowKind::LeadEnrichment,
        format!("{}/webhook/created", server.uri()),
        &["lead.created"],
    )
    .await;
    h.workflow(
        WorkflowKind::LeadEnrichment,
        format!("{}/webhook/usage", server.uri()),
        &["usage.threshold_reached"],
    )
    .await;

    let (status, lead) = h
        .call(
            Method::POST,
            "/api/v1/leads",
            Some(json!({ "email": "grace@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    tokio::time::sleep(Duration::from_millis(300)).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["trigger"], "lead.created");
    assert_eq!(body["payload"]["entity_id"], lead["id"]);
    assert_eq!(body["payload"]["company_id"], json!(h.tenant.company.id));
}

#[tokio::test]
async fn test_failed_run_insert_gives_back_workflow_quota() {
    let server = MockServer::start().await;
    let Some(h) = harness(relay_config()).await else { return };
    let workflow = h
        .workflow(
            WorkflowKind::LeadEnrichment,
            format!("{}/webhook/gone", server.uri()),
            &[],
        )
        .await;
    h.tenant
        .db
        .workflows
        .delete(h.tenant.company.id, workflow.id)
        .await
        .unwrap();

    let result = h
        .state
        .relay
        .trigger(&workflow, "manual", json!({}), None)
        .await;
    assert!(result.is_err());
    assert_eq!(h.used(UsageMetric::WorkflowRuns).await, 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_callback_event_does_not_drop_the_rest() {
    let server = MockServer::start().await;
    accepting_webhook(&server, "/webhook/outreach", 1).await;
    let Some(h) = harness(relay_config()).await else { return };
    let workflow = h
        .workflow(
            WorkflowKind::FollowUp,
            format!("{}/webhook/outreach", server.uri()),
            &[],
        )
        .await;
    let lead = h.tenant.lead("edsger@example.com").await;
    let run_id = h.manual_run(&workflow).await;

    // The booking names a campaign that does not exist, so its insert fails.
    let callback = json!({
        "status": "success",
        "events": [
            {
                "type": "booking",
                "lead_id": lead.id,
                "campaign_id": Uuid::now_v7(),
                "scheduled_at": "2026-11-02T15:00:00Z"
            },
            { "type": "email_sent", "lead_id": lead.id }
        ]
    });
    let (status, summary) = h.callback_response(&run_id, &callback, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["applied"], 1);
    assert_eq!(summary["ignored"], 1);
    assert_eq!(h.lead_status(lead.id).await, "contacted");
}

#[tokio::test]
async fn test_advance_on_stale_lead_returns_current_state() {
    let Some(h) = harness(AppConfig::for_tests(SECRET)).await else { return };
    let stale = h.tenant.lead("stale@example.com").await;

    let (status, _) = h
        .call(
            Method::POST,
            &format!("/api/v1/leads/{}/status", stale.id),
            Some(json!({ "status": "contacted" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(stale.status, LeadStatus::New);
    let lead = h
        .state
        .leads
        .advance(stale, LeadStatus::Contacted, "email sent", EventActor::system())
        .await
        .unwrap();
    assert_eq!(lead.status, LeadStatus::Contacted);

    let (_, history) = h
        .call(Method::GET, &format!("/api/v1/leads/{}/history", lead.id), None)
        .await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unsubscribe_reply_moves_lead_to_unsubscribed() {
    let server = MockServer::start().await;
    accepting_webhook(&server, "/webhook/outreach", 1).await;
    let Some(h) = harness(relay_config()).await else { return };
    let workflow = h
        .workflow(
            WorkflowKind::FollowUp,
            format!("{}/webhook/outreach", server.uri()),
            &[],
        )
        .await;
    let lead = h.tenant.lead("barbara@example.com").await;
    let run_id = h.manual_run(&workflow).await;

    let callback = json!({
        "status": "success",
        "events": [
            { "type": "email_sent", "lead_id": lead.id },
            { "type": "reply", "lead_id": lead.id, "body": "Please unsubscribe me from this list" }
        ]
    });
    let (status, summary) = h.callback_response(&run_id, &callback, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["applied"], 2);
    assert_eq!(h.lead_status(lead.id).await, "unsubscribed");
}

#[tokio::test]
async fn test_booking_callback_then_no_show() {
    let server = MockServer::start().await;
    accepting_webhook(&server, "/webhook/outreach", 1).await;
    let Some(h) = harness(relay_config()).await else { return };
    let company = h.tenant.company.id;
    let workflow = h
        .workflow(
            WorkflowKind::FollowUp,
            format!("{}/webhook/outreach", server.uri()),
            &[],
        )
        .await;
    let persona = h.tenant.persona("Closer").await;
    let campaign = h
        .tenant
        .db
        .campaigns
        .create(company, persona.id, "Meetings", None)
        .await
        .unwrap();
    let lead = h.tenant.lead("margaret@example.com").await;
    h.tenant
        .db
        .campaigns
        .enroll(company, campaign.id, &[lead.id])
        .await
        .unwrap();
    let run_id = h.manual_run(&workflow).await;

    let callback = json!({
        "status": "success",
        "events": [
            { "type": "email_sent", "lead_id": lead.id, "campaign_id": campaign.id },
            {
                "type": "booking",
                "lead_id": lead.id,
                "campaign_id": campaign.id,
                "scheduled_at": "2026-11-02T15:00:00Z",
                "meeting_url": "https://meet.example.com/abc"
            }
        ]
    });
    let (status, summary) = h.callback_response(&run_id, &callback, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["applied"], 2);
    assert_eq!(h.lead_status(lead.id).await, "meeting_booked");

    let (_, counted) = h
        .call(Method::GET, &format!("/api/v1/campaigns/{}", campaign.id), None)
        .await;
    assert_eq!(counted["sent_count"], 1);
    assert_eq!(counted["booking_count"], 1);

    let (_, bookings) = h.call(Method::GET, "/api/v1/bookings", None).await;
    let booking_id = bookings["data"][0]["id"].as_str().unwrap().to_string();
    let (status, booking) = h
        .call(
            Method::PATCH,
            &format!("/api/v1/bookings/{booking_id}"),
            Some(json!({ "status": "no_show" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "no_show");
    assert_eq!(h.lead_status(lead.id).await, "interested");
}

#[tokio::test]
async fn test_refresh_token_reuse_revokes_every_session() {
    let Some(h) = harness(AppConfig::for_tests(SECRET)).await else { return };
    let email = format!("rotator-{}@example.com", Uuid::new_v4().simple());
    let (status, registered) = h
        .call(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({
                "company_name": "Rotate Inc",
                "email": email,
                "password": "correct horse battery"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let first = registered["refresh_token"].as_str().unwrap().to_string();

    let (status, rotated) = h
        .call(
            Method::POST,
            "/api/v1/auth/refresh",
            Some(json!({ "refresh_token": first })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let second = rotated["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(first, second);

    let (status, _) = h
        .call(
            Method::POST,
            "/api/v1/auth/refresh",
            Some(json!({ "refresh_token": first })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The replay took the legitimate successor down with it.
    let (status, _) = h
        .call(
            Method::POST,
            "/api/v1/auth/refresh",
            Some(json!({ "refresh_token": second })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
