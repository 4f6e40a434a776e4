//! Outbound workflow runs and the event dispatcher that starts them.
//!
//! A run is created `pending` before the webhook is called. A delivery
//! failure closes it as `failed` right away; otherwise it stays pending
//! until the workflow tool reports back through the callback endpoint.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use leadforge_core::{
    DomainEvent, Error, EventBus, EventEnvelope, Result, RunStatus, UsageMetric, Workflow,
    WorkflowKind, WorkflowRun,
};
use leadforge_db::{Database, RunCompletion};
use leadforge_relay::{Dispatch, RelayClient, RelayRequest};

use crate::services::Metering;

#[derive(Clone)]
pub struct WorkflowRelay {
    db: Database,
    metering: Metering,
    client: Option<RelayClient>,
}

impl WorkflowRelay {
    /// `client` is `None` when the relay is switched off; triggers then
    /// fail before anything is metered or stored.
    pub fn new(db: Database, metering: Metering, client: Option<RelayClient>) -> Self {
        Self {
            db,
            metering,
            client,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Start one run of `workflow`.
    ///
    /// Returns the run as stored after the webhook call: `pending` when the
    /// webhook accepted it, `failed` when it did not.
    pub async fn trigger(
        &self,
        workflow: &Workflow,
        trigger: &str,
        payload: serde_json::Value,
        actor_id: Option<Uuid>,
    ) -> Result<WorkflowRun> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| Error::Relay("workflow relay is disabled".into()))?;
        if !workflow.is_active {
            return Err(Error::Conflict(format!(
                "workflow {} is disabled",
                workflow.id
            )));
        }

        let company_id = workflow.company_id;
        let plan = self.db.companies.plan(company_id).await?;
        let metered = self
            .metering
            .consume_for_plan(company_id, plan, UsageMetric::WorkflowRuns, 1)
            .await?;

        let run = match self
            .db
            .workflows
            .create_run(workflow, trigger, &payload, actor_id)
            .await
        {
            Ok(run) => run,
            Err(e) => {
                self.metering.release(company_id, &metered).await;
                return Err(e);
            }
        };

        let request = RelayRequest {
            run_id: run.id,
            company_id,
            trigger: trigger.to_string(),
            payload,
            callback_url: client.callback_url(run.id),
        };
        let dispatch = Dispatch {
            url: &workflow.webhook_url,
            secret: workflow.secret.as_deref(),
            request: &request,
        };

        match client.send(dispatch).await {
            Ok(delivery) => {
                self.db
                    .workflows
                    .set_response_status(run.id, i32::from(delivery.status))
                    .await?;
                self.db.workflows.record_outcome(workflow.id, true).await?;
                info!(
                    subsystem = "workflows",
                    component = "relay",
                    op = "trigger",
                    company_id = %company_id,
                    workflow_id = %workflow.id,
                    run_id = %run.id,
                    trigger,
                    http_status = delivery.status,
                    "Workflow run started"
                );
                Ok(WorkflowRun {
                    response_status: Some(i32::from(delivery.status)),
                    ..run
                })
            }
            Err(e) => {
                let completion = RunCompletion {
                    status: RunStatus::Failed,
                    response_status: e.status().map(i32::from),
                    result: None,
                    error: Some(e.to_string()),
                };
                let failed = self
                    .db
                    .workflows
                    .complete_run(company_id, run.id, &completion)
                    .await?;
                let still_active = self.db.workflows.record_outcome(workflow.id, false).await?;
                warn!(
                    subsystem = "workflows",
                    component = "relay",
                    op = "trigger",
                    company_id = %company_id,
                    workflow_id = %workflow.id,
                    run_id = %run.id,
                    error = %e,
                    still_active,
                    "Workflow run failed on delivery"
                );
                Ok(failed.unwrap_or(run))
            }
        }
    }

    /// Start every active workflow of the event's company that subscribes
    /// to the event type.
    async fn dispatch(&self, envelope: &EventEnvelope) {
        if !envelope.payload.is_relayable() {
            return;
        }
        let workflows: Vec<_> = match self
            .db
            .workflows
            .list_active_for_event(envelope.company_id, &envelope.event_type)
            .await
        {
            Ok(w) => w
                .into_iter()
                .filter(|w| relays_event(w.kind, &envelope.payload))
                .collect(),
            Err(e) => {
                warn!(
                    subsystem = "workflows",
                    component = "dispatcher",
                    event_type = %envelope.event_type,
                    error = %e,
                    "Failed to load subscribed workflows"
                );
                return;
            }
        };
        if workflows.is_empty() {
            return;
        }

        let payload = match serde_json::to_value(envelope) {
            Ok(v) => v,
            Err(_) => return,
        };
        let actor_id = envelope.actor.id.filter(|_| envelope.actor.kind == "user");

        for workflow in workflows {
            let relay = self.clone();
            let payload = payload.clone();
            let event_type = envelope.event_type.clone();
            tokio::spawn(async move {
                if let Err(e) = relay.trigger(&workflow, &event_type, payload, actor_id).await {
                    warn!(
                        subsystem = "workflows",
                        component = "dispatcher",
                        workflow_id = %workflow.id,
                        event_type = %event_type,
                        error = %e,
                        "Event-triggered run not started"
                    );
                }
            });
        }
    }
}

/// Campaign-launch workflows get their job from the launch itself, so the
/// `campaign.launched` event is not relayed to them a second time.
fn relays_event(kind: WorkflowKind, event: &DomainEvent) -> bool {
    !(kind == WorkflowKind::CampaignLaunch
        && matches!(event, DomainEvent::CampaignLaunched { .. }))
}

/// Background task relaying domain events to subscribed workflows.
pub async fn run_workflow_dispatcher(events: Arc<EventBus>, relay: WorkflowRelay) {
    if !relay.is_enabled() {
        info!(
            subsystem = "workflows",
            component = "dispatcher",
            "Workflow relay disabled, dispatcher not started"
        );
        return;
    }
    let mut rx = events.subscribe();
    debug!(
        subsystem = "workflows",
        component = "dispatcher",
        "Workflow dispatcher listening"
    );
    loop {
        match rx.recv().await {
            Ok(envelope) => relay.dispatch(&envelope).await,
            Err(RecvError::Lagged(n)) => {
                warn!(
                    subsystem = "workflows",
                    component = "dispatcher",
                    missed = n,
                    "Workflow dispatcher lagged"
                );
            }
            Err(RecvError::Closed) => break,
        }
    }
}
