//! Inbound half of the workflow relay.
//!
//! The workflow tool posts the outcome of a run together with the
//! engagement it produced (emails sent, replies, bookings). The run is
//! closed first so a replayed callback cannot apply the same events twice.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use leadforge_core::defaults::RUN_RESULT_MAX_BYTES;
use leadforge_core::{
    classify_reply, CallbackEvent, CallbackSummary, CampaignCounter, DomainEvent, Error,
    EventActor, EventBus, LeadStatus, NewBooking, NewReply, Result, RunCallback, RunStatus,
    UsageMetric, WorkflowRun,
};
use leadforge_db::{Database, RunCompletion};
use leadforge_relay::signing;

use crate::services::{LeadService, Metering};

#[derive(Clone)]
pub struct CallbackService {
    db: Database,
    metering: Metering,
    leads: LeadService,
    events: Arc<EventBus>,
}

/// What happened to one callback event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Yes,
    Ignored,
}

impl CallbackService {
    pub fn new(db: Database, metering: Metering, leads: LeadService, events: Arc<EventBus>) -> Self {
        Self {
            db,
            metering,
            leads,
            events,
        }
    }

    /// Verify, close, and apply a run callback.
    ///
    /// `body` is the raw request body; the signature covers those exact
    /// bytes. Workflows without a secret accept unsigned callbacks.
    pub async fn handle(
        &self,
        run_id: Uuid,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<CallbackSummary> {
        let (run, workflow) = self
            .db
            .workflows
            .get_run_for_callback(run_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("workflow run {run_id}")))?;

        if let Some(secret) = workflow.secret.as_deref() {
            let valid = signature
                .map(|sig| signing::verify(secret, body, sig))
                .unwrap_or(false);
            if !valid {
                warn!(
                    subsystem = "workflows",
                    component = "callback",
                    run_id = %run_id,
                    workflow_id = %workflow.id,
                    signed = signature.is_some(),
                    "Callback signature rejected"
                );
                return Err(Error::Unauthorized("invalid callback signature".into()));
            }
        }

        let callback: RunCallback = serde_json::from_slice(body)
            .map_err(|e| Error::InvalidInput(format!("invalid callback body: {e}")))?;

        if run.status != RunStatus::Pending {
            return Err(already_closed(&run));
        }

        let status = RunStatus::from(callback.status);
        let completion = RunCompletion {
            status,
            response_status: run.response_status,
            result: callback.result.clone().map(cap_result),
            error: callback.error.clone(),
        };
        let closed = self
            .db
            .workflows
            .complete_run(run.company_id, run.id, &completion)
            .await?
            .ok_or_else(|| already_closed(&run))?;

        let mut applied = 0;
        let mut ignored = 0;
        // The run is already closed, so one failing event must not drop the rest.
        for event in &callback.events {
            match self.apply(&closed, event).await {
                Ok(Applied::Yes) => applied += 1,
                Ok(Applied::Ignored) => ignored += 1,
                Err(e) => {
                    warn!(
                        subsystem = "workflows",
                        component = "callback",
                        run_id = %closed.id,
                        lead_id = %event.lead_id(),
                        error = %e,
                        "Callback event could not be applied, ignored"
                    );
                    ignored += 1;
                }
            }
        }

        info!(
            subsystem = "workflows",
            component = "callback",
            company_id = %closed.company_id,
            workflow_id = %closed.workflow_id,
            run_id = %closed.id,
            status = %status,
            applied,
            ignored,
            "Workflow run completed"
        );
        self.events.emit(
            closed.company_id,
            EventActor::workflow(closed.id),
            DomainEvent::WorkflowRunCompleted {
                run_id: closed.id,
                workflow_id: closed.workflow_id,
                success: status == RunStatus::Success,
            },
        );

        Ok(CallbackSummary {
            run_id: closed.id,
            status,
            applied,
            ignored,
        })
    }

    async fn apply(&self, run: &WorkflowRun, event: &CallbackEvent) -> Result<Applied> {
        let company_id = run.company_id;
        let Some(lead) = self.db.leads.find(company_id, event.lead_id()).await? else {
            warn!(
                subsystem = "workflows",
                component = "callback",
                run_id = %run.id,
                lead_id = %event.lead_id(),
                "Callback event references an unknown lead, ignored"
            );
            return Ok(Applied::Ignored);
        };
        let actor = EventActor::workflow(run.id);

        match event {
            CallbackEvent::EmailSent { campaign_id, .. } => {
                let plan = self.db.companies.plan(company_id).await?;
                let metric = UsageMetric::EmailsSent;
                self.metering
                    .record(company_id, metric, 1, plan.limit(metric))
                    .await?;

                let now = Utc::now();
                self.db.leads.mark_contacted(company_id, lead.id, now).await?;
                if lead.status == LeadStatus::New {
                    self.leads
                        .advance(lead.clone(), LeadStatus::Contacted, "email sent", actor)
                        .await?;
                }
                if let Some(campaign_id) = campaign_id {
                    self.db
                        .campaigns
                        .mark_contacted(company_id, *campaign_id, lead.id, now)
                        .await?;
                    self.bump(company_id, *campaign_id, CampaignCounter::Sent).await?;
                }
            }
            CallbackEvent::Reply {
                campaign_id,
                subject,
                body,
                received_at,
                ..
            } => {
                let class = classify_reply(subject.as_deref(), body);
                self.db
                    .engagement
                    .insert_reply(&NewReply {
                        company_id,
                        lead_id: lead.id,
                        campaign_id: *campaign_id,
                        subject: subject.clone(),
                        body: body.clone(),
                        sentiment: class.sentiment,
                        received_at: received_at.unwrap_or_else(Utc::now),
                    })
                    .await?;

                let lead = self.db.leads.increment_replies(company_id, lead.id).await?;
                let target = if class.unsubscribe {
                    LeadStatus::Unsubscribed
                } else {
                    LeadStatus::Replied
                };
                let lead = self.leads.advance(lead, target, "reply received", actor).await?;
                self.leads.rescore(&lead).await?;

                if let Some(campaign_id) = campaign_id {
                    self.bump(company_id, *campaign_id, CampaignCounter::Reply).await?;
                }
            }
            CallbackEvent::Booking {
                campaign_id,
                scheduled_at,
                meeting_url,
                notes,
                ..
            } => {
                self.db
                    .engagement
                    .insert_booking(&NewBooking {
                        company_id,
                        lead_id: lead.id,
                        campaign_id: *campaign_id,
                        scheduled_at: *scheduled_at,
                        meeting_url: meeting_url.clone(),
                        notes: notes.clone(),
                    })
                    .await?;
                self.leads
                    .advance(lead, LeadStatus::MeetingBooked, "meeting booked", actor)
                    .await?;
                if let Some(campaign_id) = campaign_id {
                    self.bump(company_id, *campaign_id, CampaignCounter::Booking).await?;
                }
            }
        }
        Ok(Applied::Yes)
    }

    async fn bump(&self, company_id: Uuid, campaign_id: Uuid, counter: CampaignCounter) -> Result<()> {
        if !self
            .db
            .campaigns
            .bump_counter(company_id, campaign_id, counter)
            .await?
        {
            debug!(
                subsystem = "workflows",
                component = "callback",
                campaign_id = %campaign_id,
                "Callback references an unknown campaign, counter not bumped"
            );
        }
        Ok(())
    }
}

fn already_closed(run: &WorkflowRun) -> Error {
    Error::Conflict(format!("workflow run {} is already {}", run.id, run.status))
}

/// Oversized results are replaced by a marker instead of stored.
fn cap_result(result: serde_json::Value) -> serde_json::Value {
    let size = serde_json::to_vec(&result).map(|b| b.len()).unwrap_or(0);
    if size <= RUN_RESULT_MAX_BYTES {
        return result;
    }
    serde_json::json!({
        "truncated": true,
        "original_bytes": size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cap_result_keeps_small_results() {
        let small = json!({"emails": 3});
        assert_eq!(cap_result(small.clone()), small);
    }

    #[test]
    fn test_cap_result_replaces_oversized_results() {
        let big = json!({"blob": "x".repeat(RUN_RESULT_MAX_BYTES)});
        let capped = cap_result(big);
        assert_eq!(capped["truncated"], true);
        assert!(capped["original_bytes"].as_u64().unwrap() > RUN_RESULT_MAX_BYTES as u64);
    }

    #[test]
    fn test_callback_body_parses_event_list() {
        let body = json!({
            "status": "success",
            "events": [
                {"type": "email_sent", "lead_id": Uuid::nil()},
                {"type": "reply", "lead_id": Uuid::nil(), "body": "Sounds good"},
                {"type": "booking", "lead_id": Uuid::nil(), "scheduled_at": "2026-11-02T15:00:00Z"}
            ]
        });
        let cb: RunCallback = serde_json::from_value(body).unwrap();
        assert_eq!(RunStatus::from(cb.status), RunStatus::Success);
        assert_eq!(cb.events.len(), 3);
        assert!(matches!(cb.events[1], CallbackEvent::Reply { ref subject, .. } if subject.is_none()));
    }
}
