//! Telemetry mirror: one structured log line per domain event.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use leadforge_core::logging::EVENTS_TARGET;
use leadforge_core::{DomainEvent, EventBus, EventEnvelope};

/// Log every event on the bus under the `leadforge::events` target until the
/// bus closes.
pub async fn telemetry_mirror(events: Arc<EventBus>) {
    let mut rx = events.subscribe();
    loop {
        match rx.recv().await {
            Ok(envelope) => mirror(&envelope),
            Err(RecvError::Lagged(n)) => {
                tracing::warn!(missed = n, "Telemetry mirror lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn mirror(envelope: &EventEnvelope) {
    let company_id = envelope.company_id;
    let event_id = envelope.event_id;
    let actor = envelope.actor.kind.as_str();
    match &envelope.payload {
        DomainEvent::LeadCreated { lead_id, .. } => {
            tracing::info!(
                target: EVENTS_TARGET,
                event = "lead.created",
                %event_id, %company_id, %lead_id, actor,
                "Lead created"
            );
        }
        DomainEvent::LeadStatusChanged { lead_id, from, to } => {
            tracing::info!(
                target: EVENTS_TARGET,
                event = "lead.status_changed",
                %event_id, %company_id, %lead_id, %from, %to, actor,
                "Lead status changed"
            );
        }
        DomainEvent::CampaignLaunched {
            campaign_id,
            lead_count,
        } => {
            tracing::info!(
                target: EVENTS_TARGET,
                event = "campaign.launched",
                %event_id, %company_id, %campaign_id, lead_count,
                "Campaign launched"
            );
        }
        DomainEvent::UsageThresholdReached {
            metric,
            period,
            threshold,
            used,
            limit,
        } => {
            tracing::warn!(
                target: EVENTS_TARGET,
                event = "usage.threshold_reached",
                %event_id, %company_id, metric = metric.as_str(), %period, threshold, used, limit,
                "Usage threshold reached"
            );
        }
        DomainEvent::WorkflowRunCompleted {
            run_id,
            workflow_id,
            success,
        } => {
            tracing::info!(
                target: EVENTS_TARGET,
                event = "workflow.run_completed",
                %event_id, %company_id, %run_id, %workflow_id, success,
                "Workflow run completed"
            );
        }
    }
}
