//! Domain event types, envelope, and event bus.
//!
//! Handlers and services emit [`DomainEvent`]s after a write commits. The bus
//! fans them out to independent consumers: the telemetry mirror (structured
//! logs) and the workflow dispatcher (relays matching events to the
//! automation tool).
//!
//! Every envelope is scoped to exactly one company; consumers must never
//! route an event outside the tenant that produced it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::lifecycle::LeadStatus;
use crate::usage::UsageMetric;

/// Who caused an event.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EventActor {
    /// `"system"`, `"user"`, or `"workflow"`.
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

impl EventActor {
    pub fn system() -> Self {
        Self {
            kind: "system".to_string(),
            id: None,
        }
    }

    pub fn user(id: Uuid) -> Self {
        Self {
            kind: "user".to_string(),
            id: Some(id),
        }
    }

    /// A workflow run reporting back through its callback.
    pub fn workflow(run_id: Uuid) -> Self {
        Self {
            kind: "workflow".to_string(),
            id: Some(run_id),
        }
    }
}

/// Versioned envelope around a [`DomainEvent`].
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// UUIDv7 event identifier.
    pub event_id: Uuid,
    /// Dot-namespaced event type, e.g. `"lead.created"`.
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    /// Tenant that owns the event.
    pub company_id: Uuid,
    pub actor: EventActor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
    pub payload_version: u32,
    pub payload: DomainEvent,
}

impl EventEnvelope {
    pub fn new(company_id: Uuid, actor: EventActor, event: DomainEvent) -> Self {
        Self {
            event_id: crate::ids::new_v7(),
            event_type: event.event_type().to_string(),
            occurred_at: Utc::now(),
            company_id,
            actor,
            entity_type: event.entity_type().map(String::from),
            entity_id: event.entity_id(),
            payload_version: 1,
            payload: event,
        }
    }
}

/// Domain event payloads.
///
/// Serialized with a `type` tag, e.g.
/// `{"type":"LeadCreated","lead_id":"...","email":"..."}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    LeadCreated {
        lead_id: Uuid,
        email: String,
    },
    LeadStatusChanged {
        lead_id: Uuid,
        from: LeadStatus,
        to: LeadStatus,
    },
    CampaignLaunched {
        campaign_id: Uuid,
        lead_count: i64,
    },
    UsageThresholdReached {
        metric: UsageMetric,
        period: String,
        threshold: i32,
        used: i64,
        limit: i64,
    },
    WorkflowRunCompleted {
        run_id: Uuid,
        workflow_id: Uuid,
        success: bool,
    },
}

impl DomainEvent {
    /// Namespaced type used for workflow subscriptions.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::LeadCreated { .. } => "lead.created",
            DomainEvent::LeadStatusChanged { .. } => "lead.status_changed",
            DomainEvent::CampaignLaunched { .. } => "campaign.launched",
            DomainEvent::UsageThresholdReached { .. } => "usage.threshold_reached",
            DomainEvent::WorkflowRunCompleted { .. } => "workflow.run_completed",
        }
    }

    pub fn entity_type(&self) -> Option<&'static str> {
        match self {
            DomainEvent::LeadCreated { .. } | DomainEvent::LeadStatusChanged { .. } => Some("lead"),
            DomainEvent::CampaignLaunched { .. } => Some("campaign"),
            DomainEvent::UsageThresholdReached { .. } => None,
            DomainEvent::WorkflowRunCompleted { .. } => Some("workflow_run"),
        }
    }

    pub fn entity_id(&self) -> Option<Uuid> {
        match self {
            DomainEvent::LeadCreated { lead_id, .. }
            | DomainEvent::LeadStatusChanged { lead_id, .. } => Some(*lead_id),
            DomainEvent::CampaignLaunched { campaign_id, .. } => Some(*campaign_id),
            DomainEvent::UsageThresholdReached { .. } => None,
            DomainEvent::WorkflowRunCompleted { run_id, .. } => Some(*run_id),
        }
    }

    /// Whether this event may trigger a workflow.
    ///
    /// Run completions are excluded so a workflow subscribed to everything
    /// cannot trigger itself in a loop.
    pub fn is_relayable(&self) -> bool {
        !matches!(self, DomainEvent::WorkflowRunCompleted { .. })
    }
}

/// Event types a workflow may subscribe to.
pub const SUBSCRIBABLE_EVENTS: [&str; 4] = [
    "lead.created",
    "lead.status_changed",
    "campaign.launched",
    "usage.threshold_reached",
];

/// Broadcast bus distributing enveloped events to every subscriber.
///
/// Slow receivers get `Lagged` and skip ahead.
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Recommended: 256 for production, 32 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event for a company. Dropped silently without subscribers.
    pub fn emit(&self, company_id: Uuid, actor: EventActor, event: DomainEvent) {
        let envelope = EventEnvelope::new(company_id, actor, event);
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            company_id = %company_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();
        let company_id = Uuid::new_v4();
        let lead_id = Uuid::new_v4();

        bus.emit(
            company_id,
            EventActor::user(Uuid::nil()),
            DomainEvent::LeadCreated {
                lead_id,
                email: "ada@example.com".to_string(),
            },
        );

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event_type, "lead.created");
        assert_eq!(envelope.company_id, company_id);
        assert_eq!(envelope.entity_type.as_deref(), Some("lead"));
        assert_eq!(envelope.entity_id, Some(lead_id));
        assert_eq!(envelope.actor.kind, "user");
        assert_eq!(envelope.payload_version, 1);
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new(32);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(
            Uuid::nil(),
            EventActor::system(),
            DomainEvent::CampaignLaunched {
                campaign_id: Uuid::nil(),
                lead_count: 3,
            },
        );

        assert_eq!(rx1.recv().await.unwrap().event_type, "campaign.launched");
        assert_eq!(rx2.recv().await.unwrap().event_type, "campaign.launched");
    }

    #[test]
    fn test_event_bus_no_subscribers_ok() {
        let bus = EventBus::new(4);
        bus.emit(
            Uuid::nil(),
            EventActor::system(),
            DomainEvent::WorkflowRunCompleted {
                run_id: Uuid::nil(),
                workflow_id: Uuid::nil(),
                success: true,
            },
        );
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_status_change_json_shape() {
        let event = DomainEvent::LeadStatusChanged {
            lead_id: Uuid::nil(),
            from: LeadStatus::Contacted,
            to: LeadStatus::Replied,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"LeadStatusChanged""#));
        assert!(json.contains(r#""from":"contacted""#));
        assert!(json.contains(r#""to":"replied""#));
    }

    #[test]
    fn test_run_completed_is_not_relayable() {
        let event = DomainEvent::WorkflowRunCompleted {
            run_id: Uuid::nil(),
            workflow_id: Uuid::nil(),
            success: false,
        };
        assert!(!event.is_relayable());
        assert!(!SUBSCRIBABLE_EVENTS.contains(&event.event_type()));
    }

    #[test]
    fn test_subscribable_events_are_relayable_types() {
        let samples = [
            DomainEvent::LeadCreated {
                lead_id: Uuid::nil(),
                email: String::new(),
            },
            DomainEvent::LeadStatusChanged {
                lead_id: Uuid::nil(),
                from: LeadStatus::New,
                to: LeadStatus::Contacted,
            },
            DomainEvent::CampaignLaunched {
                campaign_id: Uuid::nil(),
                lead_count: 0,
            },
            DomainEvent::UsageThresholdReached {
                metric: UsageMetric::EmailsSent,
                period: "2026-10".to_string(),
                threshold: 80,
                used: 160,
                limit: 200,
            },
        ];
        for event in samples {
            assert!(event.is_relayable());
            assert!(SUBSCRIBABLE_EVENTS.contains(&event.event_type()));
        }
    }
}
