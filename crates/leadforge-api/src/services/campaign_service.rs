//! Campaign state changes that reach outside the campaigns table.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use leadforge_core::{
    AiPersona, Campaign, CampaignStatus, DomainEvent, Error, EventActor, EventBus, Lead, Principal,
    Result, UsageMetric, WorkflowKind,
};
use leadforge_db::Database;

use crate::services::{Metering, WorkflowRelay};

/// Trigger name of the job sent to campaign-launch workflows.
pub const LAUNCH_TRIGGER: &str = "campaign.launch";

#[derive(Clone)]
pub struct CampaignService {
    db: Database,
    metering: Metering,
    relay: WorkflowRelay,
    events: Arc<EventBus>,
}

impl CampaignService {
    pub fn new(db: Database, metering: Metering, relay: WorkflowRelay, events: Arc<EventBus>) -> Self {
        Self {
            db,
            metering,
            relay,
            events,
        }
    }

    /// Draft or paused to active.
    ///
    /// One `ai_generations` unit is consumed per enrolled lead that has not
    /// been contacted yet. The launch job is then handed to every active
    /// campaign-launch workflow; delivery failures are recorded on the runs
    /// and do not undo the launch.
    pub async fn launch(&self, principal: &Principal, id: Uuid) -> Result<Campaign> {
        let company_id = principal.company_id;
        let campaign = self.db.campaigns.get(company_id, id).await?;
        campaign.status.ensure_can_become(CampaignStatus::Active)?;
        if campaign.lead_count == 0 {
            return Err(Error::InvalidInput(
                "campaign has no enrolled leads".into(),
            ));
        }

        let uncontacted = self.db.campaigns.count_uncontacted(company_id, id).await?;
        let metered = if uncontacted > 0 {
            let plan = self.db.companies.plan(company_id).await?;
            Some(
                self.metering
                    .consume_for_plan(company_id, plan, UsageMetric::AiGenerations, uncontacted)
                    .await?,
            )
        } else {
            None
        };

        let launched = match self
            .db
            .campaigns
            .set_status(
                company_id,
                id,
                campaign.status,
                CampaignStatus::Active,
                Some(principal.user_id),
            )
            .await
        {
            Ok(c) => c,
            Err(e) => {
                if let Some(m) = &metered {
                    self.metering.release(company_id, m).await;
                }
                return Err(e);
            }
        };

        info!(
            subsystem = "campaigns",
            component = "service",
            op = "launch",
            company_id = %company_id,
            campaign_id = %id,
            lead_count = launched.lead_count,
            uncontacted,
            "Campaign launched"
        );
        self.events.emit(
            company_id,
            EventActor::user(principal.user_id),
            DomainEvent::CampaignLaunched {
                campaign_id: id,
                lead_count: launched.lead_count,
            },
        );

        self.relay_launch(principal, &launched).await?;
        Ok(launched)
    }

    async fn relay_launch(&self, principal: &Principal, campaign: &Campaign) -> Result<()> {
        let company_id = principal.company_id;
        let workflows: Vec<_> = self
            .db
            .workflows
            .list(company_id)
            .await?
            .into_iter()
            .filter(|w| w.is_active && w.kind == WorkflowKind::CampaignLaunch)
            .collect();
        if workflows.is_empty() {
            warn!(
                subsystem = "campaigns",
                component = "service",
                op = "launch",
                company_id = %company_id,
                campaign_id = %campaign.id,
                "No active campaign-launch workflow, nothing relayed"
            );
            return Ok(());
        }

        let persona = self.db.personas.get(company_id, campaign.persona_id).await?;
        let leads = self
            .db
            .campaigns
            .enrolled_leads(company_id, campaign.id)
            .await?;
        let payload = launch_payload(campaign, &persona, &leads);

        for workflow in &workflows {
            if let Err(e) = self
                .relay
                .trigger(workflow, LAUNCH_TRIGGER, payload.clone(), Some(principal.user_id))
                .await
            {
                warn!(
                    subsystem = "campaigns",
                    component = "service",
                    op = "launch",
                    campaign_id = %campaign.id,
                    workflow_id = %workflow.id,
                    error = %e,
                    "Launch job not relayed"
                );
            }
        }
        Ok(())
    }

    pub async fn pause(&self, principal: &Principal, id: Uuid) -> Result<Campaign> {
        self.move_to(principal, id, CampaignStatus::Paused).await
    }

    pub async fn complete(&self, principal: &Principal, id: Uuid) -> Result<Campaign> {
        self.move_to(principal, id, CampaignStatus::Completed).await
    }

    async fn move_to(&self, principal: &Principal, id: Uuid, to: CampaignStatus) -> Result<Campaign> {
        let campaign = self.db.campaigns.get(principal.company_id, id).await?;
        campaign.status.ensure_can_become(to)?;
        self.db
            .campaigns
            .set_status(
                principal.company_id,
                id,
                campaign.status,
                to,
                Some(principal.user_id),
            )
            .await
    }
}

/// Job body for campaign-launch workflows. Leads that can no longer be
/// written to are left out.
fn launch_payload(campaign: &Campaign, persona: &AiPersona, leads: &[Lead]) -> serde_json::Value {
    let leads: Vec<_> = leads
        .iter()
        .filter(|l| l.status.is_enrollable())
        .map(|l| {
            json!({
                "id": l.id,
                "email": l.email,
                "name": l.display_name(),
                "first_name": l.first_name,
                "last_name": l.last_name,
                "title": l.title,
                "organization": l.organization,
                "status": l.status,
                "custom_fields": l.custom_fields,
            })
        })
        .collect();

    json!({
        "campaign": {
            "id": campaign.id,
            "name": campaign.name,
            "subject_template": campaign.subject_template,
        },
        "persona": {
            "id": persona.id,
            "name": persona.name,
            "role_title": persona.role_title,
            "tone": persona.tone,
            "description": persona.description,
            "system_prompt": persona.system_prompt,
            "signature": persona.signature,
        },
        "leads": leads,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use leadforge_core::{LeadGrade, LeadStatus, Tone};

    fn lead(email: &str, status: LeadStatus) -> Lead {
        let now = Utc::now();
        Lead {
            id: Uuid::now_v7(),
            company_id: Uuid::nil(),
            email: email.to_string(),
            first_name: Some("Grace".into()),
            last_name: None,
            title: None,
            organization: None,
            phone: None,
            linkedin_url: None,
            source: None,
            status,
            score: 0,
            grade: LeadGrade::Cold,
            tags: vec![],
            notes: None,
            custom_fields: json!({}),
            owner_id: None,
            reply_count: 0,
            last_contacted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_launch_payload_skips_closed_leads() {
        let now = Utc::now();
        let persona = AiPersona {
            id: Uuid::now_v7(),
            company_id: Uuid::nil(),
            name: "Sam".into(),
            role_title: Some("SDR".into()),
            tone: Tone::Friendly,
            description: None,
            system_prompt: Some("Be brief.".into()),
            signature: None,
            is_default: true,
            created_at: now,
            updated_at: now,
        };
        let campaign = Campaign {
            id: Uuid::now_v7(),
            company_id: Uuid::nil(),
            persona_id: persona.id,
            name: "Q3 outbound".into(),
            subject_template: Some("Hi {{first_name}}".into()),
            status: CampaignStatus::Active,
            lead_count: 3,
            sent_count: 0,
            reply_count: 0,
            booking_count: 0,
            created_at: now,
            updated_at: now,
            launched_at: Some(now),
        };
        let leads = vec![
            lead("a@x.io", LeadStatus::New),
            lead("b@x.io", LeadStatus::Unsubscribed),
            lead("c@x.io", LeadStatus::Contacted),
            lead("d@x.io", LeadStatus::Lost),
            lead("e@x.io", LeadStatus::Won),
        ];

        let payload = launch_payload(&campaign, &persona, &leads);
        let sent = payload["leads"].as_array().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["email"], "a@x.io");
        assert_eq!(sent[0]["name"], "Grace");
        assert_eq!(payload["persona"]["tone"], "friendly");
        assert_eq!(payload["campaign"]["name"], "Q3 outbound");
    }
}
