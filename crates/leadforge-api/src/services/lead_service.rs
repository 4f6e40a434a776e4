//! Lead writes that carry business rules: metering on create, rescoring on
//! every change, and lifecycle transitions with their side effects.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use leadforge_core::defaults::BULK_IMPORT_MAX;
use leadforge_core::{
    compute_score, plan_transition, BulkImportResponse, CreateLeadRequest, DomainEvent, Error,
    EventActor, EventBus, Lead, LeadStatus, Principal, Result, Transition, UpdateLeadRequest,
    UsageMetric,
};
use leadforge_db::{Database, StatusWrite};

use crate::services::Metering;

#[derive(Clone)]
pub struct LeadService {
    db: Database,
    metering: Metering,
    events: Arc<EventBus>,
}

impl LeadService {
    pub fn new(db: Database, metering: Metering, events: Arc<EventBus>) -> Self {
        Self {
            db,
            metering,
            events,
        }
    }

    /// Create one lead. The `leads_created` unit is reserved before the
    /// insert and handed back if the insert fails.
    pub async fn create(&self, principal: &Principal, req: CreateLeadRequest) -> Result<Lead> {
        let req = req.normalized()?;
        let company_id = principal.company_id;
        let plan = self.db.companies.plan(company_id).await?;
        let metered = self
            .metering
            .consume_for_plan(company_id, plan, UsageMetric::LeadsCreated, 1)
            .await?;

        let score = compute_score(&req.score_input());
        let lead = match self.db.leads.insert(company_id, &req, score).await {
            Ok(lead) => lead,
            Err(e) => {
                self.metering.release(company_id, &metered).await;
                return Err(e);
            }
        };

        debug!(
            subsystem = "leads",
            component = "service",
            op = "create",
            company_id = %company_id,
            lead_id = %lead.id,
            score,
            "Lead created"
        );
        self.events.emit(
            company_id,
            EventActor::user(principal.user_id),
            DomainEvent::LeadCreated {
                lead_id: lead.id,
                email: lead.email.clone(),
            },
        );
        Ok(lead)
    }

    /// All-or-nothing import. Quota is checked for the whole batch.
    pub async fn bulk_import(
        &self,
        principal: &Principal,
        leads: Vec<CreateLeadRequest>,
    ) -> Result<BulkImportResponse> {
        if leads.is_empty() {
            return Err(Error::InvalidInput("leads cannot be empty".into()));
        }
        if leads.len() > BULK_IMPORT_MAX {
            return Err(Error::InvalidInput(format!(
                "at most {BULK_IMPORT_MAX} leads per import, got {}",
                leads.len()
            )));
        }

        let rows = prepare_batch(leads)?;
        let company_id = principal.company_id;
        let plan = self.db.companies.plan(company_id).await?;
        let metered = self
            .metering
            .consume_for_plan(company_id, plan, UsageMetric::LeadsCreated, rows.len() as i64)
            .await?;

        let ids = match self.db.leads.insert_bulk(company_id, &rows).await {
            Ok(ids) => ids,
            Err(e) => {
                self.metering.release(company_id, &metered).await;
                return Err(e);
            }
        };

        info!(
            subsystem = "leads",
            component = "service",
            op = "bulk_import",
            company_id = %company_id,
            result_count = ids.len(),
            "Leads imported"
        );
        for (id, (req, _)) in ids.iter().zip(rows.iter()) {
            self.events.emit(
                company_id,
                EventActor::user(principal.user_id),
                DomainEvent::LeadCreated {
                    lead_id: *id,
                    email: req.email.clone(),
                },
            );
        }
        Ok(BulkImportResponse {
            imported: ids.len(),
            ids,
        })
    }

    /// Partial update; the score is recomputed from the merged lead.
    pub async fn update(&self, principal: &Principal, id: Uuid, req: &UpdateLeadRequest) -> Result<Lead> {
        let mut lead = self.db.leads.get(principal.company_id, id).await?;
        req.apply(&mut lead)?;
        lead.score = compute_score(&lead.score_input());
        self.db.leads.save(&lead).await
    }

    /// Move a lead through the lifecycle. Same status is a no-op.
    pub async fn transition(
        &self,
        principal: &Principal,
        id: Uuid,
        to: LeadStatus,
        reason: Option<String>,
    ) -> Result<Lead> {
        let lead = self.db.leads.get(principal.company_id, id).await?;
        match plan_transition(lead.status, to)? {
            Transition::Unchanged => Ok(lead),
            Transition::Move { from, to } => {
                self.write_transition(
                    &lead,
                    from,
                    to,
                    reason,
                    Some(principal.user_id),
                    EventActor::user(principal.user_id),
                )
                .await
            }
        }
    }

    /// Move a lead to `to` only if the lifecycle allows it from where it is
    /// now. Returns the lead unchanged otherwise. Used for automatic moves
    /// driven by workflow callbacks and booking updates.
    ///
    /// A lead moved by another writer in the meantime is re-read and
    /// returned as it now stands.
    pub async fn advance(
        &self,
        lead: Lead,
        to: LeadStatus,
        reason: &str,
        actor: EventActor,
    ) -> Result<Lead> {
        match plan_transition(lead.status, to) {
            Ok(Transition::Move { from, to }) => {
                let actor_id = if actor.kind == "user" { actor.id } else { None };
                match self
                    .write_transition(&lead, from, to, Some(reason.to_string()), actor_id, actor)
                    .await
                {
                    Err(Error::Conflict(msg)) => {
                        debug!(
                            subsystem = "leads",
                            component = "service",
                            op = "advance",
                            lead_id = %lead.id,
                            to = %to,
                            reason = %msg,
                            "Lead moved concurrently, automatic transition skipped"
                        );
                        self.db.leads.get(lead.company_id, lead.id).await
                    }
                    other => other,
                }
            }
            _ => {
                debug!(
                    subsystem = "leads",
                    component = "service",
                    op = "advance",
                    lead_id = %lead.id,
                    from = %lead.status,
                    to = %to,
                    "Automatic transition not applicable"
                );
                Ok(lead)
            }
        }
    }

    async fn write_transition(
        &self,
        lead: &Lead,
        from: LeadStatus,
        to: LeadStatus,
        reason: Option<String>,
        actor_id: Option<Uuid>,
        actor: EventActor,
    ) -> Result<Lead> {
        let mut input = lead.score_input();
        input.status = to;
        let write = StatusWrite {
            from,
            to,
            score: compute_score(&input),
            reason,
            actor_id,
        };
        let updated = self
            .db
            .leads
            .transition(lead.company_id, lead.id, &write)
            .await?;

        info!(
            subsystem = "leads",
            component = "lifecycle",
            op = "transition",
            company_id = %lead.company_id,
            lead_id = %lead.id,
            from = %from,
            to = %to,
            score = updated.score,
            "Lead status changed"
        );
        self.events.emit(
            lead.company_id,
            actor,
            DomainEvent::LeadStatusChanged {
                lead_id: lead.id,
                from,
                to,
            },
        );
        Ok(updated)
    }

    /// Recompute and store a lead's score after an engagement change.
    pub async fn rescore(&self, lead: &Lead) -> Result<i32> {
        let score = compute_score(&lead.score_input());
        if score != lead.score {
            self.db.leads.set_score(lead.company_id, lead.id, score).await?;
        }
        Ok(score)
    }
}

/// Normalize every row and score it. Rejects emails repeated in the batch
/// with the index of the repeat.
fn prepare_batch(leads: Vec<CreateLeadRequest>) -> Result<Vec<(CreateLeadRequest, i32)>> {
    let mut seen = HashSet::with_capacity(leads.len());
    leads
        .into_iter()
        .enumerate()
        .map(|(i, req)| {
            let req = req
                .normalized()
                .map_err(|e| Error::InvalidInput(format!("leads[{i}]: {e}")))?;
            if !seen.insert(req.email.clone()) {
                return Err(Error::InvalidInput(format!(
                    "leads[{i}]: duplicate email {} in batch",
                    req.email
                )));
            }
            let score = compute_score(&req.score_input());
            Ok((req, score))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(email: &str) -> CreateLeadRequest {
        CreateLeadRequest {
            email: email.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_prepare_batch_normalizes_and_scores() {
        let mut full = req(" Ada@Example.com ");
        full.first_name = Some("Ada".into());
        full.last_name = Some("Lovelace".into());
        full.title = Some("CTO".into());

        let rows = prepare_batch(vec![full, req("bob@example.com")]).unwrap();
        assert_eq!(rows[0].0.email, "ada@example.com");
        assert_eq!(rows[0].1, 8);
        assert_eq!(rows[1].1, 0);
    }

    #[test]
    fn test_prepare_batch_rejects_in_batch_duplicates() {
        let err = prepare_batch(vec![req("a@x.io"), req("b@x.io"), req("A@X.io")]).unwrap_err();
        match err {
            Error::InvalidInput(msg) => assert!(msg.starts_with("leads[2]")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_prepare_batch_reports_bad_row_index() {
        let err = prepare_batch(vec![req("ok@x.io"), req("not-an-email")]).unwrap_err();
        assert!(err.to_string().contains("leads[1]"));
    }
}
