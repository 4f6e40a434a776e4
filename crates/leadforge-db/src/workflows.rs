//! Workflow registrations and their runs.
//!
//! A workflow is an n8n webhook the company has registered. Each outbound
//! call is a [`WorkflowRun`] that starts `pending` and is finished either by
//! a transport failure or by the workflow tool's callback.

use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use leadforge_core::defaults::WORKFLOW_MAX_FAILURES;
use leadforge_core::{
    CreateWorkflowRequest, Error, NewAuditEntry, Result, RunStatus, UpdateWorkflowRequest,
    Workflow, WorkflowRun,
};

use crate::{audit, text_enum};

const WORKFLOW_COLUMNS: &str = "id, company_id, name, kind, webhook_url, secret, events, is_active,
    failure_count, last_triggered_at, created_at, updated_at";

const RUN_COLUMNS: &str = "id, workflow_id, company_id, trigger, status, request_payload,
    response_status, result, error, started_at, completed_at";

/// How a run ended.
#[derive(Debug, Clone)]
pub struct RunCompletion {
    pub status: RunStatus,
    pub response_status: Option<i32>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// PostgreSQL workflow repository.
#[derive(Clone)]
pub struct PgWorkflowRepository {
    pool: Pool<Postgres>,
}

impl PgWorkflowRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, company_id: Uuid, req: &CreateWorkflowRequest) -> Result<Workflow> {
        let row = sqlx::query(&format!(
            "INSERT INTO workflows (id, company_id, name, kind, webhook_url, secret, events)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {WORKFLOW_COLUMNS}"
        ))
        .bind(leadforge_core::new_v7())
        .bind(company_id)
        .bind(req.name.trim())
        .bind(req.kind.as_str())
        .bind(req.webhook_url.trim())
        .bind(req.secret.as_deref().filter(|s| !s.is_empty()))
        .bind(&req.events)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        parse_workflow(&row)
    }

    pub async fn list(&self, company_id: Uuid) -> Result<Vec<Workflow>> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE company_id = $1 ORDER BY created_at DESC"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(parse_workflow).collect()
    }

    pub async fn get(&self, company_id: Uuid, id: Uuid) -> Result<Workflow> {
        let row = sqlx::query(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE company_id = $1 AND id = $2"
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("workflow {id}")))?;
        parse_workflow(&row)
    }

    /// Update non-None fields. Setting `is_active = true` also clears the
    /// failure counter so a re-enabled workflow gets a fresh budget.
    pub async fn update(&self, company_id: Uuid, id: Uuid, req: &UpdateWorkflowRequest) -> Result<Workflow> {
        let secret = req
            .secret
            .as_ref()
            .map(|s| if s.is_empty() { None } else { Some(s.as_str()) });

        let row = sqlx::query(&format!(
            "UPDATE workflows SET
                name = COALESCE($3, name),
                kind = COALESCE($4, kind),
                webhook_url = COALESCE($5, webhook_url),
                secret = CASE WHEN $6 THEN $7 ELSE secret END,
                events = COALESCE($8, events),
                is_active = COALESCE($9, is_active),
                failure_count = CASE WHEN $9 IS TRUE THEN 0 ELSE failure_count END,
                updated_at = now()
             WHERE company_id = $1 AND id = $2
             RETURNING {WORKFLOW_COLUMNS}"
        ))
        .bind(company_id)
        .bind(id)
        .bind(req.name.as_deref().map(str::trim))
        .bind(req.kind.map(|k| k.as_str()))
        .bind(req.webhook_url.as_deref().map(str::trim))
        .bind(secret.is_some())
        .bind(secret.flatten())
        .bind(&req.events)
        .bind(req.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("workflow {id}")))?;
        parse_workflow(&row)
    }

    pub async fn delete(&self, company_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflows WHERE company_id = $1 AND id = $2")
            .bind(company_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Active workflows of a company subscribed to `event_type`. An empty
    /// event list subscribes to everything.
    pub async fn list_active_for_event(&self, company_id: Uuid, event_type: &str) -> Result<Vec<Workflow>> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows
             WHERE company_id = $1 AND is_active AND ($2 = ANY(events) OR events = '{{}}')
             ORDER BY created_at"
        ))
        .bind(company_id)
        .bind(event_type)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(parse_workflow).collect()
    }

    /// Track delivery health. Success resets the failure counter; a failure
    /// increments it and disables the workflow once it reaches the limit.
    ///
    /// Returns whether the workflow is still active afterwards.
    pub async fn record_outcome(&self, id: Uuid, success: bool) -> Result<bool> {
        let is_active: Option<bool> = if success {
            sqlx::query_scalar(
                "UPDATE workflows SET last_triggered_at = now(), failure_count = 0, updated_at = now()
                 WHERE id = $1
                 RETURNING is_active",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
        } else {
            sqlx::query_scalar(
                "UPDATE workflows SET
                    last_triggered_at = now(),
                    failure_count = failure_count + 1,
                    is_active = CASE WHEN failure_count + 1 >= $2 THEN false ELSE is_active END,
                    updated_at = now()
                 WHERE id = $1
                 RETURNING is_active",
            )
            .bind(id)
            .bind(WORKFLOW_MAX_FAILURES)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
        };
        is_active.ok_or_else(|| Error::NotFound(format!("workflow {id}")))
    }

    /// Create a pending run and audit it in one transaction.
    pub async fn create_run(
        &self,
        workflow: &Workflow,
        trigger: &str,
        payload: &serde_json::Value,
        actor_id: Option<Uuid>,
    ) -> Result<WorkflowRun> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let row = sqlx::query(&format!(
            "INSERT INTO workflow_runs (id, workflow_id, company_id, trigger, request_payload)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {RUN_COLUMNS}"
        ))
        .bind(leadforge_core::new_v7())
        .bind(workflow.id)
        .bind(workflow.company_id)
        .bind(trigger)
        .bind(payload)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;
        let run = parse_run(&row)?;

        let entry = NewAuditEntry::new(
            workflow.company_id,
            actor_id,
            "workflow_run.started",
            "workflow_run",
            Some(run.id),
        )
        .with_details(serde_json::json!({ "workflow_id": workflow.id, "trigger": trigger }));
        audit::insert_entry(&mut *tx, &entry).await?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(run)
    }

    pub async fn get_run(&self, company_id: Uuid, run_id: Uuid) -> Result<WorkflowRun> {
        let row = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM workflow_runs WHERE company_id = $1 AND id = $2"
        ))
        .bind(company_id)
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("workflow run {run_id}")))?;
        parse_run(&row)
    }

    /// Look up a run and its workflow without a tenant; the callback route is
    /// authenticated by the workflow's signature, not by a user token.
    pub async fn get_run_for_callback(&self, run_id: Uuid) -> Result<Option<(WorkflowRun, Workflow)>> {
        let run_row = sqlx::query(&format!("SELECT {RUN_COLUMNS} FROM workflow_runs WHERE id = $1"))
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        let Some(run_row) = run_row else {
            return Ok(None);
        };
        let run = parse_run(&run_row)?;

        let wf_row = sqlx::query(&format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = $1"))
            .bind(run.workflow_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        match wf_row {
            Some(r) => Ok(Some((run, parse_workflow(&r)?))),
            None => Ok(None),
        }
    }

    /// Finish a pending run and audit it.
    ///
    /// Returns `None` without writing when the run is no longer pending.
    pub async fn complete_run(
        &self,
        company_id: Uuid,
        run_id: Uuid,
        completion: &RunCompletion,
    ) -> Result<Option<WorkflowRun>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let row = sqlx::query(&format!(
            "UPDATE workflow_runs SET
                status = $3, response_status = COALESCE($4, response_status),
                result = $5, error = $6, completed_at = now()
             WHERE company_id = $1 AND id = $2 AND status = 'pending'
             RETURNING {RUN_COLUMNS}"
        ))
        .bind(company_id)
        .bind(run_id)
        .bind(completion.status.as_str())
        .bind(completion.response_status)
        .bind(&completion.result)
        .bind(&completion.error)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let run = parse_run(&row)?;

        let entry = NewAuditEntry::new(
            company_id,
            None,
            "workflow_run.completed",
            "workflow_run",
            Some(run_id),
        )
        .with_details(serde_json::json!({
            "workflow_id": run.workflow_id,
            "status": run.status,
            "error": run.error,
        }));
        audit::insert_entry(&mut *tx, &entry).await?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(Some(run))
    }

    /// Record the HTTP status the webhook answered with while leaving the
    /// run pending for its callback.
    pub async fn set_response_status(&self, run_id: Uuid, status: i32) -> Result<()> {
        sqlx::query("UPDATE workflow_runs SET response_status = $2 WHERE id = $1")
            .bind(run_id)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Runs newest first, for one workflow or the whole company.
    pub async fn list_runs(
        &self,
        company_id: Uuid,
        workflow_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WorkflowRun>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM workflow_runs
             WHERE company_id = $1 AND ($2::uuid IS NULL OR workflow_id = $2)",
        )
        .bind(company_id)
        .bind(workflow_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let rows = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM workflow_runs
             WHERE company_id = $1 AND ($2::uuid IS NULL OR workflow_id = $2)
             ORDER BY started_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(company_id)
        .bind(workflow_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let runs = rows.iter().map(parse_run).collect::<Result<Vec<_>>>()?;
        Ok((runs, total))
    }
}

fn parse_workflow(r: &PgRow) -> Result<Workflow> {
    Ok(Workflow {
        id: r.get("id"),
        company_id: r.get("company_id"),
        name: r.get("name"),
        kind: text_enum(r, "kind")?,
        webhook_url: r.get("webhook_url"),
        secret: r.get("secret"),
        events: r.get("events"),
        is_active: r.get("is_active"),
        failure_count: r.get("failure_count"),
        last_triggered_at: r.get("last_triggered_at"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

fn parse_run(r: &PgRow) -> Result<WorkflowRun> {
    Ok(WorkflowRun {
        id: r.get("id"),
        workflow_id: r.get("workflow_id"),
        company_id: r.get("company_id"),
        trigger: r.get("trigger"),
        status: text_enum(r, "status")?,
        request_payload: r.get("request_payload"),
        response_status: r.get("response_status"),
        result: r.get("result"),
        error: r.get("error"),
        started_at: r.get("started_at"),
        completed_at: r.get("completed_at"),
    })
}
