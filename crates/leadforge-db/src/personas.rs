//! AI persona repository.
//!
//! A company has at most one default persona (enforced by a partial unique
//! index). The first persona a company creates becomes the default, and
//! deleting the default promotes the oldest remaining one.

use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use leadforge_core::{AiPersona, CreatePersonaRequest, Error, Result, UpdatePersonaRequest};

use crate::text_enum;

const PERSONA_COLUMNS: &str = "id, company_id, name, role_title, tone, description, system_prompt,
    signature, is_default, created_at, updated_at";

/// PostgreSQL persona repository.
#[derive(Clone)]
pub struct PgPersonaRepository {
    pool: Pool<Postgres>,
}

impl PgPersonaRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, company_id: Uuid, req: &CreatePersonaRequest) -> Result<AiPersona> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("persona name cannot be empty".into()));
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        lock_company_personas(&mut tx, company_id).await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ai_personas WHERE company_id = $1")
                .bind(company_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(Error::Database)?;

        let is_default = req.is_default || existing == 0;
        if is_default {
            clear_default(&mut tx, company_id).await?;
        }

        let row = sqlx::query(&format!(
            "INSERT INTO ai_personas (id, company_id, name, role_title, tone, description,
                                      system_prompt, signature, is_default)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {PERSONA_COLUMNS}"
        ))
        .bind(leadforge_core::new_v7())
        .bind(company_id)
        .bind(name)
        .bind(&req.role_title)
        .bind(req.tone.as_str())
        .bind(&req.description)
        .bind(&req.system_prompt)
        .bind(&req.signature)
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        parse_persona(&row)
    }

    /// Default persona first, then by creation time.
    pub async fn list(&self, company_id: Uuid) -> Result<Vec<AiPersona>> {
        let rows = sqlx::query(&format!(
            "SELECT {PERSONA_COLUMNS} FROM ai_personas
             WHERE company_id = $1
             ORDER BY is_default DESC, created_at, id"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(parse_persona).collect()
    }

    pub async fn get(&self, company_id: Uuid, id: Uuid) -> Result<AiPersona> {
        let row = sqlx::query(&format!(
            "SELECT {PERSONA_COLUMNS} FROM ai_personas WHERE company_id = $1 AND id = $2"
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("persona {id}")))?;
        parse_persona(&row)
    }

    pub async fn get_default(&self, company_id: Uuid) -> Result<Option<AiPersona>> {
        let row = sqlx::query(&format!(
            "SELECT {PERSONA_COLUMNS} FROM ai_personas WHERE company_id = $1 AND is_default"
        ))
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(parse_persona).transpose()
    }

    /// Partial update; an empty string clears an optional text field.
    pub async fn update(&self, company_id: Uuid, id: Uuid, req: &UpdatePersonaRequest) -> Result<AiPersona> {
        let mut persona = self.get(company_id, id).await?;

        if let Some(name) = &req.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidInput("persona name cannot be empty".into()));
            }
            persona.name = name.to_string();
        }
        if let Some(tone) = req.tone {
            persona.tone = tone;
        }
        merge_text(&mut persona.role_title, &req.role_title);
        merge_text(&mut persona.description, &req.description);
        merge_text(&mut persona.system_prompt, &req.system_prompt);
        merge_text(&mut persona.signature, &req.signature);

        let row = sqlx::query(&format!(
            "UPDATE ai_personas SET
                name = $3, role_title = $4, tone = $5, description = $6,
                system_prompt = $7, signature = $8, updated_at = now()
             WHERE company_id = $1 AND id = $2
             RETURNING {PERSONA_COLUMNS}"
        ))
        .bind(company_id)
        .bind(id)
        .bind(&persona.name)
        .bind(&persona.role_title)
        .bind(persona.tone.as_str())
        .bind(&persona.description)
        .bind(&persona.system_prompt)
        .bind(&persona.signature)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("persona {id}")))?;
        parse_persona(&row)
    }

    /// Make `id` the company's only default persona.
    pub async fn set_default(&self, company_id: Uuid, id: Uuid) -> Result<AiPersona> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        lock_company_personas(&mut tx, company_id).await?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM ai_personas WHERE company_id = $1 AND id = $2)",
        )
        .bind(company_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;
        if !exists {
            return Err(Error::NotFound(format!("persona {id}")));
        }

        clear_default(&mut tx, company_id).await?;
        let row = sqlx::query(&format!(
            "UPDATE ai_personas SET is_default = true, updated_at = now()
             WHERE company_id = $1 AND id = $2
             RETURNING {PERSONA_COLUMNS}"
        ))
        .bind(company_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        parse_persona(&row)
    }

    /// Delete a persona no campaign references, completed ones included.
    pub async fn delete(&self, company_id: Uuid, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        lock_company_personas(&mut tx, company_id).await?;

        let was_default: Option<bool> = sqlx::query_scalar(
            "SELECT is_default FROM ai_personas WHERE company_id = $1 AND id = $2",
        )
        .bind(company_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;
        let Some(was_default) = was_default else {
            return Err(Error::NotFound(format!("persona {id}")));
        };

        let refs = sqlx::query(
            "SELECT COUNT(*) FILTER (WHERE status <> 'completed') AS open,
                    COUNT(*) FILTER (WHERE status = 'completed') AS done
             FROM campaigns WHERE company_id = $1 AND persona_id = $2",
        )
        .bind(company_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;
        let (open, done): (i64, i64) = (refs.get("open"), refs.get("done"));
        if open > 0 {
            return Err(Error::Conflict(format!(
                "persona {id} is used by {open} unfinished campaign(s)"
            )));
        }
        if done > 0 {
            return Err(Error::Conflict(format!(
                "persona {id} is kept as history of {done} completed campaign(s)"
            )));
        }

        sqlx::query("DELETE FROM ai_personas WHERE company_id = $1 AND id = $2")
            .bind(company_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        if was_default {
            sqlx::query(
                "UPDATE ai_personas SET is_default = true, updated_at = now()
                 WHERE id = (SELECT id FROM ai_personas WHERE company_id = $1
                             ORDER BY created_at, id LIMIT 1)",
            )
            .bind(company_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}

/// Serialize default-persona changes per company.
async fn lock_company_personas(tx: &mut Transaction<'_, Postgres>, company_id: Uuid) -> Result<()> {
    sqlx::query("SELECT id FROM companies WHERE id = $1 FOR UPDATE")
        .bind(company_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;
    Ok(())
}

async fn clear_default(tx: &mut Transaction<'_, Postgres>, company_id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE ai_personas SET is_default = false, updated_at = now()
         WHERE company_id = $1 AND is_default",
    )
    .bind(company_id)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;
    Ok(())
}

fn merge_text(field: &mut Option<String>, patch: &Option<String>) {
    if let Some(value) = patch {
        let trimmed = value.trim();
        *field = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }
}

fn parse_persona(r: &PgRow) -> Result<AiPersona> {
    Ok(AiPersona {
        id: r.get("id"),
        company_id: r.get("company_id"),
        name: r.get("name"),
        role_title: r.get("role_title"),
        tone: text_enum(r, "tone")?,
        description: r.get("description"),
        system_prompt: r.get("system_prompt"),
        signature: r.get("signature"),
        is_default: r.get("is_default"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}
