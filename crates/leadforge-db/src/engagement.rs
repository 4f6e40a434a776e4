//! Replies and bookings reported by the workflow tool.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use leadforge_core::defaults::PAGE_LIMIT;
use leadforge_core::{
    Booking, BookingStatus, EmailReply, Error, NewBooking, NewReply, Result, UpdateBookingRequest,
};

use crate::text_enum;

const REPLY_COLUMNS: &str =
    "id, company_id, lead_id, campaign_id, subject, body, sentiment, received_at, created_at";

const BOOKING_COLUMNS: &str =
    "id, company_id, lead_id, campaign_id, scheduled_at, meeting_url, status, notes, created_at";

#[derive(Debug, Clone)]
pub struct ReplyFilter {
    pub lead_id: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ReplyFilter {
    fn default() -> Self {
        Self {
            lead_id: None,
            campaign_id: None,
            limit: PAGE_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookingFilter {
    pub lead_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    /// Only scheduled bookings in the future, soonest first.
    pub upcoming: bool,
    pub limit: i64,
    pub offset: i64,
}

impl Default for BookingFilter {
    fn default() -> Self {
        Self {
            lead_id: None,
            status: None,
            upcoming: false,
            limit: PAGE_LIMIT,
            offset: 0,
        }
    }
}

/// PostgreSQL engagement repository.
#[derive(Clone)]
pub struct PgEngagementRepository {
    pool: Pool<Postgres>,
}

impl PgEngagementRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn insert_reply(&self, reply: &NewReply) -> Result<EmailReply> {
        let row = sqlx::query(&format!(
            "INSERT INTO email_replies (id, company_id, lead_id, campaign_id, subject, body, sentiment, received_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {REPLY_COLUMNS}"
        ))
        .bind(leadforge_core::new_v7())
        .bind(reply.company_id)
        .bind(reply.lead_id)
        .bind(reply.campaign_id)
        .bind(&reply.subject)
        .bind(&reply.body)
        .bind(reply.sentiment.as_str())
        .bind(reply.received_at)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        parse_reply(&row)
    }

    /// Newest replies first.
    pub async fn list_replies(&self, company_id: Uuid, filter: &ReplyFilter) -> Result<(Vec<EmailReply>, i64)> {
        let where_clause = "company_id = $1
             AND ($2::uuid IS NULL OR lead_id = $2)
             AND ($3::uuid IS NULL OR campaign_id = $3)";

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM email_replies WHERE {where_clause}"))
                .bind(company_id)
                .bind(filter.lead_id)
                .bind(filter.campaign_id)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;

        let rows = sqlx::query(&format!(
            "SELECT {REPLY_COLUMNS} FROM email_replies
             WHERE {where_clause}
             ORDER BY received_at DESC, id DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(company_id)
        .bind(filter.lead_id)
        .bind(filter.campaign_id)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let replies = rows.iter().map(parse_reply).collect::<Result<Vec<_>>>()?;
        Ok((replies, total))
    }

    pub async fn insert_booking(&self, booking: &NewBooking) -> Result<Booking> {
        let row = sqlx::query(&format!(
            "INSERT INTO bookings (id, company_id, lead_id, campaign_id, scheduled_at, meeting_url, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(leadforge_core::new_v7())
        .bind(booking.company_id)
        .bind(booking.lead_id)
        .bind(booking.campaign_id)
        .bind(booking.scheduled_at)
        .bind(&booking.meeting_url)
        .bind(&booking.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        parse_booking(&row)
    }

    /// Upcoming bookings are ordered soonest first; otherwise newest first.
    pub async fn list_bookings(&self, company_id: Uuid, filter: &BookingFilter) -> Result<(Vec<Booking>, i64)> {
        let where_clause = "company_id = $1
             AND ($2::uuid IS NULL OR lead_id = $2)
             AND ($3::text IS NULL OR status = $3)
             AND (NOT $4 OR (status = 'scheduled' AND scheduled_at >= now()))";
        let order = if filter.upcoming {
            "scheduled_at ASC, id ASC"
        } else {
            "scheduled_at DESC, id DESC"
        };
        let status = filter.status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM bookings WHERE {where_clause}"))
            .bind(company_id)
            .bind(filter.lead_id)
            .bind(status)
            .bind(filter.upcoming)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE {where_clause}
             ORDER BY {order}
             LIMIT $5 OFFSET $6"
        ))
        .bind(company_id)
        .bind(filter.lead_id)
        .bind(status)
        .bind(filter.upcoming)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let bookings = rows.iter().map(parse_booking).collect::<Result<Vec<_>>>()?;
        Ok((bookings, total))
    }

    pub async fn get_booking(&self, company_id: Uuid, id: Uuid) -> Result<Booking> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE company_id = $1 AND id = $2"
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("booking {id}")))?;
        parse_booking(&row)
    }

    /// Partial update; empty strings clear `meeting_url` and `notes`.
    pub async fn update_booking(&self, company_id: Uuid, id: Uuid, req: &UpdateBookingRequest) -> Result<Booking> {
        let clear = |v: &Option<String>| {
            v.as_ref().map(|s| {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else {
                    Some(s.to_string())
                }
            })
        };
        let meeting_url = clear(&req.meeting_url);
        let notes = clear(&req.notes);

        let row = sqlx::query(&format!(
            "UPDATE bookings SET
                status = COALESCE($3, status),
                scheduled_at = COALESCE($4, scheduled_at),
                meeting_url = CASE WHEN $5 THEN $6 ELSE meeting_url END,
                notes = CASE WHEN $7 THEN $8 ELSE notes END,
                updated_at = now()
             WHERE company_id = $1 AND id = $2
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(company_id)
        .bind(id)
        .bind(req.status.map(|s| s.as_str()))
        .bind(req.scheduled_at)
        .bind(meeting_url.is_some())
        .bind(meeting_url.flatten())
        .bind(notes.is_some())
        .bind(notes.flatten())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("booking {id}")))?;
        parse_booking(&row)
    }

    pub async fn count_replies_since(&self, company_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM email_replies WHERE company_id = $1 AND received_at >= $2")
            .bind(company_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    pub async fn count_bookings_since(&self, company_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE company_id = $1 AND created_at >= $2")
            .bind(company_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }
}

fn parse_reply(r: &PgRow) -> Result<EmailReply> {
    Ok(EmailReply {
        id: r.get("id"),
        company_id: r.get("company_id"),
        lead_id: r.get("lead_id"),
        campaign_id: r.get("campaign_id"),
        subject: r.get("subject"),
        body: r.get("body"),
        sentiment: text_enum(r, "sentiment")?,
        received_at: r.get("received_at"),
        created_at: r.get("created_at"),
    })
}

fn parse_booking(r: &PgRow) -> Result<Booking> {
    Ok(Booking {
        id: r.get("id"),
        company_id: r.get("company_id"),
        lead_id: r.get("lead_id"),
        campaign_id: r.get("campaign_id"),
        scheduled_at: r.get("scheduled_at"),
        meeting_url: r.get("meeting_url"),
        status: text_enum(r, "status")?,
        notes: r.get("notes"),
        created_at: r.get("created_at"),
    })
}
