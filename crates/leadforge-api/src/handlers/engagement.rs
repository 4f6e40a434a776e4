//! Replies and meeting bookings reported by workflows.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use leadforge_core::{
    clamp_page, Booking, BookingStatus, EmailReply, EventActor, LeadStatus, UpdateBookingRequest,
};
use leadforge_db::{BookingFilter, ReplyFilter};

use crate::query_types::empty_as_none;
use crate::{ApiError, AppState, ListResponse, RequireAuth};

#[derive(Debug, Default, Deserialize)]
pub struct ListRepliesQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub lead_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub campaign_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListBookingsQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub lead_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<BookingStatus>,
    /// Only scheduled bookings in the future, soonest first.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub upcoming: Option<bool>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<i64>,
}

#[utoipa::path(get, path = "/api/v1/replies", tag = "Engagement",
    params(
        ("lead_id" = Option<Uuid>, Query, description = "Filter by lead"),
        ("campaign_id" = Option<Uuid>, Query, description = "Filter by campaign"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("offset" = Option<i64>, Query, description = "Page offset"),
    ),
    responses((status = 200, description = "Paginated replies, newest first")))]
pub async fn list_replies(
    auth: RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<ListRepliesQuery>,
) -> Result<Json<ListResponse<EmailReply>>, ApiError> {
    let (limit, offset) = clamp_page(query.limit, query.offset);
    let filter = ReplyFilter {
        lead_id: query.lead_id,
        campaign_id: query.campaign_id,
        limit,
        offset,
    };
    let (replies, total) = state
        .db
        .engagement
        .list_replies(auth.principal.company_id, &filter)
        .await?;
    Ok(Json(ListResponse::new(replies, total, limit, offset)))
}

#[utoipa::path(get, path = "/api/v1/bookings", tag = "Engagement",
    params(
        ("lead_id" = Option<Uuid>, Query, description = "Filter by lead"),
        ("status" = Option<String>, Query, description = "scheduled | completed | cancelled | no_show"),
        ("upcoming" = Option<bool>, Query, description = "Only future scheduled bookings"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("offset" = Option<i64>, Query, description = "Page offset"),
    ),
    responses((status = 200, description = "Paginated bookings")))]
pub async fn list_bookings(
    auth: RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<ListResponse<Booking>>, ApiError> {
    let (limit, offset) = clamp_page(query.limit, query.offset);
    let filter = BookingFilter {
        lead_id: query.lead_id,
        status: query.status,
        upcoming: query.upcoming.unwrap_or(false),
        limit,
        offset,
    };
    let (bookings, total) = state
        .db
        .engagement
        .list_bookings(auth.principal.company_id, &filter)
        .await?;
    Ok(Json(ListResponse::new(bookings, total, limit, offset)))
}

/// Reschedule or close a booking.
///
/// Marking a booking `no_show` moves its lead back to `interested` when the
/// lifecycle allows it. Completing a booking does not decide the deal.
#[utoipa::path(patch, path = "/api/v1/bookings/{id}", tag = "Engagement",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = UpdateBookingRequest,
    responses(
        (status = 200, description = "Updated booking", body = Booking),
        (status = 404, description = "Not found"),
    ))]
pub async fn update_booking(
    auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookingRequest>,
) -> Result<Json<Booking>, ApiError> {
    let company_id = auth.principal.company_id;
    let before = state.db.engagement.get_booking(company_id, id).await?;
    let booking = state
        .db
        .engagement
        .update_booking(company_id, id, &req)
        .await?;

    if booking.status == BookingStatus::NoShow && before.status != BookingStatus::NoShow {
        let lead = state.db.leads.get(company_id, booking.lead_id).await?;
        state
            .leads
            .advance(
                lead,
                LeadStatus::Interested,
                "booking no-show",
                EventActor::user(auth.principal.user_id),
            )
            .await?;
    }
    Ok(Json(booking))
}
