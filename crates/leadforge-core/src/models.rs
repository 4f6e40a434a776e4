//! Core data models for leadforge.
//!
//! These types are shared across all leadforge crates and represent the
//! tenant-scoped domain entities. Enums are stored as TEXT in Postgres and
//! mapped through `as_str` / `FromStr`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::lifecycle::LeadStatus;
use crate::scoring::{LeadGrade, ScoreInput};
use crate::usage::{Plan, QuotaStatus, UsageMetric, UsagePeriod};

fn unknown(kind: &str, value: &str) -> Error {
    Error::InvalidInput(format!("unknown {kind}: {value}"))
}

// =============================================================================
// COMPANY TYPES
// =============================================================================

/// A tenant. Every other row belongs to exactly one company.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub domain: Option<String>,
    pub plan: Plan,
    pub settings: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateCompanyRequest {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub settings: Option<JsonValue>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct ChangePlanRequest {
    pub plan: Plan,
}

// =============================================================================
// USER / AUTH TYPES
// =============================================================================

/// Role of a user within their company. Ordered `Member < Admin < Owner`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
    utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Member,
    Admin,
    Owner,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Member => "member",
            UserRole::Admin => "admin",
            UserRole::Owner => "owner",
        }
    }

    /// Whether this role grants at least the privileges of `min`.
    pub fn at_least(&self, min: UserRole) -> bool {
        *self >= min
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "member" => Ok(UserRole::Member),
            "admin" => Ok(UserRole::Admin),
            "owner" => Ok(UserRole::Owner),
            other => Err(unknown("user role", other)),
        }
    }
}

/// A user account. The password hash never leaves the database layer.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct User {
    pub id: Uuid,
    pub company_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// A refresh-token session.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by: Option<Uuid>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuthSession {
    /// Not revoked and not expired at `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }

    /// Revoked because it was rotated into a newer session.
    pub fn was_rotated(&self) -> bool {
        self.revoked_at.is_some() && self.replaced_by.is_some()
    }
}

/// Identity resolved from a verified access token.
///
/// The tenant scope of every request comes from here, never from the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub role: UserRole,
}

impl Principal {
    pub fn require(&self, min: UserRole) -> Result<()> {
        if self.role.at_least(min) {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("requires {min} role")))
        }
    }
}

/// Access and refresh token pair returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub company_name: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub user: User,
    pub company: Company,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MeResponse {
    pub user: User,
    pub company: Company,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct ChangeRoleRequest {
    pub role: UserRole,
}

/// Trim and lowercase an email address, rejecting obviously invalid input.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(Error::InvalidInput(format!("invalid email address: {raw}"))),
    }
}

// =============================================================================
// LEAD TYPES
// =============================================================================

/// A prospect in a company's pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Lead {
    pub id: Uuid,
    pub company_id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub source: Option<String>,
    pub status: LeadStatus,
    pub score: i32,
    pub grade: LeadGrade,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub custom_fields: JsonValue,
    pub owner_id: Option<Uuid>,
    pub reply_count: i64,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn score_input(&self) -> ScoreInput<'_> {
        ScoreInput {
            status: self.status,
            first_name: self.first_name.as_deref(),
            last_name: self.last_name.as_deref(),
            title: self.title.as_deref(),
            organization: self.organization.as_deref(),
            phone: self.phone.as_deref(),
            linkedin_url: self.linkedin_url.as_deref(),
            reply_count: self.reply_count,
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(f), Some(l)) => format!("{f} {l}"),
            (Some(f), None) => f.clone(),
            (None, Some(l)) => l.clone(),
            (None, None) => self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateLeadRequest {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub custom_fields: Option<JsonValue>,
    pub owner_id: Option<Uuid>,
}

impl CreateLeadRequest {
    /// Normalize the email and drop blank optional fields.
    pub fn normalized(mut self) -> Result<Self> {
        self.email = normalize_email(&self.email)?;
        for field in [
            &mut self.first_name,
            &mut self.last_name,
            &mut self.title,
            &mut self.organization,
            &mut self.phone,
            &mut self.linkedin_url,
            &mut self.source,
            &mut self.notes,
        ] {
            *field = field
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        self.tags = normalize_tags(&self.tags);
        Ok(self)
    }

    pub fn score_input(&self) -> ScoreInput<'_> {
        ScoreInput {
            status: LeadStatus::New,
            first_name: self.first_name.as_deref(),
            last_name: self.last_name.as_deref(),
            title: self.title.as_deref(),
            organization: self.organization.as_deref(),
            phone: self.phone.as_deref(),
            linkedin_url: self.linkedin_url.as_deref(),
            reply_count: 0,
        }
    }
}

/// Lowercase, trim, and dedupe tags, preserving first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Partial lead update. Absent fields are left untouched; an empty string
/// clears an optional text field.
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateLeadRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub source: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    pub custom_fields: Option<JsonValue>,
    pub owner_id: Option<Uuid>,
}

impl UpdateLeadRequest {
    /// Apply this update to a lead in memory.
    pub fn apply(&self, lead: &mut Lead) -> Result<()> {
        fn set(target: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value {
                let v = v.trim();
                *target = if v.is_empty() { None } else { Some(v.to_string()) };
            }
        }
        if let Some(email) = &self.email {
            lead.email = normalize_email(email)?;
        }
        set(&mut lead.first_name, &self.first_name);
        set(&mut lead.last_name, &self.last_name);
        set(&mut lead.title, &self.title);
        set(&mut lead.organization, &self.organization);
        set(&mut lead.phone, &self.phone);
        set(&mut lead.linkedin_url, &self.linkedin_url);
        set(&mut lead.source, &self.source);
        set(&mut lead.notes, &self.notes);
        if let Some(tags) = &self.tags {
            lead.tags = normalize_tags(tags);
        }
        if let Some(fields) = &self.custom_fields {
            lead.custom_fields = fields.clone();
        }
        if let Some(owner) = self.owner_id {
            lead.owner_id = Some(owner);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct BulkImportRequest {
    pub leads: Vec<CreateLeadRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct BulkImportResponse {
    pub imported: usize,
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct TransitionRequest {
    pub status: LeadStatus,
    pub reason: Option<String>,
}

/// One recorded lifecycle move.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LeadStatusChange {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub from_status: LeadStatus,
    pub to_status: LeadStatus,
    pub reason: Option<String>,
    pub actor_id: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

/// Sortable lead columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeadSort {
    #[default]
    CreatedAt,
    UpdatedAt,
    Score,
}

impl LeadSort {
    pub fn column(&self) -> &'static str {
        match self {
            LeadSort::CreatedAt => "created_at",
            LeadSort::UpdatedAt => "updated_at",
            LeadSort::Score => "score",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filters for listing leads.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    /// Case-insensitive match on name, email, or organization.
    pub search: Option<String>,
    pub tag: Option<String>,
    pub min_score: Option<i32>,
    pub owner_id: Option<Uuid>,
    pub sort: LeadSort,
    pub order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

/// Clamp client pagination input to the supported range.
pub fn clamp_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit
        .unwrap_or(crate::defaults::PAGE_LIMIT)
        .clamp(1, crate::defaults::PAGE_LIMIT_MAX);
    let offset = offset.unwrap_or(crate::defaults::PAGE_OFFSET).max(0);
    (limit, offset)
}

// =============================================================================
// PERSONA TYPES
// =============================================================================

/// Voice an AI persona writes in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Friendly,
    Casual,
    Formal,
    Enthusiastic,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Friendly => "friendly",
            Tone::Casual => "casual",
            Tone::Formal => "formal",
            Tone::Enthusiastic => "enthusiastic",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "professional" => Ok(Tone::Professional),
            "friendly" => Ok(Tone::Friendly),
            "casual" => Ok(Tone::Casual),
            "formal" => Ok(Tone::Formal),
            "enthusiastic" => Ok(Tone::Enthusiastic),
            other => Err(unknown("tone", other)),
        }
    }
}

/// A sender identity used by the workflow tool to write outreach emails.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AiPersona {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub role_title: Option<String>,
    pub tone: Tone,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    pub signature: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct CreatePersonaRequest {
    pub name: String,
    pub role_title: Option<String>,
    #[serde(default)]
    pub tone: Tone,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    pub signature: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdatePersonaRequest {
    pub name: Option<String>,
    pub role_title: Option<String>,
    pub tone: Option<Tone>,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    pub signature: Option<String>,
}

// =============================================================================
// CAMPAIGN TYPES
// =============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
        }
    }

    /// Content and enrollment may only change while not running.
    pub fn is_editable(&self) -> bool {
        matches!(self, CampaignStatus::Draft | CampaignStatus::Paused)
    }

    /// Validate a campaign state change.
    pub fn ensure_can_become(&self, next: CampaignStatus) -> Result<()> {
        use CampaignStatus::*;
        let allowed = matches!(
            (self, next),
            (Draft, Active) | (Paused, Active) | (Active, Paused) | (Active, Completed) | (Paused, Completed)
        );
        if allowed {
            Ok(())
        } else {
            Err(Error::Conflict(format!("campaign cannot move from {self} to {next}")))
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "active" => Ok(CampaignStatus::Active),
            "paused" => Ok(CampaignStatus::Paused),
            "completed" => Ok(CampaignStatus::Completed),
            other => Err(unknown("campaign status", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Campaign {
    pub id: Uuid,
    pub company_id: Uuid,
    pub persona_id: Uuid,
    pub name: String,
    pub subject_template: Option<String>,
    pub status: CampaignStatus,
    pub lead_count: i64,
    pub sent_count: i64,
    pub reply_count: i64,
    pub booking_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub launched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CreateCampaignRequest {
    pub name: String,
    /// Falls back to the company's default persona.
    pub persona_id: Option<Uuid>,
    pub subject_template: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub persona_id: Option<Uuid>,
    pub subject_template: Option<String>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct EnrollLeadsRequest {
    pub lead_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EnrollResponse {
    pub enrolled: i64,
    pub skipped: i64,
    pub lead_count: i64,
}

/// Campaign counters bumped by workflow callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignCounter {
    Sent,
    Reply,
    Booking,
}

impl CampaignCounter {
    pub fn column(&self) -> &'static str {
        match self {
            CampaignCounter::Sent => "sent_count",
            CampaignCounter::Reply => "reply_count",
            CampaignCounter::Booking => "booking_count",
        }
    }
}

// =============================================================================
// ENGAGEMENT TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl FromStr for Sentiment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(unknown("sentiment", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EmailReply {
    pub id: Uuid,
    pub company_id: Uuid,
    pub lead_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub subject: Option<String>,
    pub body: String,
    pub sentiment: Sentiment,
    pub received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReply {
    pub company_id: Uuid,
    pub lead_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub subject: Option<String>,
    pub body: String,
    pub sentiment: Sentiment,
    pub received_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scheduled" => Ok(BookingStatus::Scheduled),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "no_show" => Ok(BookingStatus::NoShow),
            other => Err(unknown("booking status", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Booking {
    pub id: Uuid,
    pub company_id: Uuid,
    pub lead_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub meeting_url: Option<String>,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub company_id: Uuid,
    pub lead_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub meeting_url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct UpdateBookingRequest {
    pub status: Option<BookingStatus>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub meeting_url: Option<String>,
    pub notes: Option<String>,
}

// =============================================================================
// WORKFLOW TYPES
// =============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    CampaignLaunch,
    LeadEnrichment,
    FollowUp,
    #[default]
    Custom,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::CampaignLaunch => "campaign_launch",
            WorkflowKind::LeadEnrichment => "lead_enrichment",
            WorkflowKind::FollowUp => "follow_up",
            WorkflowKind::Custom => "custom",
        }
    }
}

impl FromStr for WorkflowKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "campaign_launch" => Ok(WorkflowKind::CampaignLaunch),
            "lead_enrichment" => Ok(WorkflowKind::LeadEnrichment),
            "follow_up" => Ok(WorkflowKind::FollowUp),
            "custom" => Ok(WorkflowKind::Custom),
            other => Err(unknown("workflow kind", other)),
        }
    }
}

/// A registered n8n webhook.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Workflow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub kind: WorkflowKind,
    pub webhook_url: String,
    #[serde(skip_serializing, default)]
    pub secret: Option<String>,
    /// Subscribed event types; empty means all.
    pub events: Vec<String>,
    pub is_active: bool,
    pub failure_count: i32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn subscribes_to(&self, event_type: &str) -> bool {
        self.events.is_empty() || self.events.iter().any(|e| e == event_type)
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CreateWorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub kind: WorkflowKind,
    pub webhook_url: String,
    pub secret: Option<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateWorkflowRequest {
    pub name: Option<String>,
    pub kind: Option<WorkflowKind>,
    pub webhook_url: Option<String>,
    pub secret: Option<String>,
    pub events: Option<Vec<String>>,
    /// Re-enabling also resets the failure counter.
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct TriggerWorkflowRequest {
    #[serde(default)]
    pub payload: JsonValue,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(unknown("run status", other)),
        }
    }
}

/// One outbound relay invocation and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub company_id: Uuid,
    /// Event type or `"manual"`.
    pub trigger: String,
    pub status: RunStatus,
    pub request_payload: JsonValue,
    pub response_status: Option<i32>,
    pub result: Option<JsonValue>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Outcome reported by the workflow tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CallbackOutcome {
    Success,
    Failed,
}

impl From<CallbackOutcome> for RunStatus {
    fn from(o: CallbackOutcome) -> Self {
        match o {
            CallbackOutcome::Success => RunStatus::Success,
            CallbackOutcome::Failed => RunStatus::Failed,
        }
    }
}

/// Body of `POST /api/v1/hooks/runs/:id/callback`.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct RunCallback {
    pub status: CallbackOutcome,
    pub error: Option<String>,
    pub result: Option<JsonValue>,
    #[serde(default)]
    pub events: Vec<CallbackEvent>,
}

/// Engagement facts reported back by the workflow tool.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallbackEvent {
    EmailSent {
        lead_id: Uuid,
        campaign_id: Option<Uuid>,
    },
    Reply {
        lead_id: Uuid,
        campaign_id: Option<Uuid>,
        subject: Option<String>,
        body: String,
        received_at: Option<DateTime<Utc>>,
    },
    Booking {
        lead_id: Uuid,
        campaign_id: Option<Uuid>,
        scheduled_at: DateTime<Utc>,
        meeting_url: Option<String>,
        notes: Option<String>,
    },
}

impl CallbackEvent {
    pub fn lead_id(&self) -> Uuid {
        match self {
            CallbackEvent::EmailSent { lead_id, .. }
            | CallbackEvent::Reply { lead_id, .. }
            | CallbackEvent::Booking { lead_id, .. } => *lead_id,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CallbackSummary {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub applied: usize,
    pub ignored: usize,
}

// =============================================================================
// AUDIT / NOTIFICATION / USAGE TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AuditEntry {
    pub id: Uuid,
    pub company_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Audit entry to append.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub company_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: JsonValue,
}

impl NewAuditEntry {
    pub fn new(
        company_id: Uuid,
        actor_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
    ) -> Self {
        Self {
            company_id,
            actor_id,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            details: JsonValue::Object(Default::default()),
        }
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub company_id: Uuid,
    /// `"usage_threshold"`.
    pub kind: String,
    pub metric: Option<UsageMetric>,
    pub period: Option<String>,
    pub threshold: Option<i32>,
    pub message: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Threshold alert to insert at most once per `(company, metric, period, threshold)`.
#[derive(Debug, Clone)]
pub struct NewThresholdNotification {
    pub company_id: Uuid,
    pub metric: UsageMetric,
    pub period: UsagePeriod,
    pub threshold: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UsageCounter {
    pub company_id: Uuid,
    pub metric: UsageMetric,
    #[schema(value_type = String, example = "2026-10")]
    pub period: UsagePeriod,
    pub count: i64,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// DASHBOARD
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DashboardSummary {
    /// Lead counts keyed by status; every status is present.
    pub leads_by_status: BTreeMap<String, i64>,
    pub total_leads: i64,
    pub average_score: f64,
    pub hot_leads: i64,
    pub replies_last_30_days: i64,
    pub bookings_last_30_days: i64,
    pub upcoming_bookings: Vec<Booking>,
    pub quota: Vec<QuotaStatus>,
    pub unread_notifications: i64,
}
