//! Lead scoring.
//!
//! Scores are derived, never user-entered: they are recomputed whenever a
//! lead's profile, status, or reply count changes.

use serde::{Deserialize, Serialize};

use crate::lifecycle::LeadStatus;

/// Upper bound of a lead score.
pub const MAX_SCORE: i32 = 100;

/// Points per completed profile field.
pub const PROFILE_FIELD_POINTS: i32 = 4;

/// Points per reply received.
pub const REPLY_POINTS: i32 = 5;

/// Cap on engagement points from replies.
pub const REPLY_POINTS_CAP: i32 = 15;

/// Minimum score for a hot lead.
pub const HOT_THRESHOLD: i32 = 70;

/// Minimum score for a warm lead.
pub const WARM_THRESHOLD: i32 = 40;

/// Inputs to the scoring function.
#[derive(Debug, Clone, Default)]
pub struct ScoreInput<'a> {
    pub status: LeadStatus,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub title: Option<&'a str>,
    pub organization: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub linkedin_url: Option<&'a str>,
    pub reply_count: i64,
}

/// Temperature bucket of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LeadGrade {
    Hot,
    Warm,
    Cold,
}

impl LeadGrade {
    pub fn from_score(score: i32) -> Self {
        if score >= HOT_THRESHOLD {
            LeadGrade::Hot
        } else if score >= WARM_THRESHOLD {
            LeadGrade::Warm
        } else {
            LeadGrade::Cold
        }
    }
}

fn status_base(status: LeadStatus) -> i32 {
    match status {
        LeadStatus::New => 0,
        LeadStatus::Contacted => 10,
        LeadStatus::Replied => 30,
        LeadStatus::Interested => 50,
        LeadStatus::MeetingBooked => 75,
        LeadStatus::Won => 100,
        LeadStatus::Lost | LeadStatus::Unsubscribed => 0,
    }
}

fn present(field: Option<&str>) -> bool {
    field.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Compute a lead score in `0..=MAX_SCORE`.
pub fn compute_score(input: &ScoreInput<'_>) -> i32 {
    if matches!(input.status, LeadStatus::Lost | LeadStatus::Unsubscribed) {
        return 0;
    }

    let profile_fields = [
        present(input.phone),
        present(input.title),
        present(input.organization),
        present(input.linkedin_url),
        present(input.first_name) && present(input.last_name),
    ];
    let profile = profile_fields.iter().filter(|p| **p).count() as i32 * PROFILE_FIELD_POINTS;

    let replies = input.reply_count.clamp(0, i64::from(REPLY_POINTS_CAP)) as i32;
    let engagement = (replies * REPLY_POINTS).min(REPLY_POINTS_CAP);

    (status_base(input.status) + profile + engagement).clamp(0, MAX_SCORE)
}
