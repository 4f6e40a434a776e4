//! Lead lifecycle state machine.
//!
//! A lead moves through outreach stages driven by user actions and by
//! workflow callbacks (emails sent, replies, bookings). Transitions are
//! validated here so that every write path (HTTP handlers, relay callbacks,
//! booking updates) enforces the same graph:
//!
//! ```text
//! New           -> Contacted | Lost | Unsubscribed
//! Contacted     -> Replied | MeetingBooked | Lost | Unsubscribed
//! Replied       -> Interested | MeetingBooked | Lost | Unsubscribed
//! Interested    -> MeetingBooked | Won | Lost | Unsubscribed
//! MeetingBooked -> Interested | Won | Lost | Unsubscribed
//! Lost          -> New
//! Won, Unsubscribed: terminal
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Outreach stage of a lead.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Replied,
    Interested,
    MeetingBooked,
    Won,
    Lost,
    Unsubscribed,
}

impl LeadStatus {
    /// All statuses in pipeline order.
    pub const ALL: [LeadStatus; 8] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Replied,
        LeadStatus::Interested,
        LeadStatus::MeetingBooked,
        LeadStatus::Won,
        LeadStatus::Lost,
        LeadStatus::Unsubscribed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Replied => "replied",
            LeadStatus::Interested => "interested",
            LeadStatus::MeetingBooked => "meeting_booked",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
            LeadStatus::Unsubscribed => "unsubscribed",
        }
    }

    /// Statuses reachable from `self` in one step.
    pub fn allowed_next(&self) -> &'static [LeadStatus] {
        use LeadStatus::*;
        match self {
            New => &[Contacted, Lost, Unsubscribed],
            Contacted => &[Replied, MeetingBooked, Lost, Unsubscribed],
            Replied => &[Interested, MeetingBooked, Lost, Unsubscribed],
            Interested => &[MeetingBooked, Won, Lost, Unsubscribed],
            MeetingBooked => &[Interested, Won, Lost, Unsubscribed],
            Lost => &[New],
            Won | Unsubscribed => &[],
        }
    }

    pub fn can_transition_to(&self, next: LeadStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Whether a lead in this status may be enrolled into a campaign.
    pub fn is_enrollable(&self) -> bool {
        !matches!(
            self,
            LeadStatus::Won | LeadStatus::Lost | LeadStatus::Unsubscribed
        )
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "new" => Ok(LeadStatus::New),
            "contacted" => Ok(LeadStatus::Contacted),
            "replied" => Ok(LeadStatus::Replied),
            "interested" => Ok(LeadStatus::Interested),
            "meeting_booked" => Ok(LeadStatus::MeetingBooked),
            "won" => Ok(LeadStatus::Won),
            "lost" => Ok(LeadStatus::Lost),
            "unsubscribed" => Ok(LeadStatus::Unsubscribed),
            other => Err(Error::InvalidInput(format!("unknown lead status: {other}"))),
        }
    }
}

/// Outcome of planning a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Target equals the current status; nothing to write.
    Unchanged,
    /// Valid move from one status to another.
    Move { from: LeadStatus, to: LeadStatus },
}

/// Validate a requested status change.
pub fn plan_transition(from: LeadStatus, to: LeadStatus) -> Result<Transition> {
    if from == to {
        return Ok(Transition::Unchanged);
    }
    if from.can_transition_to(to) {
        Ok(Transition::Move { from, to })
    } else {
        Err(Error::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_through_pipeline() {
        let path = [
            LeadStatus::New,
            LeadStatus::Contacted,
            LeadStatus::Replied,
            LeadStatus::Interested,
            LeadStatus::MeetingBooked,
            LeadStatus::Won,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(LeadStatus::Won.allowed_next().is_empty());
        assert!(LeadStatus::Unsubscribed.allowed_next().is_empty());
        assert!(!LeadStatus::Lost.allowed_next().is_empty());
        for to in LeadStatus::ALL {
            assert!(!LeadStatus::Won.can_transition_to(to));
            assert!(!LeadStatus::Unsubscribed.can_transition_to(to));
        }
    }

    #[test]
    fn test_lost_can_only_reopen() {
        assert_eq!(LeadStatus::Lost.allowed_next(), &[LeadStatus::New]);
    }

    #[test]
    fn test_cannot_skip_straight_to_won() {
        let err = plan_transition(LeadStatus::New, LeadStatus::Won).unwrap_err();
        match err {
            Error::InvalidTransition { from, to } => {
                assert_eq!(from, LeadStatus::New);
                assert_eq!(to, LeadStatus::Won);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[test]
    fn test_same_status_is_unchanged() {
        for status in LeadStatus::ALL {
            assert_eq!(
                plan_transition(status, status).unwrap(),
                Transition::Unchanged
            );
        }
    }

    #[test]
    fn test_every_open_status_can_unsubscribe_and_be_lost() {
        for status in LeadStatus::ALL.iter().filter(|s| s.is_enrollable()) {
            assert!(status.can_transition_to(LeadStatus::Unsubscribed));
            assert!(status.can_transition_to(LeadStatus::Lost));
        }
    }

    #[test]
    fn test_no_show_returns_booking_to_interested() {
        assert!(LeadStatus::MeetingBooked.can_transition_to(LeadStatus::Interested));
    }

    #[test]
    fn test_enrollable() {
        assert!(LeadStatus::New.is_enrollable());
        assert!(LeadStatus::Replied.is_enrollable());
        assert!(!LeadStatus::Unsubscribed.is_enrollable());
        assert!(!LeadStatus::Won.is_enrollable());
        assert!(!LeadStatus::Lost.is_enrollable());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in LeadStatus::ALL {
            assert_eq!(status.as_str().parse::<LeadStatus>().unwrap(), status);
        }
        assert!("archived".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn test_serde_matches_db_representation() {
        let json = serde_json::to_string(&LeadStatus::MeetingBooked).unwrap();
        assert_eq!(json, "\"meeting_booked\"");
    }
}
