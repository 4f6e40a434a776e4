//! # leadforge-core
//!
//! Core types, rules, and abstractions for leadforge.
//!
//! This crate holds the domain model shared by every other crate: the lead
//! lifecycle state machine, lead scoring, usage periods and plan quotas,
//! domain events, and the repository traits the services are written against.

pub mod defaults;
pub mod engagement;
pub mod error;
pub mod events;
pub mod ids;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod scoring;
pub mod traits;
pub mod usage;

// Re-export commonly used types at crate root
pub use engagement::{classify_reply, ReplyClassification};
pub use error::{Error, Result};
pub use events::{DomainEvent, EventActor, EventBus, EventEnvelope, SUBSCRIBABLE_EVENTS};
pub use ids::{extract_timestamp, is_v7, new_v7};
pub use lifecycle::{plan_transition, LeadStatus, Transition};
pub use models::*;
pub use scoring::{compute_score, LeadGrade, ScoreInput};
pub use traits::*;
pub use usage::{
    check_quota, crossed_thresholds, threshold_message, Increment, Plan, QuotaStatus, UsageMetric,
    UsagePeriod, ALERT_THRESHOLDS,
};
