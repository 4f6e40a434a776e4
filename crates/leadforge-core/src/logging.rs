//! Structured logging schema and field name constants for leadforge.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the `x-request-id` header.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "relay", "auth", "metering"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "dispatcher", "callback", "telemetry"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "consume", "trigger", "refresh", "transition"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Tenant the operation runs for.
pub const COMPANY_ID: &str = "company_id";

/// Authenticated user.
pub const USER_ID: &str = "user_id";

/// Lead being operated on.
pub const LEAD_ID: &str = "lead_id";

/// Campaign being operated on.
pub const CAMPAIGN_ID: &str = "campaign_id";

/// Workflow being triggered.
pub const WORKFLOW_ID: &str = "workflow_id";

/// Workflow run.
pub const RUN_ID: &str = "run_id";

/// Domain event type, e.g. "lead.created".
pub const EVENT_TYPE: &str = "event_type";

// ─── Usage fields ──────────────────────────────────────────────────────────

/// Usage metric name.
pub const METRIC: &str = "metric";

/// Usage period (`YYYY-MM`).
pub const PERIOD: &str = "period";

/// Alert threshold percentage.
pub const THRESHOLD: &str = "threshold";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned or affected.
pub const RESULT_COUNT: &str = "result_count";

/// HTTP status returned by a remote endpoint.
pub const HTTP_STATUS: &str = "http_status";

// ─── Database fields ───────────────────────────────────────────────────────

/// Configured pool size.
pub const POOL_SIZE: &str = "pool_size";

/// Database table or entity affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Log target for the domain event telemetry mirror.
pub const EVENTS_TARGET: &str = "leadforge::events";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_match_span_fields() {
        // Call sites write these as bare identifiers in tracing macros.
        assert_eq!(SUBSYSTEM, "subsystem");
        assert_eq!(COMPONENT, "component");
        assert_eq!(OPERATION, "op");
        assert_eq!(ERROR_MSG, "error");
    }

    #[test]
    fn test_events_target_is_namespaced() {
        assert!(EVENTS_TARGET.starts_with("leadforge::"));
    }
}
