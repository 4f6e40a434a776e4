//! Centralized default constants for leadforge.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for list endpoints.
pub const PAGE_LIMIT: i64 = 50;

/// Largest page size a client may request.
pub const PAGE_LIMIT_MAX: i64 = 200;

/// Default page offset.
pub const PAGE_OFFSET: i64 = 0;

/// Maximum leads accepted by one bulk import request.
pub const BULK_IMPORT_MAX: usize = 500;

/// Default number of months returned by usage history.
pub const USAGE_HISTORY_MONTHS: u32 = 6;

/// Upper bound on usage history months.
pub const USAGE_HISTORY_MONTHS_MAX: u32 = 24;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP bind host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default rate limit: max requests per period.
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Default rate limit: period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Event bus broadcast capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// CORS preflight cache duration.
pub const CORS_MAX_AGE_SECS: u64 = 3600;

/// Maximum accepted request body (bulk imports are the largest payloads).
pub const MAX_BODY_SIZE_BYTES: usize = 4 * 1024 * 1024;

// =============================================================================
// AUTH
// =============================================================================

/// Access token lifetime.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 900;

/// Refresh session lifetime.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// Expired sessions older than this are deleted at startup.
pub const SESSION_PURGE_AFTER_DAYS: i64 = 7;

/// Clock skew tolerated when validating access tokens.
pub const JWT_LEEWAY_SECS: u64 = 30;

/// Default JWT issuer claim.
pub const JWT_ISSUER: &str = "leadforge";

/// Minimum HMAC secret length for JWT signing.
pub const JWT_SECRET_MIN_BYTES: usize = 32;

/// Minimum password length accepted at registration.
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Prefix of opaque refresh tokens.
pub const REFRESH_TOKEN_PREFIX: &str = "lf_rt_";

// =============================================================================
// RELAY
// =============================================================================

/// Timeout for outbound workflow webhook calls.
pub const RELAY_TIMEOUT_SECS: u64 = 10;

/// Consecutive delivery failures after which a workflow is disabled.
pub const WORKFLOW_MAX_FAILURES: i32 = 10;

/// Largest response body stored on a workflow run.
pub const RUN_RESULT_MAX_BYTES: usize = 64 * 1024;

// =============================================================================
// DASHBOARD
// =============================================================================

/// Look-back window for reply and booking counts.
pub const DASHBOARD_WINDOW_DAYS: i64 = 30;

/// Upcoming bookings shown on the dashboard.
pub const DASHBOARD_UPCOMING_LIMIT: i64 = 5;
