//! # leadforge-db
//!
//! PostgreSQL database layer for leadforge.
//!
//! This crate provides:
//! - Connection pool management
//! - Tenant-scoped repositories for every domain entity
//! - Atomic usage counters with quota enforcement
//! - Embedded migrations (feature `migrations`)
//!
//! Every repository method that reads or writes tenant data takes the
//! `company_id` as its first argument and filters on it; a row belonging
//! to another company behaves exactly like a missing row.
//!
//! ## Example
//!
//! ```rust,ignore
//! use leadforge_db::{Database, CreateLeadRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/leadforge").await?;
//!     let lead = db.leads.insert(company_id, CreateLeadRequest {
//!         email: "ada@example.com".into(),
//!         ..Default::default()
//!     }, 0).await?;
//!     println!("Created lead: {}", lead.id);
//!     Ok(())
//! }
//! ```

use std::str::FromStr;

use sqlx::postgres::PgRow;
use sqlx::Row;

pub mod audit;
pub mod campaigns;
pub mod companies;
pub mod engagement;
pub mod leads;
pub mod notifications;
pub mod personas;
pub mod pool;
pub mod sessions;
pub mod usage;
pub mod users;
pub mod workflows;

// Always compiled so integration tests (in tests/) can use the helpers.
pub mod test_fixtures;

// Re-export core types
pub use leadforge_core::*;

pub use audit::PgAuditRepository;
pub use campaigns::PgCampaignRepository;
pub use companies::PgCompanyRepository;
pub use engagement::{BookingFilter, PgEngagementRepository, ReplyFilter};
pub use leads::{PgLeadRepository, StatusWrite};
pub use notifications::PgNotificationRepository;
pub use personas::PgPersonaRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use sessions::PgSessionRepository;
pub use usage::PgUsageRepository;
pub use users::{NewUser, PgUserRepository, UserCredentials};
pub use workflows::{PgWorkflowRepository, RunCompletion};

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Read a TEXT column holding an enum's `as_str` form.
///
/// A value outside the enum means the row was written by something other
/// than this crate, so it surfaces as an internal error, not bad input.
pub(crate) fn text_enum<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: FromStr<Err = Error>,
{
    let raw: String = row.get(column);
    raw.parse()
        .map_err(|e: Error| Error::Internal(format!("corrupt {column} value: {e}")))
}

/// Optional variant of [`text_enum`].
pub(crate) fn text_enum_opt<T>(row: &PgRow, column: &str) -> Result<Option<T>>
where
    T: FromStr<Err = Error>,
{
    let raw: Option<String> = row.get(column);
    raw.map(|v| {
        v.parse()
            .map_err(|e: Error| Error::Internal(format!("corrupt {column} value: {e}")))
    })
    .transpose()
}

/// Map a unique-constraint violation to `Conflict`, passing other errors through.
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: impl Into<String>) -> Error {
    let err = Error::Database(e);
    if err.is_unique_violation() {
        Error::Conflict(message.into())
    } else {
        err
    }
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub companies: PgCompanyRepository,
    pub users: PgUserRepository,
    pub sessions: PgSessionRepository,
    pub leads: PgLeadRepository,
    pub personas: PgPersonaRepository,
    pub campaigns: PgCampaignRepository,
    pub engagement: PgEngagementRepository,
    /// Usage counters; also the Postgres [`UsageStore`].
    pub usage: PgUsageRepository,
    pub notifications: PgNotificationRepository,
    pub workflows: PgWorkflowRepository,
    pub audit: PgAuditRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            companies: PgCompanyRepository::new(pool.clone()),
            users: PgUserRepository::new(pool.clone()),
            sessions: PgSessionRepository::new(pool.clone()),
            leads: PgLeadRepository::new(pool.clone()),
            personas: PgPersonaRepository::new(pool.clone()),
            campaigns: PgCampaignRepository::new(pool.clone()),
            engagement: PgEngagementRepository::new(pool.clone()),
            usage: PgUsageRepository::new(pool.clone()),
            notifications: PgNotificationRepository::new(pool.clone()),
            workflows: PgWorkflowRepository::new(pool.clone()),
            audit: PgAuditRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Round-trip a trivial query; backs the readiness probe.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
