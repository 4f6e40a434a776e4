//! Service layer for business logic.

pub mod auth_service;
pub mod callback_service;
pub mod campaign_service;
pub mod lead_service;
pub mod metering;
pub mod telemetry;
pub mod workflow_relay;

pub use auth_service::AuthService;
pub use callback_service::CallbackService;
pub use campaign_service::CampaignService;
pub use lead_service::LeadService;
pub use metering::{Metered, Metering};
pub use telemetry::telemetry_mirror;
pub use workflow_relay::{run_workflow_dispatcher, WorkflowRelay};
