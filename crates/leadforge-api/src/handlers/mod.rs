//! HTTP handlers, one module per resource.

pub mod audit;
pub mod auth;
pub mod campaigns;
pub mod company;
pub mod dashboard;
pub mod engagement;
pub mod hooks;
pub mod leads;
pub mod notifications;
pub mod personas;
pub mod system;
pub mod usage;
pub mod users;
pub mod workflows;
