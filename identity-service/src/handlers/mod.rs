//! HTTP handlers for identity-service.

pub mod accounts;
pub mod actions;
pub mod health;
pub mod metrics;
pub mod search;

pub use accounts::get_account;
pub use actions::perform_action;
pub use health::{health_check, readiness_check};
pub use metrics::metrics_endpoint;
pub use search::search;
