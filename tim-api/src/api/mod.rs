//! HTTP API handlers

pub mod health;
pub mod modules;
pub mod policy;
pub mod series;

pub use health::health_routes;
pub use modules::{get_module, list_modules};
pub use policy::recent_policy_events;
pub use series::get_series;
