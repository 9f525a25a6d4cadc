//! guidepath library
//!
//! Engine wiring, configuration, the backend client and the typed service
//! channel. Exposed for the binary and for integration tests.

pub mod app_context;
pub mod backend;
pub mod config;
pub mod service;

pub use app_context::AppContext;
pub use backend::{BackendClient, ElementHint};
pub use config::AppConfig;
pub use service::{GuideHandle, GuideReply, GuideRequest, GuideService};
