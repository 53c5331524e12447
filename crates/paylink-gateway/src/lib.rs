//! HTTP gateway for Paylink: checkout links, SMS delivery, payment webhooks
//! and short-link redirects.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod model;
pub mod state;
pub mod telemetry;

pub use app::App;
pub use config::{Cli, LogFormat, Settings, StoreSettings};
pub use state::{AppState, Webhooks};
