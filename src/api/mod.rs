//! API module for all HTTP handlers
//!
//! Contains the webhook ingestion endpoint plus the REST endpoints an
//! administrator uses to test and inspect the hook configuration.

pub mod config;
pub mod status;
pub mod test;
pub mod webhook;

// Re-export handlers
pub use config::{get_clone_urls, get_config, reload_config_endpoint};
pub use status::status;
pub use test::test_configuration;
pub use webhook::handle_webhook;

use axum::{Router, routing};

use crate::SharedState;

pub async fn root() -> &'static str {
    "jenkins_notify"
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(root))
        .route("/webhook", routing::post(handle_webhook))
        .route("/api/test", routing::get(test_configuration))
        .route(
            "/api/clone-urls/{project}/{slug}",
            routing::get(get_clone_urls),
        )
        .route("/api/config", routing::get(get_config))
        .route("/api/reload", routing::post(reload_config_endpoint))
        .route("/api/status", routing::get(status))
        .with_state(state)
}
