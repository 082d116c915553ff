//! Config API endpoints

use axum::{
    Json,
    extract::{Path as AxumPath, State as AxumState},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;
use tokio::fs;
use tracing::{error, info};

use crate::events::Repository;
use crate::{SharedState, reload_config};

/// Response for config content
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub config_toml: String,
    pub path: String,
}

/// GET /api/config - Get current configuration file content
pub async fn get_config(AxumState(state): AxumState<SharedState>) -> impl IntoResponse {
    let path = &state.config_path;

    match fs::read_to_string(path).await {
        Ok(content) => Json(ConfigResponse {
            config_toml: content,
            path: path.to_string_lossy().into_owned(),
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": format!("Failed to read config file: {}", e)
            })),
        )
            .into_response(),
    }
}

/// POST /api/reload - Reload configuration from disk
/// The new configuration is validated before it replaces the old one.
pub async fn reload_config_endpoint(AxumState(state): AxumState<SharedState>) -> impl IntoResponse {
    match reload_config(&state.config_path).await {
        Ok(new_config) => {
            let mut config = state.config.write().unwrap();
            *config = new_config;
            info!(
                "Configuration reloaded successfully from {:?}",
                state.config_path
            );
            Json(json!({
                "status": "success",
                "message": "Configuration reloaded successfully"
            }))
            .into_response()
        }
        Err(e) => {
            error!("Failed to reload config: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": e.to_string()
                })),
            )
                .into_response()
        }
    }
}

/// GET /api/clone-urls/{project}/{slug} - The clone URLs a repository
/// would be advertised under for clone types `http` and `ssh`.
pub async fn get_clone_urls(
    AxumState(state): AxumState<SharedState>,
    AxumPath((project, slug)): AxumPath<(String, String)>,
) -> impl IntoResponse {
    let repository = Repository::new(project, slug);

    let http = state.clone_urls.http_clone_url(&repository);
    let ssh = state.clone_urls.ssh_clone_url(&repository);
    match (http, ssh) {
        (Ok(http), Ok(ssh)) => Json(json!({ "http": http, "ssh": ssh })).into_response(),
        (Err(e), _) | (_, Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
