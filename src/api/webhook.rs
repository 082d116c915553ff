//! Webhook handler for host repository events
//!
//! The host delivers push and pull request events as JSON with an
//! `X-Event-Key` header naming the event family. The handler parses the
//! payload into the boundary event types, optionally verifies the
//! delivery signature and hands the event to the matching listener.
//! It returns as soon as the background work is submitted.

use axum::{
    body::Bytes,
    extract::State as AxumState,
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::SharedState;
use crate::events::{
    PullRequest, PullRequestEvent, PullRequestEventKind, RefChange, Repository,
    RepositoryRefsChangedEvent, User,
};
use crate::utils::verify_webhook_signature;

const REFS_CHANGED_KEY: &str = "repo:refs_changed";

#[derive(Debug, Deserialize)]
struct RepositoryProbe {
    repository: Repository,
}

#[derive(Debug, Deserialize)]
struct RefsChangedPayload {
    repository: Repository,
    #[serde(default)]
    actor: Option<User>,
    #[serde(default)]
    changes: Vec<RefChange>,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    repository: Repository,
    #[serde(default)]
    actor: Option<User>,
    pull_request: PullRequest,
}

/// Handles the host webhook POST request.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let event_key = headers.get("X-Event-Key").and_then(|v| v.to_str().ok());
    let Some(event_key) = event_key else {
        info!("No X-Event-Key header, ignoring delivery");
        return StatusCode::NO_CONTENT;
    };

    // Identify the repository first so the signature policy can be
    // looked up before the full payload is trusted.
    let probe: RepositoryProbe = match serde_json::from_slice(&body) {
        Ok(probe) => probe,
        Err(e) => {
            info!("Could not parse JSON body: {:?}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    let repo_config = {
        let config = state.config.read().unwrap();
        config.find_repository(&probe.repository).cloned()
    };

    // Per-repository webhook signature validation if required
    if let Some(repo_config) = &repo_config {
        if repo_config.needs_webhook_secret() {
            let signature_opt = headers
                .get("X-Hub-Signature-256")
                .and_then(|v| v.to_str().ok());
            let Some(signature) = signature_opt else {
                error!(
                    "Repository '{}' requires a webhook secret, but no signature header was supplied.",
                    probe.repository.full_name()
                );
                return StatusCode::UNAUTHORIZED;
            };
            if !repo_config.has_valid_secret() {
                error!(
                    "Repository '{}' requires a webhook secret, but none was configured.",
                    probe.repository.full_name()
                );
                return StatusCode::INTERNAL_SERVER_ERROR;
            }
            let secret = repo_config.webhook_secret.as_ref().unwrap();
            if !verify_webhook_signature(secret, &body, signature) {
                error!(
                    "Signature verification failed for repository '{}'!",
                    probe.repository.full_name()
                );
                return StatusCode::UNAUTHORIZED;
            }
        }
    }

    if event_key == REFS_CHANGED_KEY {
        let payload: RefsChangedPayload = match serde_json::from_slice(&body) {
            Ok(payload) => payload,
            Err(e) => {
                info!("Could not parse push payload: {:?}", e);
                return StatusCode::BAD_REQUEST;
            }
        };
        let event = RepositoryRefsChangedEvent {
            repository: payload.repository,
            user: payload.actor,
            changes: payload.changes,
        };
        info!(
            "Push event for '{}' with {} ref change(s)",
            event.repository.full_name(),
            event.changes.len()
        );
        let submitted = state.refs_listener.on_refs_changed(&event);
        debug!("Submitted {} notification task(s)", submitted.len());
        StatusCode::OK
    } else if let Some(kind) = PullRequestEventKind::from_event_key(event_key) {
        let payload: PullRequestPayload = match serde_json::from_slice(&body) {
            Ok(payload) => payload,
            Err(e) => {
                info!("Could not parse pull request payload: {:?}", e);
                return StatusCode::BAD_REQUEST;
            }
        };
        let event = PullRequestEvent {
            repository: payload.repository,
            user: payload.actor,
            kind,
            pull_request: payload.pull_request,
        };
        info!(
            "Pull request event '{}' for '{}'",
            event_key,
            event.repository.full_name()
        );
        let _ = state.pull_request_listener.on_pull_request_event(&event);
        StatusCode::OK
    } else {
        info!("Unhandled event key '{}', ignoring.", event_key);
        StatusCode::NO_CONTENT
    }
}
