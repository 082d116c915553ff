//! Diagnostic endpoint
//!
//! Lets an administrator exercise candidate hook settings before saving
//! them. The call runs the same notifier the event path uses, but with
//! settings taken from query parameters instead of the stored
//! configuration.

use axum::{
    extract::{Query, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::SharedState;
use crate::events::Repository;
use crate::notifier::TriggerSettings;

#[derive(Debug, Deserialize)]
pub struct TestParams {
    #[serde(rename = "jenkinsBase")]
    jenkins_base: Option<String>,
    #[serde(rename = "cloneUrl")]
    clone_url: Option<String>,
    #[serde(rename = "cloneType")]
    clone_type: Option<String>,
    #[serde(rename = "ignoreCerts")]
    ignore_certs: Option<bool>,
    #[serde(rename = "omitBranch")]
    omit_branch: Option<bool>,
    #[serde(rename = "omitHash")]
    omit_hash: Option<bool>,
    branch: Option<String>,
    hash: Option<String>,
    project: Option<String>,
    slug: Option<String>,
}

/// GET /api/test - Trigger a test notification with the given settings.
/// Responds with an empty body on success and "FAIL" plus the diagnostic
/// message otherwise.
pub async fn test_configuration(
    AxumState(state): AxumState<SharedState>,
    Query(params): Query<TestParams>,
) -> Response {
    let Some(jenkins_base) = params.jenkins_base.filter(|s| !s.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            "The jenkinsBase parameter is required",
        )
            .into_response();
    };
    let Some(clone_url) = params.clone_url.filter(|s| !s.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            "The cloneUrl parameter is required",
        )
            .into_response();
    };

    let repository = Repository::new(
        params.project.unwrap_or_else(|| "TEST".to_string()),
        params.slug.unwrap_or_else(|| "test".to_string()),
    );
    let trigger = TriggerSettings {
        jenkins_base,
        ignore_certs: params.ignore_certs.unwrap_or(false),
        clone_type: params.clone_type,
        clone_url: Some(clone_url),
        omit_branch: params.omit_branch.unwrap_or(false),
        omit_hash: params.omit_hash.unwrap_or(false),
    };

    info!(
        "Test notification requested for '{}'",
        repository.full_name()
    );
    let result = state
        .notifier
        .notify_with(
            &repository,
            &trigger,
            params.branch.as_deref(),
            params.hash.as_deref(),
        )
        .await;

    if result.successful() {
        StatusCode::OK.into_response()
    } else if result.message().is_empty() {
        (StatusCode::OK, "FAIL").into_response()
    } else {
        (StatusCode::OK, format!("FAIL\n{}", result.message())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::NotifyConfig;
    use crate::api::test_support::{serve_app, spawn_remote};

    async fn call_test(
        base: &str,
        query: &[(&str, &str)],
    ) -> (reqwest::StatusCode, String) {
        let response = reqwest::Client::new()
            .get(format!("{}/api/test", base))
            .query(query)
            .send()
            .await
            .unwrap();
        let status = response.status();
        let body = response.text().await.unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn missing_jenkins_base_is_a_bad_request() {
        let (base, _state) = serve_app(NotifyConfig::default()).await;
        let (status, body) = call_test(&base, &[("cloneUrl", "git@x:repo.git")]).await;
        assert_eq!(status, 400);
        assert!(body.contains("jenkinsBase"));
    }

    #[tokio::test]
    async fn missing_clone_url_is_a_bad_request() {
        let (base, _state) = serve_app(NotifyConfig::default()).await;
        let (status, body) =
            call_test(&base, &[("jenkinsBase", "http://jenkins.localhost")]).await;
        assert_eq!(status, 400);
        assert!(body.contains("cloneUrl"));
    }

    #[tokio::test]
    async fn scheduled_response_is_a_bare_success() {
        let jenkins = spawn_remote("/git/notifyCommit", "Scheduled polling of repo").await;
        let (base, _state) = serve_app(NotifyConfig::default()).await;

        let (status, body) = call_test(
            &base,
            &[
                ("jenkinsBase", jenkins.as_str()),
                ("cloneUrl", "git@x:repo.git"),
                ("branch", "master"),
                ("hash", "abc123"),
            ],
        )
        .await;
        assert_eq!(status, 200);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn unexpected_response_reports_fail_with_body() {
        let jenkins = spawn_remote("/git/notifyCommit", "Something unexpected").await;
        let (base, _state) = serve_app(NotifyConfig::default()).await;

        let (status, body) = call_test(
            &base,
            &[
                ("jenkinsBase", jenkins.as_str()),
                ("cloneUrl", "git@x:repo.git"),
            ],
        )
        .await;
        assert_eq!(status, 200);
        assert!(body.starts_with("FAIL"));
        assert!(body.contains("Something unexpected"));
    }

    #[tokio::test]
    async fn bogus_clone_type_reports_fail() {
        let (base, state) = serve_app(NotifyConfig::default()).await;

        let (status, body) = call_test(
            &base,
            &[
                ("jenkinsBase", "http://jenkins.localhost"),
                ("cloneUrl", "git@x:repo.git"),
                ("cloneType", "bogus"),
            ],
        )
        .await;
        assert_eq!(status, 200);
        assert!(body.starts_with("FAIL"));

        // Declined before dispatch: the recorded attempt has no URL.
        let recent = state.history.recent(1);
        assert_eq!(recent[0].url, None);
    }
}
