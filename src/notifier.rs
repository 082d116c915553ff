//! Service object that does the actual notification.
//!
//! The notifier is the error boundary for dispatch: every outcome,
//! including configuration declines, URL construction failures and
//! transport errors, is turned into a [`NotificationResult`]. Nothing
//! above it ever sees a propagated error from a trigger attempt.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::clone_url::CloneUrlResolver;
use crate::dispatch::NotificationDispatcher;
use crate::error::NotifyError;
use crate::events::{PullRequestEvent, Repository};
use crate::history::{NotificationHistory, TriggerKind};
use crate::http::HttpClientFactory;
use crate::settings::{
    CLONE_TYPE, CLONE_URL, IGNORE_CERTS, JENKINS_BASE, NOTIFY_PULL_REQUESTS, OMIT_BRANCH,
    OMIT_HASH, PULL_REQUESTS_NOTIFICATION_URL, SettingsService,
};

/// Response body prefix Jenkins answers with when a commit notification
/// actually scheduled a poll.
const SCHEDULED_PREFIX: &str = "Scheduled";

/// Immutable outcome of one dispatch attempt.
///
/// `url` is absent when the attempt was declined by configuration or URL
/// construction failed, so diagnostic callers can tell "declined before
/// dispatch" from "dispatch attempted and failed".
#[derive(Debug, Clone, serde::Serialize)]
pub struct NotificationResult {
    successful: bool,
    url: Option<String>,
    message: String,
}

impl NotificationResult {
    pub fn success(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            successful: true,
            url: Some(url.into()),
            message: message.into(),
        }
    }

    pub fn failure(url: Option<String>, message: impl Into<String>) -> Self {
        Self {
            successful: false,
            url,
            message: message.into(),
        }
    }

    pub fn successful(&self) -> bool {
        self.successful
    }

    /// The exact URL that was (attempted to be) invoked.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// How the advertised clone URL is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneType {
    Http,
    Ssh,
    Custom,
}

impl CloneType {
    /// Parses the stored selector. Hooks configured before the selector
    /// existed have no value at all; those behave as `custom`. Anything
    /// unrecognized is a fatal configuration error, never a silent
    /// fallback.
    pub fn parse(value: Option<&str>) -> Result<Self, NotifyError> {
        match value {
            None => Ok(CloneType::Custom),
            Some("custom") => Ok(CloneType::Custom),
            Some("http") => Ok(CloneType::Http),
            Some("ssh") => Ok(CloneType::Ssh),
            Some(other) => Err(NotifyError::UnknownCloneType(other.to_string())),
        }
    }
}

/// Settings snapshot for one ref-change trigger call. The stored-config
/// path fills this from the repository's hook settings; the diagnostic
/// endpoint fills it from query parameters so an administrator can test
/// candidate settings before saving them.
#[derive(Debug, Clone, Default)]
pub struct TriggerSettings {
    pub jenkins_base: String,
    pub ignore_certs: bool,
    pub clone_type: Option<String>,
    pub clone_url: Option<String>,
    pub omit_branch: bool,
    pub omit_hash: bool,
}

#[derive(Debug, Clone, Copy)]
enum ResponseCheck {
    /// Ref-change path: the body must start with "Scheduled".
    ScheduledPrefix,
    /// Pull request path: any readable response counts as success.
    AnyResponse,
}

#[derive(Clone)]
pub struct Notifier {
    settings: Arc<dyn SettingsService>,
    clone_urls: Arc<dyn CloneUrlResolver>,
    clients: Arc<dyn HttpClientFactory>,
    dispatcher: Arc<NotificationDispatcher>,
    history: Arc<NotificationHistory>,
}

impl Notifier {
    pub fn new(
        settings: Arc<dyn SettingsService>,
        clone_urls: Arc<dyn CloneUrlResolver>,
        clients: Arc<dyn HttpClientFactory>,
        dispatcher: Arc<NotificationDispatcher>,
        history: Arc<NotificationHistory>,
    ) -> Self {
        Self {
            settings,
            clone_urls,
            clients,
            dispatcher,
            history,
        }
    }

    /// Sends a commit notification using the repository's stored hook
    /// configuration.
    pub async fn notify(&self, repository: &Repository, branch: &str, hash: &str) -> NotificationResult {
        let result = match self.stored_trigger_settings(repository) {
            Ok(trigger) => {
                self.run_trigger(repository, &trigger, Some(branch), Some(hash))
                    .await
            }
            Err(message) => {
                debug!(
                    "Not notifying for '{}': {}",
                    repository.full_name(),
                    message
                );
                NotificationResult::failure(None, message)
            }
        };
        self.history
            .record(repository, TriggerKind::RefChange, &result);
        result
    }

    /// Background form of [`notify`](Self::notify). Submits the work to
    /// the shared dispatcher and returns without blocking.
    pub fn notify_background(
        &self,
        repository: &Repository,
        branch: &str,
        hash: &str,
    ) -> JoinHandle<NotificationResult> {
        let notifier = self.clone();
        let repository = repository.clone();
        let branch = branch.to_string();
        let hash = hash.to_string();
        self.dispatcher
            .submit(async move { notifier.notify(&repository, &branch, &hash).await })
    }

    /// Fully-parameterized form used by diagnostics, bypassing stored
    /// configuration.
    pub async fn notify_with(
        &self,
        repository: &Repository,
        trigger: &TriggerSettings,
        branch: Option<&str>,
        hash: Option<&str>,
    ) -> NotificationResult {
        let result = self.run_trigger(repository, trigger, branch, hash).await;
        self.history
            .record(repository, TriggerKind::ConfigTest, &result);
        result
    }

    /// Sends a pull request notification using the repository's stored
    /// hook configuration and notification URL template.
    pub async fn notify_pull_request(&self, event: &PullRequestEvent) -> NotificationResult {
        let result = self.run_pull_request(event).await;
        self.history
            .record(&event.repository, TriggerKind::PullRequest, &result);
        result
    }

    /// Background form of [`notify_pull_request`](Self::notify_pull_request).
    pub fn notify_pull_request_background(
        &self,
        event: PullRequestEvent,
    ) -> JoinHandle<NotificationResult> {
        let notifier = self.clone();
        self.dispatcher
            .submit(async move { notifier.notify_pull_request(&event).await })
    }

    /// Reads the stored hook configuration, or explains why no call will
    /// be made.
    fn stored_trigger_settings(&self, repository: &Repository) -> Result<TriggerSettings, String> {
        let hook = self.settings.get_hook(repository);
        let settings = self.settings.get_settings(repository);
        let (Some(hook), Some(settings)) = (hook, settings) else {
            return Err("hook is not configured correctly or not enabled".to_string());
        };
        if !hook.enabled {
            return Err("hook is not configured correctly or not enabled".to_string());
        }
        let Some(jenkins_base) = settings.get_string(JENKINS_BASE) else {
            return Err("the build server base URL is not configured".to_string());
        };

        Ok(TriggerSettings {
            jenkins_base: jenkins_base.to_string(),
            ignore_certs: settings.get_bool(IGNORE_CERTS, false),
            clone_type: settings.get_string(CLONE_TYPE).map(String::from),
            clone_url: settings.get_string(CLONE_URL).map(String::from),
            omit_branch: settings.get_bool(OMIT_BRANCH, false),
            omit_hash: settings.get_bool(OMIT_HASH, false),
        })
    }

    async fn run_trigger(
        &self,
        repository: &Repository,
        trigger: &TriggerSettings,
        branch: Option<&str>,
        hash: Option<&str>,
    ) -> NotificationResult {
        let url = match self.build_trigger_url(repository, trigger, branch, hash) {
            Ok(url) => url,
            Err(e) => {
                warn!(
                    "Could not build trigger URL for '{}': {}",
                    repository.full_name(),
                    e
                );
                return NotificationResult::failure(None, e.to_string());
            }
        };
        self.dispatch(url, trigger.ignore_certs, ResponseCheck::ScheduledPrefix)
            .await
    }

    async fn run_pull_request(&self, event: &PullRequestEvent) -> NotificationResult {
        let repository = &event.repository;
        let hook = self.settings.get_hook(repository);
        let settings = self.settings.get_settings(repository);
        let (Some(hook), Some(settings)) = (hook, settings) else {
            debug!("Hook not configured correctly or not enabled, returning.");
            return NotificationResult::failure(
                None,
                "hook is not configured correctly or not enabled",
            );
        };
        if !hook.enabled {
            debug!("Hook not configured correctly or not enabled, returning.");
            return NotificationResult::failure(
                None,
                "hook is not configured correctly or not enabled",
            );
        }
        if !settings.get_bool(NOTIFY_PULL_REQUESTS, false) {
            debug!("Pull request notifications not enabled, returning.");
            return NotificationResult::failure(
                None,
                "pull request notifications are not enabled",
            );
        }
        let Some(template) = settings.get_string(PULL_REQUESTS_NOTIFICATION_URL) else {
            return NotificationResult::failure(
                None,
                "the pull request notification URL is not configured",
            );
        };

        let url = expand_pull_request_url(template, event);
        let ignore_certs = settings.get_bool(IGNORE_CERTS, false);
        self.dispatch(url, ignore_certs, ResponseCheck::AnyResponse)
            .await
    }

    /// Builds the commit trigger URL.
    ///
    /// Parameter order is fixed: the encoded clone URL first, then
    /// `branches` unless omitted or absent, then `sha1` unless omitted.
    fn build_trigger_url(
        &self,
        repository: &Repository,
        trigger: &TriggerSettings,
        branch: Option<&str>,
        hash: Option<&str>,
    ) -> Result<String, NotifyError> {
        let base = trigger
            .jenkins_base
            .strip_suffix('/')
            .unwrap_or(&trigger.jenkins_base);

        let clone_url = match CloneType::parse(trigger.clone_type.as_deref())? {
            CloneType::Custom => trigger.clone_url.clone().ok_or_else(|| {
                NotifyError::ConfigError("the repository clone URL is not configured".to_string())
            })?,
            CloneType::Http => self.clone_urls.http_clone_url(repository)?,
            CloneType::Ssh => self.clone_urls.ssh_clone_url(repository)?,
        };

        let mut url = format!(
            "{}/git/notifyCommit?url={}",
            base,
            urlencoding::encode(&clone_url)
        );
        if !trigger.omit_branch {
            if let Some(branch) = branch {
                url.push_str(&format!("&branches={}", urlencoding::encode(branch)));
            }
        }
        if !trigger.omit_hash {
            if let Some(hash) = hash {
                url.push_str(&format!("&sha1={}", hash));
            }
        }
        Ok(url)
    }

    /// Executes the HTTP GET and classifies the response. The client is
    /// dropped before returning on every path, releasing its connection
    /// resources.
    async fn dispatch(
        &self,
        url: String,
        ignore_certs: bool,
        check: ResponseCheck,
    ) -> NotificationResult {
        let use_tls = url.starts_with("https");
        let client = match self.clients.client(use_tls, ignore_certs) {
            Ok(client) => client,
            Err(e) => return NotificationResult::failure(Some(url), e.to_string()),
        };

        let response = match client.get(url.as_str()).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Error triggering build with url '{}': {}", url, e);
                return NotificationResult::failure(Some(url), e.to_string());
            }
        };
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                error!("Error reading trigger response from '{}': {}", url, e);
                return NotificationResult::failure(Some(url), e.to_string());
            }
        };

        debug!("Successfully triggered build with url '{}'", url);
        match check {
            ResponseCheck::ScheduledPrefix if !body.starts_with(SCHEDULED_PREFIX) => {
                NotificationResult::failure(Some(url), body)
            }
            _ => NotificationResult::success(url, body),
        }
    }
}

/// Expands the pull request notification URL template.
///
/// Placeholders are replaced by literal token substitution, so `$` has
/// no special meaning beyond introducing a known token, and replacement
/// values are percent-encoded.
fn expand_pull_request_url(template: &str, event: &PullRequestEvent) -> String {
    let pr = &event.pull_request;
    let replacements = [
        ("$pr", pr.id.to_string()),
        ("$fr", pr.from_ref.id.clone()),
        ("$fh", pr.from_ref.latest_commit.clone()),
        ("$tr", pr.to_ref.id.clone()),
        ("$th", pr.to_ref.latest_commit.clone()),
        ("$event", event.kind.trigger_name()),
    ];

    let mut url = template.to_string();
    for (token, value) in replacements {
        url = url.replace(token, &urlencoding::encode(&value));
    }
    url
}
