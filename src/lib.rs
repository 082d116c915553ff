pub mod api;
pub mod clone_url;
pub mod dispatch;
pub mod eligibility;
pub mod error;
pub mod events;
pub mod history;
pub mod http;
pub mod listeners;
pub mod logging;
pub mod notifier;
pub mod settings;
pub mod utils;

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::clone_url::{CloneUrlResolver, ConfigCloneUrlResolver};
use crate::dispatch::NotificationDispatcher;
use crate::eligibility::{
    EligibilityFilter, EligibilityFilterChain, IgnoreCommittersEligibilityFilter,
};
use crate::error::NotifyError;
use crate::events::Repository;
use crate::history::NotificationHistory;
use crate::http::DefaultHttpClientFactory;
use crate::listeners::{PullRequestEventListener, RepositoryChangeListener};
use crate::notifier::{CloneType, Notifier};
use crate::settings::{
    CLONE_TYPE, CLONE_URL, HookConfiguration, JENKINS_BASE, NOTIFY_PULL_REQUESTS,
    PULL_REQUESTS_NOTIFICATION_URL, Settings, SettingsService,
};

const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Server-wide settings, mainly the clone bases advertised for hooks
/// with clone type `http` or `ssh`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServerConfig {
    pub http_clone_base: Option<String>,
    pub ssh_clone_base: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepositoryConfig {
    pub project: String,
    pub slug: String,
    #[serde(default)]
    pub hook_enabled: bool,
    #[serde(default)]
    pub settings: Settings,
    pub with_webhook_secret: Option<bool>,
    pub webhook_secret: Option<String>,
}

impl RepositoryConfig {
    /// Returns true if webhook secret validation should be enforced.
    pub fn needs_webhook_secret(&self) -> bool {
        self.with_webhook_secret.unwrap_or(false)
    }

    /// Returns true if a valid (non-empty) webhook_secret is set.
    pub fn has_valid_secret(&self) -> bool {
        self.webhook_secret
            .as_ref()
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }

    pub fn matches(&self, repository: &Repository) -> bool {
        self.project.eq_ignore_ascii_case(&repository.project)
            && self.slug.eq_ignore_ascii_case(&repository.slug)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotifyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub repository: Vec<RepositoryConfig>,
}

impl NotifyConfig {
    pub fn find_repository(&self, repository: &Repository) -> Option<&RepositoryConfig> {
        self.repository.iter().find(|r| r.matches(repository))
    }

    /// Checks every enabled hook for the settings it cannot run without.
    pub fn validate(&self) -> Result<(), NotifyError> {
        for repo in self.repository.iter().filter(|r| r.hook_enabled) {
            let name = format!("{}/{}", repo.project, repo.slug);
            let settings = &repo.settings;

            if settings.get_string(JENKINS_BASE).is_none() {
                return Err(NotifyError::ConfigError(format!(
                    "repository {}: the URL for your build server instance is required ({})",
                    name, JENKINS_BASE
                )));
            }

            match CloneType::parse(settings.get_string(CLONE_TYPE)) {
                Ok(CloneType::Custom) => {
                    if settings.get_string(CLONE_URL).is_none() {
                        return Err(NotifyError::ConfigError(format!(
                            "repository {}: the repository clone URL is required ({})",
                            name, CLONE_URL
                        )));
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(NotifyError::ConfigError(format!(
                        "repository {}: {}",
                        name, e
                    )));
                }
            }

            if settings.get_bool(NOTIFY_PULL_REQUESTS, false)
                && settings.get_string(PULL_REQUESTS_NOTIFICATION_URL).is_none()
            {
                return Err(NotifyError::ConfigError(format!(
                    "repository {}: the pull request notification URL is required ({})",
                    name, PULL_REQUESTS_NOTIFICATION_URL
                )));
            }
        }
        Ok(())
    }
}

/// Settings lookups backed by the live service configuration.
pub struct ConfigSettingsService {
    config: Arc<RwLock<NotifyConfig>>,
}

impl ConfigSettingsService {
    pub fn new(config: Arc<RwLock<NotifyConfig>>) -> Self {
        Self { config }
    }
}

impl SettingsService for ConfigSettingsService {
    fn get_settings(&self, repository: &Repository) -> Option<Settings> {
        let config = self.config.read().unwrap();
        config
            .find_repository(repository)
            .map(|r| r.settings.clone())
    }

    fn get_hook(&self, repository: &Repository) -> Option<HookConfiguration> {
        let config = self.config.read().unwrap();
        config.find_repository(repository).map(|r| HookConfiguration {
            enabled: r.hook_enabled,
        })
    }
}

pub struct AppState {
    pub config: Arc<RwLock<NotifyConfig>>,
    pub config_path: PathBuf,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub history: Arc<NotificationHistory>,
    pub notifier: Arc<Notifier>,
    pub clone_urls: Arc<dyn CloneUrlResolver>,
    pub refs_listener: RepositoryChangeListener,
    pub pull_request_listener: PullRequestEventListener,
}

pub type SharedState = Arc<AppState>;

/// Wires the full service graph around a loaded configuration. Used by
/// main and by the API tests.
pub fn build_state(config: NotifyConfig, config_path: PathBuf) -> SharedState {
    let config = Arc::new(RwLock::new(config));

    let settings: Arc<dyn SettingsService> =
        Arc::new(ConfigSettingsService::new(config.clone()));
    let clone_urls: Arc<dyn CloneUrlResolver> =
        Arc::new(ConfigCloneUrlResolver::new(config.clone()));
    let dispatcher = Arc::new(NotificationDispatcher::new());
    let history = Arc::new(NotificationHistory::new(DEFAULT_HISTORY_CAPACITY));

    let notifier = Arc::new(Notifier::new(
        settings.clone(),
        clone_urls.clone(),
        Arc::new(DefaultHttpClientFactory),
        dispatcher.clone(),
        history.clone(),
    ));

    let filters: Vec<Arc<dyn EligibilityFilter>> = vec![Arc::new(
        IgnoreCommittersEligibilityFilter::new(settings.clone()),
    )];
    let filter_chain = Arc::new(EligibilityFilterChain::new(filters));

    let refs_listener =
        RepositoryChangeListener::new(filter_chain.clone(), notifier.clone(), settings.clone());
    let pull_request_listener =
        PullRequestEventListener::new(filter_chain, notifier.clone(), settings);

    Arc::new(AppState {
        config,
        config_path,
        start_time: Instant::now(),
        started_at: Utc::now(),
        dispatcher,
        history,
        notifier,
        clone_urls,
        refs_listener,
        pull_request_listener,
    })
}

/// Load, parse and validate the configuration file.
pub fn load_config(path: &Path) -> Result<NotifyConfig, NotifyError> {
    let config_str = std::fs::read_to_string(path).map_err(|e| {
        NotifyError::ConfigError(format!("Failed to read config file '{}': {}", path.display(), e))
    })?;
    parse_config(&config_str, path)
}

/// Async variant used by the reload endpoint.
pub async fn reload_config(path: &Path) -> Result<NotifyConfig, NotifyError> {
    let config_str = tokio::fs::read_to_string(path).await.map_err(|e| {
        NotifyError::ConfigError(format!("Failed to read config file '{}': {}", path.display(), e))
    })?;
    parse_config(&config_str, path)
}

fn parse_config(config_str: &str, path: &Path) -> Result<NotifyConfig, NotifyError> {
    let config: NotifyConfig = toml::from_str(config_str).map_err(|e| {
        NotifyError::ConfigError(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn config_from(toml_str: &str) -> Result<NotifyConfig, NotifyError> {
        parse_config(toml_str, Path::new("test.toml"))
    }

    const VALID: &str = r#"
        [server]
        http_clone_base = "https://stash.localhost/stash"
        ssh_clone_base = "ssh://git@stash.localhost:7999"

        [[repository]]
        project = "TEST"
        slug = "test"
        hook_enabled = true

        [repository.settings]
        jenkinsBase = "https://jenkins.localhost/jenkins"
        cloneType = "ssh"
        ignoreCommitters = "svc-build"
    "#;

    #[test]
    fn parses_and_validates_good_config() {
        let config = config_from(VALID).unwrap();
        assert_eq!(config.repository.len(), 1);

        // Lookups are case-insensitive on both project and slug.
        assert!(config.find_repository(&Repository::new("test", "TEST")).is_some());
        assert!(config.find_repository(&Repository::new("TEST", "test")).is_some());
        assert!(config.find_repository(&Repository::new("OTHER", "test")).is_none());
    }

    #[test]
    fn enabled_hook_requires_jenkins_base() {
        let toml_str = r#"
            [[repository]]
            project = "TEST"
            slug = "test"
            hook_enabled = true
        "#;
        let err = config_from(toml_str).unwrap_err();
        assert!(err.to_string().contains("jenkinsBase"));
    }

    #[test]
    fn custom_clone_type_requires_clone_url() {
        let toml_str = r#"
            [[repository]]
            project = "TEST"
            slug = "test"
            hook_enabled = true

            [repository.settings]
            jenkinsBase = "https://jenkins.localhost"
        "#;
        let err = config_from(toml_str).unwrap_err();
        assert!(err.to_string().contains("gitRepoUrl"));
    }

    #[test]
    fn unknown_clone_type_fails_validation() {
        let toml_str = r#"
            [[repository]]
            project = "TEST"
            slug = "test"
            hook_enabled = true

            [repository.settings]
            jenkinsBase = "https://jenkins.localhost"
            cloneType = "bogus"
        "#;
        let err = config_from(toml_str).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn pull_request_notifications_require_template() {
        let toml_str = r#"
            [[repository]]
            project = "TEST"
            slug = "test"
            hook_enabled = true

            [repository.settings]
            jenkinsBase = "https://jenkins.localhost"
            gitRepoUrl = "git@x:repo.git"
            notifyPullRequests = true
        "#;
        let err = config_from(toml_str).unwrap_err();
        assert!(err.to_string().contains("pullRequestsNotificationUrl"));
    }

    #[test]
    fn disabled_hooks_are_not_validated() {
        let toml_str = r#"
            [[repository]]
            project = "TEST"
            slug = "test"
        "#;
        assert!(config_from(toml_str).is_ok());
    }

    #[test]
    fn load_config_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.repository[0].slug, "test");
    }

    #[test]
    fn settings_service_reflects_config() {
        let config = Arc::new(RwLock::new(config_from(VALID).unwrap()));
        let service = ConfigSettingsService::new(config);
        let repo = Repository::new("TEST", "test");

        let hook = service.get_hook(&repo).unwrap();
        assert!(hook.enabled);
        let settings = service.get_settings(&repo).unwrap();
        assert_eq!(settings.get_string(CLONE_TYPE), Some("ssh"));

        assert!(service.get_hook(&Repository::new("NOPE", "nope")).is_none());
    }
}
