//! Event listeners
//!
//! Thin adapters between host-delivered events and the notifier. Each
//! listener checks that the repository has settings at all, builds one
//! event context per notification candidate, consults the eligibility
//! chain and, if approved, hands off to the notifier's background entry
//! point. The returned handles are dropped by production callers and
//! awaited by tests.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::eligibility::{EligibilityFilterChain, EventContext, EventSource};
use crate::events::{PullRequestEvent, RepositoryRefsChangedEvent};
use crate::notifier::{NotificationResult, Notifier};
use crate::settings::SettingsService;
use crate::utils::strip_ref_prefix;

/// Listens to push events and triggers one notification per ref change.
pub struct RepositoryChangeListener {
    filter_chain: Arc<EligibilityFilterChain>,
    notifier: Arc<Notifier>,
    settings: Arc<dyn SettingsService>,
}

impl RepositoryChangeListener {
    pub fn new(
        filter_chain: Arc<EligibilityFilterChain>,
        notifier: Arc<Notifier>,
        settings: Arc<dyn SettingsService>,
    ) -> Self {
        Self {
            filter_chain,
            notifier,
            settings,
        }
    }

    /// Handles one push event. A push may move several refs; each gets
    /// its own context, chain verdict and background notification.
    pub fn on_refs_changed(
        &self,
        event: &RepositoryRefsChangedEvent,
    ) -> Vec<JoinHandle<NotificationResult>> {
        if self.settings.get_settings(&event.repository).is_none() {
            debug!(
                "No settings stored for '{}', skipping.",
                event.repository.full_name()
            );
            return Vec::new();
        }

        let mut submitted = Vec::new();
        for change in &event.changes {
            let context = EventContext::new(
                EventSource::RefsChanged,
                event.repository.clone(),
                event.user.clone(),
            );
            if self.filter_chain.should_deliver_notification(&context) {
                let branch = strip_ref_prefix(&change.ref_id);
                submitted.push(
                    self.notifier
                        .notify_background(&event.repository, branch, &change.to_hash),
                );
            }
        }
        submitted
    }
}

/// Listens to pull request lifecycle events.
pub struct PullRequestEventListener {
    filter_chain: Arc<EligibilityFilterChain>,
    notifier: Arc<Notifier>,
    settings: Arc<dyn SettingsService>,
}

impl PullRequestEventListener {
    pub fn new(
        filter_chain: Arc<EligibilityFilterChain>,
        notifier: Arc<Notifier>,
        settings: Arc<dyn SettingsService>,
    ) -> Self {
        Self {
            filter_chain,
            notifier,
            settings,
        }
    }

    pub fn on_pull_request_event(
        &self,
        event: &PullRequestEvent,
    ) -> Option<JoinHandle<NotificationResult>> {
        if self.settings.get_settings(&event.repository).is_none() {
            debug!(
                "No settings stored for '{}', skipping.",
                event.repository.full_name()
            );
            return None;
        }

        let context = EventContext::new(
            EventSource::PullRequest,
            event.repository.clone(),
            event.user.clone(),
        );
        if self.filter_chain.should_deliver_notification(&context) {
            Some(self.notifier.notify_pull_request_background(event.clone()))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::dispatch::NotificationDispatcher;
    use crate::eligibility::EligibilityFilter;
    use crate::events::{
        PullRequest, PullRequestEventKind, PullRequestRef, RefChange, Repository, User,
    };
    use crate::history::NotificationHistory;
    use crate::settings::{
        HookConfiguration, JENKINS_BASE, NOTIFY_PULL_REQUESTS, PULL_REQUESTS_NOTIFICATION_URL,
        Settings,
    };

    struct StubSettingsService {
        settings: Option<Settings>,
    }

    impl SettingsService for StubSettingsService {
        fn get_settings(&self, _repository: &Repository) -> Option<Settings> {
            self.settings.clone()
        }

        fn get_hook(&self, _repository: &Repository) -> Option<HookConfiguration> {
            self.settings
                .as_ref()
                .map(|_| HookConfiguration { enabled: true })
        }
    }

    struct FixedFilter {
        verdict: bool,
        calls: AtomicUsize,
    }

    impl EligibilityFilter for FixedFilter {
        fn should_deliver_notification(&self, _context: &EventContext) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict
        }
    }

    struct NullResolver;

    impl crate::clone_url::CloneUrlResolver for NullResolver {
        fn http_clone_url(
            &self,
            _repository: &Repository,
        ) -> Result<String, crate::error::NotifyError> {
            Ok("https://stash.localhost/scm/test/test.git".to_string())
        }

        fn ssh_clone_url(
            &self,
            _repository: &Repository,
        ) -> Result<String, crate::error::NotifyError> {
            Ok("ssh://git@stash.localhost:7999/test/test.git".to_string())
        }
    }

    /// Settings pointing at a port nothing listens on. Dispatch fails,
    /// which is fine: the failed result still records the attempted URL.
    async fn unreachable_settings() -> Settings {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut settings = Settings::new();
        settings.set_text(JENKINS_BASE, &format!("http://{}", addr));
        settings.set_text(crate::settings::CLONE_URL, "git@x:repo.git");
        settings.set_flag(NOTIFY_PULL_REQUESTS, true);
        settings.set_text(
            PULL_REQUESTS_NOTIFICATION_URL,
            &format!("http://{}/pr?pr=$pr&event=$event", addr),
        );
        settings
    }

    fn listener_with(
        settings: Option<Settings>,
        verdict: bool,
    ) -> (RepositoryChangeListener, PullRequestEventListener, Arc<FixedFilter>) {
        let service: Arc<dyn SettingsService> = Arc::new(StubSettingsService {
            settings: settings.clone(),
        });
        let notifier = Arc::new(Notifier::new(
            service.clone(),
            Arc::new(NullResolver),
            Arc::new(crate::http::DefaultHttpClientFactory),
            Arc::new(NotificationDispatcher::new()),
            Arc::new(NotificationHistory::new(16)),
        ));
        let filter = Arc::new(FixedFilter {
            verdict,
            calls: AtomicUsize::new(0),
        });
        let chain = Arc::new(EligibilityFilterChain::new(vec![filter.clone()]));
        (
            RepositoryChangeListener::new(chain.clone(), notifier.clone(), service.clone()),
            PullRequestEventListener::new(chain, notifier, service),
            filter,
        )
    }

    fn refs_event(changes: Vec<RefChange>) -> RepositoryRefsChangedEvent {
        RepositoryRefsChangedEvent {
            repository: Repository::new("TEST", "test"),
            user: Some(User {
                name: "pinky".to_string(),
                email: None,
            }),
            changes,
        }
    }

    fn pr_event() -> PullRequestEvent {
        PullRequestEvent {
            repository: Repository::new("TEST", "test"),
            user: None,
            kind: PullRequestEventKind::Merged,
            pull_request: PullRequest {
                id: 7,
                from_ref: PullRequestRef {
                    id: "refs/heads/feature".to_string(),
                    latest_commit: "f00d".to_string(),
                },
                to_ref: PullRequestRef {
                    id: "refs/heads/master".to_string(),
                    latest_commit: "abc1".to_string(),
                },
            },
        }
    }

    #[tokio::test]
    async fn notifies_each_ref_change_with_stripped_branch() {
        let settings = unreachable_settings().await;
        let (listener, _, filter) = listener_with(Some(settings), true);

        let handles = listener.on_refs_changed(&refs_event(vec![
            RefChange {
                ref_id: "refs/heads/master".to_string(),
                to_hash: "sha1".to_string(),
            },
            RefChange {
                ref_id: "refs/heads/feature/branch".to_string(),
                to_hash: "sha2".to_string(),
            },
        ]));

        assert_eq!(handles.len(), 2);
        assert_eq!(filter.calls.load(Ordering::SeqCst), 2);

        let mut urls = Vec::new();
        for handle in handles {
            let result = handle.await.unwrap();
            assert!(!result.successful());
            urls.push(result.url().unwrap().to_string());
        }
        assert!(urls[0].contains("&branches=master&sha1=sha1"));
        assert!(urls[1].contains("&branches=feature%2Fbranch&sha1=sha2"));
    }

    #[tokio::test]
    async fn zero_ref_changes_mean_zero_notifications() {
        let settings = unreachable_settings().await;
        let (listener, _, filter) = listener_with(Some(settings), true);

        let handles = listener.on_refs_changed(&refs_event(Vec::new()));
        assert!(handles.is_empty());
        assert_eq!(filter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_settings_abort_before_the_chain() {
        let (listener, _, filter) = listener_with(None, true);

        let handles = listener.on_refs_changed(&refs_event(vec![RefChange {
            ref_id: "refs/heads/master".to_string(),
            to_hash: "sha1".to_string(),
        }]));
        assert!(handles.is_empty());
        assert_eq!(filter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn chain_veto_suppresses_notification() {
        let settings = unreachable_settings().await;
        let (listener, _, filter) = listener_with(Some(settings), false);

        let handles = listener.on_refs_changed(&refs_event(vec![RefChange {
            ref_id: "refs/heads/master".to_string(),
            to_hash: "sha1".to_string(),
        }]));
        assert!(handles.is_empty());
        assert_eq!(filter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pull_request_listener_submits_when_approved() {
        let settings = unreachable_settings().await;
        let (_, listener, _) = listener_with(Some(settings), true);

        let handle = listener.on_pull_request_event(&pr_event()).unwrap();
        let result = handle.await.unwrap();
        assert!(!result.successful());
        assert!(result.url().unwrap().ends_with("pr=7&event=merged"));
    }

    #[tokio::test]
    async fn pull_request_listener_respects_veto_and_missing_settings() {
        let settings = unreachable_settings().await;
        let (_, vetoed, _) = listener_with(Some(settings), false);
        assert!(vetoed.on_pull_request_event(&pr_event()).is_none());

        let (_, unconfigured, filter) = listener_with(None, true);
        assert!(unconfigured.on_pull_request_event(&pr_event()).is_none());
        assert_eq!(filter.calls.load(Ordering::SeqCst), 0);
    }
}
