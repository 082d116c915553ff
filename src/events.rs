//! Host event boundary types
//!
//! The host delivers two event families: ref changes (a push may move
//! several refs at once) and pull request lifecycle events. These structs
//! mirror the payloads the host hands over; nothing in here talks to the
//! network.

use serde::{Deserialize, Serialize};

/// Identifier of a repository, used as the lookup key into configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    pub project: String,
    pub slug: String,
}

impl Repository {
    pub fn new(project: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            slug: slug.into(),
        }
    }

    /// "PROJECT/slug" form used in log lines and history entries.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.project, self.slug)
    }
}

/// The acting principal behind an event. System-triggered changes carry
/// no user at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A single ref pointer update carried by a push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefChange {
    pub ref_id: String,
    pub to_hash: String,
}

/// A push event. One event may carry any number of ref changes,
/// including zero.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryRefsChangedEvent {
    pub repository: Repository,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub changes: Vec<RefChange>,
}

/// One side of a pull request: a ref id plus its latest commit hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub id: String,
    pub latest_commit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    pub from_ref: PullRequestRef,
    pub to_ref: PullRequestRef,
}

/// The pull request lifecycle events the host delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestEventKind {
    Opened,
    Reopened,
    Rescoped,
    Merged,
    Declined,
    CommentAdded,
}

impl PullRequestEventKind {
    /// The host event class name, as delivered on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            PullRequestEventKind::Opened => "PullRequestOpenedEvent",
            PullRequestEventKind::Reopened => "PullRequestReopenedEvent",
            PullRequestEventKind::Rescoped => "PullRequestRescopedEvent",
            PullRequestEventKind::Merged => "PullRequestMergedEvent",
            PullRequestEventKind::Declined => "PullRequestDeclinedEvent",
            PullRequestEventKind::CommentAdded => "PullRequestCommentAddedEvent",
        }
    }

    /// Short event name substituted for the `$event` placeholder:
    /// one leading "PullRequest" and one trailing "Event" stripped from
    /// the type name, lower-cased.
    pub fn trigger_name(&self) -> String {
        derive_trigger_name(self.type_name())
    }

    /// Maps an `X-Event-Key` header value ("pr:opened", "pr:merged", ...)
    /// to an event kind. Unknown keys yield None.
    pub fn from_event_key(key: &str) -> Option<Self> {
        match key {
            "pr:opened" => Some(PullRequestEventKind::Opened),
            "pr:reopened" => Some(PullRequestEventKind::Reopened),
            "pr:rescoped" => Some(PullRequestEventKind::Rescoped),
            "pr:merged" => Some(PullRequestEventKind::Merged),
            "pr:declined" => Some(PullRequestEventKind::Declined),
            "pr:comment_added" => Some(PullRequestEventKind::CommentAdded),
            _ => None,
        }
    }
}

pub(crate) fn derive_trigger_name(type_name: &str) -> String {
    let stripped = type_name.strip_prefix("PullRequest").unwrap_or(type_name);
    let stripped = stripped.strip_suffix("Event").unwrap_or(stripped);
    stripped.to_lowercase()
}

/// A pull request lifecycle event. The repository is the pull request's
/// target repository.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub repository: Repository,
    #[serde(default)]
    pub user: Option<User>,
    pub kind: PullRequestEventKind,
    pub pull_request: PullRequest,
}
