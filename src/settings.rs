//! Per-repository hook settings
//!
//! Settings are a flat key to value mapping kept exactly as the legacy
//! store shipped them, so the recognized keys below use the historical
//! camelCase identifiers. Typed accessors apply the defaulting rules:
//! an absent boolean is false, an absent or empty string means the
//! feature is disabled.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::events::Repository;

/// Field name for the build server base URL property
pub const JENKINS_BASE: &str = "jenkinsBase";

/// Field name for the clone type property (`http`, `ssh` or `custom`)
pub const CLONE_TYPE: &str = "cloneType";

/// Field name for the repo clone URL override property
pub const CLONE_URL: &str = "gitRepoUrl";

/// Field name for the ignore certs property
pub const IGNORE_CERTS: &str = "ignoreCerts";

/// Field name for the omit hash property
pub const OMIT_HASH: &str = "omitHash";

/// Field name for the omit branch property
pub const OMIT_BRANCH: &str = "omitBranch";

/// Field name for the ignore committers property (space-separated names)
pub const IGNORE_COMMITTERS: &str = "ignoreCommitters";

/// Field name for the notify on pull requests property
pub const NOTIFY_PULL_REQUESTS: &str = "notifyPullRequests";

/// Field name for the pull request notification URL template property
pub const PULL_REQUESTS_NOTIFICATION_URL: &str = "pullRequestsNotificationUrl";

/// Reserved for future branch filtering, not consulted by the core logic
pub const BRANCH_OPTIONS: &str = "branchOptions";

/// Reserved for future branch filtering, not consulted by the core logic
pub const BRANCH_OPTIONS_BRANCHES: &str = "branchOptionsBranches";

/// A single stored settings value. The legacy store kept strings and
/// booleans side by side in one table, so both shapes are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Text(String),
}

/// Flat settings mapping for one repository hook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    values: HashMap<String, SettingValue>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the string value for `key`. Empty strings and boolean
    /// values count as absent so downstream code never sees an empty
    /// string where a URL or name list is expected.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(SettingValue::Text(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean value for `key`, falling back to `default`
    /// when the key is absent or not interpretable as a boolean.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(SettingValue::Bool(b)) => *b,
            Some(SettingValue::Text(s)) => match s.to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => default,
            },
            None => default,
        }
    }

    pub fn set_text(&mut self, key: &str, value: &str) {
        self.values
            .insert(key.to_string(), SettingValue::Text(value.to_string()));
    }

    pub fn set_flag(&mut self, key: &str, value: bool) {
        self.values
            .insert(key.to_string(), SettingValue::Bool(value));
    }
}

/// The per-repository enabled/disabled unit gating all notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfiguration {
    pub enabled: bool,
}

/// Read access to the externally persisted per-repository configuration.
///
/// Lookups must be safe for concurrent use from background worker tasks.
pub trait SettingsService: Send + Sync {
    /// The stored settings for the repository, or None when the hook has
    /// never been configured.
    fn get_settings(&self, repository: &Repository) -> Option<Settings>;

    /// The hook enabled/disabled state, or None when the hook is absent.
    fn get_hook(&self, repository: &Repository) -> Option<HookConfiguration>;
}
