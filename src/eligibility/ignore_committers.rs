use std::sync::Arc;

use tracing::debug;

use crate::eligibility::{EligibilityFilter, EventContext};
use crate::settings::{IGNORE_COMMITTERS, SettingsService};

/// Suppresses notifications for events initiated by a user on the
/// repository's ignore list. The list is stored as space-separated names
/// and matched case-insensitively. Events without a user, and
/// repositories without a list, always pass.
pub struct IgnoreCommittersEligibilityFilter {
    settings: Arc<dyn SettingsService>,
}

impl IgnoreCommittersEligibilityFilter {
    pub fn new(settings: Arc<dyn SettingsService>) -> Self {
        Self { settings }
    }
}

impl EligibilityFilter for IgnoreCommittersEligibilityFilter {
    fn should_deliver_notification(&self, context: &EventContext) -> bool {
        let Some(user) = context.user() else {
            return true;
        };
        let Some(settings) = self.settings.get_settings(context.repository()) else {
            return true;
        };
        let Some(ignore_committers) = settings.get_string(IGNORE_COMMITTERS) else {
            return true;
        };

        for committer in ignore_committers.split_whitespace() {
            if committer.eq_ignore_ascii_case(&user.name) {
                debug!(
                    "Ignoring event on '{}' due to ignored committer '{}'",
                    context.repository().full_name(),
                    committer
                );
                return false;
            }
        }
        true
    }
}
