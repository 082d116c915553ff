//! Eligibility filtering
//!
//! Before a notification is dispatched, an ordered chain of filters gets
//! a chance to veto it. A filter may only suppress delivery when it can
//! affirmatively prove the notification should not go out; it can never
//! force delivery. Filters are pure predicates over the event context
//! and externally read configuration.

pub mod ignore_committers;

pub use ignore_committers::IgnoreCommittersEligibilityFilter;

use std::sync::Arc;

use crate::events::{Repository, User};

/// Which event family produced a context. Identity only, never
/// interpreted by the filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    RefsChanged,
    PullRequest,
}

/// Context handed through the filter chain, created once per incoming
/// event and read-only afterwards.
#[derive(Debug, Clone)]
pub struct EventContext {
    source: EventSource,
    repository: Repository,
    user: Option<User>,
}

impl EventContext {
    pub fn new(source: EventSource, repository: Repository, user: Option<User>) -> Self {
        Self {
            source,
            repository,
            user,
        }
    }

    pub fn source(&self) -> EventSource {
        self.source
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// The user that initiated the event, absent for system-triggered
    /// changes.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }
}

/// A single filter in an [`EligibilityFilterChain`].
///
/// A particular filter should only say a notification cannot be
/// delivered if it can authoritatively state that it should not be.
pub trait EligibilityFilter: Send + Sync {
    /// True if the notification should be delivered, or if this filter
    /// cannot assertively determine that it should not be.
    fn should_deliver_notification(&self, context: &EventContext) -> bool;
}

/// Ordered, immutable collection of filters evaluated as a
/// short-circuit AND. Assembled once at startup and shared across all
/// worker tasks.
pub struct EligibilityFilterChain {
    filters: Vec<Arc<dyn EligibilityFilter>>,
}

impl EligibilityFilterChain {
    pub fn new(filters: Vec<Arc<dyn EligibilityFilter>>) -> Self {
        Self { filters }
    }

    /// Evaluates filters in registration order, stopping at the first
    /// veto. An empty chain always approves.
    pub fn should_deliver_notification(&self, context: &EventContext) -> bool {
        for filter in &self.filters {
            if !filter.should_deliver_notification(context) {
                return false;
            }
        }
        true
    }
}
