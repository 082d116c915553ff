//! Bounded in-memory record of completed dispatch attempts, surfaced by
//! the status API. Oldest entries fall off once the capacity is hit.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::events::Repository;
use crate::notifier::NotificationResult;

/// What caused a dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    RefChange,
    PullRequest,
    ConfigTest,
}

/// One completed dispatch attempt.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub id: String,
    pub repository: String,
    pub trigger: TriggerKind,
    pub successful: bool,
    pub url: Option<String>,
    pub message: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct HistoryInner {
    entries: VecDeque<AttemptRecord>,
    total: u64,
    successful: u64,
}

pub struct NotificationHistory {
    capacity: usize,
    inner: Mutex<HistoryInner>,
}

impl NotificationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(HistoryInner::default()),
        }
    }

    pub fn record(
        &self,
        repository: &Repository,
        trigger: TriggerKind,
        result: &NotificationResult,
    ) {
        let record = AttemptRecord {
            id: Uuid::now_v7().to_string(),
            repository: repository.full_name(),
            trigger,
            successful: result.successful(),
            url: result.url().map(String::from),
            message: result.message().to_string(),
            completed_at: Utc::now(),
        };

        let mut inner = self.inner.lock().unwrap();
        inner.total += 1;
        if record.successful {
            inner.successful += 1;
        }
        if inner.entries.len() == self.capacity {
            inner.entries.pop_back();
        }
        inner.entries.push_front(record);
    }

    /// The most recent attempts, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AttemptRecord> {
        let inner = self.inner.lock().unwrap();
        inner.entries.iter().take(limit).cloned().collect()
    }

    /// (total, successful, failed) counters over the process lifetime.
    pub fn counters(&self) -> (u64, u64, u64) {
        let inner = self.inner.lock().unwrap();
        (inner.total, inner.successful, inner.total - inner.successful)
    }
}
