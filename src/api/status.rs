//! Status API endpoint

use axum::{Json, extract::State as AxumState};
use serde_json::{Value, json};

use crate::SharedState;

/// GET /api/status - Server information and recent dispatch attempts
pub async fn status(AxumState(state): AxumState<SharedState>) -> Json<Value> {
    // Read repository count without holding the lock across an await
    let total_repositories = {
        let config = state.config.read().unwrap();
        config.repository.len()
    };

    let (total, successful, failed) = state.history.counters();

    Json(json!({
        "server": {
            "name": "jenkins_notify",
            "version": env!("CARGO_PKG_VERSION"),
            "started_at": state.started_at.to_rfc3339(),
            "uptime_seconds": state.start_time.elapsed().as_secs(),
        },
        "notifications": {
            "total": total,
            "successful": successful,
            "failed": failed,
            "recent": state.history.recent(20),
        },
        "config": {
            "total_repositories": total_repositories,
        }
    }))
}
