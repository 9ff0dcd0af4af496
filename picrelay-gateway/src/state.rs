use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::notifier::Notifier;
use crate::pipeline::JobDispatcher;

/// Shared application state for the HTTP handlers
pub struct AppState {
    dispatcher: Arc<JobDispatcher>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(dispatcher: Arc<JobDispatcher>) -> Self {
        Self {
            dispatcher,
            started_at: Utc::now(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<JobDispatcher> {
        &self.dispatcher
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        self.dispatcher.notifier()
    }

    /// Seconds since the state was created
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
