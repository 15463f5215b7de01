use async_trait::async_trait;
use agl_core::{Subscribe, WorkerEvent};

use crate::subscriber::view::log_event;

/// Writes every worker event to the log at a level matching its kind.
#[derive(Debug, Default)]
pub struct Journal;

impl Journal {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for Journal {
    async fn on_event(&self, event: &WorkerEvent) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "journal"
    }
}
