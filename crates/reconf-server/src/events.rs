//! Asynchronous server events

use crate::snapshot::ConfigSnapshot;
use reconf_schema::Schema;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Event broadcast to subscribers
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new snapshot was published
    Update {
        /// The published snapshot
        snapshot: Arc<ConfigSnapshot>,
        /// Level bits of the change (0 for refreshes)
        level: u32,
    },
    /// The schema changed
    Description {
        /// The new schema
        schema: Arc<Schema>,
    },
}

#[derive(Debug)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: ServerEvent) {
        // no subscribers is fine
        if self.tx.send(event).is_err() {
            tracing::trace!("event dropped: no subscribers");
        }
    }
}
