//! Published configuration snapshots
//!
//! Snapshots are immutable and swapped atomically, so readers never wait on
//! an in-flight transaction.

use arc_swap::ArcSwap;
use reconf_property::Fingerprint;
use reconf_protocol::{ConfigMessage, FieldValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Flat configuration as last published
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Monotonic publication counter, starting at 1
    pub version: u64,
    /// Fingerprint of the schema the values mirror
    pub schema_fingerprint: Fingerprint,
    /// Values in schema order
    pub values: ConfigMessage,
}

impl ConfigSnapshot {
    /// Value by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }
}

/// Wait-free holder of the current snapshot
#[derive(Debug)]
pub(crate) struct SnapshotStore {
    current: ArcSwap<ConfigSnapshot>,
}

impl SnapshotStore {
    /// Store holding version 1
    pub(crate) fn new(schema_fingerprint: Fingerprint, values: ConfigMessage) -> Self {
        Self {
            current: ArcSwap::from_pointee(ConfigSnapshot {
                version: 1,
                schema_fingerprint,
                values,
            }),
        }
    }

    pub(crate) fn load(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    /// Publish the next version
    ///
    /// Callers serialize publication; the version only ever grows.
    pub(crate) fn publish(
        &self,
        schema_fingerprint: Fingerprint,
        values: ConfigMessage,
    ) -> Arc<ConfigSnapshot> {
        let snapshot = Arc::new(ConfigSnapshot {
            version: self.current.load().version + 1,
            schema_fingerprint,
            values,
        });
        self.current.store(Arc::clone(&snapshot));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_increase() {
        let fp = Fingerprint::compute(b"schema");
        let store = SnapshotStore::new(fp, ConfigMessage::new());
        assert_eq!(store.load().version, 1);

        let held = store.load();
        let next = store.publish(fp, ConfigMessage::new().with("a", 1));
        assert_eq!(next.version, 2);
        assert_eq!(store.load().get("a"), Some(&FieldValue::Int(1)));
        // earlier readers keep their snapshot
        assert_eq!(held.version, 1);
        assert!(held.values.is_empty());
    }
}
