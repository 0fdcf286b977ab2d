//! **SnapshotStore** — the latest published report + line, safely readable
//! by concurrently arriving observers.
//!
//! One exclusivity guard, two operations: an atomic swap and a read of the
//! last complete pair. No history is retained.

use crate::types::{CrowdReport, DjLine};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<RwLock<Option<(CrowdReport, DjLine)>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the stored pair. Never partially visible: readers
    /// see either the previous complete pair or this one.
    pub async fn replace(&self, report: CrowdReport, line: DjLine) {
        *self.inner.write().await = Some((report, line));
    }

    /// The latest complete pair, or `None` before the first successful cycle.
    pub async fn current(&self) -> Option<(CrowdReport, DjLine)> {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlaybackCategory;

    fn report(energy: u8) -> CrowdReport {
        CrowdReport {
            has_people: true,
            people_count: 10,
            description: "packed floor".to_string(),
            energy_level: energy,
            dancing: true,
            bored: false,
            recommended_category: PlaybackCategory::Party,
        }
    }

    #[tokio::test]
    async fn empty_until_first_replace() {
        let store = SnapshotStore::new();
        assert!(store.current().await.is_none());
    }

    #[tokio::test]
    async fn read_returns_the_latest_pair() {
        let store = SnapshotStore::new();
        store.replace(report(3), DjLine::text_only("warming up")).await;
        store.replace(report(9), DjLine::text_only("hands up!")).await;
        let (current, line) = store.current().await.unwrap();
        assert_eq!(current.energy_level, 9);
        assert_eq!(line.text, "hands up!");
    }
}
