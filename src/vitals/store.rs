use std::sync::Arc;
use tokio::sync::RwLock;

use super::sample::VitalsSample;

/// Process-wide latest-readings slot.
///
/// Single writer (the acquisition loop), many readers (API handlers,
/// actuation). The slot is replaced wholesale under the write lock, so a
/// reader observes either the previous sample or the new one, never a torn
/// mix of the two.
#[derive(Clone, Default)]
pub struct VitalsStore {
    latest: Arc<RwLock<Option<VitalsSample>>>,
}

impl VitalsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest sample. Last write wins.
    pub async fn update(&self, sample: VitalsSample) {
        *self.latest.write().await = Some(sample);
    }

    /// Snapshot the latest sample; `None` until the first update of the
    /// process lifetime.
    pub async fn read_latest(&self) -> Option<VitalsSample> {
        self.latest.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn sample(hr: f64) -> VitalsSample {
        VitalsSample {
            timestamp: Local::now(),
            heart_rate: hr,
            breathing_rate: 15.0,
            temperature: 21.0,
            humidity: 50.0,
            pressure: 1010.0,
        }
    }

    #[tokio::test]
    async fn empty_until_first_update() {
        let store = VitalsStore::new();
        assert!(store.read_latest().await.is_none());
    }

    #[tokio::test]
    async fn update_replaces_latest() {
        let store = VitalsStore::new();
        store.update(sample(70.0)).await;
        store.update(sample(75.0)).await;
        let latest = store.read_latest().await.unwrap();
        assert_eq!(latest.heart_rate, 75.0);
    }

    #[tokio::test]
    async fn clones_share_the_slot() {
        let store = VitalsStore::new();
        let handle = store.clone();
        store.update(sample(68.0)).await;
        assert_eq!(handle.read_latest().await.unwrap().heart_rate, 68.0);
    }
}
