//! The pin cache service: owns the index, coordinator, scheduler and
//! observer pump, and their lifecycle.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::info;

use super::coordinator::{TouchCoordinator, TouchOutcome};
use super::entry::CacheEntry;
use super::index::PersistentIndex;
use super::maintenance::{MaintenanceScheduler, SweepReport};
use super::observer::{FetchObserver, spawn_observer};
use super::path::ResponseMeta;
use crate::clock::{Clock, SystemClock};
use crate::config::CacheSettings;
use crate::store::{BoundedStore, ContentStore};

/// Point-in-time view of the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub max_bytes: u64,
    pub max_file_bytes: u64,
    /// A debounced index write is armed.
    pub flush_pending: bool,
}

/// A running pin cache.
pub struct PinCache {
    index: Arc<PersistentIndex>,
    coordinator: Arc<TouchCoordinator>,
    maintenance: Arc<MaintenanceScheduler>,
    settings: watch::Sender<CacheSettings>,
    observer: FetchObserver,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl PinCache {
    /// Load the index at `index_path` and start background maintenance.
    pub async fn start(settings: CacheSettings, index_path: impl Into<PathBuf>, store: Arc<dyn ContentStore>) -> Self {
        Self::start_with_clock(settings, index_path, store, Arc::new(SystemClock)).await
    }

    pub async fn start_with_clock(
        settings: CacheSettings, index_path: impl Into<PathBuf>, store: Arc<dyn ContentStore>, clock: Arc<dyn Clock>,
    ) -> Self {
        let store: Arc<dyn ContentStore> = Arc::new(BoundedStore::new(store, settings.store_timeout));
        let index = Arc::new(PersistentIndex::load(index_path, settings.flush_debounce, Arc::clone(&clock)).await);

        let (tx, rx) = watch::channel(settings.clone());
        let maintenance = Arc::new(MaintenanceScheduler::new(
            Arc::clone(&store),
            Arc::clone(&index),
            rx.clone(),
            Arc::clone(&clock),
        ));
        maintenance.start_periodic(settings.cleanup_interval, settings.initial_sweep_delay).await;

        let coordinator =
            Arc::new(TouchCoordinator::new(store, Arc::clone(&index), Arc::clone(&maintenance), rx, clock));
        let (observer, pump) = spawn_observer(Arc::clone(&coordinator));

        info!(
            file = %index.file().display(),
            ttl_secs = settings.ttl.as_secs(),
            max_bytes = settings.max_bytes,
            max_file_bytes = settings.max_file_bytes,
            cleanup_interval_secs = settings.cleanup_interval.as_secs(),
            "pin cache started"
        );

        Self { index, coordinator, maintenance, settings: tx, observer, pump: Mutex::new(Some(pump)) }
    }

    /// Touch an observed locator.
    pub async fn touch(&self, raw_url: &str, meta: &ResponseMeta) -> TouchOutcome {
        self.coordinator.touch(raw_url, meta).await
    }

    /// Hook for hosts that forward completed fetches.
    pub fn observer(&self) -> FetchObserver {
        self.observer.clone()
    }

    /// Run a maintenance pass now. `None` if it was folded into a running pass.
    pub async fn run_maintenance(&self) -> Option<SweepReport> {
        self.maintenance.run_once().await
    }

    pub async fn stats(&self) -> CacheStats {
        let settings = self.settings.borrow().clone();
        CacheStats {
            entries: self.index.len().await,
            total_bytes: self.index.total_bytes().await,
            max_bytes: settings.max_bytes,
            max_file_bytes: settings.max_file_bytes,
            flush_pending: self.index.flush_pending().await,
        }
    }

    /// Tracked entries, most recently accessed first.
    pub async fn entries(&self) -> Vec<CacheEntry> {
        let mut entries = self.index.snapshot().await;
        entries.sort_by(|a, b| b.last_access.cmp(&a.last_access).then_with(|| a.path.cmp(&b.path)));
        entries
    }

    pub fn settings(&self) -> CacheSettings {
        self.settings.borrow().clone()
    }

    /// Apply new limits and timings to subsequent touches and passes.
    ///
    /// The store timeout and name-cache TTL are fixed at start.
    pub async fn update_settings(&self, settings: CacheSettings) {
        let previous = self.settings.send_replace(settings.clone());
        self.index.set_flush_debounce(settings.flush_debounce);

        if previous.cleanup_interval != settings.cleanup_interval {
            self.maintenance.start_periodic(settings.cleanup_interval, settings.cleanup_interval).await;
        }
        info!(
            ttl_secs = settings.ttl.as_secs(),
            max_bytes = settings.max_bytes,
            max_file_bytes = settings.max_file_bytes,
            "cache settings updated"
        );
    }

    /// Stop background work and write any unsaved index state.
    pub async fn stop(&self) {
        self.maintenance.stop().await;
        if let Some(pump) = self.pump.lock().await.take() {
            pump.abort();
        }
        self.index.shutdown().await;
        info!("pin cache stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::FetchEvent;
    use crate::clock::ManualClock;
    use crate::store::testing::FakeStore;

    const CID: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

    fn settings() -> CacheSettings {
        CacheSettings { max_bytes: 1_000, max_file_bytes: 500, ..Default::default() }
    }

    fn gateway(rest: &str) -> String {
        format!("http://127.0.0.1:8080/ipfs/{CID}/{rest}")
    }

    #[tokio::test]
    async fn test_touch_stats_and_entries() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let store = Arc::new(FakeStore::new());
        store.set_size(&format!("/ipfs/{CID}/a"), 100);
        store.set_size(&format!("/ipfs/{CID}/b"), 200);
        let cache = PinCache::start_with_clock(settings(), dir.path().join("i.json"), store, clock.clone()).await;

        cache.touch(&gateway("a"), &ResponseMeta::default()).await;
        clock.advance(10);
        cache.touch(&gateway("b"), &ResponseMeta::default()).await;

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.total_bytes, 300);
        assert_eq!(stats.max_bytes, 1_000);
        assert!(stats.flush_pending);

        let entries = cache.entries().await;
        assert_eq!(entries[0].path, format!("/ipfs/{CID}/b"));
        assert_eq!(entries[1].path, format!("/ipfs/{CID}/a"));

        cache.stop().await;
    }

    #[tokio::test]
    async fn test_stop_persists_and_restart_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("i.json");
        let store = Arc::new(FakeStore::new());
        store.set_size(&format!("/ipfs/{CID}/a"), 100);

        let cache = PinCache::start(settings(), &file, store.clone()).await;
        assert!(cache.touch(&gateway("a"), &ResponseMeta::default()).await.is_admitted());
        cache.stop().await;
        assert!(file.exists());

        let restarted = PinCache::start(settings(), &file, store).await;
        let stats = restarted.stats().await;
        assert_eq!((stats.entries, stats.total_bytes), (1, 100));
        restarted.stop().await;
    }

    #[tokio::test]
    async fn test_observer_feeds_touches() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::new());
        let path = format!("/ipfs/{CID}/style.css");
        store.set_size(&path, 50);
        let cache = PinCache::start(settings(), dir.path().join("i.json"), store.clone()).await;

        let observer = cache.observer();
        assert!(observer.completed(FetchEvent::get(gateway("style.css"), 200)));
        assert!(observer.completed(FetchEvent::get(gateway("missing.css"), 404)));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.stats().await.entries, 1);
        assert_eq!(store.pin_add_calls(&format!("/ipfs/{CID}/missing.css")), 0);
        cache.stop().await;
    }

    #[tokio::test]
    async fn test_update_settings_tightens_next_pass() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::new());
        store.set_size(&format!("/ipfs/{CID}/a"), 400);
        let cache = PinCache::start(settings(), dir.path().join("i.json"), store).await;
        cache.touch(&gateway("a"), &ResponseMeta::default()).await;

        cache.update_settings(CacheSettings { max_file_bytes: 300, ..settings() }).await;
        let report = cache.run_maintenance().await.unwrap();

        assert_eq!(report.oversized, 1);
        assert_eq!(cache.stats().await.max_file_bytes, 300);
        assert_eq!(cache.settings().max_file_bytes, 300);
        cache.stop().await;
    }

    #[tokio::test]
    async fn test_store_calls_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::new());
        store.set_latency(Duration::from_millis(500));
        let bounded = CacheSettings { store_timeout: Duration::from_millis(50), ..settings() };
        let cache = PinCache::start(bounded, dir.path().join("i.json"), store).await;

        let outcome = cache.touch(&gateway("slow"), &ResponseMeta::default()).await;
        assert_eq!(outcome, TouchOutcome::PinFailed);
        assert_eq!(cache.stats().await.entries, 0);
        cache.stop().await;
    }
}
