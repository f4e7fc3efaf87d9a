//! Touch handling: refresh tracked entries, admit new ones.
//!
//! Admission of a path runs at most once at a time. Concurrent touches of
//! the same path join the in-flight admission and observe its outcome.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::Serialize;
use tokio::sync::{Mutex, Semaphore, watch};
use tracing::{debug, info, warn};

use super::entry::CacheEntry;
use super::index::PersistentIndex;
use super::maintenance::MaintenanceScheduler;
use super::names::NameResolutionCache;
use super::path::{ResponseMeta, is_cacheable, normalize};
use crate::clock::Clock;
use crate::config::CacheSettings;
use crate::store::{ContentStore, PinMode, unpin};

/// What a touch decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TouchOutcome {
    /// Not a locator the cache may pin.
    NotCacheable,
    /// Mutable name with no current content address.
    Unresolved,
    /// Already tracked; timestamps and TTL were renewed.
    Refreshed,
    /// Pinned by something other than this cache; left alone.
    ExternallyPinned,
    Admitted { size_bytes: u64 },
    /// Pinned, then unpinned because it is above the per-item ceiling.
    Oversized { size_bytes: u64, limit: u64 },
    /// Pinned, then unpinned because its size could not be resolved.
    SizeUnknown,
    PinFailed,
    /// The pin listing could not be read, so ownership is unknown.
    StoreUnavailable,
}

impl TouchOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, TouchOutcome::Admitted { .. })
    }
}

type Admission = Shared<BoxFuture<'static, TouchOutcome>>;

/// Detached touches allowed to run at once.
pub const MAX_DETACHED_TOUCHES: usize = 32;

/// Decides, for each observed locator, whether to refresh, admit or ignore it.
pub struct TouchCoordinator {
    store: Arc<dyn ContentStore>,
    index: Arc<PersistentIndex>,
    names: NameResolutionCache,
    maintenance: Arc<MaintenanceScheduler>,
    settings: watch::Receiver<CacheSettings>,
    clock: Arc<dyn Clock>,
    inflight: Arc<Mutex<HashMap<String, Admission>>>,
    detached: Arc<Semaphore>,
}

impl TouchCoordinator {
    pub fn new(
        store: Arc<dyn ContentStore>, index: Arc<PersistentIndex>, maintenance: Arc<MaintenanceScheduler>,
        settings: watch::Receiver<CacheSettings>, clock: Arc<dyn Clock>,
    ) -> Self {
        let names = NameResolutionCache::new(settings.borrow().name_cache_ttl, Arc::clone(&clock));
        Self {
            store,
            index,
            names,
            maintenance,
            settings,
            clock,
            inflight: Arc::default(),
            detached: Arc::new(Semaphore::new(MAX_DETACHED_TOUCHES)),
        }
    }

    /// Handle one observed locator and report the decision.
    pub async fn touch(self: &Arc<Self>, raw_url: &str, meta: &ResponseMeta) -> TouchOutcome {
        let Some(path) = normalize(raw_url, meta) else {
            return TouchOutcome::NotCacheable;
        };

        let path = if path.is_mutable() {
            match self.names.resolve_path(&path, self.store.as_ref()).await {
                Some(resolved) => resolved,
                None => return TouchOutcome::Unresolved,
            }
        } else {
            path
        };

        self.touch_path(path.to_string()).await
    }

    /// Fire-and-forget [`touch`](Self::touch).
    ///
    /// At most [`MAX_DETACHED_TOUCHES`] run at once; the caller waits for a
    /// slot before the touch is spawned.
    pub async fn touch_detached(self: &Arc<Self>, raw_url: String, meta: ResponseMeta) {
        let Ok(permit) = Arc::clone(&self.detached).acquire_owned().await else {
            return;
        };

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = coordinator.touch(&raw_url, &meta).await;
            debug!(url = %raw_url, ?outcome, "touch finished");
            drop(permit);
        });
    }

    /// Detached touch slots currently free.
    pub fn detached_slots(&self) -> usize {
        self.detached.available_permits()
    }

    /// Touch an already-canonical content path.
    pub async fn touch_path(self: &Arc<Self>, path: String) -> TouchOutcome {
        if !is_cacheable(&path) {
            return TouchOutcome::NotCacheable;
        }

        if self.refresh_if_tracked(&path).await {
            return TouchOutcome::Refreshed;
        }

        self.admission(path).await.await
    }

    /// Join the in-flight admission for `path`, or start one.
    async fn admission(self: &Arc<Self>, path: String) -> Admission {
        let mut inflight = self.inflight.lock().await;
        if let Some(running) = inflight.get(&path) {
            debug!(path = %path, "joining in-flight admission");
            return running.clone();
        }

        let coordinator = Arc::clone(self);
        let key = path.clone();
        let task = tokio::spawn(async move {
            let outcome = coordinator.admit(&key).await;
            coordinator.inflight.lock().await.remove(&key);
            outcome
        });

        let shared = async move {
            task.await.unwrap_or_else(|e| {
                warn!(error = %e, "admission task failed");
                TouchOutcome::PinFailed
            })
        }
        .boxed()
        .shared();

        inflight.insert(path, shared.clone());
        shared
    }

    async fn refresh_if_tracked(self: &Arc<Self>, path: &str) -> bool {
        let ttl_ms = self.settings.borrow().ttl_ms();
        if !self.index.refresh(path, self.clock.now_ms(), ttl_ms).await {
            return false;
        }
        self.index.schedule_flush().await;
        debug!(path = %path, "refreshed cache entry");
        true
    }

    async fn admit(self: &Arc<Self>, path: &str) -> TouchOutcome {
        // A previous admission may have finished since the caller checked.
        if self.refresh_if_tracked(path).await {
            return TouchOutcome::Refreshed;
        }

        match self.store.pin_ls(path, PinMode::Recursive).await {
            Ok(true) => {
                debug!(path = %path, "already pinned elsewhere; not managing");
                return TouchOutcome::ExternallyPinned;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(path = %path, error = %e, "pin listing failed; skipping admission");
                return TouchOutcome::StoreUnavailable;
            }
        }

        if let Err(e) = self.store.pin_add(path).await {
            warn!(path = %path, error = %e, "pin failed");
            return TouchOutcome::PinFailed;
        }

        let settings = self.settings.borrow().clone();
        let size_bytes = match self.store.object_stat(path).await {
            Ok(size) => size,
            Err(e) => {
                warn!(path = %path, error = %e, "size lookup failed; reversing pin");
                self.reverse_pin(path).await;
                return TouchOutcome::SizeUnknown;
            }
        };

        if settings.exceeds_file_limit(size_bytes) {
            info!(path = %path, size_bytes, limit = settings.max_file_bytes, "object above per-item limit; reversing pin");
            self.reverse_pin(path).await;
            return TouchOutcome::Oversized { size_bytes, limit: settings.max_file_bytes };
        }

        self.index.upsert(CacheEntry::new(path, self.clock.now_ms(), settings.ttl_ms(), size_bytes)).await;
        self.index.schedule_flush().await;
        self.maintenance.run_soon(settings.maintenance_soon_delay).await;

        info!(path = %path, size_bytes, "admitted cache entry");
        TouchOutcome::Admitted { size_bytes }
    }

    async fn reverse_pin(&self, path: &str) {
        if let Err(e) = unpin(self.store.as_ref(), path).await {
            warn!(path = %path, error = %e, "compensating unpin failed; pin is now untracked");
        }
    }
}
