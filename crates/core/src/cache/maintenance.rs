//! Maintenance sweeps over the cache index.
//!
//! A pass runs, in order:
//! 1. TTL sweep: unpin entries past `pinned_at + ttl`
//! 2. Size hydration: resolve sizes left unknown by older records
//! 3. Oversize sweep: unpin entries above the per-item ceiling
//! 4. Quota sweep: unpin least-recently-accessed entries until under quota
//!
//! Only one pass runs at a time. Triggers that arrive while a pass is
//! running collapse into a single follow-up pass. The index is flushed once
//! at the end of a pass that changed anything.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::entry::CacheEntry;
use super::index::PersistentIndex;
use crate::clock::Clock;
use crate::config::CacheSettings;
use crate::store::{ContentStore, UnpinOutcome, unpin};

/// What a single maintenance pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub expired: usize,
    pub hydrated: usize,
    pub oversized: usize,
    pub quota_evicted: usize,
    /// Evictions abandoned because the store call failed.
    pub failed_unpins: usize,
    /// Entries left after the pass.
    pub entries: usize,
    pub total_bytes: u64,
}

impl SweepReport {
    pub fn changed(&self) -> bool {
        self.expired + self.hydrated + self.oversized + self.quota_evicted > 0
    }
}

#[derive(Debug, Clone, Copy)]
enum EvictReason {
    Expired,
    Oversized,
    Quota,
}

#[derive(Default)]
struct PassState {
    running: bool,
    queued: bool,
}

/// Holds the running flag for the pass in progress.
///
/// A pass whose future is dropped mid-sweep releases the flag on drop, so a
/// cancelled pass never blocks later ones.
struct RunningPass<'a> {
    pass: &'a StdMutex<PassState>,
    armed: bool,
}

impl RunningPass<'_> {
    /// Release the flag under a lock the caller already holds.
    fn finish(mut self, pass: &mut PassState) {
        pass.running = false;
        self.armed = false;
    }
}

impl Drop for RunningPass<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut pass = self.pass.lock().unwrap_or_else(PoisonError::into_inner);
            pass.running = false;
            pass.queued = false;
            warn!("maintenance pass cancelled before completing");
        }
    }
}

#[derive(Default)]
struct Timers {
    periodic: Option<JoinHandle<()>>,
    soon: Option<JoinHandle<()>>,
}

/// Runs maintenance passes on demand, soon, and periodically.
pub struct MaintenanceScheduler {
    store: Arc<dyn ContentStore>,
    index: Arc<PersistentIndex>,
    settings: watch::Receiver<CacheSettings>,
    clock: Arc<dyn Clock>,
    pass: StdMutex<PassState>,
    timers: Mutex<Timers>,
}

impl MaintenanceScheduler {
    pub fn new(
        store: Arc<dyn ContentStore>, index: Arc<PersistentIndex>, settings: watch::Receiver<CacheSettings>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, index, settings, clock, pass: StdMutex::default(), timers: Mutex::default() }
    }

    /// Run one pass, or queue a follow-up if a pass is already running.
    ///
    /// Returns the report of the last pass this call ran, or `None` when the
    /// request was folded into the running pass.
    pub async fn run_once(&self) -> Option<SweepReport> {
        let guard = {
            let mut pass = self.lock_pass();
            if pass.running {
                pass.queued = true;
                return None;
            }
            pass.running = true;
            pass.queued = false;
            RunningPass { pass: &self.pass, armed: true }
        };

        loop {
            let report = self.sweep().await;

            let mut pass = self.lock_pass();
            if pass.queued {
                pass.queued = false;
                debug!("running queued maintenance pass");
                continue;
            }
            guard.finish(&mut pass);
            return Some(report);
        }
    }

    /// Run a pass on its own task so cancelling a timer never cuts it short.
    fn spawn_pass(self: &Arc<Self>) -> JoinHandle<Option<SweepReport>> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run_once().await })
    }

    fn lock_pass(&self) -> std::sync::MutexGuard<'_, PassState> {
        self.pass.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm a single near-term pass after `delay`; no-op if one is armed.
    pub async fn run_soon(self: &Arc<Self>, delay: Duration) {
        let mut timers = self.timers.lock().await;
        if timers.soon.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let scheduler = Arc::clone(self);
        timers.soon = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.timers.lock().await.soon = None;
            let _ = scheduler.spawn_pass();
        }));
    }

    /// Start the periodic loop: one pass after `initial_delay`, then every `interval`.
    ///
    /// Replaces a previously started loop.
    pub async fn start_periodic(self: &Arc<Self>, interval: Duration, initial_delay: Duration) {
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            info!(
                interval_secs = interval.as_secs(),
                initial_delay_ms = initial_delay.as_millis() as u64,
                "maintenance scheduler starting"
            );
            tokio::time::sleep(initial_delay).await;
            let _ = scheduler.spawn_pass().await;

            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let _ = scheduler.spawn_pass().await;
            }
        });

        if let Some(previous) = self.timers.lock().await.periodic.replace(handle) {
            previous.abort();
        }
    }

    /// Abort the periodic loop and any armed near-term pass.
    ///
    /// A pass already in progress runs to completion.
    pub async fn stop(&self) {
        let mut timers = self.timers.lock().await;
        if let Some(periodic) = timers.periodic.take() {
            periodic.abort();
        }
        if let Some(soon) = timers.soon.take() {
            soon.abort();
        }
    }

    async fn sweep(&self) -> SweepReport {
        let settings = self.settings.borrow().clone();
        let mut report = SweepReport::default();

        self.expire(&mut report).await;
        self.hydrate_sizes(&mut report).await;
        self.evict_oversized(&settings, &mut report).await;
        self.enforce_quota(&settings, &mut report).await;

        report.entries = self.index.len().await;
        report.total_bytes = self.index.total_bytes().await;

        if report.changed() {
            if let Err(e) = self.index.flush().await {
                warn!(error = %e, "index flush after maintenance failed");
            }
            info!(
                expired = report.expired,
                hydrated = report.hydrated,
                oversized = report.oversized,
                quota_evicted = report.quota_evicted,
                failed_unpins = report.failed_unpins,
                entries = report.entries,
                total_bytes = report.total_bytes,
                "maintenance pass complete"
            );
        } else {
            debug!(entries = report.entries, total_bytes = report.total_bytes, "maintenance pass found nothing to do");
        }

        report
    }

    async fn expire(&self, report: &mut SweepReport) {
        let now = self.clock.now_ms();
        for entry in self.index.snapshot().await {
            if !entry.is_expired(now) {
                continue;
            }
            if self.evict(&entry, EvictReason::Expired).await {
                report.expired += 1;
            } else {
                report.failed_unpins += 1;
            }
        }
    }

    async fn hydrate_sizes(&self, report: &mut SweepReport) {
        for entry in self.index.snapshot().await {
            if entry.size_bytes.is_some() {
                continue;
            }
            match self.store.object_stat(&entry.path).await {
                Ok(size) => {
                    if self.index.set_size(&entry.path, size).await {
                        report.hydrated += 1;
                    }
                }
                Err(e) => debug!(path = %entry.path, error = %e, "size still unresolved"),
            }
        }
    }

    async fn evict_oversized(&self, settings: &CacheSettings, report: &mut SweepReport) {
        for entry in self.index.snapshot().await {
            let Some(size) = entry.size_bytes else {
                continue;
            };
            if !settings.exceeds_file_limit(size) {
                continue;
            }
            if self.evict(&entry, EvictReason::Oversized).await {
                report.oversized += 1;
            } else {
                report.failed_unpins += 1;
            }
        }
    }

    async fn enforce_quota(&self, settings: &CacheSettings, report: &mut SweepReport) {
        if !settings.exceeds_quota(self.index.total_bytes().await) {
            return;
        }

        let mut candidates = self.index.snapshot().await;
        candidates.sort_by_key(|e| (e.last_access, e.pinned_at));

        for entry in candidates {
            if !settings.exceeds_quota(self.index.total_bytes().await) {
                break;
            }
            if self.evict(&entry, EvictReason::Quota).await {
                report.quota_evicted += 1;
            } else {
                report.failed_unpins += 1;
            }
        }
    }

    /// Unpin and forget an entry. Returns false if the store call failed.
    async fn evict(&self, entry: &CacheEntry, reason: EvictReason) -> bool {
        match unpin(self.store.as_ref(), &entry.path).await {
            Ok(outcome) => {
                self.index.remove(&entry.path).await;
                debug!(
                    path = %entry.path,
                    ?reason,
                    already_absent = outcome == UnpinOutcome::AlreadyAbsent,
                    size_bytes = entry.size_bytes,
                    "evicted cache entry"
                );
                true
            }
            Err(e) => {
                warn!(path = %entry.path, ?reason, error = %e, "unpin failed; will retry next pass");
                false
            }
        }
    }
}
