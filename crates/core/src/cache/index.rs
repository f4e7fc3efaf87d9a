//! Persistent index of cached entries.
//!
//! The in-memory map is authoritative; the JSON file mirrors it with
//! debounced, whole-file rewrites. The map and the aggregate byte counter
//! live behind one lock and are never updated separately.
//!
//! File layout:
//!
//! ```json
//! { "version": 1, "entries": { "<path>": { "path": "...", "pinnedAt": 0, "lastAccess": 0, "ttlMs": 0, "sizeBytes": 0 } }, "updatedAt": 0 }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::entry::{CacheEntry, EntryRecord, entry_from_record};
use crate::Error;
use crate::clock::Clock;

/// Version tag written to the durable file.
pub const INDEX_VERSION: u64 = 1;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexDocument {
    version: u64,
    entries: BTreeMap<String, EntryRecord>,
    updated_at: i64,
}

/// Counts from loading the durable file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub accepted: usize,
    pub dropped: usize,
}

#[derive(Default)]
struct IndexState {
    entries: HashMap<String, CacheEntry>,
    total_bytes: u64,
    dirty: bool,
    flush_timer: Option<JoinHandle<()>>,
}

impl IndexState {
    fn insert(&mut self, entry: CacheEntry) {
        let added = entry.accounted_bytes();
        if let Some(old) = self.entries.insert(entry.path.clone(), entry) {
            self.total_bytes = self.total_bytes.saturating_sub(old.accounted_bytes());
        }
        self.total_bytes = self.total_bytes.saturating_add(added);
    }

    fn remove(&mut self, path: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(path)?;
        self.total_bytes = self.total_bytes.saturating_sub(removed.accounted_bytes());
        Some(removed)
    }
}

/// Durable map from content path to [`CacheEntry`].
pub struct PersistentIndex {
    file: PathBuf,
    clock: Arc<dyn Clock>,
    debounce: AtomicU64,
    state: Mutex<IndexState>,
    /// Serializes snapshot-and-write so an older snapshot never lands last.
    write_lock: Mutex<()>,
}

impl PersistentIndex {
    /// Create an empty index backed by `file`, without reading it.
    pub fn new(file: impl Into<PathBuf>, debounce: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            file: file.into(),
            clock,
            debounce: AtomicU64::new(duration_millis(debounce)),
            state: Mutex::new(IndexState::default()),
            write_lock: Mutex::new(()),
        }
    }

    /// Open the index at `file`, loading whatever valid state it holds.
    ///
    /// Never fails: a missing, unreadable or corrupt file yields an empty
    /// index, and invalid records are dropped individually.
    pub async fn load(file: impl Into<PathBuf>, debounce: Duration, clock: Arc<dyn Clock>) -> Self {
        let index = Self::new(file, debounce, clock);
        let stats = index.reload().await;
        tracing::info!(
            file = %index.file.display(),
            accepted = stats.accepted,
            dropped = stats.dropped,
            "loaded cache index"
        );
        index
    }

    /// Replace the in-memory state with the contents of the durable file.
    pub async fn reload(&self) -> LoadStats {
        let (entries, stats) = read_index_file(&self.file).await;
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.total_bytes = 0;
        for entry in entries {
            state.insert(entry);
        }
        state.dirty = false;
        stats
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn set_flush_debounce(&self, debounce: Duration) {
        self.debounce.store(duration_millis(debounce), Ordering::Relaxed);
    }

    fn flush_debounce(&self) -> Duration {
        Duration::from_millis(self.debounce.load(Ordering::Relaxed))
    }

    pub async fn get(&self, path: &str) -> Option<CacheEntry> {
        self.state.lock().await.entries.get(path).cloned()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.state.lock().await.entries.contains_key(path)
    }

    /// Insert or replace an entry, keeping the aggregate in step.
    pub async fn upsert(&self, entry: CacheEntry) {
        self.state.lock().await.insert(entry);
    }

    /// Refresh an already-tracked entry in place. Returns false if untracked.
    pub async fn refresh(&self, path: &str, now_ms: i64, ttl_ms: i64) -> bool {
        match self.state.lock().await.entries.get_mut(path) {
            Some(entry) => {
                entry.refresh(now_ms, ttl_ms);
                true
            }
            None => false,
        }
    }

    /// Record a resolved size for an entry. Returns false if untracked.
    pub async fn set_size(&self, path: &str, size_bytes: u64) -> bool {
        let mut state = self.state.lock().await;
        let Some(entry) = state.entries.get(path).cloned() else {
            return false;
        };
        state.insert(CacheEntry { size_bytes: Some(size_bytes), ..entry });
        true
    }

    pub async fn remove(&self, path: &str) -> Option<CacheEntry> {
        self.state.lock().await.remove(path)
    }

    /// Point-in-time copy of every entry.
    pub async fn snapshot(&self) -> Vec<CacheEntry> {
        self.state.lock().await.entries.values().cloned().collect()
    }

    pub async fn total_bytes(&self) -> u64 {
        self.state.lock().await.total_bytes
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_dirty(&self) -> bool {
        self.state.lock().await.dirty
    }

    /// Whether a debounced flush is armed.
    pub async fn flush_pending(&self) -> bool {
        self.state.lock().await.flush_timer.is_some()
    }

    /// Mark the index dirty and arm the debounce timer if it is not armed yet.
    pub async fn schedule_flush(self: &Arc<Self>) {
        let mut state = self.state.lock().await;
        state.dirty = true;
        if state.flush_timer.is_some() {
            return;
        }

        let index = Arc::clone(self);
        let delay = self.flush_debounce();
        state.flush_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            index.state.lock().await.flush_timer = None;
            if let Err(e) = index.flush_if_dirty().await {
                tracing::warn!(file = %index.file.display(), error = %e, "debounced index flush failed");
            }
        }));
    }

    /// Write the index if anything changed since the last successful write.
    pub async fn flush_if_dirty(&self) -> Result<bool, Error> {
        if !self.is_dirty().await {
            return Ok(false);
        }
        self.flush().await.map(|()| true)
    }

    /// Serialize every entry and rewrite the durable file.
    ///
    /// On failure the index stays dirty so the next flush retries.
    pub async fn flush(&self) -> Result<(), Error> {
        let _write = self.write_lock.lock().await;

        let document = {
            let mut state = self.state.lock().await;
            state.dirty = false;
            IndexDocument {
                version: INDEX_VERSION,
                entries: state.entries.iter().map(|(k, v)| (k.clone(), EntryRecord::from(v))).collect(),
                updated_at: self.clock.now_ms(),
            }
        };

        let result = match serde_json::to_vec_pretty(&document) {
            Ok(bytes) => write_atomically(&self.file, &bytes).await.map_err(Error::from),
            Err(e) => Err(Error::from(e)),
        };

        match result {
            Ok(()) => {
                tracing::debug!(file = %self.file.display(), entries = document.entries.len(), "flushed cache index");
                Ok(())
            }
            Err(e) => {
                self.state.lock().await.dirty = true;
                Err(e)
            }
        }
    }

    /// Cancel a pending debounced flush and write any unsaved state now.
    pub async fn shutdown(&self) {
        if let Some(timer) = self.state.lock().await.flush_timer.take() {
            timer.abort();
        }
        if let Err(e) = self.flush_if_dirty().await {
            tracing::warn!(file = %self.file.display(), error = %e, "final index flush failed");
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

async fn write_atomically(file: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = file.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = file.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, file).await
}

async fn read_index_file(file: &Path) -> (Vec<CacheEntry>, LoadStats) {
    let raw = match tokio::fs::read(file).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(file = %file.display(), "no cache index on disk; starting empty");
            return (Vec::new(), LoadStats::default());
        }
        Err(e) => {
            tracing::warn!(file = %file.display(), error = %e, "failed to read cache index; starting empty");
            return (Vec::new(), LoadStats::default());
        }
    };

    let document: Value = match serde_json::from_slice(&raw) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(file = %file.display(), error = %e, "corrupt cache index; starting empty");
            return (Vec::new(), LoadStats::default());
        }
    };

    if let Some(version) = document.get("version").and_then(Value::as_u64)
        && version != INDEX_VERSION
    {
        tracing::warn!(version, expected = INDEX_VERSION, "unexpected cache index version; loading best-effort");
    }

    let Some(records) = document.get("entries").and_then(Value::as_object) else {
        return (Vec::new(), LoadStats::default());
    };

    let mut stats = LoadStats::default();
    let mut entries = Vec::with_capacity(records.len());
    for (key, value) in records {
        match entry_from_record(key, value) {
            Ok(entry) => {
                stats.accepted += 1;
                entries.push(entry);
            }
            Err(reason) => {
                stats.dropped += 1;
                tracing::debug!(key = %key, %reason, "dropping invalid cache record");
            }
        }
    }

    (entries, stats)
}
