//! Content-store boundary.
//!
//! The cache never reaches the store directly: every pin, unpin, stat and
//! name resolution goes through [`ContentStore`], and every call is treated
//! as fallible and possibly slow. [`BoundedStore`] applies the per-call
//! timeout so the coordinator never waits on the store indefinitely.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

#[cfg(test)]
pub(crate) mod testing;

/// Pin listing mode.
///
/// Only recursive pins are ever created or listed by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Recursive,
}

impl PinMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PinMode::Recursive => "recursive",
        }
    }
}

/// Errors reported by a content store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The path is not pinned (or only pinned indirectly).
    #[error("not pinned: {0}")]
    NotPinned(String),

    /// The call did not complete within the bounded wait.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the operation.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The store answered with something unparseable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    /// Classify a raw error message from the store.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_not_pinned_message(&message) { StoreError::NotPinned(message) } else { StoreError::Rejected(message) }
    }

    pub fn is_not_pinned(&self) -> bool {
        matches!(self, StoreError::NotPinned(_))
    }
}

/// Known "not pinned" phrasings, matched case-insensitively as substrings.
///
/// Covers "not pinned", "is not pinned" and "not pinned or pinned indirectly".
pub fn is_not_pinned_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("not pinned")
}

/// Primitives the cache consumes from the content store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Pin `path` recursively.
    async fn pin_add(&self, path: &str) -> Result<(), StoreError>;

    /// Whether `path` is pinned under `mode`.
    async fn pin_ls(&self, path: &str, mode: PinMode) -> Result<bool, StoreError>;

    /// Remove the recursive pin on `path`.
    async fn pin_rm(&self, path: &str) -> Result<(), StoreError>;

    /// Cumulative size of the DAG under `path`, in bytes.
    async fn object_stat(&self, path: &str) -> Result<u64, StoreError>;

    /// Resolve a mutable name to its current content path (e.g. `/ipfs/<cid>`).
    async fn resolve_name(&self, name: &str) -> Result<String, StoreError>;
}

/// Result of an unpin that reached its goal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpinOutcome {
    Removed,
    /// The store reported the path as not pinned.
    AlreadyAbsent,
}

/// Unpin `path`, treating "not pinned" as success.
pub async fn unpin(store: &dyn ContentStore, path: &str) -> Result<UnpinOutcome, StoreError> {
    match store.pin_rm(path).await {
        Ok(()) => Ok(UnpinOutcome::Removed),
        Err(StoreError::NotPinned(_)) => Ok(UnpinOutcome::AlreadyAbsent),
        Err(e) => Err(e),
    }
}

/// A store wrapper that bounds every call with a timeout.
#[derive(Clone)]
pub struct BoundedStore {
    inner: Arc<dyn ContentStore>,
    timeout: Duration,
}

impl BoundedStore {
    pub fn new(inner: Arc<dyn ContentStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self, fut: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl ContentStore for BoundedStore {
    async fn pin_add(&self, path: &str) -> Result<(), StoreError> {
        self.bounded(self.inner.pin_add(path)).await
    }

    async fn pin_ls(&self, path: &str, mode: PinMode) -> Result<bool, StoreError> {
        self.bounded(self.inner.pin_ls(path, mode)).await
    }

    async fn pin_rm(&self, path: &str) -> Result<(), StoreError> {
        self.bounded(self.inner.pin_rm(path)).await
    }

    async fn object_stat(&self, path: &str) -> Result<u64, StoreError> {
        self.bounded(self.inner.object_stat(path)).await
    }

    async fn resolve_name(&self, name: &str) -> Result<String, StoreError> {
        self.bounded(self.inner.resolve_name(name)).await
    }
}
