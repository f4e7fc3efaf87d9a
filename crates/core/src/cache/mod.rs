//! Time-bounded pin cache for content fetched through a gateway.
//!
//! Observed fetches are normalized to canonical content paths, pinned in the
//! content store on first sight, and tracked in a JSON index with their
//! size and TTL. Maintenance passes unpin what has expired or no longer
//! fits the configured limits.

pub mod coordinator;
pub mod entry;
pub mod index;
pub mod maintenance;
pub mod names;
pub mod observer;
pub mod path;
pub mod service;

pub use coordinator::{TouchCoordinator, TouchOutcome};
pub use entry::{CacheEntry, EntryRecord, RecordError};
pub use index::{LoadStats, PersistentIndex};
pub use maintenance::{MaintenanceScheduler, SweepReport};
pub use names::NameResolutionCache;
pub use observer::{FetchEvent, FetchObserver};
pub use path::{ContentPath, Namespace, ResponseMeta, is_cacheable, normalize};
pub use service::{CacheStats, PinCache};
