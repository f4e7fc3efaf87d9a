//! Cache introspection and maintenance tools.

pub mod entries;
pub mod stats;
pub mod sweep;

pub use entries::{CacheEntriesParams, entries_impl};
pub use stats::stats_impl;
pub use sweep::sweep_impl;
