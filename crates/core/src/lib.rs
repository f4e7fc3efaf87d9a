//! Core types and shared functionality for edgepin.
//!
//! This crate provides:
//! - Content-path normalization for observed gateway traffic
//! - A persistent, debounced JSON index of pinned entries
//! - The touch coordinator and maintenance scheduler
//! - The content-store trait the coordinator drives
//! - Configuration structures and the unified error type

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod store;

pub use cache::{
    CacheEntry, CacheStats, FetchEvent, FetchObserver, PinCache, ResponseMeta, SweepReport, TouchOutcome,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, CacheSettings, ConfigError};
pub use error::Error;
pub use store::{ContentStore, PinMode, StoreError};
