//! MCP tool implementations.
//!
//! This module contains all tools exposed by the edgepin server.

pub mod cache;
pub mod observe;
pub mod touch;

pub use observe::{CacheObserveParams, observe_impl};
pub use touch::{CacheTouchParams, touch_impl};
