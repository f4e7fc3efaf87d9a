//! Client code for edgepin.
//!
//! This crate provides the Kubo RPC client that backs the pin cache's
//! content-store primitives.

pub mod kubo;

pub use kubo::{KuboClient, KuboConfig, KuboError};
