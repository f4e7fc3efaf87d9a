//! In-memory content store for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{ContentStore, PinMode, StoreError};

#[derive(Default)]
struct FakeState {
    pinned: HashSet<String>,
    sizes: HashMap<String, u64>,
    names: HashMap<String, String>,
    pin_add_calls: Vec<String>,
    pin_rm_calls: Vec<String>,
    stat_calls: Vec<String>,
    resolve_calls: Vec<String>,
    fail_pin: bool,
    fail_unpin: bool,
    fail_pin_ls: bool,
    latency: Duration,
}

/// Test double that records every call and can be told to fail.
#[derive(Default)]
pub(crate) struct FakeStore {
    state: Mutex<FakeState>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_pin(&self, path: &str) {
        self.state.lock().unwrap().pinned.insert(path.to_string());
    }

    pub fn is_pinned(&self, path: &str) -> bool {
        self.state.lock().unwrap().pinned.contains(path)
    }

    pub fn set_size(&self, path: &str, size: u64) {
        self.state.lock().unwrap().sizes.insert(path.to_string(), size);
    }

    pub fn set_name(&self, name: &str, target: &str) {
        self.state.lock().unwrap().names.insert(name.to_string(), target.to_string());
    }

    pub fn fail_pin(&self, fail: bool) {
        self.state.lock().unwrap().fail_pin = fail;
    }

    pub fn fail_unpin(&self, fail: bool) {
        self.state.lock().unwrap().fail_unpin = fail;
    }

    pub fn fail_pin_ls(&self, fail: bool) {
        self.state.lock().unwrap().fail_pin_ls = fail;
    }

    /// Delay applied to `pin_add` and `object_stat`.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().unwrap().latency = latency;
    }

    pub fn pin_add_calls(&self, path: &str) -> usize {
        self.state.lock().unwrap().pin_add_calls.iter().filter(|p| *p == path).count()
    }

    pub fn total_pin_add_calls(&self) -> usize {
        self.state.lock().unwrap().pin_add_calls.len()
    }

    pub fn pin_rm_calls(&self, path: &str) -> usize {
        self.state.lock().unwrap().pin_rm_calls.iter().filter(|p| *p == path).count()
    }

    pub fn stat_calls(&self) -> usize {
        self.state.lock().unwrap().stat_calls.len()
    }

    pub fn resolve_calls(&self) -> usize {
        self.state.lock().unwrap().resolve_calls.len()
    }

    async fn delay(&self) {
        let latency = self.state.lock().unwrap().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ContentStore for FakeStore {
    async fn pin_add(&self, path: &str) -> Result<(), StoreError> {
        self.state.lock().unwrap().pin_add_calls.push(path.to_string());
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        if state.fail_pin {
            return Err(StoreError::Rejected("pin add failed".into()));
        }
        state.pinned.insert(path.to_string());
        Ok(())
    }

    async fn pin_ls(&self, path: &str, _mode: PinMode) -> Result<bool, StoreError> {
        let state = self.state.lock().unwrap();
        if state.fail_pin_ls {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(state.pinned.contains(path))
    }

    async fn pin_rm(&self, path: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.pin_rm_calls.push(path.to_string());
        if state.fail_unpin {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        if state.pinned.remove(path) {
            Ok(())
        } else {
            Err(StoreError::from_message("not pinned or pinned indirectly"))
        }
    }

    async fn object_stat(&self, path: &str) -> Result<u64, StoreError> {
        self.state.lock().unwrap().stat_calls.push(path.to_string());
        self.delay().await;
        let state = self.state.lock().unwrap();
        state
            .sizes
            .get(path)
            .copied()
            .ok_or_else(|| StoreError::Rejected(format!("no size for {path}")))
    }

    async fn resolve_name(&self, name: &str) -> Result<String, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.resolve_calls.push(name.to_string());
        state
            .names
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::Rejected(format!("could not resolve name {name}")))
    }
}
