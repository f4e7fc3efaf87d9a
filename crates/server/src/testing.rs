//! In-memory store and cache fixtures for tool tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use edgepin_core::{CacheSettings, ContentStore, PinCache, PinMode, StoreError};

pub const CID: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

#[derive(Default)]
pub struct MemoryStore {
    pinned: Mutex<HashSet<String>>,
    sizes: Mutex<HashMap<String, u64>>,
}

impl MemoryStore {
    pub fn with_sizes(sizes: &[(&str, u64)]) -> Self {
        let store = Self::default();
        store
            .sizes
            .lock()
            .unwrap()
            .extend(sizes.iter().map(|(path, size)| (path.to_string(), *size)));
        store
    }

    pub fn is_pinned(&self, path: &str) -> bool {
        self.pinned.lock().unwrap().contains(path)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn pin_add(&self, path: &str) -> Result<(), StoreError> {
        self.pinned.lock().unwrap().insert(path.to_string());
        Ok(())
    }

    async fn pin_ls(&self, path: &str, _mode: PinMode) -> Result<bool, StoreError> {
        Ok(self.is_pinned(path))
    }

    async fn pin_rm(&self, path: &str) -> Result<(), StoreError> {
        if self.pinned.lock().unwrap().remove(path) {
            Ok(())
        } else {
            Err(StoreError::from_message("not pinned or pinned indirectly"))
        }
    }

    async fn object_stat(&self, path: &str) -> Result<u64, StoreError> {
        self.sizes
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .ok_or_else(|| StoreError::Rejected(format!("no size for {path}")))
    }

    async fn resolve_name(&self, name: &str) -> Result<String, StoreError> {
        Err(StoreError::Rejected(format!("could not resolve name {name}")))
    }
}

pub fn content_path(rest: &str) -> String {
    format!("/ipfs/{CID}/{rest}")
}

pub fn gateway_url(rest: &str) -> String {
    format!("http://127.0.0.1:8080{}", content_path(rest))
}

/// A started cache over `store`, with its temp dir kept alive alongside.
pub async fn cache_with(store: Arc<MemoryStore>, settings: CacheSettings) -> (tempfile::TempDir, Arc<PinCache>) {
    let dir = tempfile::tempdir().unwrap();
    let cache = PinCache::start(settings, dir.path().join("index.json"), store).await;
    (dir, Arc::new(cache))
}

/// Decode the JSON text body of a tool result.
pub fn result_json(result: &rmcp::model::CallToolResult) -> serde_json::Value {
    let text = result
        .content
        .first()
        .and_then(|c| c.as_text())
        .map(|c| c.text.clone())
        .unwrap();
    serde_json::from_str(&text).unwrap()
}
