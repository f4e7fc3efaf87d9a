//! Short-lived memo of mutable-name resolutions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::path::{ContentPath, Namespace, parse_gateway_path};
use crate::clock::Clock;
use crate::store::ContentStore;

#[derive(Debug, Clone)]
struct ResolvedName {
    cid: String,
    resolved_at: i64,
}

/// Maps a mutable name to the content address it pointed at recently.
///
/// Independent of the main cache TTL; entries older than `ttl` are
/// re-resolved through the store.
pub struct NameResolutionCache {
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, ResolvedName>>,
}

impl NameResolutionCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Current content address for `name`, or `None` if it cannot be resolved.
    pub async fn resolve(&self, name: &str, store: &dyn ContentStore) -> Option<String> {
        let now = self.clock.now_ms();
        {
            let entries = self.entries.lock().await;
            if let Some(hit) = entries.get(name)
                && now.saturating_sub(hit.resolved_at) < self.ttl_ms
            {
                return Some(hit.cid.clone());
            }
        }

        let resolved = match store.resolve_name(name).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::debug!(mutable_name = %name, error = %e, "name resolution failed");
                return None;
            }
        };

        let cid = parse_gateway_path(&resolved).filter(|p| p.namespace == Namespace::Ipfs).map(|p| p.id)?;

        let mut entries = self.entries.lock().await;
        entries.retain(|_, hit| now.saturating_sub(hit.resolved_at) < self.ttl_ms);
        entries.insert(name.to_string(), ResolvedName { cid: cid.clone(), resolved_at: now });
        Some(cid)
    }

    /// Rewrite a mutable-name path onto its current content address.
    pub async fn resolve_path(&self, path: &ContentPath, store: &dyn ContentStore) -> Option<ContentPath> {
        if !path.is_mutable() {
            return Some(path.clone());
        }
        let cid = self.resolve(&path.id, store).await?;
        Some(path.with_content_id(&cid))
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
