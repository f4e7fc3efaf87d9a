//! Attachment point for hosts that watch gateway traffic.
//!
//! The host forwards every completed fetch through a [`FetchObserver`]; a
//! pump task picks out gateway content responses and touches them. The pump
//! stalls while every detached touch slot is busy, so a burst backs up into
//! the bounded queue and overflow is dropped there.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::coordinator::TouchCoordinator;
use super::path::ResponseMeta;

/// Pending events held before new ones are dropped.
pub const OBSERVER_QUEUE_CAPACITY: usize = 256;

const CANDIDATE_STATUSES: [u16; 3] = [200, 206, 304];

/// One completed fetch as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchEvent {
    pub url: String,
    pub method: String,
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl FetchEvent {
    pub fn get(url: impl Into<String>, status: u16) -> Self {
        Self { url: url.into(), method: "GET".to_string(), status, headers: Vec::new() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Successful `GET` of a gateway content URL.
    pub fn is_candidate(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
            && CANDIDATE_STATUSES.contains(&self.status)
            && (self.url.contains("/ipfs/") || self.url.contains("/ipns/"))
    }

    pub fn response_meta(&self) -> ResponseMeta {
        ResponseMeta::from_headers(self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// Cloneable handle the host uses to report completed fetches.
#[derive(Debug, Clone)]
pub struct FetchObserver {
    tx: mpsc::Sender<FetchEvent>,
}

impl FetchObserver {
    /// Queue `event` without waiting. Returns false if it was dropped.
    pub fn completed(&self, event: FetchEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                debug!(url = %event.url, "observer queue full; dropping fetch event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Create an observer and the pump task that drains it into `coordinator`.
pub fn spawn_observer(coordinator: Arc<TouchCoordinator>) -> (FetchObserver, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<FetchEvent>(OBSERVER_QUEUE_CAPACITY);

    let pump = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if !event.is_candidate() {
                continue;
            }
            let meta = event.response_meta();
            coordinator.touch_detached(event.url, meta).await;
        }
        debug!("fetch observer closed");
    });

    (FetchObserver { tx }, pump)
}
