//! Kubo RPC client error types.

use std::sync::Arc;
use std::time::Duration;

use edgepin_core::StoreError;

/// Errors from the Kubo RPC client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KuboError {
    /// The configured API base is not a usable http(s) URL.
    #[error("invalid API base: {0}")]
    InvalidApiBase(String),

    /// Request timeout.
    #[error("request timeout after {0:?}")]
    Timeout(Duration),

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// The node answered with an error body.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl KuboError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() { KuboError::Timeout(timeout) } else { KuboError::Network(Arc::new(err)) }
    }

    /// The node reported that the path is not pinned.
    pub fn is_not_pinned(&self) -> bool {
        matches!(self, KuboError::Api { message, .. } if edgepin_core::store::is_not_pinned_message(message))
    }
}

impl From<KuboError> for StoreError {
    fn from(err: KuboError) -> Self {
        match err {
            KuboError::Timeout(after) => StoreError::Timeout(after),
            KuboError::Network(e) => StoreError::Unavailable(e.to_string()),
            KuboError::InvalidApiBase(reason) => StoreError::Unavailable(reason),
            KuboError::Api { message, .. } => StoreError::from_message(message),
            KuboError::Parse(reason) => StoreError::InvalidResponse(reason),
        }
    }
}
