//! Kubo RPC response bodies.
//!
//! Kubo answers in PascalCase JSON. Only the fields the cache reads are
//! modelled; everything else is ignored.

use std::collections::HashMap;

use serde::Deserialize;

/// Body of `pin/add` and `pin/rm`.
#[derive(Debug, Deserialize)]
pub struct PinsResponse {
    #[serde(rename = "Pins", default)]
    pub pins: Vec<String>,
}

/// Body of `pin/ls`.
#[derive(Debug, Deserialize)]
pub struct PinLsResponse {
    #[serde(rename = "Keys", default)]
    pub keys: HashMap<String, PinInfo>,
}

#[derive(Debug, Deserialize)]
pub struct PinInfo {
    #[serde(rename = "Type", default)]
    pub pin_type: String,
}

/// Body of `files/stat`.
#[derive(Debug, Deserialize)]
pub struct FilesStat {
    #[serde(rename = "Hash", default)]
    pub hash: String,
    #[serde(rename = "CumulativeSize")]
    pub cumulative_size: u64,
}

/// Body of `name/resolve`.
#[derive(Debug, Deserialize)]
pub struct NameResolve {
    #[serde(rename = "Path")]
    pub path: String,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Code", default)]
    pub code: i64,
}

/// Best-effort message from an error response body.
pub fn error_message(body: &[u8], status: u16) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ApiErrorBody>(body) {
        return parsed.message;
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() { format!("HTTP {status}") } else { text.to_string() }
}
