//! Cache entries and their persisted record shape.
//!
//! Records are read leniently: each one goes through [`entry_from_record`],
//! which accepts legacy field names and rejects (rather than guesses) when a
//! required field is missing or malformed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tracked content path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Canonical content path; the index key.
    pub path: String,
    /// Epoch ms of the last (re-)admission; TTL anchor.
    pub pinned_at: i64,
    /// Epoch ms of the last touch; LRU order only.
    pub last_access: i64,
    pub ttl_ms: i64,
    /// Cumulative size, `None` while unresolved.
    pub size_bytes: Option<u64>,
}

impl CacheEntry {
    pub fn new(path: impl Into<String>, now_ms: i64, ttl_ms: i64, size_bytes: u64) -> Self {
        Self { path: path.into(), pinned_at: now_ms, last_access: now_ms, ttl_ms, size_bytes: Some(size_bytes) }
    }

    pub fn expires_at(&self) -> i64 {
        self.pinned_at.saturating_add(self.ttl_ms)
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at()
    }

    /// Re-admit in place: new TTL anchor, access time and TTL.
    pub fn refresh(&mut self, now_ms: i64, ttl_ms: i64) {
        self.pinned_at = now_ms;
        self.last_access = now_ms;
        self.ttl_ms = ttl_ms;
    }

    /// Bytes this entry contributes to the aggregate.
    pub fn accounted_bytes(&self) -> u64 {
        self.size_bytes.unwrap_or(0)
    }
}

/// On-disk shape of one entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    pub path: String,
    pub pinned_at: i64,
    pub last_access: i64,
    pub ttl_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl From<&CacheEntry> for EntryRecord {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            path: entry.path.clone(),
            pinned_at: entry.pinned_at,
            last_access: entry.last_access,
            ttl_ms: entry.ttl_ms,
            size_bytes: entry.size_bytes,
        }
    }
}

/// Why a persisted record was dropped at load time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record is not an object")]
    NotAnObject,
    #[error("empty path")]
    EmptyPath,
    #[error("field {0} missing or not a positive number")]
    InvalidField(&'static str),
    #[error("size is not numeric")]
    InvalidSize,
}

fn positive_millis(record: &serde_json::Map<String, Value>, field: &'static str) -> Result<i64, RecordError> {
    let value = record.get(field).and_then(Value::as_f64).ok_or(RecordError::InvalidField(field))?;
    if !value.is_finite() || value < 1.0 || value > i64::MAX as f64 {
        return Err(RecordError::InvalidField(field));
    }
    Ok(value.floor() as i64)
}

fn size_field(record: &serde_json::Map<String, Value>) -> Result<Option<u64>, RecordError> {
    let raw = match record.get("sizeBytes").or_else(|| record.get("size_bytes")) {
        None | Some(Value::Null) => return Ok(None),
        Some(raw) => raw,
    };
    let size = raw.as_f64().ok_or(RecordError::InvalidSize)?;
    if !size.is_finite() {
        return Err(RecordError::InvalidSize);
    }
    // Negative sizes are the legacy "unknown" sentinel.
    if size < 0.0 { Ok(None) } else { Ok(Some(size.floor() as u64)) }
}

/// Validate and normalize one persisted record stored under `key`.
pub fn entry_from_record(key: &str, value: &Value) -> Result<CacheEntry, RecordError> {
    let record = value.as_object().ok_or(RecordError::NotAnObject)?;

    let path = record
        .get("path")
        .or_else(|| record.get("ipfsPath"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| key.trim());
    if path.is_empty() {
        return Err(RecordError::EmptyPath);
    }

    let pinned_at = positive_millis(record, "pinnedAt")?;
    let last_access = positive_millis(record, "lastAccess")?;
    let ttl_ms = positive_millis(record, "ttlMs")?;
    let size_bytes = size_field(record)?;

    Ok(CacheEntry { path: path.to_string(), pinned_at, last_access, ttl_ms, size_bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expiry_is_strictly_after_ttl() {
        let entry = CacheEntry::new("/ipfs/QmA", 1_000, 500, 10);
        assert_eq!(entry.expires_at(), 1_500);
        assert!(!entry.is_expired(1_500));
        assert!(entry.is_expired(1_501));
    }

    #[test]
    fn test_refresh_moves_anchor_and_access() {
        let mut entry = CacheEntry::new("/ipfs/QmA", 1_000, 500, 10);
        entry.refresh(2_000, 900);
        assert_eq!(entry.pinned_at, 2_000);
        assert_eq!(entry.last_access, 2_000);
        assert_eq!(entry.ttl_ms, 900);
        assert_eq!(entry.size_bytes, Some(10));
    }

    #[test]
    fn test_record_roundtrip_fields() {
        let entry = CacheEntry::new("/ipfs/QmA/file", 1_000, 500, 42);
        let value = serde_json::to_value(EntryRecord::from(&entry)).unwrap();
        assert_eq!(value, json!({"path": "/ipfs/QmA/file", "pinnedAt": 1000, "lastAccess": 1000, "ttlMs": 500, "sizeBytes": 42}));
        assert_eq!(entry_from_record("/ipfs/QmA/file", &value).unwrap(), entry);
    }

    #[test]
    fn test_unknown_size_not_serialized() {
        let entry = CacheEntry { size_bytes: None, ..CacheEntry::new("/ipfs/QmA", 1, 1, 0) };
        let value = serde_json::to_value(EntryRecord::from(&entry)).unwrap();
        assert!(value.get("sizeBytes").is_none());
    }

    #[test]
    fn test_legacy_field_names() {
        let value = json!({"ipfsPath": "/ipfs/QmOld", "pinnedAt": 10, "lastAccess": 11, "ttlMs": 5, "size_bytes": 7});
        let entry = entry_from_record("ignored", &value).unwrap();
        assert_eq!(entry.path, "/ipfs/QmOld");
        assert_eq!(entry.size_bytes, Some(7));
    }

    #[test]
    fn test_path_falls_back_to_key() {
        let value = json!({"pinnedAt": 10, "lastAccess": 11, "ttlMs": 5, "sizeBytes": 1});
        let entry = entry_from_record("/ipfs/QmKey", &value).unwrap();
        assert_eq!(entry.path, "/ipfs/QmKey");
    }

    #[test]
    fn test_missing_or_negative_size_is_unknown() {
        let value = json!({"path": "/ipfs/Qm", "pinnedAt": 10, "lastAccess": 11, "ttlMs": 5});
        assert_eq!(entry_from_record("k", &value).unwrap().size_bytes, None);

        let value = json!({"path": "/ipfs/Qm", "pinnedAt": 10, "lastAccess": 11, "ttlMs": 5, "sizeBytes": -1});
        assert_eq!(entry_from_record("k", &value).unwrap().size_bytes, None);
    }

    #[test]
    fn test_fractional_numbers_are_floored() {
        let value = json!({"path": "/ipfs/Qm", "pinnedAt": 10.7, "lastAccess": 11.2, "ttlMs": 5.9, "sizeBytes": 3.5});
        let entry = entry_from_record("k", &value).unwrap();
        assert_eq!((entry.pinned_at, entry.last_access, entry.ttl_ms, entry.size_bytes), (10, 11, 5, Some(3)));
    }

    #[test]
    fn test_rejects_invalid_records() {
        let missing_ttl = json!({"path": "/ipfs/Qm", "pinnedAt": 10, "lastAccess": 11, "sizeBytes": 1});
        assert_eq!(entry_from_record("k", &missing_ttl), Err(RecordError::InvalidField("ttlMs")));

        let zero_pinned = json!({"path": "/ipfs/Qm", "pinnedAt": 0, "lastAccess": 11, "ttlMs": 5});
        assert_eq!(entry_from_record("k", &zero_pinned), Err(RecordError::InvalidField("pinnedAt")));

        let string_size = json!({"path": "/ipfs/Qm", "pinnedAt": 10, "lastAccess": 11, "ttlMs": 5, "sizeBytes": "big"});
        assert_eq!(entry_from_record("k", &string_size), Err(RecordError::InvalidSize));

        let empty_path = json!({"path": "  ", "pinnedAt": 10, "lastAccess": 11, "ttlMs": 5});
        assert_eq!(entry_from_record("", &empty_path), Err(RecordError::EmptyPath));

        assert_eq!(entry_from_record("k", &json!(42)), Err(RecordError::NotAnObject));
    }
}
