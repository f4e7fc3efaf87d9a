//! Unified error types for edgepin.
//!
//! Store failures never surface here: they abandon the current admission or
//! eviction and are reported through [`TouchOutcome`](crate::TouchOutcome) and
//! [`SweepReport`](crate::SweepReport). What is left is persistence, where a
//! failure leaves the in-memory index authoritative until the next flush.

/// Unified error types for the edgepin core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading or writing the durable index failed.
    #[error("PERSIST_ERROR: {0}")]
    Persist(#[from] std::io::Error),

    /// The durable index could not be encoded.
    #[error("PERSIST_ERROR: encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: Error = io.into();
        assert!(matches!(err, Error::Persist(_)));
        assert!(err.to_string().starts_with("PERSIST_ERROR"));
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn test_encode_error_display() {
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json.into();
        assert!(err.to_string().starts_with("PERSIST_ERROR: encode failed"));
    }
}
