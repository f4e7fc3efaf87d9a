//! API base URL normalization.

use super::error::KuboError;

/// RPC path prefix appended to the API base.
pub const RPC_PREFIX: &str = "/api/v0";

/// Normalize a configured API base into `scheme://host[:port][/prefix]`.
///
/// Normalization steps:
/// 1. Trim whitespace; default scheme to `http://` if missing
/// 2. Reject schemes other than http/https
/// 3. Drop query and fragment
/// 4. Strip trailing slashes and a trailing `/api/v0`
pub fn normalize_api_base(input: &str) -> Result<String, KuboError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(KuboError::InvalidApiBase("empty URL".into()));
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("http://{trimmed}") };
    let mut parsed = url::Url::parse(&url_str).map_err(|e| KuboError::InvalidApiBase(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(KuboError::InvalidApiBase(format!("unsupported scheme: {scheme}"))),
    }
    if parsed.host_str().is_none() {
        return Err(KuboError::InvalidApiBase("missing host".into()));
    }

    parsed.set_query(None);
    parsed.set_fragment(None);

    let mut base = parsed.as_str().trim_end_matches('/').to_string();
    if let Some(stripped) = base.strip_suffix(RPC_PREFIX) {
        base = stripped.trim_end_matches('/').to_string();
    }
    Ok(base)
}

/// Full URL of an RPC command such as `pin/add`.
pub fn endpoint(base: &str, command: &str) -> String {
    format!("{base}{RPC_PREFIX}/{command}")
}
