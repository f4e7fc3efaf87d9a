//! Content-path normalization for observed gateway traffic.
//!
//! ### Path families
//! - `/ipfs/<cid>[/rest...]`: immutable content address, cacheable
//! - `/ipns/<name>[/rest...]`: mutable name, resolved before caching
//!
//! ### Normalization
//! - A store-reported path (`x-ipfs-path` response header) wins over the URL
//! - Query and fragment are dropped, rest segments are percent-decoded
//! - A trailing slash is preserved since it marks a directory listing

use std::fmt;

use percent_encoding::percent_decode_str;

/// Longest path the cache will consider pinning.
pub const MAX_CACHEABLE_LEN: usize = 2048;

/// Longest input accepted for parsing at all.
const MAX_INPUT_LEN: usize = 4096;

/// Response header carrying the store's canonical path for a gateway response.
pub const CONTENT_PATH_HEADER: &str = "x-ipfs-path";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Ipfs,
    Ipns,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Ipfs => "ipfs",
            Namespace::Ipns => "ipns",
        }
    }

    fn parse(segment: &str) -> Option<Self> {
        match segment.to_ascii_lowercase().as_str() {
            "ipfs" => Some(Namespace::Ipfs),
            "ipns" => Some(Namespace::Ipns),
            _ => None,
        }
    }
}

/// A parsed `/<namespace>/<id><rest>` path.
///
/// `rest` is empty or starts with `/`; it ends with `/` when the input
/// path had a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentPath {
    pub namespace: Namespace,
    pub id: String,
    pub rest: String,
}

impl ContentPath {
    pub fn is_mutable(&self) -> bool {
        self.namespace == Namespace::Ipns
    }

    /// The same sub-path re-rooted at an immutable content address.
    pub fn with_content_id(&self, cid: &str) -> Self {
        Self { namespace: Namespace::Ipfs, id: cid.to_string(), rest: self.rest.clone() }
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}{}", self.namespace.as_str(), self.id, self.rest)
    }
}

/// Metadata from the completed response that observed a locator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    /// Canonical path reported by the store, if any.
    pub content_path: Option<String>,
}

impl ResponseMeta {
    pub fn with_content_path(path: impl Into<String>) -> Self {
        Self { content_path: Some(path.into()) }
    }

    /// Pick the store-reported path out of response headers (case-insensitive name).
    pub fn from_headers<'a>(headers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let content_path = headers
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(CONTENT_PATH_HEADER))
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Self { content_path }
    }
}

fn decode_segment(segment: &str) -> String {
    match percent_decode_str(segment).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}

/// Parse a gateway-style path into its namespace, identifier and rest.
///
/// Returns `None` for anything that is not `/ipfs/...` or `/ipns/...`.
pub fn parse_gateway_path(input: &str) -> Option<ContentPath> {
    let raw = input.trim();
    if raw.is_empty() || raw.len() > MAX_INPUT_LEN {
        return None;
    }

    let base = raw.split(['?', '#']).next().unwrap_or_default();
    let mut parts = base.strip_prefix('/').unwrap_or(base).split('/');

    let namespace = Namespace::parse(parts.next()?)?;
    let id = parts.next()?.trim();
    if id.is_empty() {
        return None;
    }

    let segments: Vec<String> = parts.map(decode_segment).collect();
    let trailing_slash = base.ends_with('/');

    let mut rest = if segments.is_empty() { String::new() } else { format!("/{}", segments.join("/")) };
    if trailing_slash && !rest.ends_with('/') {
        rest.push('/');
    }

    Some(ContentPath { namespace, id: id.to_string(), rest })
}

/// Turn an observed locator into a canonical content path.
///
/// Prefers the store-reported path from `meta`; otherwise derives the path
/// from the URL's path segments.
pub fn normalize(raw_url: &str, meta: &ResponseMeta) -> Option<ContentPath> {
    if let Some(hinted) = meta.content_path.as_deref().and_then(parse_gateway_path) {
        return Some(hinted);
    }

    let url = url::Url::parse(raw_url.trim()).ok()?;
    parse_gateway_path(url.path())
}

/// Whether `path` may be pinned by the cache.
///
/// Only content-address paths qualify. A bare `/ipfs/<cid>` is treated as a
/// single file object; `/ipfs/<cid>/` and any sub-path ending in `/` denote
/// directories, which are never pinned blindly.
pub fn is_cacheable(path: &str) -> bool {
    if path.len() > MAX_CACHEABLE_LEN {
        return false;
    }
    let Some(rest) = path.strip_prefix("/ipfs/") else {
        return false;
    };

    match rest.split_once('/') {
        None => !rest.is_empty(),
        Some((cid, sub)) => !cid.is_empty() && !sub.is_empty() && !path.ends_with('/'),
    }
}
