//! Kubo RPC API client.
//!
//! Implements the content-store primitives the pin cache consumes on top of
//! a Kubo node's HTTP RPC API.
//!
//! ### Endpoints
//!
//! - `pin/add?arg=<path>&recursive=true`
//! - `pin/ls?arg=<path>&type=<mode>`: a "not pinned" error answers `false`
//! - `pin/rm?arg=<path>&recursive=true`
//! - `files/stat?arg=<path>`: reads `CumulativeSize`
//! - `name/resolve?arg=<name>&recursive=true`: reads `Path`
//!
//! Every command is a `POST`. Non-2xx answers carry `{"Message", "Code", "Type"}`.

pub mod error;
pub mod response;
pub mod url;

pub use error::KuboError;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use edgepin_core::{AppConfig, ContentStore, PinMode, StoreError};
use reqwest::header;
use serde::de::DeserializeOwned;

/// Default API base of a local node.
const DEFAULT_API_BASE: &str = "http://127.0.0.1:5001";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "edgepin/0.1";

/// Kubo client configuration.
#[derive(Debug, Clone)]
pub struct KuboConfig {
    /// Node API base (default: http://127.0.0.1:5001).
    pub api_base: String,
    /// Per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for KuboConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl From<&AppConfig> for KuboConfig {
    fn from(config: &AppConfig) -> Self {
        Self { api_base: config.api_base.clone(), timeout: config.store_timeout(), user_agent: config.user_agent.clone() }
    }
}

/// Kubo RPC API client.
#[derive(Debug, Clone)]
pub struct KuboClient {
    http: reqwest::Client,
    base: String,
    config: KuboConfig,
}

impl KuboClient {
    pub fn new(config: KuboConfig) -> Result<Self, KuboError> {
        let base = url::normalize_api_base(&config.api_base)?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| KuboError::Network(std::sync::Arc::new(e)))?;

        Ok(Self { http, base, config })
    }

    /// Normalized API base this client talks to.
    pub fn api_base(&self) -> &str {
        &self.base
    }

    /// Issue one RPC command and decode its JSON body.
    async fn call<T: DeserializeOwned>(&self, command: &str, query: &[(&str, &str)]) -> Result<T, KuboError> {
        let start = Instant::now();
        let url = url::endpoint(&self.base, command);

        let http_response = self
            .http
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| KuboError::from_reqwest(e, self.config.timeout))?;

        let status = http_response.status();
        let bytes = http_response
            .bytes()
            .await
            .map_err(|e| KuboError::from_reqwest(e, self.config.timeout))?;

        tracing::debug!(command, status = status.as_u16(), elapsed_ms = start.elapsed().as_millis() as u64, "kubo call");

        if !status.is_success() {
            return Err(KuboError::Api {
                status: status.as_u16(),
                message: response::error_message(&bytes, status.as_u16()),
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| KuboError::Parse(format!("{command}: {e}")))
    }

    pub async fn pin_add(&self, path: &str) -> Result<Vec<String>, KuboError> {
        let body: response::PinsResponse = self.call("pin/add", &[("arg", path), ("recursive", "true")]).await?;
        Ok(body.pins)
    }

    /// Whether `path` is pinned with `mode`.
    pub async fn pin_ls(&self, path: &str, mode: PinMode) -> Result<bool, KuboError> {
        match self.call::<response::PinLsResponse>("pin/ls", &[("arg", path), ("type", mode.as_str())]).await {
            Ok(body) => Ok(!body.keys.is_empty()),
            Err(e) if e.is_not_pinned() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn pin_rm(&self, path: &str) -> Result<(), KuboError> {
        self.call::<response::PinsResponse>("pin/rm", &[("arg", path), ("recursive", "true")])
            .await
            .map(|_| ())
    }

    /// Cumulative size of the object at `path` in bytes.
    pub async fn files_stat(&self, path: &str) -> Result<u64, KuboError> {
        let body: response::FilesStat = self.call("files/stat", &[("arg", path)]).await?;
        Ok(body.cumulative_size)
    }

    /// Resolve a mutable name to the path it currently points at.
    pub async fn name_resolve(&self, name: &str) -> Result<String, KuboError> {
        let body: response::NameResolve = self.call("name/resolve", &[("arg", name), ("recursive", "true")]).await?;
        Ok(body.path)
    }
}

#[async_trait]
impl ContentStore for KuboClient {
    async fn pin_add(&self, path: &str) -> Result<(), StoreError> {
        KuboClient::pin_add(self, path).await.map(|_| ()).map_err(StoreError::from)
    }

    async fn pin_ls(&self, path: &str, mode: PinMode) -> Result<bool, StoreError> {
        KuboClient::pin_ls(self, path, mode).await.map_err(StoreError::from)
    }

    async fn pin_rm(&self, path: &str) -> Result<(), StoreError> {
        KuboClient::pin_rm(self, path).await.map_err(StoreError::from)
    }

    async fn object_stat(&self, path: &str) -> Result<u64, StoreError> {
        self.files_stat(path).await.map_err(StoreError::from)
    }

    async fn resolve_name(&self, name: &str) -> Result<String, StoreError> {
        self.name_resolve(name).await.map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned response and hand back the request head it received.
    async fn serve_once(status: u16, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut read = 0;
            while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf[read..]).await.unwrap();
                if n == 0 {
                    break;
                }
                read += n;
            }
            let response = format!(
                "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf[..read]).into_owned()
        });

        (format!("http://{addr}"), handle)
    }

    fn client(api_base: String) -> KuboClient {
        KuboClient::new(KuboConfig { api_base, timeout: Duration::from_secs(5), ..Default::default() }).unwrap()
    }

    #[test]
    fn test_new_normalizes_api_base() {
        let client = client("http://127.0.0.1:5001/api/v0/".into());
        assert_eq!(client.api_base(), "http://127.0.0.1:5001");
    }

    #[test]
    fn test_new_rejects_bad_api_base() {
        let result = KuboClient::new(KuboConfig { api_base: "ftp://node".into(), ..Default::default() });
        assert!(matches!(result, Err(KuboError::InvalidApiBase(_))));
    }

    #[tokio::test]
    async fn test_files_stat_reads_cumulative_size() {
        let (base, server) = serve_once(200, r#"{"Hash":"bafyA","CumulativeSize":2048,"Type":"file"}"#).await;

        let size = client(base).files_stat("/ipfs/bafyA/a.txt").await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(size, 2048);
        assert!(request.starts_with("POST /api/v0/files/stat?arg=%2Fipfs%2FbafyA%2Fa.txt "));
    }

    #[tokio::test]
    async fn test_pin_ls_not_pinned_is_false() {
        let (base, server) =
            serve_once(500, r#"{"Message":"path '/ipfs/bafyA' is not pinned","Code":0,"Type":"error"}"#).await;

        let pinned = client(base).pin_ls("/ipfs/bafyA", PinMode::Recursive).await.unwrap();
        let request = server.await.unwrap();

        assert!(!pinned);
        assert!(request.contains("type=recursive"));
    }

    #[tokio::test]
    async fn test_pin_ls_with_keys_is_true() {
        let (base, _server) = serve_once(200, r#"{"Keys":{"bafyA":{"Type":"recursive"}}}"#).await;
        assert!(client(base).pin_ls("/ipfs/bafyA", PinMode::Recursive).await.unwrap());
    }

    #[tokio::test]
    async fn test_pin_rm_not_pinned_maps_to_store_error() {
        let (base, _server) = serve_once(500, r#"{"Message":"not pinned or pinned indirectly","Code":0}"#).await;

        let err = ContentStore::pin_rm(&client(base), "/ipfs/bafyA").await.unwrap_err();
        assert!(err.is_not_pinned());
    }

    #[tokio::test]
    async fn test_name_resolve() {
        let (base, server) = serve_once(200, r#"{"Path":"/ipfs/bafySite"}"#).await;

        let path = client(base).name_resolve("example.org").await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(path, "/ipfs/bafySite");
        assert!(request.contains("recursive=true"));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_parse_error() {
        let (base, _server) = serve_once(200, "not json").await;
        let err = client(base).files_stat("/ipfs/bafyA").await.unwrap_err();
        assert!(matches!(err, KuboError::Parse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = ContentStore::pin_add(&client(format!("http://{addr}")), "/ipfs/bafyA").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
