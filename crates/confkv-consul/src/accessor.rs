use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use confkv_core::{
    BackendError, KvPair, KvPairs, QueryMeta, QueryOptions, StoreAccessor, WriteOptions,
};
use reqwest::header::HeaderMap;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

/// Address used when no endpoint is configured.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8500";

const INDEX_HEADER: &str = "X-Consul-Index";
const TOKEN_HEADER: &str = "X-Consul-Token";

/// A KV entry as returned by Consul's `/v1/kv` endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulKvEntry {
    key: String,
    /// Base64-encoded value; `null` for keys stored without a body
    value: Option<String>,
}

impl ConsulKvEntry {
    fn into_pair(self) -> Result<KvPair, BackendError> {
        let value = match self.value {
            Some(encoded) => BASE64.decode(encoded.as_bytes()).map_err(|e| {
                BackendError::Store(format!("Invalid base64 value for {}: {}", self.key, e))
            })?,
            None => Vec::new(),
        };
        Ok(KvPair {
            key: self.key,
            value,
        })
    }
}

/// Consul KV HTTP API client.
///
/// Talks to a single agent over the v1 HTTP API. Blocking queries are
/// expressed through `QueryOptions::wait_index`, which maps to Consul's
/// `index` query parameter.
pub struct ConsulAccessor {
    http_client: HttpClient,
    base_url: String,
}

impl ConsulAccessor {
    /// Create a new accessor for the agent at `address`.
    ///
    /// `address` is either `host:port` (plain HTTP is assumed) or a full
    /// `http://` / `https://` URL.
    pub fn new(address: &str) -> Result<Self, BackendError> {
        let base_url = Self::normalize_address(address)?;
        let http_client = HttpClient::builder()
            .build()
            .map_err(|e| BackendError::Construction(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Base URL of the agent, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn normalize_address(address: &str) -> Result<String, BackendError> {
        let address = address.trim();
        let address = if address.is_empty() {
            DEFAULT_ADDRESS
        } else {
            address
        };

        let candidate = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };

        let url = Url::parse(&candidate).map_err(|e| {
            BackendError::Construction(format!("Invalid Consul address {}: {}", address, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(BackendError::Construction(format!(
                "Unsupported scheme {} in Consul address {}",
                url.scheme(),
                address
            )));
        }
        if url.host_str().is_none() {
            return Err(BackendError::Construction(format!(
                "Consul address {} has no host",
                address
            )));
        }

        Ok(candidate.trim_end_matches('/').to_string())
    }

    /// URL of a KV entry. Path separators are kept, each segment is percent-encoded.
    fn kv_url(&self, key: &str) -> String {
        let path = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/v1/kv/{}", self.base_url, path)
    }

    fn with_token(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }

    fn apply_query(request: RequestBuilder, opts: &QueryOptions) -> RequestBuilder {
        let mut request = Self::with_token(request, opts.token.as_deref());
        if let Some(index) = opts.wait_index {
            request = request.query(&[("index", index.to_string())]);
        }
        if let Some(wait) = opts.wait_time {
            request = request.query(&[("wait", format!("{}ms", wait.as_millis()))]);
        }
        request
    }

    fn parse_query_meta(headers: &HeaderMap) -> Result<QueryMeta, BackendError> {
        let raw = headers
            .get(INDEX_HEADER)
            .ok_or_else(|| BackendError::Store(format!("Missing {} header", INDEX_HEADER)))?;

        let last_index = raw
            .to_str()
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| {
                BackendError::Store(format!("Failed to parse {}: {:?}", INDEX_HEADER, raw))
            })?;

        Ok(QueryMeta { last_index })
    }

    async fn read_entries(response: reqwest::Response) -> Result<Vec<KvPair>, BackendError> {
        let entries: Vec<ConsulKvEntry> = response
            .json()
            .await
            .map_err(|e| BackendError::Store(format!("Failed to decode KV response: {}", e)))?;

        entries.into_iter().map(ConsulKvEntry::into_pair).collect()
    }

    async fn failure(op: &str, response: reqwest::Response) -> BackendError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        BackendError::Store(format!(
            "KV {} failed with status {}: {}",
            op,
            status,
            text.trim()
        ))
    }
}

#[async_trait]
impl StoreAccessor for ConsulAccessor {
    #[instrument(skip(self, opts), level = "debug", fields(wait_index = ?opts.wait_index))]
    async fn get_entry(
        &self,
        key: &str,
        opts: &QueryOptions,
    ) -> Result<(Option<KvPair>, QueryMeta), BackendError> {
        let request = Self::apply_query(self.http_client.get(self.kv_url(key)), opts);

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Store(format!("KV GET request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::NOT_FOUND && !status.is_success() {
            return Err(Self::failure("GET", response).await);
        }

        let meta = Self::parse_query_meta(response.headers())?;

        if status == StatusCode::NOT_FOUND {
            debug!("KV key not found: {} (index {})", key, meta.last_index);
            return Ok((None, meta));
        }

        let entry = Self::read_entries(response).await?.into_iter().next();
        debug!(
            "KV GET {} ({} bytes, index {})",
            key,
            entry.as_ref().map(|e| e.value.len()).unwrap_or(0),
            meta.last_index
        );
        Ok((entry, meta))
    }

    #[instrument(skip(self, opts), level = "debug")]
    async fn list_entries(
        &self,
        prefix: &str,
        opts: &QueryOptions,
    ) -> Result<KvPairs, BackendError> {
        let request = self
            .http_client
            .get(self.kv_url(prefix))
            .query(&[("recurse", "")]);
        let request = Self::apply_query(request, opts);

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Store(format!("KV LIST request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("KV prefix has no keys: {}", prefix);
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(Self::failure("LIST", response).await);
        }

        let pairs = Self::read_entries(response).await?;
        debug!("KV LIST {} ({} keys)", prefix, pairs.len());
        Ok(pairs)
    }

    #[instrument(skip(self, entry, opts), level = "debug", fields(key = %entry.key, value_len = entry.value.len()))]
    async fn put_entry(&self, entry: &KvPair, opts: &WriteOptions) -> Result<(), BackendError> {
        let request = self
            .http_client
            .put(self.kv_url(&entry.key))
            .body(entry.value.clone());
        let request = Self::with_token(request, opts.token.as_deref());

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Store(format!("KV PUT request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::failure("PUT", response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Store(format!("Failed to read KV response: {}", e)))?;
        if body.trim() != "true" {
            return Err(BackendError::Store(format!(
                "KV PUT of {} was rejected by the store",
                entry.key
            )));
        }

        debug!("KV PUT {} ({} bytes)", entry.key, entry.value.len());
        Ok(())
    }
}
