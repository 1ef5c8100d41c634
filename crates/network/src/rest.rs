// crates/network/src/rest.rs
//! Remote store over a PostgREST-style HTTP API

use crate::client::{parse_url, Client};
use crate::error::{NetworkError, NetworkResult};
use marketsync_sync_engine::{async_trait, RemoteError, RemoteErrorKind, RemoteResult, RemoteStore};
use reqwest::{Method, RequestBuilder, Url};
use serde_json::Value;

/// Connection settings for [`RestRemoteStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConfig {
    /// Project URL, e.g. `https://xyz.example.co`
    pub base_url: String,
    /// Sent as `apikey` and bearer token when present
    pub api_key: Option<String>,
}

impl RestConfig {
    /// Creates a config without credentials
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Sets the API key; an empty key means none
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = if key.is_empty() { None } else { Some(key) };
        self
    }
}

/// Maps an HTTP status to a remote error kind
pub fn kind_for_status(status: u16) -> RemoteErrorKind {
    match status {
        400 | 422 => RemoteErrorKind::Validation,
        401 | 403 => RemoteErrorKind::Unauthorized,
        404 => RemoteErrorKind::NotFound,
        408 => RemoteErrorKind::Timeout,
        409 => RemoteErrorKind::Conflict,
        500..=599 => RemoteErrorKind::Server,
        _ => RemoteErrorKind::Other,
    }
}

impl From<NetworkError> for RemoteError {
    fn from(err: NetworkError) -> Self {
        let kind = match &err {
            NetworkError::Status { status, .. } => kind_for_status(*status),
            NetworkError::Timeout | NetworkError::Resilience(_) => RemoteErrorKind::Timeout,
            NetworkError::Http(e) if e.is_timeout() => RemoteErrorKind::Timeout,
            NetworkError::Http(_) | NetworkError::NetworkUnavailable => RemoteErrorKind::Network,
            NetworkError::InvalidUrl(_) => RemoteErrorKind::Validation,
            NetworkError::Decode(_) => RemoteErrorKind::Other,
        };
        RemoteError::new(kind, err.to_string())
    }
}

/// [`RemoteStore`] backed by `{base}/rest/v1/{table}` endpoints
///
/// Records are addressed by their `id` column with an `id=eq.{id}` filter.
#[derive(Debug, Clone)]
pub struct RestRemoteStore {
    client: Client,
    base: Url,
    api_key: Option<String>,
}

impl RestRemoteStore {
    /// Creates a store, validating the base URL
    pub fn new(client: Client, config: RestConfig) -> NetworkResult<Self> {
        let base = parse_url(&config.base_url)?;
        if base.cannot_be_a_base() {
            return Err(NetworkError::InvalidUrl(config.base_url));
        }

        Ok(Self {
            client,
            base,
            api_key: config.api_key,
        })
    }

    /// Endpoint for a table
    pub fn table_url(&self, table: &str) -> NetworkResult<Url> {
        if table.is_empty() {
            return Err(NetworkError::InvalidUrl("empty table name".to_string()));
        }

        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| NetworkError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(["rest", "v1", table]);
        Ok(url)
    }

    /// Endpoint for a single record of a table
    pub fn record_url(&self, table: &str, id: &str) -> NetworkResult<Url> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        log::debug!("{} {}", method, url);
        self.authorize(self.client.request(method, url))
    }

    async fn execute(&self, request: RequestBuilder) -> NetworkResult<String> {
        let response = self.client.send(request).await?;
        response.text().await.map_err(NetworkError::from_transport)
    }
}

/// First row of a `return=representation` response
fn first_row(body: &str, fallback: &Value) -> NetworkResult<Value> {
    if body.trim().is_empty() {
        return Ok(fallback.clone());
    }

    match serde_json::from_str::<Value>(body)? {
        Value::Array(rows) => Ok(rows.into_iter().next().unwrap_or_else(|| fallback.clone())),
        row => Ok(row),
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn insert(&self, table: &str, record: &Value) -> RemoteResult<Value> {
        let request = self
            .request(Method::POST, self.table_url(table)?)
            .header("Prefer", "return=representation")
            .json(record);

        let body = self.execute(request).await?;
        Ok(first_row(&body, record)?)
    }

    async fn update_by_id(&self, table: &str, id: &str, patch: &Value) -> RemoteResult<()> {
        let request = self
            .request(Method::PATCH, self.record_url(table, id)?)
            .json(patch);
        self.execute(request).await?;
        Ok(())
    }

    async fn delete_by_id(&self, table: &str, id: &str) -> RemoteResult<()> {
        let request = self.request(Method::DELETE, self.record_url(table, id)?);
        self.execute(request).await?;
        Ok(())
    }
}
