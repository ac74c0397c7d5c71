//! HTTP implementation of [`SearchBackend`] over `reqwest`.
//!
//! Speaks the Elasticsearch-compatible REST API:
//!
//! | operation | request |
//! |---|---|
//! | bulk | `POST /_bulk` (NDJSON) |
//! | search | `POST /{index}/_search` |
//! | open scroll | `POST /{index}/_search?scroll={keep_alive}` |
//! | continue scroll | `POST /_search/scroll` |
//! | clear scroll | `DELETE /_search/scroll` |
//! | create index | `PUT /{index}` |
//! | refresh | `POST /{index}/_refresh` |
//! | force merge | `POST /{index}/_forcemerge?max_num_segments={n}` |
//! | get alias | `GET /_alias/{alias}` (404 means no binding) |
//! | update aliases | `POST /_aliases` |

use std::collections::HashMap;
use std::time::Duration;

use logsift_core::config::BackendConfig;
use logsift_core::error::BackendError;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{
    AliasAction, BulkItem, BulkResponse, ItemStatus, RawHit, ScrollPage, SearchBackend,
    SearchResponse, ndjson_body,
};

/// NDJSON content type required by `_bulk`
const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Production backend client
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
    timeout_secs: u64,
}

impl HttpBackend {
    /// Builds a client from the `[backend]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Transport` if the HTTP client cannot be constructed.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Transport(format!("failed to build HTTP client: {e}")))?;

        let credentials = if config.username.is_empty() {
            None
        } else {
            Some((config.username.clone(), config.password.clone()))
        };

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_owned(),
            credentials,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Applies credentials, sends the request and classifies failures.
    async fn send(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<Response, BackendError> {
        let request = match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Transport(format!(
                    "{operation} timed out after {}s: {e}",
                    self.timeout_secs
                ))
            } else {
                BackendError::Transport(format!("{operation} failed: {e}"))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(operation, status = status.as_u16(), "backend call succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BackendError::from_status(
            status.as_u16(),
            error_reason(&body).unwrap_or(body),
        ))
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<T, BackendError> {
        let response = self.send(request, operation).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(format!("{operation}: {e}")))
    }
}

impl SearchBackend for HttpBackend {
    async fn bulk(&self, items: &[BulkItem]) -> Result<BulkResponse, BackendError> {
        let request = self
            .client
            .post(self.url("_bulk"))
            .header(reqwest::header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .body(ndjson_body(items));
        let wire: WireBulkResponse = self.send_json(request, "bulk").await?;
        Ok(wire.into_response())
    }

    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse, BackendError> {
        let request = self
            .client
            .post(self.url(&format!("{index}/_search")))
            .json(body);
        let wire: WireSearchResponse = self.send_json(request, "search").await?;
        Ok(SearchResponse {
            total: wire.hits.total.value(),
            hits: wire.hits.hits.into_iter().map(WireHit::into_hit).collect(),
        })
    }

    async fn open_scroll(
        &self,
        index: &str,
        body: &Value,
        keep_alive: &str,
    ) -> Result<ScrollPage, BackendError> {
        let request = self
            .client
            .post(self.url(&format!("{index}/_search")))
            .query(&[("scroll", keep_alive)])
            .json(body);
        let wire: WireSearchResponse = self.send_json(request, "open_scroll").await?;
        Ok(wire.into_scroll_page())
    }

    async fn continue_scroll(
        &self,
        scroll_id: &str,
        keep_alive: &str,
    ) -> Result<ScrollPage, BackendError> {
        let request = self
            .client
            .post(self.url("_search/scroll"))
            .json(&json!({ "scroll": keep_alive, "scroll_id": scroll_id }));
        let wire: WireSearchResponse = self.send_json(request, "continue_scroll").await?;
        Ok(wire.into_scroll_page())
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), BackendError> {
        let request = self
            .client
            .delete(self.url("_search/scroll"))
            .json(&json!({ "scroll_id": [scroll_id] }));
        self.send(request, "clear_scroll").await?;
        Ok(())
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), BackendError> {
        let request = self.client.put(self.url(index)).json(body);
        self.send(request, "create_index").await?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), BackendError> {
        let request = self.client.delete(self.url(index));
        match self.send(request, "delete_index").await {
            Ok(_) => Ok(()),
            Err(BackendError::Rejected { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh(&self, index: &str) -> Result<(), BackendError> {
        let request = self.client.post(self.url(&format!("{index}/_refresh")));
        self.send(request, "refresh").await?;
        Ok(())
    }

    async fn force_merge(
        &self,
        index: &str,
        max_segments: u32,
        timeout: Duration,
    ) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.url(&format!("{index}/_forcemerge")))
            .query(&[("max_num_segments", max_segments)])
            .timeout(timeout);
        self.send(request, "force_merge").await?;
        Ok(())
    }

    async fn get_alias(&self, alias: &str) -> Result<Vec<String>, BackendError> {
        let request = self.client.get(self.url(&format!("_alias/{alias}")));
        match self
            .send_json::<HashMap<String, Value>>(request, "get_alias")
            .await
        {
            Ok(bindings) => {
                let mut indices: Vec<String> = bindings.into_keys().collect();
                indices.sort();
                Ok(indices)
            }
            Err(BackendError::Rejected { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), BackendError> {
        let body = json!({
            "actions": actions.iter().map(AliasAction::to_json).collect::<Vec<_>>()
        });
        let request = self.client.post(self.url("_aliases")).json(&body);
        self.send(request, "update_aliases").await?;
        Ok(())
    }
}

/// Extracts `error.type: error.reason` from a backend error body.
fn error_reason(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    describe_error(value.get("error")?)
}

fn describe_error(error: &Value) -> Option<String> {
    match error {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => {
            let kind = obj.get("type").and_then(Value::as_str).unwrap_or("error");
            let reason = obj.get("reason").and_then(Value::as_str).unwrap_or("");
            Some(format!("{kind}: {reason}"))
        }
        _ => None,
    }
}

// --- wire format ---

#[derive(Debug, Deserialize)]
struct WireBulkResponse {
    #[serde(default)]
    items: Vec<HashMap<String, WireBulkItem>>,
}

#[derive(Debug, Deserialize)]
struct WireBulkItem {
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

impl WireBulkResponse {
    fn into_response(self) -> BulkResponse {
        let items = self
            .items
            .into_iter()
            .map(|entry| match entry.into_values().next() {
                Some(item) => {
                    let reason = item
                        .error
                        .as_ref()
                        .and_then(describe_error)
                        .unwrap_or_default();
                    ItemStatus::from_status(item.status, reason)
                }
                None => ItemStatus::Failed {
                    status: 0,
                    reason: "empty bulk item entry".to_owned(),
                },
            })
            .collect();
        BulkResponse { items }
    }
}

#[derive(Debug, Deserialize)]
struct WireSearchResponse {
    #[serde(rename = "_scroll_id", default)]
    scroll_id: Option<String>,
    hits: WireHits,
}

impl WireSearchResponse {
    fn into_scroll_page(self) -> ScrollPage {
        ScrollPage {
            scroll_id: self.scroll_id,
            total: self.hits.total.value(),
            hits: self.hits.hits.into_iter().map(WireHit::into_hit).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireHits {
    #[serde(default)]
    total: WireTotal,
    #[serde(default)]
    hits: Vec<WireHit>,
}

/// `hits.total` is a number on older backends and `{ "value": n }` on newer ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTotal {
    Count(u64),
    Object { value: u64 },
}

impl Default for WireTotal {
    fn default() -> Self {
        Self::Count(0)
    }
}

impl WireTotal {
    fn value(&self) -> u64 {
        match self {
            Self::Count(n) | Self::Object { value: n } => *n,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireHit {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Option<Value>,
    #[serde(default)]
    highlight: HashMap<String, Vec<String>>,
}

impl WireHit {
    fn into_hit(self) -> RawHit {
        RawHit {
            index: self.index,
            id: self.id,
            score: self.score,
            source: self.source,
            highlight: self.highlight,
        }
    }
}
