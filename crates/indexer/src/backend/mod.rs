//! Search backend abstraction for testability.
//!
//! The [`SearchBackend`] trait abstracts the Elasticsearch-compatible REST API,
//! allowing production code to use [`HttpBackend`] while tests use an in-process fake.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐ ┌───────────┐ ┌────────────────┐
//! │ BulkIndexer│ │LogSearcher│ │ScrollConsumer  │
//! └─────┬──────┘ └─────┬─────┘ └───────┬────────┘
//!       └──────────────┼───────────────┘
//!                      ▼
//!              ┌──────────────┐
//!              │SearchBackend │ (trait)
//!              └──────────────┘
//!                 │        │
//!                 ▼        ▼
//!          ┌───────────┐ ┌────┐
//!          │HttpBackend│ │Mock│
//!          └─────┬─────┘ └────┘
//!                ▼
//!        search cluster
//! ```
//!
//! # Error Classification
//!
//! - HTTP 429/503: [`BackendError::Throttled`], retried only by the bulk pipeline
//! - connection failures and request timeouts: [`BackendError::Transport`]
//! - any other non-2xx status: [`BackendError::Rejected`]

pub mod http;
#[cfg(test)]
pub(crate) mod mock;

pub use http::HttpBackend;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use logsift_core::error::BackendError;
use serde_json::{Map, Value, json};

/// Trait abstracting search backend operations.
///
/// The trait is `Send + Sync + 'static`, allowing a single client to be shared
/// through `Arc` by the bulk workers, searchers and scroll consumers.
pub trait SearchBackend: Send + Sync + 'static {
    /// Sends one bulk request.
    ///
    /// On success the response holds exactly one status per item, in request order.
    fn bulk(
        &self,
        items: &[BulkItem],
    ) -> impl Future<Output = Result<BulkResponse, BackendError>> + Send;

    /// Runs a search against an index, alias or pattern.
    fn search(
        &self,
        index: &str,
        body: &Value,
    ) -> impl Future<Output = Result<SearchResponse, BackendError>> + Send;

    /// Opens a scroll cursor and returns the first page.
    fn open_scroll(
        &self,
        index: &str,
        body: &Value,
        keep_alive: &str,
    ) -> impl Future<Output = Result<ScrollPage, BackendError>> + Send;

    /// Pulls the next page of an open scroll cursor, renewing its lease.
    fn continue_scroll(
        &self,
        scroll_id: &str,
        keep_alive: &str,
    ) -> impl Future<Output = Result<ScrollPage, BackendError>> + Send;

    /// Releases a scroll cursor.
    fn clear_scroll(&self, scroll_id: &str)
    -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Creates an index with the given settings/mappings body.
    fn create_index(
        &self,
        index: &str,
        body: &Value,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Deletes an index. A missing index is not an error.
    fn delete_index(&self, index: &str) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Makes recent writes to an index visible to search.
    fn refresh(&self, index: &str) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Merges an index down to `max_segments` segments.
    ///
    /// `timeout` overrides the client's default request timeout for this call.
    fn force_merge(
        &self,
        index: &str,
        max_segments: u32,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Lists the indices an alias currently points to. An unknown alias yields an empty list.
    fn get_alias(&self, alias: &str)
    -> impl Future<Output = Result<Vec<String>, BackendError>> + Send;

    /// Applies alias actions atomically in a single call.
    fn update_aliases(
        &self,
        actions: &[AliasAction],
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Bulk operation kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BulkOp {
    /// Create or replace
    #[default]
    Index,
    /// Create only; fails if the id already exists
    Create,
}

impl BulkOp {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Create => "create",
        }
    }
}

/// Action header of one bulk item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkAction {
    /// Operation
    pub op: BulkOp,
    /// Target index
    pub index: String,
    /// Document id; the backend assigns one when absent
    pub id: Option<String>,
    /// Legacy mapping type
    pub doc_type: Option<String>,
}

impl BulkAction {
    /// Renders the action header JSON line.
    pub fn header(&self) -> Value {
        let mut meta = Map::new();
        meta.insert("_index".to_owned(), json!(self.index));
        if let Some(id) = &self.id {
            meta.insert("_id".to_owned(), json!(id));
        }
        if let Some(doc_type) = &self.doc_type {
            meta.insert("_type".to_owned(), json!(doc_type));
        }
        json!({ self.op.as_str(): meta })
    }
}

/// One bulk item: action header plus pre-serialized document source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItem {
    /// Action header
    pub action: BulkAction,
    /// Serialized header line (without newline)
    header: Bytes,
    /// Serialized document (without newline)
    source: Bytes,
}

impl BulkItem {
    /// Builds an item from its action and serialized source.
    pub fn new(action: BulkAction, source: Bytes) -> Self {
        let header = Bytes::from(action.header().to_string());
        Self {
            action,
            header,
            source,
        }
    }

    /// Serialized document source
    pub fn source(&self) -> &Bytes {
        &self.source
    }

    /// Size of this item in the NDJSON body, including both newlines.
    pub fn encoded_len(&self) -> usize {
        self.header.len() + self.source.len() + 2
    }

    /// Appends this item's two NDJSON lines to `buf`.
    pub fn write_ndjson(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_slice(&self.header);
        buf.put_u8(b'\n');
        buf.put_slice(&self.source);
        buf.put_u8(b'\n');
    }
}

/// Builds the NDJSON body for a batch.
pub fn ndjson_body(items: &[BulkItem]) -> Bytes {
    let mut buf = BytesMut::with_capacity(items.iter().map(BulkItem::encoded_len).sum());
    for item in items {
        item.write_ndjson(&mut buf);
    }
    buf.freeze()
}

/// Per-item bulk outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    /// Accepted
    Ok,
    /// Throttled or unavailable (429/503); retryable
    Throttled {
        /// HTTP status
        status: u16,
    },
    /// Terminal failure
    Failed {
        /// HTTP status
        status: u16,
        /// Failure reason reported by the backend
        reason: String,
    },
}

impl ItemStatus {
    /// Classifies an item-level HTTP status.
    pub fn from_status(status: u16, reason: impl Into<String>) -> Self {
        match status {
            200..=299 => Self::Ok,
            429 | 503 => Self::Throttled { status },
            _ => Self::Failed {
                status,
                reason: reason.into(),
            },
        }
    }
}

/// Bulk response: one status per request item, in request order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponse {
    /// Item statuses
    pub items: Vec<ItemStatus>,
}

/// One search hit as returned by the backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawHit {
    /// Concrete index holding the document
    pub index: String,
    /// Backend document id
    pub id: String,
    /// Relevance score (absent when scoring is disabled or sorted)
    pub score: Option<f64>,
    /// Document source (absent when source fetching is disabled)
    pub source: Option<Value>,
    /// Highlighted fragments per field
    pub highlight: HashMap<String, Vec<String>>,
}

/// Search response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// Total number of matching documents
    pub total: u64,
    /// Returned page of hits
    pub hits: Vec<RawHit>,
}

/// One page of a scroll cursor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollPage {
    /// Renewed cursor handle
    pub scroll_id: Option<String>,
    /// Total number of matching documents
    pub total: u64,
    /// Hits of this page
    pub hits: Vec<RawHit>,
}

/// Alias binding change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasAction {
    /// Point the alias at an index
    Add {
        /// Index name
        index: String,
        /// Alias name
        alias: String,
    },
    /// Remove the alias from an index
    Remove {
        /// Index name
        index: String,
        /// Alias name
        alias: String,
    },
}

impl AliasAction {
    /// Renders the action as used in an `_aliases` request.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Add { index, alias } => json!({ "add": { "index": index, "alias": alias } }),
            Self::Remove { index, alias } => {
                json!({ "remove": { "index": index, "alias": alias } })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Option<&str>) -> BulkItem {
        BulkItem::new(
            BulkAction {
                op: BulkOp::Index,
                index: "syslog-20240115120000000".to_owned(),
                id: id.map(str::to_owned),
                doc_type: None,
            },
            Bytes::from_static(br#"{"message":"hello"}"#),
        )
    }

    #[test]
    fn header_omits_absent_id() {
        assert_eq!(
            item(None).action.header(),
            json!({ "index": { "_index": "syslog-20240115120000000" } })
        );
        assert_eq!(
            item(Some("a1")).action.header()["index"]["_id"],
            json!("a1")
        );
    }

    #[test]
    fn create_op_with_type() {
        let action = BulkAction {
            op: BulkOp::Create,
            index: "i".to_owned(),
            id: Some("x".to_owned()),
            doc_type: Some("_doc".to_owned()),
        };
        assert_eq!(
            action.header(),
            json!({ "create": { "_index": "i", "_id": "x", "_type": "_doc" } })
        );
    }

    #[test]
    fn ndjson_body_has_two_lines_per_item() {
        let items = vec![item(Some("a")), item(Some("b"))];
        let body = ndjson_body(&items);
        let text = std::str::from_utf8(&body).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.ends_with('\n'));
        assert_eq!(
            body.len(),
            items.iter().map(BulkItem::encoded_len).sum::<usize>()
        );
    }

    #[test]
    fn item_status_classification() {
        assert_eq!(ItemStatus::from_status(201, ""), ItemStatus::Ok);
        assert_eq!(
            ItemStatus::from_status(429, "es_rejected_execution_exception"),
            ItemStatus::Throttled { status: 429 }
        );
        assert!(matches!(
            ItemStatus::from_status(400, "mapper_parsing_exception"),
            ItemStatus::Failed { status: 400, .. }
        ));
    }

    #[test]
    fn alias_actions_render() {
        let add = AliasAction::Add {
            index: "syslog-1".to_owned(),
            alias: "syslog".to_owned(),
        };
        assert_eq!(add.to_json()["add"]["index"], "syslog-1");
        let remove = AliasAction::Remove {
            index: "syslog-0".to_owned(),
            alias: "syslog".to_owned(),
        };
        assert_eq!(remove.to_json()["remove"]["alias"], "syslog");
    }
}
