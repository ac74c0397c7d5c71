//! 로그 타입별 검색기 -- 파싱, 컴파일, 실행을 묶고 hit마다 permalink를 붙입니다.
//!
//! # 처리 흐름
//! ```text
//! query text -> parse -> compile(registry, window) -> SearchRequest -> backend(alias)
//!                                                                       │
//!                                  SearchHit { .., locator } <──────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use logsift_core::config::SearchConfig;
use logsift_core::metrics as m;
use logsift_core::types::SortOrder;
use logsift_query::{
    ColumnRegistry, CompilerOptions, HighlightOptions, QueryCompiler, SearchRequest, TimeWindow,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::backend::{RawHit, SearchBackend};
use crate::error::IndexerError;
use crate::permalink::{Locator, PermalinkMatch, PermalinkResolver};
use crate::scroll::ScrollConsumer;

/// 검색 옵션
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// 정렬 컬럼 (논리 이름). 없으면 레지스트리 기본 정렬
    pub sort: Option<String>,
    /// 정렬 방향. 없으면 컬럼 기본 방향
    pub order: Option<SortOrder>,
    /// 시작 위치
    pub from: usize,
    /// 페이지 크기. 없으면 설정의 기본 페이지 크기
    pub size: Option<usize>,
    /// 하이라이트 여부
    pub highlight: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            sort: None,
            order: None,
            from: 0,
            size: None,
            highlight: true,
        }
    }
}

/// 검색 결과 hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// 문서가 있는 인덱스 세대
    pub index: String,
    /// 백엔드 문서 id
    pub id: String,
    /// 관련도 점수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// 문서 원본
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
    /// 필드별 하이라이트 조각
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub highlight: HashMap<String, Vec<String>>,
    /// permalink locator (`receivedTime`과 `recordFinder`가 있을 때)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
}

impl From<RawHit> for SearchHit {
    fn from(hit: RawHit) -> Self {
        let locator = hit
            .source
            .as_ref()
            .and_then(Locator::from_source)
            .map(|l| l.to_string());
        Self {
            index: hit.index,
            id: hit.id,
            score: hit.score,
            source: hit.source,
            highlight: hit.highlight,
            locator,
        }
    }
}

/// 검색 결과 페이지
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    /// 총 일치 건수
    pub total: u64,
    /// 이번 페이지의 hit
    pub hits: Vec<SearchHit>,
}

/// 로그 타입 하나에 묶인 검색기
pub struct LogSearcher<B: SearchBackend> {
    backend: Arc<B>,
    alias: String,
    registry: Arc<ColumnRegistry>,
    compiler: QueryCompiler,
    highlight: HighlightOptions,
    default_page_size: usize,
    max_page_size: usize,
    scroll_keep_alive: String,
    scroll_page_size: usize,
    resolver: PermalinkResolver<B>,
}

impl<B: SearchBackend> LogSearcher<B> {
    /// 검색기를 생성합니다.
    pub fn new(
        backend: Arc<B>,
        alias: impl Into<String>,
        registry: Arc<ColumnRegistry>,
        search: &SearchConfig,
    ) -> Self {
        let alias = alias.into();
        let resolver = PermalinkResolver::new(Arc::clone(&backend), &alias);
        Self {
            backend,
            alias,
            registry,
            compiler: QueryCompiler::new(CompilerOptions::from_core(search)),
            highlight: HighlightOptions::from_core(search),
            default_page_size: search.default_page_size,
            max_page_size: search.max_page_size,
            scroll_keep_alive: search.scroll_keep_alive.clone(),
            scroll_page_size: search.scroll_page_size,
            resolver,
        }
    }

    /// 읽기 별칭
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// 컬럼 레지스트리
    pub fn registry(&self) -> &ColumnRegistry {
        &self.registry
    }

    /// 백엔드에 보낼 검색 요청을 만듭니다. I/O는 없습니다.
    pub fn build_request(
        &self,
        query_text: &str,
        window: &TimeWindow,
        params: &SearchParams,
    ) -> SearchRequest {
        let query = self
            .compiler
            .compile_str(query_text, &self.registry, window);
        let mut request = SearchRequest::new(query)
            .max_page_size(self.max_page_size)
            .page(params.from, params.size.unwrap_or(self.default_page_size))
            .sort(&self.registry, params.sort.as_deref(), params.order);
        if params.highlight {
            request = request.highlight(&self.registry, self.highlight.clone());
        }
        request
    }

    /// 자유 텍스트 질의를 실행합니다.
    pub async fn search(
        &self,
        query_text: &str,
        window: &TimeWindow,
        params: &SearchParams,
    ) -> Result<SearchResults, IndexerError> {
        let request = self.build_request(query_text, window, params);
        let started = Instant::now();
        let response = self.backend.search(&self.alias, &request.to_body()).await;

        let outcome = if response.is_ok() { "ok" } else { "error" };
        metrics::counter!(
            m::SEARCH_QUERIES_TOTAL,
            m::LABEL_ALIAS => self.alias.clone(),
            m::LABEL_RESULT => outcome
        )
        .increment(1);

        let response = response?;
        debug!(
            alias = %self.alias,
            query = query_text,
            total = response.total,
            returned = response.hits.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search executed"
        );

        Ok(SearchResults {
            total: response.total,
            hits: response.hits.into_iter().map(SearchHit::from).collect(),
        })
    }

    /// 일치하는 문서 전체를 순회하는 scroll 소비자를 만듭니다.
    ///
    /// 정렬은 `_doc` 순서(가장 저렴한 순서)이며 관련도 점수는 계산하지 않습니다.
    pub fn export(
        &self,
        query_text: &str,
        window: &TimeWindow,
        page_size: Option<usize>,
    ) -> ScrollConsumer<B> {
        let query = self
            .compiler
            .compile_str(query_text, &self.registry, window);
        let body = json!({
            "query": query.to_json(),
            "size": page_size.unwrap_or(self.scroll_page_size).max(1),
            "sort": ["_doc"],
        });
        ScrollConsumer::new(
            Arc::clone(&self.backend),
            self.alias.clone(),
            body,
            self.scroll_keep_alive.clone(),
        )
    }

    /// permalink locator를 문서 위치로 해석합니다.
    pub async fn resolve(&self, locator: &str) -> Result<Vec<PermalinkMatch>, IndexerError> {
        self.resolver.resolve_str(locator).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SearchResponse;
    use crate::backend::mock::MockBackend;
    use chrono::{TimeZone, Utc};

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 7, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 0).unwrap(),
        )
        .unwrap()
    }

    fn searcher(backend: &Arc<MockBackend>) -> LogSearcher<MockBackend> {
        LogSearcher::new(
            Arc::clone(backend),
            "syslog",
            Arc::new(ColumnRegistry::common()),
            &SearchConfig::default(),
        )
    }

    #[tokio::test]
    async fn search_attaches_locators() {
        let backend = Arc::new(MockBackend::new());
        backend.set_search_response(SearchResponse {
            total: 2,
            hits: vec![
                RawHit {
                    index: "syslog-1".to_owned(),
                    id: "a".to_owned(),
                    score: Some(2.0),
                    source: Some(json!({
                        "receivedTime": "2024-01-15T11:00:00.000Z",
                        "recordFinder": "fw-1"
                    })),
                    highlight: HashMap::new(),
                },
                RawHit {
                    index: "syslog-1".to_owned(),
                    id: "b".to_owned(),
                    source: Some(json!({ "message": "no locator fields" })),
                    ..RawHit::default()
                },
            ],
        });
        let results = searcher(&backend)
            .search("+failed", &window(), &SearchParams::default())
            .await
            .unwrap();

        assert_eq!(results.total, 2);
        let locator = results.hits[0].locator.as_deref().unwrap();
        let decoded = crate::permalink::decode(locator).unwrap();
        assert_eq!(decoded.record_finder(), "fw-1");
        assert!(results.hits[1].locator.is_none());

        let state = backend.state.lock().unwrap();
        let (index, body) = &state.searches[0];
        assert_eq!(index, "syslog");
        assert_eq!(body["size"], 50);
        assert!(body.get("highlight").is_some());
        assert_eq!(body["query"]["bool"]["filter"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn build_request_applies_params() {
        let backend = Arc::new(MockBackend::new());
        let params = SearchParams {
            sort: Some("receivedTime".to_owned()),
            order: Some(SortOrder::Asc),
            from: 100,
            size: Some(5_000),
            highlight: false,
        };
        let body = searcher(&backend)
            .build_request("alice", &window(), &params)
            .to_body();
        assert_eq!(body["from"], 100);
        assert_eq!(body["size"], 1_000);
        assert_eq!(body["sort"][0]["receivedTime"]["order"], "asc");
        assert!(body.get("highlight").is_none());
    }

    #[tokio::test]
    async fn search_surfaces_transport_errors() {
        let backend = Arc::new(MockBackend::new());
        backend.fail("search");
        let result = searcher(&backend)
            .search("alice", &window(), &SearchParams::default())
            .await;
        assert!(matches!(result, Err(IndexerError::Backend(_))));
    }

    #[tokio::test]
    async fn export_scrolls_alias_in_doc_order() {
        let backend = Arc::new(MockBackend::new());
        let mut scroll = searcher(&backend).export("*", &window(), Some(200));
        assert!(scroll.next_page().await.unwrap().is_none());

        let state = backend.state.lock().unwrap();
        let (index, body, keep_alive) = &state.scroll_opens[0];
        assert_eq!(index, "syslog");
        assert_eq!(keep_alive, "1m");
        assert_eq!(body["size"], 200);
        assert_eq!(body["sort"][0], "_doc");
    }

    #[tokio::test]
    async fn resolve_uses_generation_pattern() {
        let backend = Arc::new(MockBackend::new());
        let locator =
            crate::permalink::encode(Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap(), "fw-1")
                .unwrap();
        let matches = searcher(&backend).resolve(&locator).await.unwrap();
        assert!(matches.is_empty());
        assert_eq!(backend.state.lock().unwrap().searches[0].0, "syslog-*");
    }
}
