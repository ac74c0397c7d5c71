//! 검색 요청 빌더 -- 정렬, 페이지, 하이라이트
//!
//! 컴파일된 [`BoolQuery`]에 표시 관련 옵션을 붙여 백엔드 `_search` 본문을 만듭니다.

use logsift_core::config::SearchConfig;
use logsift_core::dsl::BoolQuery;
use logsift_core::types::{FIELD_RECORD_FINDER, SortOrder};
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::column::ColumnRegistry;

/// 기본 페이지 크기
const DEFAULT_PAGE_SIZE: usize = 50;
/// 기본 최대 페이지 크기
const DEFAULT_MAX_PAGE_SIZE: usize = 1_000;

/// 하이라이트 옵션
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightOptions {
    /// 일치 구간 시작 마커
    pub pre_tag: String,
    /// 일치 구간 종료 마커
    pub post_tag: String,
    /// 조각 길이 (문자)
    pub fragment_size: u32,
    /// 필드당 조각 수 (0 = 필드 전체)
    pub number_of_fragments: u32,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            pre_tag: "<mark>".to_owned(),
            post_tag: "</mark>".to_owned(),
            fragment_size: 150,
            number_of_fragments: 3,
        }
    }
}

impl HighlightOptions {
    /// core 설정의 `[search]` 섹션에서 생성합니다.
    pub fn from_core(search: &SearchConfig) -> Self {
        Self {
            pre_tag: search.highlight_pre_tag.clone(),
            post_tag: search.highlight_post_tag.clone(),
            fragment_size: search.fragment_size,
            number_of_fragments: search.number_of_fragments,
        }
    }
}

/// 백엔드 검색 요청
#[derive(Debug, Clone)]
pub struct SearchRequest {
    query: BoolQuery,
    sort: Vec<(String, SortOrder)>,
    from: usize,
    size: usize,
    max_page_size: usize,
    highlight: Option<(HighlightOptions, Vec<String>)>,
    source: bool,
}

impl SearchRequest {
    /// 정렬/하이라이트 없는 첫 페이지 요청을 생성합니다.
    pub fn new(query: BoolQuery) -> Self {
        Self {
            query,
            sort: Vec::new(),
            from: 0,
            size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            highlight: None,
            source: true,
        }
    }

    /// 논리 컬럼으로 정렬합니다.
    ///
    /// 알 수 없거나 정렬할 수 없는 컬럼이면 레지스트리 기본 정렬을 사용합니다.
    /// 방향이 없으면 컬럼의 기본 방향, 그것도 없으면 내림차순입니다.
    /// 페이지 간 순서를 고정하기 위해 `recordFinder` 오름차순이 2차 정렬로 붙습니다.
    pub fn sort(
        mut self,
        registry: &ColumnRegistry,
        column: Option<&str>,
        order: Option<SortOrder>,
    ) -> Self {
        let primary = match column.map(|name| (name, registry.get(name))) {
            Some((_, Some(col))) if col.sortable => (
                col.sort_field.clone(),
                order.or(col.default_sort_order).unwrap_or_default(),
            ),
            Some((name, _)) => {
                let (field, default_order) = registry.default_sort();
                warn!(
                    column = name,
                    fallback = field,
                    "sort column is unknown or not sortable, using default sort"
                );
                (field.to_owned(), order.unwrap_or(default_order))
            }
            None => {
                let (field, default_order) = registry.default_sort();
                (field.to_owned(), order.unwrap_or(default_order))
            }
        };

        self.sort.clear();
        let tie_break = primary.0 != FIELD_RECORD_FINDER;
        self.sort.push(primary);
        if tie_break {
            self.sort
                .push((FIELD_RECORD_FINDER.to_owned(), SortOrder::Asc));
        }
        self
    }

    /// 페이지 위치와 크기를 설정합니다.
    pub fn page(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }

    /// 페이지 크기 상한을 설정합니다.
    pub fn max_page_size(mut self, max: usize) -> Self {
        self.max_page_size = max.max(1);
        self
    }

    /// 검색 대상 필드에 하이라이트를 켭니다.
    pub fn highlight(mut self, registry: &ColumnRegistry, options: HighlightOptions) -> Self {
        self.highlight = Some((options, registry.searchable_fields()));
        self
    }

    /// `_source` 반환 여부를 설정합니다.
    pub fn source(mut self, enabled: bool) -> Self {
        self.source = enabled;
        self
    }

    /// 쿼리 트리
    pub fn query(&self) -> &BoolQuery {
        &self.query
    }

    /// 시작 위치
    pub fn from(&self) -> usize {
        self.from
    }

    /// `[1, max_page_size]`로 보정된 페이지 크기
    pub fn size(&self) -> usize {
        self.size.clamp(1, self.max_page_size)
    }

    /// 정렬 목록 (필드, 방향)
    pub fn sort_fields(&self) -> &[(String, SortOrder)] {
        &self.sort
    }

    /// 백엔드 `_search` 본문을 생성합니다.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_owned(), self.query.to_json());
        body.insert("from".to_owned(), json!(self.from));
        body.insert("size".to_owned(), json!(self.size()));
        body.insert("track_total_hits".to_owned(), json!(true));

        if !self.sort.is_empty() {
            let sort: Vec<Value> = self
                .sort
                .iter()
                .map(|(field, order)| json!({ field.as_str(): { "order": order.as_str() } }))
                .collect();
            body.insert("sort".to_owned(), Value::Array(sort));
        }

        if let Some((options, fields)) = &self.highlight {
            let per_field: Map<String, Value> = fields
                .iter()
                .map(|field| {
                    (
                        field.clone(),
                        json!({
                            "fragment_size": options.fragment_size,
                            "number_of_fragments": options.number_of_fragments,
                        }),
                    )
                })
                .collect();
            body.insert(
                "highlight".to_owned(),
                json!({
                    "pre_tags": [options.pre_tag],
                    "post_tags": [options.post_tag],
                    "fields": per_field,
                }),
            );
        }

        if !self.source {
            body.insert("_source".to_owned(), json!(false));
        }

        Value::Object(body)
    }
}
