//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logsift_`
//! - 모듈명: `indexer_`, `search_`, `scroll_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)

use metrics::{describe_counter, describe_gauge, describe_histogram};

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 별칭(alias) 레이블 키
pub const LABEL_ALIAS: &str = "alias";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Indexer 메트릭 ────────────────────────────────────────────────

/// Indexer: 적재 성공 문서 수 (counter)
pub const INDEXER_DOCUMENTS_INDEXED_TOTAL: &str = "logsift_indexer_documents_indexed_total";

/// Indexer: 적재 실패 문서 수 (counter)
pub const INDEXER_DOCUMENTS_FAILED_TOTAL: &str = "logsift_indexer_documents_failed_total";

/// Indexer: 과부하로 재시도된 문서 수 (counter)
pub const INDEXER_DOCUMENTS_THROTTLED_TOTAL: &str = "logsift_indexer_documents_throttled_total";

/// Indexer: 전송한 벌크 배치 수 (counter, label: result)
pub const INDEXER_BATCHES_TOTAL: &str = "logsift_indexer_batches_total";

/// Indexer: 벌크 호출 지연 시간 (histogram, 초)
pub const INDEXER_BULK_DURATION_SECONDS: &str = "logsift_indexer_bulk_duration_seconds";

/// Indexer: 워커 큐에 대기 중인 문서 수 (gauge)
pub const INDEXER_QUEUE_DEPTH: &str = "logsift_indexer_queue_depth";

// ─── Search 메트릭 ────────────────────────────────────────────────

/// Search: 실행된 검색 수 (counter, label: result)
pub const SEARCH_QUERIES_TOTAL: &str = "logsift_search_queries_total";

/// Search: permalink 해석 수 (counter)
pub const SEARCH_PERMALINKS_RESOLVED_TOTAL: &str = "logsift_search_permalinks_resolved_total";

/// Scroll: 가져온 페이지 수 (counter)
pub const SCROLL_PAGES_TOTAL: &str = "logsift_scroll_pages_total";

/// 벌크 지연 시간 히스토그램 버킷 (초)
pub const BULK_DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더가 설치되지 않은 경우에도 안전하게 호출할 수 있습니다.
pub fn describe_all() {
    describe_counter!(
        INDEXER_DOCUMENTS_INDEXED_TOTAL,
        "Total number of documents acknowledged by the backend"
    );
    describe_counter!(
        INDEXER_DOCUMENTS_FAILED_TOTAL,
        "Total number of documents rejected by the backend"
    );
    describe_counter!(
        INDEXER_DOCUMENTS_THROTTLED_TOTAL,
        "Total number of document writes re-queued after throttling"
    );
    describe_counter!(INDEXER_BATCHES_TOTAL, "Total number of bulk requests sent");
    describe_histogram!(
        INDEXER_BULK_DURATION_SECONDS,
        "Latency of a single bulk request in seconds"
    );
    describe_gauge!(
        INDEXER_QUEUE_DEPTH,
        "Number of documents waiting in batching worker queues"
    );
    describe_counter!(SEARCH_QUERIES_TOTAL, "Total number of search requests executed");
    describe_counter!(
        SEARCH_PERMALINKS_RESOLVED_TOTAL,
        "Total number of permalink resolutions"
    );
    describe_counter!(SCROLL_PAGES_TOTAL, "Total number of scroll pages fetched");
}
