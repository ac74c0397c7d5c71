#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`backend`]: 백엔드 추상화 (`SearchBackend` trait, `HttpBackend`)
//! - [`bulk`]: 벌크 인덱싱 파이프라인 (`BulkIndexer`, `ItemReceipt`, `LoadSummary`)
//! - [`scroll`]: scroll 커서 소비자 (`ScrollConsumer`)
//! - [`permalink`]: locator 코덱과 해석기 (`Locator`, `PermalinkResolver`)
//! - [`search`]: 로그 타입별 검색기 (`LogSearcher`)
//! - [`schema`]: 공통 스키마 인덱스 매핑
//! - [`config`]: 벌크 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입

pub mod backend;
pub mod bulk;
pub mod config;
pub mod error;
pub mod permalink;
pub mod schema;
pub mod scroll;
pub mod search;

// --- 주요 타입 re-export ---

// 백엔드
pub use backend::{
    AliasAction, BulkAction, BulkItem, BulkOp, BulkResponse, HttpBackend, ItemStatus, RawHit,
    ScrollPage, SearchBackend, SearchResponse,
};

// 벌크 파이프라인
pub use bulk::{BulkIndexer, ItemReceipt, LoadSummary, PipelineState};

// 설정
pub use config::{BulkConfig, BulkConfigBuilder};

// 에러
pub use error::{IndexerError, ItemError};

// permalink
pub use permalink::{Locator, PermalinkMatch, PermalinkResolver};

// scroll
pub use scroll::ScrollConsumer;

// 검색
pub use search::{LogSearcher, SearchHit, SearchParams, SearchResults};
