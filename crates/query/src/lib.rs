#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`column`]: 컬럼 메타데이터와 로그 타입별 레지스트리
//! - [`parser`]: 자유 텍스트 → [`QueryTerm`] 목록
//! - [`compiler`]: [`QueryTerm`] 목록 → 백엔드 불리언 쿼리
//! - [`request`]: 정렬/페이지/하이라이트를 포함한 검색 요청 본문
//! - [`error`]: 도메인 에러 타입

pub mod column;
pub mod compiler;
pub mod error;
pub mod parser;
pub mod request;

// --- 주요 타입 re-export ---

pub use column::{Coercion, Column, ColumnRegistry};
pub use compiler::{CompilerOptions, QueryCompiler, TimeWindow};
pub use error::QueryError;
pub use parser::{QueryTerm, Requirement, TermType, parse, render_terms};
pub use request::{HighlightOptions, SearchRequest};
