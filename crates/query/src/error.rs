//! 쿼리 크레이트 에러 타입
//!
//! 모든 변형은 백엔드 호출 전에 발생하는 입력 검증 실패이며,
//! `From<QueryError> for SiftError` 변환으로 `validation` 분류에 들어갑니다.

use logsift_core::error::{SiftError, ValidationError};

/// 쿼리 도메인 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// 잘못된 컬럼 정의 (빈 이름, 중복 이름 등)
    #[error("invalid column '{name}': {reason}")]
    InvalidColumn {
        /// 컬럼명
        name: String,
        /// 사유
        reason: String,
    },

    /// 알 수 없는 값 변환 정책
    #[error("unknown coercion '{coercion}' for column '{column}'")]
    UnknownCoercion {
        /// 컬럼명
        column: String,
        /// 설정된 정책 이름
        coercion: String,
    },

    /// 시작 시각이 종료 시각보다 같거나 늦음
    #[error("invalid time window: start {start} must be before end {end}")]
    InvalidTimeWindow {
        /// 시작 시각 (RFC 3339)
        start: String,
        /// 종료 시각 (RFC 3339)
        end: String,
    },
}

impl From<QueryError> for ValidationError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidColumn { name, reason } => {
                ValidationError::InvalidColumn { name, reason }
            }
            QueryError::UnknownCoercion { column, coercion } => ValidationError::InvalidColumn {
                name: column,
                reason: format!("unknown coercion '{coercion}'"),
            },
            QueryError::InvalidTimeWindow { start, end } => {
                ValidationError::InvalidTimeWindow { start, end }
            }
        }
    }
}

impl From<QueryError> for SiftError {
    fn from(err: QueryError) -> Self {
        SiftError::Validation(err.into())
    }
}
