//! 인덱서 에러 타입
//!
//! [`IndexerError`]는 백엔드 호출, 파이프라인 상태 전이, 설정 검증 등
//! 크레이트 전체의 에러를 표현합니다. `From<IndexerError> for SiftError`가
//! 구현되어 있어 상위 레이어에서 `?`로 전파할 수 있습니다.
//!
//! [`ItemError`]는 벌크 항목 하나의 실패이며 해당 항목의 receipt로만 전달됩니다.

use logsift_core::error::{BackendError, ConfigError, SiftError, ValidationError};
use logsift_query::QueryError;

/// 인덱서 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// 백엔드 호출 실패
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// 입력 검증 실패 (손상된 locator, 잘못된 상태 전이, 사용 중인 scroll 등)
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// 쿼리 구성 실패
    #[error(transparent)]
    Query(#[from] QueryError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 문서 직렬화 실패
    #[error("failed to serialize document: {0}")]
    Serialization(String),

    /// 배치 워커가 비정상 종료됨
    #[error("batching worker lost: {0}")]
    WorkerLost(String),
}

impl IndexerError {
    /// 허용되지 않는 상태에서의 호출 에러를 만듭니다.
    pub(crate) fn invalid_state(expected: &str, actual: impl std::fmt::Display) -> Self {
        ValidationError::InvalidState {
            expected: expected.to_owned(),
            actual: actual.to_string(),
        }
        .into()
    }
}

impl From<IndexerError> for SiftError {
    fn from(err: IndexerError) -> Self {
        match err {
            IndexerError::Backend(e) => SiftError::Backend(e),
            IndexerError::Validation(e) => SiftError::Validation(e),
            IndexerError::Query(e) => e.into(),
            IndexerError::Config { field, reason } => {
                SiftError::Config(ConfigError::InvalidValue { field, reason })
            }
            IndexerError::Serialization(reason) => {
                SiftError::Validation(ValidationError::InvalidState {
                    expected: "serializable document".to_owned(),
                    actual: reason,
                })
            }
            IndexerError::WorkerLost(reason) => SiftError::Io(std::io::Error::other(reason)),
        }
    }
}

/// 벌크 항목 하나의 실패
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    /// 백엔드가 항목을 거부함 (매핑 충돌 등)
    #[error("item rejected (status {status}): {reason}")]
    Rejected {
        /// HTTP 상태 코드
        status: u16,
        /// 거부 사유
        reason: String,
    },

    /// 재시도 한도까지 과부하가 계속됨
    #[error("item still throttled after {attempts} attempts")]
    Throttled {
        /// 시도 횟수
        attempts: u32,
    },

    /// 배치 전체 전송 실패
    #[error("bulk transport failure: {0}")]
    Transport(String),

    /// 결과를 받기 전에 워커가 사라짐
    #[error("item aborted: {0}")]
    Aborted(String),
}

impl From<&BackendError> for ItemError {
    fn from(err: &BackendError) -> Self {
        match err {
            BackendError::Rejected { status, reason } => ItemError::Rejected {
                status: *status,
                reason: reason.clone(),
            },
            other => ItemError::Transport(other.to_string()),
        }
    }
}
