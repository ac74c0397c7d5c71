//! 에러 타입 -- 도메인별 에러 정의
//!
//! 분류 체계:
//! - `validation`: 잘못된 시간 범위, 손상된 locator 등. I/O 이전에 거부됩니다.
//! - `transport`: 백엔드 연결 실패, 잘못된 요청. 읽기 경로에서는 호출자에게 그대로 전달됩니다.
//! - `throttled`: 백엔드 과부하(429/503). 벌크 인덱싱 파이프라인 내부에서만 재시도합니다.

/// logsift 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum SiftError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 입력 검증 에러
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// 검색 백엔드 에러
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SiftError {
    /// 입력 검증 실패인지 확인합니다.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 정의되지 않은 로그 타입
    #[error("unknown log type: {0}")]
    UnknownLogType(String),
}

/// 입력 검증 에러
///
/// 백엔드 호출 전에 거부되며, 메시지는 호출자에게 그대로 노출됩니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// 시작 시각이 종료 시각보다 같거나 늦음
    #[error("invalid time window: start {start} must be before end {end}")]
    InvalidTimeWindow { start: String, end: String },

    /// 손상된 permalink locator
    #[error("malformed locator: {0}")]
    MalformedLocator(String),

    /// 잘못된 컬럼 정의
    #[error("invalid column '{name}': {reason}")]
    InvalidColumn { name: String, reason: String },

    /// 허용되지 않는 상태에서의 호출
    #[error("invalid state: expected {expected}, found {actual}")]
    InvalidState { expected: String, actual: String },

    /// 이전 pull이 아직 완료되지 않았거나 중단된 scroll 커서
    #[error("scroll cursor busy: {0}")]
    ScrollBusy(String),
}

/// 검색 백엔드 에러
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// 연결 실패, 타임아웃 등 전송 계층 에러
    #[error("transport failure: {0}")]
    Transport(String),

    /// 백엔드 과부하 (HTTP 429/503)
    #[error("backend throttled (status {status})")]
    Throttled { status: u16 },

    /// 백엔드가 요청을 거부함
    #[error("request rejected (status {status}): {reason}")]
    Rejected { status: u16, reason: String },

    /// 응답 본문 해석 실패
    #[error("failed to decode backend response: {0}")]
    Decode(String),

    /// 작업별 타임아웃 초과 (force-merge 등)
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },
}

impl BackendError {
    /// 재시도 대상(과부하)인지 확인합니다.
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }

    /// HTTP 상태 코드를 에러로 분류합니다.
    pub fn from_status(status: u16, reason: impl Into<String>) -> Self {
        match status {
            429 | 503 => Self::Throttled { status },
            _ => Self::Rejected {
                status,
                reason: reason.into(),
            },
        }
    }
}
