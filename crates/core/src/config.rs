//! 설정 관리 -- logsift.toml 파싱 및 런타임 설정
//!
//! [`SiftConfig`]는 모든 크레이트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGSIFT_BACKEND_URL=http://es:9200` 형식)
//! 3. 설정 파일 (`logsift.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logsift_core::error::SiftError> {
//! use logsift_core::config::SiftConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = SiftConfig::load("logsift.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = SiftConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SiftError};
use crate::types::SortOrder;

/// logsift 통합 설정
///
/// `logsift.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 크레이트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiftConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 검색 백엔드 연결 설정
    #[serde(default)]
    pub backend: BackendConfig,
    /// 벌크 인덱서 설정
    #[serde(default)]
    pub indexer: IndexerConfig,
    /// 검색/쿼리 컴파일러 설정
    #[serde(default)]
    pub search: SearchConfig,
    /// 로그 타입 목록
    #[serde(default)]
    pub log_types: Vec<LogTypeConfig>,
}

impl SiftConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SiftError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SiftError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SiftError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SiftError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SiftError> {
        toml::from_str(toml_str).map_err(|e| {
            SiftError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 이름으로 로그 타입 설정을 찾습니다.
    pub fn log_type(&self, name: &str) -> Result<&LogTypeConfig, ConfigError> {
        self.log_types
            .iter()
            .find(|lt| lt.name == name)
            .ok_or_else(|| ConfigError::UnknownLogType(name.to_owned()))
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGSIFT_{SECTION}_{FIELD}`
    /// 예: `LOGSIFT_INDEXER_WORKERS=4`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGSIFT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGSIFT_GENERAL_LOG_FORMAT");

        // Backend
        override_string(&mut self.backend.url, "LOGSIFT_BACKEND_URL");
        override_u64(&mut self.backend.timeout_secs, "LOGSIFT_BACKEND_TIMEOUT_SECS");
        override_u64(
            &mut self.backend.merge_timeout_secs,
            "LOGSIFT_BACKEND_MERGE_TIMEOUT_SECS",
        );
        override_string(&mut self.backend.username, "LOGSIFT_BACKEND_USERNAME");
        override_string(&mut self.backend.password, "LOGSIFT_BACKEND_PASSWORD");

        // Indexer
        override_usize(&mut self.indexer.workers, "LOGSIFT_INDEXER_WORKERS");
        override_usize(&mut self.indexer.batch_bytes, "LOGSIFT_INDEXER_BATCH_BYTES");
        override_u64(
            &mut self.indexer.flush_interval_ms,
            "LOGSIFT_INDEXER_FLUSH_INTERVAL_MS",
        );
        override_u64(
            &mut self.indexer.retry_initial_backoff_ms,
            "LOGSIFT_INDEXER_RETRY_INITIAL_BACKOFF_MS",
        );
        override_u64(
            &mut self.indexer.retry_max_backoff_ms,
            "LOGSIFT_INDEXER_RETRY_MAX_BACKOFF_MS",
        );
        override_u32(
            &mut self.indexer.retry_max_attempts,
            "LOGSIFT_INDEXER_RETRY_MAX_ATTEMPTS",
        );

        // Search
        override_usize(
            &mut self.search.default_page_size,
            "LOGSIFT_SEARCH_DEFAULT_PAGE_SIZE",
        );
        override_usize(&mut self.search.max_page_size, "LOGSIFT_SEARCH_MAX_PAGE_SIZE");
        override_string(
            &mut self.search.scroll_keep_alive,
            "LOGSIFT_SEARCH_SCROLL_KEEP_ALIVE",
        );
        override_usize(
            &mut self.search.scroll_page_size,
            "LOGSIFT_SEARCH_SCROLL_PAGE_SIZE",
        );
        override_bool(
            &mut self.search.batch_lonely_terms,
            "LOGSIFT_SEARCH_BATCH_LONELY_TERMS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SiftError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.backend.validate()?;
        self.indexer.validate()?;
        self.search.validate()?;

        let mut names = HashSet::new();
        for log_type in &self.log_types {
            log_type.validate()?;
            if !names.insert(log_type.name.as_str()) {
                return Err(invalid(
                    "log_types.name",
                    format!("duplicate log type '{}'", log_type.name),
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> SiftError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 검색 백엔드 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// 백엔드 기본 URL
    pub url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// force-merge 타임아웃 (초)
    pub merge_timeout_secs: u64,
    /// basic auth 사용자명 (비어 있으면 인증 없음)
    pub username: String,
    /// basic auth 비밀번호
    pub password: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_owned(),
            timeout_secs: 30,
            merge_timeout_secs: 600,
            username: String::new(),
            password: String::new(),
        }
    }
}

impl BackendConfig {
    fn validate(&self) -> Result<(), SiftError> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(invalid("backend.url", "must start with http:// or https://"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("backend.timeout_secs", "must be greater than 0"));
        }
        if self.merge_timeout_secs == 0 {
            return Err(invalid(
                "backend.merge_timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// 벌크 인덱서 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// 배치 워커 수
    pub workers: usize,
    /// 배치 플러시 임계 크기 (직렬화 바이트)
    pub batch_bytes: usize,
    /// 유휴 상태에서 부분 배치를 플러시하는 간격 (밀리초)
    pub flush_interval_ms: u64,
    /// 과부하 재시도 초기 백오프 (밀리초)
    pub retry_initial_backoff_ms: u64,
    /// 과부하 재시도 최대 백오프 (밀리초)
    pub retry_max_backoff_ms: u64,
    /// 과부하 재시도 최대 횟수 (0 = 무제한)
    pub retry_max_attempts: u32,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            batch_bytes: 5 * 1024 * 1024,
            flush_interval_ms: 1_000,
            retry_initial_backoff_ms: 100,
            retry_max_backoff_ms: 5_000,
            retry_max_attempts: 0,
        }
    }
}

impl IndexerConfig {
    fn validate(&self) -> Result<(), SiftError> {
        const MAX_WORKERS: usize = 64;
        const MAX_BATCH_BYTES: usize = 100 * 1024 * 1024;

        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(invalid(
                "indexer.workers",
                format!("must be 1-{MAX_WORKERS}"),
            ));
        }
        if self.batch_bytes == 0 || self.batch_bytes > MAX_BATCH_BYTES {
            return Err(invalid(
                "indexer.batch_bytes",
                format!("must be 1-{MAX_BATCH_BYTES}"),
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(invalid(
                "indexer.flush_interval_ms",
                "must be greater than 0",
            ));
        }
        if self.retry_max_backoff_ms < self.retry_initial_backoff_ms {
            return Err(invalid(
                "indexer.retry_max_backoff_ms",
                "must be greater than or equal to retry_initial_backoff_ms",
            ));
        }
        Ok(())
    }
}

/// 검색/쿼리 컴파일러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 기본 페이지 크기
    pub default_page_size: usize,
    /// 최대 페이지 크기
    pub max_page_size: usize,
    /// 하이라이트 시작 마커
    pub highlight_pre_tag: String,
    /// 하이라이트 종료 마커
    pub highlight_post_tag: String,
    /// 하이라이트 조각 길이 (문자)
    pub fragment_size: u32,
    /// 필드당 하이라이트 조각 수 (0 = 필드 전체)
    pub number_of_fragments: u32,
    /// scroll 커서 유지 시간 (백엔드 표기, 예: "1m")
    pub scroll_keep_alive: String,
    /// scroll 페이지 크기
    pub scroll_page_size: usize,
    /// 퍼지 변형 가중치
    pub fuzzy_boost: f32,
    /// 퍼지 허용 범위
    pub fuzziness: String,
    /// 부호 없는 단순 용어를 하나의 relevance 쿼리로 묶을지 여부
    pub batch_lonely_terms: bool,
    /// 이 개수 이하의 should 절에는 절대값 1을 적용
    pub min_should_match_threshold: usize,
    /// 임계치를 넘는 should 절에 적용할 백분율
    pub min_should_match_percent: u8,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 1_000,
            highlight_pre_tag: "<mark>".to_owned(),
            highlight_post_tag: "</mark>".to_owned(),
            fragment_size: 150,
            number_of_fragments: 3,
            scroll_keep_alive: "1m".to_owned(),
            scroll_page_size: 500,
            fuzzy_boost: 0.5,
            fuzziness: "AUTO".to_owned(),
            batch_lonely_terms: true,
            min_should_match_threshold: 2,
            min_should_match_percent: 75,
        }
    }
}

impl SearchConfig {
    fn validate(&self) -> Result<(), SiftError> {
        if self.max_page_size == 0 {
            return Err(invalid("search.max_page_size", "must be greater than 0"));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(invalid(
                "search.default_page_size",
                "must be 1-max_page_size",
            ));
        }
        if self.scroll_page_size == 0 {
            return Err(invalid("search.scroll_page_size", "must be greater than 0"));
        }
        if self.scroll_keep_alive.is_empty() {
            return Err(invalid("search.scroll_keep_alive", "must not be empty"));
        }
        if !(self.fuzzy_boost > 0.0) {
            return Err(invalid("search.fuzzy_boost", "must be greater than 0"));
        }
        if self.min_should_match_percent == 0 || self.min_should_match_percent > 100 {
            return Err(invalid("search.min_should_match_percent", "must be 1-100"));
        }
        Ok(())
    }
}

/// 로그 타입 설정
///
/// 로그 타입마다 읽기 별칭(alias)과 컬럼 레지스트리를 가집니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogTypeConfig {
    /// 로그 타입 이름 (예: "eventlog")
    pub name: String,
    /// 읽기 별칭. 인덱스 세대 이름의 접두어로도 쓰입니다.
    pub alias: String,
    /// 공통 스키마 컬럼을 포함할지 여부
    #[serde(default = "default_true")]
    pub include_common_columns: bool,
    /// 로그 타입 전용 컬럼
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

fn default_true() -> bool {
    true
}

impl LogTypeConfig {
    fn validate(&self) -> Result<(), SiftError> {
        if self.name.is_empty() {
            return Err(invalid("log_types.name", "must not be empty"));
        }
        let alias_ok = !self.alias.is_empty()
            && self
                .alias
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !alias_ok {
            return Err(invalid(
                "log_types.alias",
                format!(
                    "alias '{}' must be non-empty lowercase [a-z0-9_-]",
                    self.alias
                ),
            ));
        }
        Ok(())
    }
}

/// 컬럼 정의 (설정 파일 표현)
///
/// 쿼리 크레이트가 이 정의로 불변 `Column`을 만듭니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// 논리 컬럼명 (쿼리의 `field:` 접두어)
    pub name: String,
    /// 백엔드 필드 경로
    pub field: String,
    /// 표시 이름
    #[serde(default)]
    pub display_name: Option<String>,
    /// 분류
    #[serde(default)]
    pub category: Option<String>,
    /// 정렬 필드 (기본값: `field`)
    #[serde(default)]
    pub sort_field: Option<String>,
    /// 정렬 가능 여부
    #[serde(default)]
    pub sortable: bool,
    /// 자유 텍스트 검색 대상 여부
    #[serde(default)]
    pub searchable: bool,
    /// 기본 정렬 방향
    #[serde(default)]
    pub default_sort_order: Option<SortOrder>,
    /// 값 변환 정책 (default, integer, boolean, uppercase, lowercase, ip)
    #[serde(default = "default_coercion")]
    pub coercion: String,
}

fn default_coercion() -> String {
    "default".to_owned()
}

impl ColumnSpec {
    /// 이름과 필드만으로 컬럼 정의를 생성합니다.
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            display_name: None,
            category: None,
            sort_field: None,
            sortable: false,
            searchable: false,
            default_sort_order: None,
            coercion: default_coercion(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
