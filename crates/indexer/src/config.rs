//! 벌크 파이프라인 설정
//!
//! [`BulkConfig`]는 core의 `[indexer]`, `[backend]` 섹션에서 파생되며
//! 밀리초/초 값을 [`Duration`]으로 바꿔 파이프라인에 전달합니다.
//!
//! # 사용 예시
//! ```
//! use logsift_core::config::SiftConfig;
//! use logsift_indexer::config::BulkConfig;
//!
//! let core_config = SiftConfig::default();
//! let config = BulkConfig::from_core(&core_config);
//! assert_eq!(config.workers, 2);
//! ```

use std::time::Duration;

use logsift_core::config::SiftConfig;

use crate::error::IndexerError;

/// 최대 워커 수
const MAX_WORKERS: usize = 64;

/// 벌크 파이프라인 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkConfig {
    /// 배치 워커 수
    pub workers: usize,
    /// 배치 플러시 임계 크기 (NDJSON 바이트)
    pub batch_bytes: usize,
    /// 유휴 상태에서 부분 배치를 플러시하는 간격
    pub flush_interval: Duration,
    /// 과부하 재시도 초기 백오프
    pub retry_initial_backoff: Duration,
    /// 과부하 재시도 최대 백오프
    pub retry_max_backoff: Duration,
    /// 과부하 재시도 최대 횟수 (0 = 무제한)
    pub retry_max_attempts: u32,
    /// force-merge 타임아웃
    pub merge_timeout: Duration,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            batch_bytes: 5 * 1024 * 1024,
            flush_interval: Duration::from_secs(1),
            retry_initial_backoff: Duration::from_millis(100),
            retry_max_backoff: Duration::from_secs(5),
            retry_max_attempts: 0,
            merge_timeout: Duration::from_secs(600),
        }
    }
}

impl BulkConfig {
    /// core 설정에서 벌크 설정을 생성합니다.
    pub fn from_core(core: &SiftConfig) -> Self {
        Self {
            workers: core.indexer.workers,
            batch_bytes: core.indexer.batch_bytes,
            flush_interval: Duration::from_millis(core.indexer.flush_interval_ms),
            retry_initial_backoff: Duration::from_millis(core.indexer.retry_initial_backoff_ms),
            retry_max_backoff: Duration::from_millis(core.indexer.retry_max_backoff_ms),
            retry_max_attempts: core.indexer.retry_max_attempts,
            merge_timeout: Duration::from_secs(core.backend.merge_timeout_secs),
        }
    }

    /// 빌더를 생성합니다.
    pub fn builder() -> BulkConfigBuilder {
        BulkConfigBuilder::new()
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(config_error(
                "workers",
                format!("must be 1-{MAX_WORKERS}"),
            ));
        }
        if self.batch_bytes == 0 {
            return Err(config_error("batch_bytes", "must be greater than 0"));
        }
        if self.flush_interval.is_zero() {
            return Err(config_error("flush_interval", "must be greater than 0"));
        }
        if self.retry_max_backoff < self.retry_initial_backoff {
            return Err(config_error(
                "retry_max_backoff",
                "must be greater than or equal to retry_initial_backoff",
            ));
        }
        if self.merge_timeout.is_zero() {
            return Err(config_error("merge_timeout", "must be greater than 0"));
        }
        Ok(())
    }

    /// `attempts`번 시도한 항목이 더 재시도할 수 있는지 확인합니다.
    pub fn may_retry(&self, attempts: u32) -> bool {
        self.retry_max_attempts == 0 || attempts < self.retry_max_attempts
    }

    /// 현재 백오프의 다음 값 (두 배, 최대값 제한)
    pub fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.retry_max_backoff)
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> IndexerError {
    IndexerError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 벌크 설정 빌더
#[derive(Debug, Default)]
pub struct BulkConfigBuilder {
    config: BulkConfig,
}

impl BulkConfigBuilder {
    /// 기본값으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 워커 수를 설정합니다.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// 배치 플러시 임계 크기를 설정합니다.
    pub fn batch_bytes(mut self, bytes: usize) -> Self {
        self.config.batch_bytes = bytes;
        self
    }

    /// 유휴 플러시 간격을 설정합니다.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    /// 재시도 백오프 범위를 설정합니다.
    pub fn retry_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.retry_initial_backoff = initial;
        self.config.retry_max_backoff = max;
        self
    }

    /// 재시도 최대 횟수를 설정합니다 (0 = 무제한).
    pub fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_max_attempts = attempts;
        self
    }

    /// force-merge 타임아웃을 설정합니다.
    pub fn merge_timeout(mut self, timeout: Duration) -> Self {
        self.config.merge_timeout = timeout;
        self
    }

    /// 설정을 검증하고 반환합니다.
    pub fn build(self) -> Result<BulkConfig, IndexerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        BulkConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_converts_units() {
        let mut core = SiftConfig::default();
        core.indexer.flush_interval_ms = 250;
        core.indexer.workers = 4;
        core.backend.merge_timeout_secs = 900;
        let config = BulkConfig::from_core(&core);
        assert_eq!(config.workers, 4);
        assert_eq!(config.flush_interval, Duration::from_millis(250));
        assert_eq!(config.merge_timeout, Duration::from_secs(900));
    }

    #[test]
    fn builder_rejects_zero_workers() {
        let err = BulkConfig::builder().workers(0).build().unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn builder_rejects_inverted_backoff() {
        let result = BulkConfig::builder()
            .retry_backoff(Duration::from_secs(2), Duration::from_secs(1))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn unbounded_retry_when_max_attempts_is_zero() {
        let config = BulkConfig::default();
        assert!(config.may_retry(1));
        assert!(config.may_retry(u32::MAX - 1));
    }

    #[test]
    fn bounded_retry() {
        let config = BulkConfig::builder().retry_max_attempts(3).build().unwrap();
        assert!(config.may_retry(2));
        assert!(!config.may_retry(3));
    }

    #[test]
    fn backoff_doubles_up_to_max() {
        let config = BulkConfig::builder()
            .retry_backoff(Duration::from_millis(100), Duration::from_millis(350))
            .build()
            .unwrap();
        let b1 = config.next_backoff(config.retry_initial_backoff);
        let b2 = config.next_backoff(b1);
        let b3 = config.next_backoff(b2);
        assert_eq!(b1, Duration::from_millis(200));
        assert_eq!(b2, Duration::from_millis(350));
        assert_eq!(b3, Duration::from_millis(350));
    }
}
