//! logsift.toml 통합 설정 테스트
//!
//! - logsift.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 파일 로딩 에러 테스트

use logsift_core::config::SiftConfig;
use logsift_core::error::{ConfigError, SiftError};
use serial_test::serial;

const EXAMPLE: &str = include_str!("../../../logsift.toml.example");

// =============================================================================
// logsift.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let config = SiftConfig::parse(EXAMPLE).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.backend.url, "http://localhost:9200");
}

#[test]
fn example_config_passes_validation() {
    let config = SiftConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_declares_five_log_types() {
    let config = SiftConfig::parse(EXAMPLE).expect("should parse");
    let names: Vec<&str> = config.log_types.iter().map(|lt| lt.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["eventlog", "endpoint", "directory", "dbaudit", "syslog"]
    );
}

#[test]
fn example_config_column_flags() {
    let config = SiftConfig::parse(EXAMPLE).expect("should parse");
    let syslog = config.log_type("syslog").expect("syslog declared");
    let severity = syslog
        .columns
        .iter()
        .find(|c| c.name == "severity")
        .expect("severity column");

    assert_eq!(severity.field, "log.severity");
    assert_eq!(severity.coercion, "integer");
    assert!(severity.sortable);
    assert_eq!(
        severity.default_sort_order,
        Some(logsift_core::types::SortOrder::Asc)
    );
}

#[test]
fn example_config_matches_code_defaults() {
    let example = SiftConfig::parse(EXAMPLE).expect("should parse");
    let defaults = SiftConfig::default();

    assert_eq!(example.indexer.workers, defaults.indexer.workers);
    assert_eq!(example.indexer.batch_bytes, defaults.indexer.batch_bytes);
    assert_eq!(
        example.indexer.retry_max_attempts,
        defaults.indexer.retry_max_attempts
    );
    assert_eq!(
        example.backend.merge_timeout_secs,
        defaults.backend.merge_timeout_secs
    );
    assert_eq!(example.search.max_page_size, defaults.search.max_page_size);
    assert_eq!(
        example.search.min_should_match_percent,
        defaults.search.min_should_match_percent
    );
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_backend_only() {
    let config = SiftConfig::parse(
        r#"
[backend]
url = "https://search.internal:9200"
username = "loader"
"#,
    )
    .expect("should parse");

    assert_eq!(config.backend.url, "https://search.internal:9200");
    assert_eq!(config.backend.username, "loader");
    assert_eq!(config.backend.timeout_secs, 30);
    assert_eq!(config.indexer.workers, 2);
    config.validate().expect("partial config should validate");
}

#[test]
fn partial_config_search_tuning_only() {
    let config = SiftConfig::parse(
        r#"
[search]
batch_lonely_terms = false
min_should_match_percent = 50
"#,
    )
    .expect("should parse");

    assert!(!config.search.batch_lonely_terms);
    assert_eq!(config.search.min_should_match_percent, 50);
    assert_eq!(config.search.min_should_match_threshold, 2);
}

#[test]
fn wrong_value_type_is_parse_error() {
    let err = SiftConfig::parse("[indexer]\nworkers = \"two\"").unwrap_err();
    assert!(matches!(
        err,
        SiftError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial]
fn env_override_takes_precedence_over_toml() {
    let mut config = SiftConfig::parse(EXAMPLE).expect("should parse");
    let original = std::env::var("LOGSIFT_GENERAL_LOG_LEVEL").ok();

    // SAFETY: serial 테스트로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
    unsafe {
        std::env::set_var("LOGSIFT_GENERAL_LOG_LEVEL", "error");
    }
    config.apply_env_overrides();
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGSIFT_GENERAL_LOG_LEVEL", val),
            None => std::env::remove_var("LOGSIFT_GENERAL_LOG_LEVEL"),
        }
    }

    assert_eq!(config.general.log_level, "error");
}

#[test]
#[serial]
fn env_override_numeric_field() {
    let mut config = SiftConfig::default();
    let original = std::env::var("LOGSIFT_INDEXER_RETRY_MAX_ATTEMPTS").ok();

    // SAFETY: serial 테스트로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
    unsafe {
        std::env::set_var("LOGSIFT_INDEXER_RETRY_MAX_ATTEMPTS", "5");
    }
    config.apply_env_overrides();
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGSIFT_INDEXER_RETRY_MAX_ATTEMPTS", val),
            None => std::env::remove_var("LOGSIFT_INDEXER_RETRY_MAX_ATTEMPTS"),
        }
    }

    assert_eq!(config.indexer.retry_max_attempts, 5);
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
#[serial]
async fn load_reads_file_and_validates() {
    let path = std::env::temp_dir().join(format!("logsift-core-test-{}.toml", std::process::id()));
    tokio::fs::write(&path, "[indexer]\nworkers = 0\n")
        .await
        .expect("write temp config");

    let result = SiftConfig::load(&path).await;
    let _ = tokio::fs::remove_file(&path).await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("indexer.workers"));
}
