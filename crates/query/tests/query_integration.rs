//! 쿼리 크레이트 통합 테스트
//!
//! 설정 파일의 로그 타입 → 레지스트리 → 파싱 → 컴파일 → 요청 본문까지
//! 공개 API만으로 전체 흐름을 검증합니다.

use chrono::{TimeZone, Utc};
use logsift_core::config::SiftConfig;
use logsift_core::types::SortOrder;
use logsift_query::{
    ColumnRegistry, CompilerOptions, HighlightOptions, QueryCompiler, SearchRequest, TimeWindow,
};
use serde_json::json;

const CONFIG: &str = r#"
[search]
min_should_match_percent = 60

[[log_types]]
name = "eventlog"
alias = "eventlog"

[[log_types.columns]]
name = "eventId"
field = "log.eventId"
coercion = "integer"
sortable = true
default_sort_order = "desc"
"#;

fn window() -> TimeWindow {
    TimeWindow::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap(),
    )
    .unwrap()
}

#[test]
fn config_to_request_body() {
    let config = SiftConfig::parse(CONFIG).unwrap();
    let log_type = config.log_type("eventlog").unwrap();
    let registry = ColumnRegistry::for_log_type(log_type).unwrap();
    let compiler = QueryCompiler::new(CompilerOptions::from_core(&config.search));

    let query = compiler.compile_str(
        r#"+eventId:4625 -#noise alice bob "domain admins" hostname:WEB-01"#,
        &registry,
        &window(),
    );
    let body = SearchRequest::new(query)
        .sort(&registry, Some("eventId"), None)
        .page(0, 25)
        .highlight(&registry, HighlightOptions::from_core(&config.search))
        .to_body();

    let bool_body = &body["query"]["bool"];
    assert_eq!(bool_body["filter"].as_array().unwrap().len(), 3);
    assert_eq!(bool_body["filter"][2], json!({ "term": { "log.eventId": 4625 } }));
    assert_eq!(bool_body["must_not"][0], json!({ "term": { "tag": "noise" } }));

    // lonely(1) + phrase(1) + hostname filter(1) = 3 → 백분율
    assert_eq!(bool_body["should"].as_array().unwrap().len(), 3);
    assert_eq!(bool_body["minimum_should_match"], "60%");
    assert_eq!(
        bool_body["should"][2],
        json!({ "constant_score": { "filter": { "term": { "all.hostname": "web-01" } } } })
    );

    assert_eq!(body["sort"][0]["log.eventId"]["order"], "desc");
    assert_eq!(body["size"], 25);
    assert!(body["highlight"]["fields"].get("message").is_some());
}

#[test]
fn log_type_default_sort_is_used_without_explicit_column() {
    let config = SiftConfig::parse(CONFIG).unwrap();
    let registry = ColumnRegistry::for_log_type(config.log_type("eventlog").unwrap()).unwrap();
    let request = SearchRequest::new(Default::default()).sort(&registry, None, None);
    assert_eq!(
        request.sort_fields()[0],
        ("log.eventId".to_owned(), SortOrder::Desc)
    );
}

#[test]
fn time_ranges_use_epoch_millis() {
    let registry = ColumnRegistry::common();
    let query = QueryCompiler::default().compile_str("", &registry, &window());
    let json = query.to_json();

    let coarse = &json["bool"]["filter"][0]["range"]["eventTime"];
    let precise = &json["bool"]["filter"][1]["range"]["eventTime"];
    assert_eq!(coarse["format"], "epoch_millis");
    assert_eq!(
        coarse["gte"],
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap().timestamp_millis()
    );
    assert_eq!(
        coarse["lt"],
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap().timestamp_millis()
    );
    assert_eq!(
        precise["gte"],
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap().timestamp_millis()
    );
}
