//! 공통 스키마 인덱스 매핑
//!
//! [`LogDocument`](logsift_core::types::LogDocument)의 필드를 백엔드 타입에 대응시킵니다.
//! 로그 타입별 payload(`log`)는 동적 매핑에 맡깁니다.

use serde_json::{Map, Value, json};

/// 날짜 필드 형식: RFC 3339 문자열과 epoch 밀리초 모두 허용
const DATE_FORMAT: &str = "strict_date_optional_time||epoch_millis";

/// 공통 스키마 매핑을 생성합니다.
pub fn default_mapping() -> Value {
    json!({
        "dynamic": true,
        "properties": {
            "recordFinder": { "type": "keyword" },
            "receivedTime": { "type": "date", "format": DATE_FORMAT },
            "eventTime": { "type": "date", "format": DATE_FORMAT },
            "receivingPort": { "type": "integer" },
            "reportingIp": { "type": "ip" },
            "ipProtocol": { "type": "keyword" },
            "tag": { "type": "keyword" },
            "message": { "type": "text" },
            "source": identifiers(),
            "target": identifiers(),
            "all": identifiers(),
            "log": { "type": "object", "dynamic": true }
        }
    })
}

/// 식별자 하위 객체 매핑
fn identifiers() -> Value {
    let mut properties = Map::new();
    properties.insert("ip".to_owned(), json!({ "type": "ip" }));
    properties.insert("port".to_owned(), json!({ "type": "integer" }));
    for field in ["hostname", "fqdn", "samName", "upn"] {
        // 검색과 정확 일치를 모두 지원
        properties.insert(
            field.to_owned(),
            json!({
                "type": "keyword",
                "fields": { "text": { "type": "text" } }
            }),
        );
    }
    for field in ["sid", "domain", "logonId"] {
        properties.insert(field.to_owned(), json!({ "type": "keyword" }));
    }
    json!({ "properties": properties })
}
