//! 도메인 타입 -- 정규화된 보안 로그 문서
//!
//! 모든 로그 타입(이벤트 로그, 엔드포인트 보호 리포트, 디렉토리 크롤,
//! DB 감사 추적, syslog)의 ETL 어댑터는 [`LogDocument`] 공통 스키마에
//! 로그 타입별 payload(`log`)를 덧붙여 내보냅니다.
//!
//! 문서는 추가 전용(append-only)이며, 정정은 새 문서로 기록합니다.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- 백엔드 필드 경로 상수 ---

/// 레코드 식별자 필드
pub const FIELD_RECORD_FINDER: &str = "recordFinder";
/// 수집 시각 필드
pub const FIELD_RECEIVED_TIME: &str = "receivedTime";
/// 이벤트 발생 시각 필드
pub const FIELD_EVENT_TIME: &str = "eventTime";
/// 태그 필드
pub const FIELD_TAG: &str = "tag";
/// 메시지 필드
pub const FIELD_MESSAGE: &str = "message";
/// 로그 타입별 payload 네임스페이스
pub const PAYLOAD_NAMESPACE: &str = "log";

/// 정렬 방향
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// 오름차순
    Asc,
    /// 내림차순
    #[default]
    Desc,
}

impl SortOrder {
    /// 백엔드 DSL 표기를 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// 문자열에서 정렬 방향을 파싱합니다. 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 식별자 묶음 -- `source`, `target`, `all` 하위 객체
///
/// 모든 필드는 선택적이며 다중 값을 가질 수 있습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Identifiers {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip: Vec<IpAddr>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hostname: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fqdn: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sam_name: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sid: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub domain: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub upn: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logon_id: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub port: Vec<u16>,
}

impl Identifiers {
    /// 모든 필드가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.ip.is_empty()
            && self.hostname.is_empty()
            && self.fqdn.is_empty()
            && self.sam_name.is_empty()
            && self.sid.is_empty()
            && self.domain.is_empty()
            && self.upn.is_empty()
            && self.logon_id.is_empty()
            && self.port.is_empty()
    }

    /// 다른 식별자 묶음의 값을 중복 없이 합칩니다. 기존 순서를 유지합니다.
    pub fn merge_from(&mut self, other: &Identifiers) {
        extend_unique(&mut self.ip, &other.ip);
        extend_unique(&mut self.hostname, &other.hostname);
        extend_unique(&mut self.fqdn, &other.fqdn);
        extend_unique(&mut self.sam_name, &other.sam_name);
        extend_unique(&mut self.sid, &other.sid);
        extend_unique(&mut self.domain, &other.domain);
        extend_unique(&mut self.upn, &other.upn);
        extend_unique(&mut self.logon_id, &other.logon_id);
        extend_unique(&mut self.port, &other.port);
    }

    /// 두 묶음의 중복 제거 합집합을 반환합니다.
    pub fn union(a: &Identifiers, b: &Identifiers) -> Identifiers {
        let mut merged = Identifiers::default();
        merged.merge_from(a);
        merged.merge_from(b);
        merged
    }
}

fn extend_unique<T: PartialEq + Clone>(target: &mut Vec<T>, values: &[T]) {
    for value in values {
        if !target.contains(value) {
            target.push(value.clone());
        }
    }
}

/// 정규화된 로그 이벤트 하나
///
/// `record_finder`는 같은 `received_time` 버킷 안에서 유일한 판별자이며,
/// 두 값의 조합으로 permalink locator를 다시 계산할 수 있습니다.
///
/// `all`은 `source`와 `target`의 중복 제거 합집합입니다. 식별자를 설정하는
/// 메서드([`with_source`](Self::with_source), [`with_target`](Self::with_target))가
/// 매번 다시 계산하므로 쿼리 시점에 합칠 필요가 없습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogDocument {
    /// 레코드 판별자
    #[serde(default)]
    pub record_finder: String,
    /// 수신 포트
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiving_port: Option<u16>,
    /// 보고 장비 IP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporting_ip: Option<IpAddr>,
    /// 수집 시각 (밀리초 정밀도)
    pub received_time: DateTime<Utc>,
    /// 소스가 보고한 이벤트 시각
    pub event_time: DateTime<Utc>,
    /// 레이블 집합
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<String>,
    /// 메시지 본문
    #[serde(default)]
    pub message: String,
    /// IP 프로토콜명 (tcp, udp 등)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_protocol: Option<String>,
    /// 출발지 식별자
    #[serde(default, skip_serializing_if = "Identifiers::is_empty")]
    pub source: Identifiers,
    /// 대상 식별자
    #[serde(default, skip_serializing_if = "Identifiers::is_empty")]
    pub target: Identifiers,
    /// source ∪ target
    #[serde(default, skip_serializing_if = "Identifiers::is_empty")]
    pub all: Identifiers,
    /// 로그 타입별 payload
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub log: serde_json::Value,
}

impl LogDocument {
    /// 새 문서를 생성합니다. 두 시각은 밀리초 단위로 절삭됩니다.
    pub fn new(
        received_time: DateTime<Utc>,
        event_time: DateTime<Utc>,
        record_finder: impl Into<String>,
    ) -> Self {
        Self {
            record_finder: record_finder.into(),
            receiving_port: None,
            reporting_ip: None,
            received_time: truncate_to_millis(received_time),
            event_time: truncate_to_millis(event_time),
            tag: Vec::new(),
            message: String::new(),
            ip_protocol: None,
            source: Identifiers::default(),
            target: Identifiers::default(),
            all: Identifiers::default(),
            log: serde_json::Value::Null,
        }
    }

    /// 메시지를 설정합니다.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// 태그를 추가합니다. 이미 있는 태그는 무시합니다.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tag.contains(&tag) {
            self.tag.push(tag);
        }
        self
    }

    /// 보고 장비 IP를 설정합니다.
    pub fn with_reporting_ip(mut self, ip: IpAddr) -> Self {
        self.reporting_ip = Some(ip);
        self
    }

    /// 출발지 식별자를 설정하고 `all`을 다시 계산합니다.
    pub fn with_source(mut self, source: Identifiers) -> Self {
        self.source = source;
        self.fan_out();
        self
    }

    /// 대상 식별자를 설정하고 `all`을 다시 계산합니다.
    pub fn with_target(mut self, target: Identifiers) -> Self {
        self.target = target;
        self.fan_out();
        self
    }

    /// 로그 타입별 payload를 설정합니다.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.log = payload;
        self
    }

    /// `all`을 `source ∪ target`으로 다시 계산합니다.
    ///
    /// 외부에서 역직렬화한 문서는 `all`이 비어 있을 수 있으므로
    /// 적재 전에 한 번 호출합니다.
    pub fn fan_out(&mut self) {
        self.all = Identifiers::union(&self.source, &self.target);
    }
}

/// 시각을 밀리초 정밀도로 절삭합니다.
pub fn truncate_to_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(time.timestamp_millis()).unwrap_or(time)
}
