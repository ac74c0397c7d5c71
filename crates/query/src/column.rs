//! 컬럼 레지스트리 -- 로그 타입별 필드 메타데이터
//!
//! [`Column`]은 논리 컬럼명과 백엔드 필드 경로, 값 변환 정책([`Coercion`]),
//! 정렬/검색 플래그를 묶은 불변 메타데이터입니다.
//! [`ColumnRegistry`]는 시작 시 설정으로부터 한 번 만들어지며 이후 읽기 전용입니다.
//!
//! # 사용 예시
//! ```
//! use logsift_query::column::{Coercion, Column, ColumnRegistry};
//!
//! let registry = ColumnRegistry::from_columns(vec![
//!     Column::new("eventId", "log.eventId").with_coercion(Coercion::Integer),
//! ])
//! .unwrap();
//!
//! let column = registry.get("eventId").unwrap();
//! assert_eq!(column.coerce("4625"), Some(serde_json::json!(4625)));
//! assert_eq!(column.coerce("x"), None);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use logsift_core::config::{ColumnSpec, LogTypeConfig};
use logsift_core::types::{
    FIELD_EVENT_TIME, FIELD_MESSAGE, FIELD_RECEIVED_TIME, FIELD_RECORD_FINDER, FIELD_TAG,
    PAYLOAD_NAMESPACE, SortOrder,
};
use serde_json::Value;

use crate::error::QueryError;

/// 값 변환 정책
///
/// 쿼리 값(문자열)을 백엔드 term 값으로 바꿉니다.
/// `None`은 해당 용어를 버린다는 뜻입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Coercion {
    /// 문자열 그대로
    #[default]
    Default,
    /// 64비트 정수
    Integer,
    /// true/false/yes/no/on/off/1/0
    Boolean,
    /// 대문자 변환
    Uppercase,
    /// 소문자 변환
    Lowercase,
    /// IP 주소 (정규화된 표기)
    Ip,
}

impl Coercion {
    /// 설정 이름으로 정책을 찾습니다.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "default" | "string" => Some(Self::Default),
            "integer" | "int" => Some(Self::Integer),
            "boolean" | "bool" => Some(Self::Boolean),
            "uppercase" => Some(Self::Uppercase),
            "lowercase" => Some(Self::Lowercase),
            "ip" => Some(Self::Ip),
            _ => None,
        }
    }

    /// 정책 이름
    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Uppercase => "uppercase",
            Self::Lowercase => "lowercase",
            Self::Ip => "ip",
        }
    }

    /// 원시 쿼리 값을 변환합니다.
    pub fn apply(&self, raw: &str) -> Option<Value> {
        match self {
            Self::Default => Some(Value::String(raw.to_owned())),
            Self::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
            Self::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "off" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            Self::Uppercase => Some(Value::String(raw.to_uppercase())),
            Self::Lowercase => Some(Value::String(raw.to_lowercase())),
            Self::Ip => raw
                .trim()
                .parse::<IpAddr>()
                .ok()
                .map(|ip| Value::String(ip.to_string())),
        }
    }
}

impl fmt::Display for Coercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 컬럼 메타데이터
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// 논리 컬럼명
    pub name: String,
    /// 백엔드 필드 경로
    pub backend_field: String,
    /// 표시 이름
    pub display_name: String,
    /// 분류
    pub category: Option<String>,
    /// 정렬에 사용할 백엔드 필드
    pub sort_field: String,
    /// 정렬 가능 여부
    pub sortable: bool,
    /// 자유 텍스트 검색 대상 여부
    pub searchable: bool,
    /// 기본 정렬 방향
    pub default_sort_order: Option<SortOrder>,
    /// 값 변환 정책
    pub coercion: Coercion,
}

impl Column {
    /// 기본 플래그로 컬럼을 생성합니다. 정렬 필드와 표시 이름은 각각
    /// 백엔드 필드와 컬럼명을 따릅니다.
    pub fn new(name: impl Into<String>, backend_field: impl Into<String>) -> Self {
        let name = name.into();
        let backend_field = backend_field.into();
        Self {
            display_name: name.clone(),
            sort_field: backend_field.clone(),
            name,
            backend_field,
            category: None,
            sortable: false,
            searchable: false,
            default_sort_order: None,
            coercion: Coercion::Default,
        }
    }

    /// 값 변환 정책을 설정합니다.
    pub fn with_coercion(mut self, coercion: Coercion) -> Self {
        self.coercion = coercion;
        self
    }

    /// 분류를 설정합니다.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// 표시 이름을 설정합니다.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// 정렬 가능 컬럼으로 표시합니다.
    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// 자유 텍스트 검색 대상으로 표시합니다.
    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    /// 기본 정렬 방향을 설정합니다.
    pub fn with_default_sort(mut self, order: SortOrder) -> Self {
        self.default_sort_order = Some(order);
        self
    }

    /// 설정 파일 표현에서 컬럼을 생성합니다.
    pub fn from_spec(spec: &ColumnSpec) -> Result<Self, QueryError> {
        let coercion =
            Coercion::from_name(&spec.coercion).ok_or_else(|| QueryError::UnknownCoercion {
                column: spec.name.clone(),
                coercion: spec.coercion.clone(),
            })?;

        let mut column = Column::new(&spec.name, &spec.field).with_coercion(coercion);
        if let Some(display_name) = &spec.display_name {
            column.display_name = display_name.clone();
        }
        if let Some(sort_field) = &spec.sort_field {
            column.sort_field = sort_field.clone();
        }
        column.category = spec.category.clone();
        column.sortable = spec.sortable;
        column.searchable = spec.searchable;
        column.default_sort_order = spec.default_sort_order;
        Ok(column)
    }

    /// 쿼리 값을 이 컬럼의 정책으로 변환합니다.
    pub fn coerce(&self, raw: &str) -> Option<Value> {
        self.coercion.apply(raw)
    }
}

/// 로그 타입별 컬럼 레지스트리
///
/// 컬럼명은 레지스트리 안에서 유일합니다. 등록 순서가 유지되며,
/// 기본 정렬 컬럼은 기본 정렬 방향을 가진 첫 번째 컬럼입니다.
#[derive(Debug, Clone)]
pub struct ColumnRegistry {
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
    time_field: String,
    tag_field: String,
    namespace: String,
}

impl ColumnRegistry {
    /// 컬럼 목록으로 레지스트리를 생성합니다.
    ///
    /// # Errors
    /// 빈 컬럼명, 빈 백엔드 필드, 중복 컬럼명이 있으면 `InvalidColumn`을 반환합니다.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, QueryError> {
        let mut by_name = HashMap::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            validate_column(column)?;
            if by_name.insert(column.name.clone(), idx).is_some() {
                return Err(QueryError::InvalidColumn {
                    name: column.name.clone(),
                    reason: "duplicate column name".to_owned(),
                });
            }
        }

        let time_field = by_name
            .get(FIELD_EVENT_TIME)
            .map(|&idx| columns[idx].backend_field.clone())
            .unwrap_or_else(|| FIELD_EVENT_TIME.to_owned());
        let tag_field = by_name
            .get(FIELD_TAG)
            .map(|&idx| columns[idx].backend_field.clone())
            .unwrap_or_else(|| FIELD_TAG.to_owned());

        Ok(Self {
            columns,
            by_name,
            time_field,
            tag_field,
            namespace: PAYLOAD_NAMESPACE.to_owned(),
        })
    }

    /// 설정 파일 표현 목록으로 레지스트리를 생성합니다.
    pub fn from_specs(specs: &[ColumnSpec]) -> Result<Self, QueryError> {
        let columns = specs
            .iter()
            .map(Column::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_columns(columns)
    }

    /// 공통 스키마 컬럼만 가진 레지스트리를 반환합니다.
    pub fn common() -> Self {
        let columns = common_columns();
        let by_name = columns
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.name.clone(), idx))
            .collect();
        Self {
            columns,
            by_name,
            time_field: FIELD_EVENT_TIME.to_owned(),
            tag_field: FIELD_TAG.to_owned(),
            namespace: PAYLOAD_NAMESPACE.to_owned(),
        }
    }

    /// 로그 타입 설정으로 레지스트리를 생성합니다.
    ///
    /// `include_common_columns`가 켜져 있으면 공통 컬럼 뒤에 로그 타입 컬럼을
    /// 덧붙입니다. 이름이 같은 공통 컬럼은 로그 타입 정의로 대체됩니다.
    pub fn for_log_type(log_type: &LogTypeConfig) -> Result<Self, QueryError> {
        let own = log_type
            .columns
            .iter()
            .map(Column::from_spec)
            .collect::<Result<Vec<_>, _>>()?;

        if !log_type.include_common_columns {
            return Self::from_columns(own);
        }

        let mut columns: Vec<Column> = common_columns()
            .into_iter()
            .filter(|common| !own.iter().any(|c| c.name == common.name))
            .collect();
        columns.extend(own);
        Self::from_columns(columns)
    }

    /// payload 네임스페이스를 바꿉니다.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// 이름으로 컬럼을 찾습니다.
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.by_name.get(name).map(|&idx| &self.columns[idx])
    }

    /// 등록 순서대로 모든 컬럼을 반환합니다.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// 자유 텍스트 검색 대상 백엔드 필드 목록
    pub fn searchable_fields(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.searchable)
            .map(|c| c.backend_field.clone())
            .collect()
    }

    /// 정렬 가능한 컬럼 목록
    pub fn sortable_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.sortable)
    }

    /// 시간 구간 필터에 사용할 백엔드 필드
    pub fn time_field(&self) -> &str {
        &self.time_field
    }

    /// 해시태그 필터에 사용할 백엔드 필드
    pub fn tag_field(&self) -> &str {
        &self.tag_field
    }

    /// 태그 컬럼의 변환 규칙을 적용한 태그 값
    ///
    /// 태그 컬럼이 등록되지 않은 레지스트리에서는 원문을 그대로 사용합니다.
    pub fn coerce_tag(&self, raw: &str) -> Option<Value> {
        match self.get(FIELD_TAG) {
            Some(column) => column.coerce(raw),
            None => Some(Value::String(raw.to_owned())),
        }
    }

    /// 등록되지 않은 필드를 찾을 payload 네임스페이스
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// 기본 정렬 (정렬 필드, 방향)
    ///
    /// 기본 정렬 방향을 가진 첫 번째 컬럼, 없으면 시간 필드 내림차순입니다.
    pub fn default_sort(&self) -> (&str, SortOrder) {
        self.columns
            .iter()
            .find_map(|c| {
                c.default_sort_order
                    .map(|order| (c.sort_field.as_str(), order))
            })
            .unwrap_or((self.time_field.as_str(), SortOrder::Desc))
    }

    /// 컬럼 수
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// 컬럼이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

fn validate_column(column: &Column) -> Result<(), QueryError> {
    if column.name.trim().is_empty() {
        return Err(QueryError::InvalidColumn {
            name: column.name.clone(),
            reason: "column name must not be empty".to_owned(),
        });
    }
    if column.backend_field.trim().is_empty() {
        return Err(QueryError::InvalidColumn {
            name: column.name.clone(),
            reason: "backend field must not be empty".to_owned(),
        });
    }
    if column.name.chars().any(char::is_whitespace) || column.name.contains(':') {
        return Err(QueryError::InvalidColumn {
            name: column.name.clone(),
            reason: "column name must not contain whitespace or ':'".to_owned(),
        });
    }
    Ok(())
}

/// 공통 스키마 컬럼
fn common_columns() -> Vec<Column> {
    vec![
        Column::new(FIELD_EVENT_TIME, FIELD_EVENT_TIME)
            .with_display_name("Event time")
            .with_category("time")
            .sortable(),
        Column::new(FIELD_RECEIVED_TIME, FIELD_RECEIVED_TIME)
            .with_display_name("Received time")
            .with_category("time")
            .sortable(),
        Column::new(FIELD_RECORD_FINDER, FIELD_RECORD_FINDER)
            .with_display_name("Record")
            .with_category("record")
            .sortable(),
        Column::new(FIELD_TAG, FIELD_TAG)
            .with_display_name("Tags")
            .with_category("record")
            .with_coercion(Coercion::Lowercase),
        Column::new(FIELD_MESSAGE, FIELD_MESSAGE)
            .with_display_name("Message")
            .with_category("record")
            .searchable(),
        Column::new("reportingIp", "reportingIp")
            .with_display_name("Reporting IP")
            .with_category("network")
            .with_coercion(Coercion::Ip)
            .sortable(),
        Column::new("receivingPort", "receivingPort")
            .with_display_name("Receiving port")
            .with_category("network")
            .with_coercion(Coercion::Integer)
            .sortable(),
        Column::new("ipProtocol", "ipProtocol")
            .with_display_name("Protocol")
            .with_category("network")
            .with_coercion(Coercion::Lowercase),
        Column::new("ip", "all.ip")
            .with_display_name("IP")
            .with_category("identity")
            .with_coercion(Coercion::Ip),
        Column::new("sourceIp", "source.ip")
            .with_display_name("Source IP")
            .with_category("identity")
            .with_coercion(Coercion::Ip),
        Column::new("targetIp", "target.ip")
            .with_display_name("Target IP")
            .with_category("identity")
            .with_coercion(Coercion::Ip),
        Column::new("port", "all.port")
            .with_display_name("Port")
            .with_category("identity")
            .with_coercion(Coercion::Integer),
        Column::new("sourcePort", "source.port")
            .with_display_name("Source port")
            .with_category("identity")
            .with_coercion(Coercion::Integer),
        Column::new("targetPort", "target.port")
            .with_display_name("Target port")
            .with_category("identity")
            .with_coercion(Coercion::Integer),
        Column::new("hostname", "all.hostname")
            .with_display_name("Hostname")
            .with_category("identity")
            .with_coercion(Coercion::Lowercase)
            .searchable(),
        Column::new("sourceHost", "source.hostname")
            .with_display_name("Source host")
            .with_category("identity")
            .with_coercion(Coercion::Lowercase),
        Column::new("targetHost", "target.hostname")
            .with_display_name("Target host")
            .with_category("identity")
            .with_coercion(Coercion::Lowercase),
        Column::new("fqdn", "all.fqdn")
            .with_display_name("FQDN")
            .with_category("identity")
            .with_coercion(Coercion::Lowercase),
        Column::new("user", "all.samName")
            .with_display_name("User")
            .with_category("identity")
            .searchable(),
        Column::new("sourceUser", "source.samName")
            .with_display_name("Source user")
            .with_category("identity"),
        Column::new("targetUser", "target.samName")
            .with_display_name("Target user")
            .with_category("identity"),
        Column::new("upn", "all.upn")
            .with_display_name("UPN")
            .with_category("identity")
            .with_coercion(Coercion::Lowercase)
            .searchable(),
        Column::new("sid", "all.sid")
            .with_display_name("SID")
            .with_category("identity")
            .with_coercion(Coercion::Uppercase),
        Column::new("domain", "all.domain")
            .with_display_name("Domain")
            .with_category("identity")
            .with_coercion(Coercion::Uppercase),
        Column::new("logonId", "all.logonId")
            .with_display_name("Logon ID")
            .with_category("identity"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coercion_integer() {
        assert_eq!(Coercion::Integer.apply("4625"), Some(json!(4625)));
        assert_eq!(Coercion::Integer.apply("-3"), Some(json!(-3)));
        assert_eq!(Coercion::Integer.apply("12a"), None);
    }

    #[test]
    fn coercion_boolean_accepts_common_spellings() {
        for raw in ["true", "YES", "On", "1"] {
            assert_eq!(Coercion::Boolean.apply(raw), Some(json!(true)), "{raw}");
        }
        for raw in ["false", "no", "OFF", "0"] {
            assert_eq!(Coercion::Boolean.apply(raw), Some(json!(false)), "{raw}");
        }
        assert_eq!(Coercion::Boolean.apply("maybe"), None);
    }

    #[test]
    fn coercion_case_and_ip() {
        assert_eq!(Coercion::Uppercase.apply("corp"), Some(json!("CORP")));
        assert_eq!(Coercion::Lowercase.apply("WEB-01"), Some(json!("web-01")));
        assert_eq!(Coercion::Ip.apply("10.0.0.1"), Some(json!("10.0.0.1")));
        assert_eq!(Coercion::Ip.apply("FE80::1"), Some(json!("fe80::1")));
        assert_eq!(Coercion::Ip.apply("not-an-ip"), None);
    }

    #[test]
    fn coercion_names_roundtrip() {
        for c in [
            Coercion::Default,
            Coercion::Integer,
            Coercion::Boolean,
            Coercion::Uppercase,
            Coercion::Lowercase,
            Coercion::Ip,
        ] {
            assert_eq!(Coercion::from_name(c.name()), Some(c));
        }
        assert_eq!(Coercion::from_name("hex"), None);
    }

    #[test]
    fn sort_field_defaults_to_backend_field() {
        let column = Column::new("eventId", "log.eventId");
        assert_eq!(column.sort_field, "log.eventId");
        assert_eq!(column.display_name, "eventId");
    }

    #[test]
    fn from_specs_rejects_duplicates() {
        let specs = vec![
            ColumnSpec::new("eventId", "log.eventId"),
            ColumnSpec::new("eventId", "log.other"),
        ];
        let err = ColumnRegistry::from_specs(&specs).unwrap_err();
        assert!(matches!(err, QueryError::InvalidColumn { .. }));
    }

    #[test]
    fn from_specs_rejects_empty_name() {
        let specs = vec![ColumnSpec::new("", "log.x")];
        assert!(ColumnRegistry::from_specs(&specs).is_err());
    }

    #[test]
    fn from_specs_rejects_unknown_coercion() {
        let mut spec = ColumnSpec::new("level", "log.level");
        spec.coercion = "hex".to_owned();
        let err = ColumnRegistry::from_specs(&[spec]).unwrap_err();
        assert!(matches!(err, QueryError::UnknownCoercion { .. }));
    }

    #[test]
    fn from_spec_copies_flags() {
        let mut spec = ColumnSpec::new("severity", "log.severity");
        spec.sortable = true;
        spec.sort_field = Some("log.severity.num".to_owned());
        spec.default_sort_order = Some(SortOrder::Asc);
        spec.coercion = "integer".to_owned();
        let column = Column::from_spec(&spec).unwrap();
        assert!(column.sortable);
        assert!(!column.searchable);
        assert_eq!(column.sort_field, "log.severity.num");
        assert_eq!(column.coercion, Coercion::Integer);
    }

    #[test]
    fn common_registry_defaults() {
        let registry = ColumnRegistry::common();
        assert_eq!(registry.time_field(), "eventTime");
        assert_eq!(registry.tag_field(), "tag");
        assert_eq!(registry.namespace(), "log");
        assert_eq!(registry.default_sort(), ("eventTime", SortOrder::Desc));
        assert!(registry.searchable_fields().contains(&"message".to_owned()));
        assert!(registry.get("recordFinder").is_some());
    }

    #[test]
    fn tag_values_follow_tag_column_coercion() {
        let registry = ColumnRegistry::common();
        assert_eq!(registry.coerce_tag("VPN"), Some(Value::String("vpn".to_owned())));

        let bare = ColumnRegistry::from_columns(vec![Column::new("message", "message")]).unwrap();
        assert_eq!(bare.coerce_tag("VPN"), Some(Value::String("VPN".to_owned())));
    }

    #[test]
    fn common_column_names_are_unique() {
        let columns = common_columns();
        ColumnRegistry::from_columns(columns).unwrap();
    }

    #[test]
    fn default_sort_uses_first_column_with_order() {
        let registry = ColumnRegistry::from_columns(vec![
            Column::new("a", "log.a").sortable(),
            Column::new("b", "log.b")
                .sortable()
                .with_default_sort(SortOrder::Asc),
            Column::new("c", "log.c").with_default_sort(SortOrder::Desc),
        ])
        .unwrap();
        assert_eq!(registry.default_sort(), ("log.b", SortOrder::Asc));
    }

    #[test]
    fn log_type_columns_override_common_by_name() {
        let mut message = ColumnSpec::new("message", "log.text");
        message.searchable = true;
        let log_type = LogTypeConfig {
            name: "syslog".to_owned(),
            alias: "syslog".to_owned(),
            include_common_columns: true,
            columns: vec![message, ColumnSpec::new("facility", "log.facility")],
        };
        let registry = ColumnRegistry::for_log_type(&log_type).unwrap();
        assert_eq!(registry.get("message").unwrap().backend_field, "log.text");
        assert!(registry.get("facility").is_some());
        assert!(registry.get("hostname").is_some());
        assert_eq!(registry.columns().last().unwrap().name, "facility");
    }

    #[test]
    fn log_type_without_common_columns() {
        let log_type = LogTypeConfig {
            name: "dbaudit".to_owned(),
            alias: "dbaudit".to_owned(),
            include_common_columns: false,
            columns: vec![ColumnSpec::new("statement", "log.statement")],
        };
        let registry = ColumnRegistry::for_log_type(&log_type).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.time_field(), "eventTime");
        assert!(registry.searchable_fields().is_empty());
    }

    #[test]
    fn time_field_follows_registered_event_time_column() {
        let registry =
            ColumnRegistry::from_columns(vec![Column::new("eventTime", "log.timestamp")]).unwrap();
        assert_eq!(registry.time_field(), "log.timestamp");
    }
}
