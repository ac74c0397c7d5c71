//! 백엔드 쿼리 트리 -- 컴파일러 출력이자 검색 요청의 본문
//!
//! [`Query`]는 백엔드가 이해하는 원시 쿼리(term/range/match/phrase)와
//! [`BoolQuery`] 조합을 표현하며, [`Query::to_json`]으로
//! Elasticsearch 호환 JSON DSL을 생성합니다.
//!
//! ```text
//! bool
//!  ├─ filter    (점수 없음, must)
//!  ├─ must      (점수 반영)
//!  ├─ should    (점수 반영 + constant_score로 감싼 필터)
//!  └─ must_not
//! ```

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

/// `multi_match` 쿼리 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// 필드별 최고 점수
    BestFields,
    /// 구문 일치
    Phrase,
}

impl MatchKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::BestFields => "best_fields",
            Self::Phrase => "phrase",
        }
    }
}

/// 여러 용어 결합 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

impl Operator {
    fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// 다중 필드 텍스트 매치
#[derive(Debug, Clone, PartialEq)]
pub struct MultiMatch {
    /// 검색 텍스트
    pub query: String,
    /// 대상 필드 목록
    pub fields: Vec<String>,
    /// 매치 유형
    pub kind: MatchKind,
    /// 용어 결합 연산자 (없으면 백엔드 기본값)
    pub operator: Option<Operator>,
    /// 퍼지 허용 범위 (예: "AUTO")
    pub fuzziness: Option<String>,
    /// 점수 가중치
    pub boost: Option<f32>,
}

impl MultiMatch {
    /// 기본 설정의 `best_fields` 매치를 생성합니다.
    pub fn new(query: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            query: query.into(),
            fields,
            kind: MatchKind::BestFields,
            operator: None,
            fuzziness: None,
            boost: None,
        }
    }
}

/// minimum_should_match 정책 값
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinimumShouldMatch {
    /// 절대 개수
    Count(u32),
    /// 백분율
    Percent(u8),
}

impl MinimumShouldMatch {
    fn to_json(self) -> Value {
        match self {
            Self::Count(n) => json!(n),
            Self::Percent(p) => json!(format!("{p}%")),
        }
    }
}

/// 불리언 조합 쿼리
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    /// 점수에 영향 없는 필수 조건
    pub filter: Vec<Query>,
    /// 점수에 반영되는 필수 조건
    pub must: Vec<Query>,
    /// 선택 조건
    pub should: Vec<Query>,
    /// 제외 조건
    pub must_not: Vec<Query>,
    /// should 최소 일치 정책
    pub minimum_should_match: Option<MinimumShouldMatch>,
}

impl BoolQuery {
    /// 빈 불리언 쿼리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 조건이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.filter.is_empty()
            && self.must.is_empty()
            && self.should.is_empty()
            && self.must_not.is_empty()
    }

    /// `filter`에 포함된 range 쿼리를 반환합니다.
    pub fn range_filters(&self) -> impl Iterator<Item = &Query> {
        self.filter
            .iter()
            .filter(|q| matches!(q, Query::Range { .. }))
    }

    /// JSON DSL로 변환합니다.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        for (key, clauses) in [
            ("filter", &self.filter),
            ("must", &self.must),
            ("should", &self.should),
            ("must_not", &self.must_not),
        ] {
            if !clauses.is_empty() {
                body.insert(
                    key.to_owned(),
                    Value::Array(clauses.iter().map(Query::to_json).collect()),
                );
            }
        }
        if let Some(msm) = self.minimum_should_match {
            body.insert("minimum_should_match".to_owned(), msm.to_json());
        }
        json!({ "bool": body })
    }
}

/// 백엔드 쿼리 노드
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// 모든 문서
    MatchAll,
    /// 정확히 일치하는 값
    Term { field: String, value: Value },
    /// 값 구간 `[gte, lt)`
    Range {
        field: String,
        gte: Option<Value>,
        lt: Option<Value>,
        format: Option<String>,
    },
    /// 필드 존재 여부
    Exists { field: String },
    /// 다중 필드 텍스트 매치
    MultiMatch(MultiMatch),
    /// 점수를 고정하는 필터 래퍼
    ConstantScore(Box<Query>),
    /// 불리언 조합
    Bool(BoolQuery),
}

impl Query {
    /// term 쿼리를 생성합니다.
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// epoch 밀리초 구간 `[gte, lt)` range 쿼리를 생성합니다.
    pub fn millis_range(field: impl Into<String>, gte: i64, lt: i64) -> Self {
        Self::Range {
            field: field.into(),
            gte: Some(json!(gte)),
            lt: Some(json!(lt)),
            format: Some("epoch_millis".to_owned()),
        }
    }

    /// exists 쿼리를 생성합니다.
    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists {
            field: field.into(),
        }
    }

    /// JSON DSL로 변환합니다.
    pub fn to_json(&self) -> Value {
        match self {
            Self::MatchAll => json!({ "match_all": {} }),
            Self::Term { field, value } => json!({ "term": { field.as_str(): value } }),
            Self::Range {
                field,
                gte,
                lt,
                format,
            } => {
                let mut bounds = Map::new();
                if let Some(gte) = gte {
                    bounds.insert("gte".to_owned(), gte.clone());
                }
                if let Some(lt) = lt {
                    bounds.insert("lt".to_owned(), lt.clone());
                }
                if let Some(format) = format {
                    bounds.insert("format".to_owned(), json!(format));
                }
                json!({ "range": { field.as_str(): bounds } })
            }
            Self::Exists { field } => json!({ "exists": { "field": field } }),
            Self::MultiMatch(m) => {
                let mut body = Map::new();
                body.insert("query".to_owned(), json!(m.query));
                body.insert("fields".to_owned(), json!(m.fields));
                body.insert("type".to_owned(), json!(m.kind.as_str()));
                if let Some(op) = m.operator {
                    body.insert("operator".to_owned(), json!(op.as_str()));
                }
                if let Some(fuzziness) = &m.fuzziness {
                    body.insert("fuzziness".to_owned(), json!(fuzziness));
                }
                if let Some(boost) = m.boost {
                    body.insert("boost".to_owned(), json!(boost));
                }
                json!({ "multi_match": body })
            }
            Self::ConstantScore(inner) => {
                json!({ "constant_score": { "filter": inner.to_json() } })
            }
            Self::Bool(b) => b.to_json(),
        }
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl Serialize for BoolQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
