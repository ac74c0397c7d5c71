//! 쿼리 컴파일러 -- 용어 목록 + 시간 구간 + 컬럼 레지스트리 → 불리언 쿼리
//!
//! 모든 절은 요구 수준(must/should/must_not)과 점수 반영 여부(filter/scored)로
//! 여섯 개 버킷에 나뉜 뒤 하나의 [`BoolQuery`]로 조립됩니다.
//!
//! ```text
//! must     + filter  → bool.filter
//! must     + scored  → bool.must
//! should   + scored  → bool.should
//! should   + filter  → bool.should (constant_score)
//! must_not + (모두)  → bool.must_not
//! ```
//!
//! 시간 구간은 항상 두 개의 range 필터로 들어갑니다: 시 단위로 바깥쪽 반올림한
//! 거친 구간과 분 단위로 바깥쪽 반올림한 정밀 구간입니다.
//!
//! 알 수 없는 용어나 변환할 수 없는 값은 에러가 아니라 조용히 버려집니다.

use chrono::{DateTime, Duration, Utc};
use logsift_core::config::SearchConfig;
use logsift_core::dsl::{BoolQuery, MinimumShouldMatch, MultiMatch, MatchKind, Operator, Query};
use tracing::debug;

use crate::column::ColumnRegistry;
use crate::error::QueryError;
use crate::parser::{QueryTerm, Requirement, TermType, parse};

const HOUR_MILLIS: i64 = 3_600_000;
const MINUTE_MILLIS: i64 = 60_000;

/// 반열린 시간 구간 `[start, end)`
///
/// 생성 시점에 `start < end`를 검증하므로 컴파일 단계에서는 실패하지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// 시간 구간을 생성합니다.
    ///
    /// # Errors
    /// `start >= end`이면 `InvalidTimeWindow`를 반환합니다.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, QueryError> {
        if start >= end {
            return Err(QueryError::InvalidTimeWindow {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// `end` 직전 `span` 길이의 구간을 생성합니다.
    pub fn ending_at(end: DateTime<Utc>, span: Duration) -> Result<Self, QueryError> {
        Self::new(end - span, end)
    }

    /// 시작 시각
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// 종료 시각 (미포함)
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// 시 단위로 바깥쪽 반올림한 밀리초 경계
    pub fn hour_bounds(&self) -> (i64, i64) {
        self.rounded_bounds(HOUR_MILLIS)
    }

    /// 분 단위로 바깥쪽 반올림한 밀리초 경계
    pub fn minute_bounds(&self) -> (i64, i64) {
        self.rounded_bounds(MINUTE_MILLIS)
    }

    fn rounded_bounds(&self, unit: i64) -> (i64, i64) {
        let start = self.start.timestamp_millis();
        let end = self.end.timestamp_millis();
        let floor = start.div_euclid(unit) * unit;
        let end_floor = end.div_euclid(unit) * unit;
        let ceil = if end_floor == end {
            end
        } else {
            end_floor + unit
        };
        (floor, ceil)
    }
}

/// 컴파일러 조정값
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerOptions {
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

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            fuzzy_boost: 0.5,
            fuzziness: "AUTO".to_owned(),
            batch_lonely_terms: true,
            min_should_match_threshold: 2,
            min_should_match_percent: 75,
        }
    }
}

impl CompilerOptions {
    /// core 설정의 `[search]` 섹션에서 생성합니다.
    pub fn from_core(search: &SearchConfig) -> Self {
        Self {
            fuzzy_boost: search.fuzzy_boost,
            fuzziness: search.fuzziness.clone(),
            batch_lonely_terms: search.batch_lonely_terms,
            min_should_match_threshold: search.min_should_match_threshold,
            min_should_match_percent: search.min_should_match_percent,
        }
    }
}

/// 요구 수준 × 점수 반영 여부 버킷
#[derive(Default)]
struct Buckets {
    must_filter: Vec<Query>,
    must_scored: Vec<Query>,
    should_filter: Vec<Query>,
    should_scored: Vec<Query>,
    must_not_filter: Vec<Query>,
    must_not_scored: Vec<Query>,
}

impl Buckets {
    fn filter(&mut self, requirement: Requirement, query: Query) {
        match requirement {
            Requirement::Must => self.must_filter.push(query),
            Requirement::Should => self.should_filter.push(query),
            Requirement::MustNot => self.must_not_filter.push(query),
        }
    }

    fn scored(&mut self, requirement: Requirement, query: Query) {
        match requirement {
            Requirement::Must => self.must_scored.push(query),
            Requirement::Should => self.should_scored.push(query),
            Requirement::MustNot => self.must_not_scored.push(query),
        }
    }
}

/// 쿼리 컴파일러
///
/// 상태가 없으며 여러 스레드에서 공유해도 됩니다.
#[derive(Debug, Clone, Default)]
pub struct QueryCompiler {
    options: CompilerOptions,
}

impl QueryCompiler {
    /// 주어진 조정값으로 컴파일러를 생성합니다.
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    /// 조정값을 반환합니다.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// 자유 텍스트를 파싱한 뒤 컴파일합니다.
    pub fn compile_str(
        &self,
        query: &str,
        registry: &ColumnRegistry,
        window: &TimeWindow,
    ) -> BoolQuery {
        self.compile(&parse(query), registry, window)
    }

    /// 용어 목록을 불리언 쿼리로 컴파일합니다.
    pub fn compile(
        &self,
        terms: &[QueryTerm],
        registry: &ColumnRegistry,
        window: &TimeWindow,
    ) -> BoolQuery {
        let searchable = registry.searchable_fields();
        let mut buckets = Buckets::default();
        let mut lonely: Vec<&str> = Vec::new();

        for term in terms {
            match &term.kind {
                TermType::Term if term.term == "*" => match term.requirement {
                    Requirement::MustNot => buckets.must_not_filter.push(Query::MatchAll),
                    // should 절로 두면 minimum_should_match를 혼자 충족시킴
                    Requirement::Must | Requirement::Should => {
                        buckets.must_filter.push(Query::MatchAll);
                    }
                },
                TermType::Term if term.requirement == Requirement::Should => {
                    lonely.push(&term.term);
                }
                TermType::Term => {
                    buckets.scored(term.requirement, self.text_match(&term.term, &searchable));
                }
                TermType::Phrase => {
                    let mut phrase = MultiMatch::new(&term.term, searchable.clone());
                    phrase.kind = MatchKind::Phrase;
                    buckets.scored(term.requirement, Query::MultiMatch(phrase));
                }
                TermType::Hashtag => Self::tag_filter(&mut buckets, term, registry),
                TermType::Field(field) if field == "tag" => {
                    Self::tag_filter(&mut buckets, term, registry);
                }
                TermType::Field(field) if field == "exists" => match registry.get(&term.term) {
                    Some(column) => {
                        buckets.filter(term.requirement, Query::exists(&column.backend_field));
                    }
                    None => debug!(column = %term.term, "exists on unknown column dropped"),
                },
                TermType::Field(field) => match registry.get(field) {
                    Some(column) => match column.coerce(&term.term) {
                        Some(value) => {
                            buckets.filter(
                                term.requirement,
                                Query::term(&column.backend_field, value),
                            );
                        }
                        None => debug!(
                            column = %column.name,
                            coercion = %column.coercion,
                            value = %term.term,
                            "uncoercible value dropped"
                        ),
                    },
                    None => {
                        let path = format!("{}.{}", registry.namespace(), field);
                        buckets.filter(term.requirement, Query::term(path, term.term.as_str()));
                    }
                },
            }
        }

        if !lonely.is_empty() {
            if self.options.batch_lonely_terms {
                let joined = lonely.join(" ");
                buckets.should_scored.push(Query::MultiMatch(MultiMatch::new(
                    joined,
                    searchable.clone(),
                )));
            } else {
                for text in lonely {
                    buckets
                        .should_scored
                        .push(Query::MultiMatch(MultiMatch::new(text, searchable.clone())));
                }
            }
        }

        self.assemble(buckets, registry, window)
    }

    fn tag_filter(buckets: &mut Buckets, term: &QueryTerm, registry: &ColumnRegistry) {
        match registry.coerce_tag(&term.term) {
            Some(value) => buckets.filter(term.requirement, Query::term(registry.tag_field(), value)),
            None => debug!(value = %term.term, "uncoercible tag dropped"),
        }
    }

    /// 정확 매치 + 낮은 가중치 퍼지 변형
    ///
    /// 둘 중 하나만 맞아도 되도록 내부 should(최소 1)로 묶습니다.
    fn text_match(&self, text: &str, fields: &[String]) -> Query {
        let mut exact = MultiMatch::new(text, fields.to_vec());
        exact.operator = Some(Operator::And);

        let mut fuzzy = MultiMatch::new(text, fields.to_vec());
        fuzzy.operator = Some(Operator::And);
        fuzzy.fuzziness = Some(self.options.fuzziness.clone());
        fuzzy.boost = Some(self.options.fuzzy_boost);

        Query::Bool(BoolQuery {
            should: vec![Query::MultiMatch(exact), Query::MultiMatch(fuzzy)],
            minimum_should_match: Some(MinimumShouldMatch::Count(1)),
            ..BoolQuery::default()
        })
    }

    fn assemble(
        &self,
        buckets: Buckets,
        registry: &ColumnRegistry,
        window: &TimeWindow,
    ) -> BoolQuery {
        let time_field = registry.time_field();
        let (hour_start, hour_end) = window.hour_bounds();
        let (minute_start, minute_end) = window.minute_bounds();

        let mut filter = Vec::with_capacity(2 + buckets.must_filter.len());
        filter.push(Query::millis_range(time_field, hour_start, hour_end));
        filter.push(Query::millis_range(time_field, minute_start, minute_end));
        filter.extend(buckets.must_filter);

        let mut should = buckets.should_scored;
        should.extend(
            buckets
                .should_filter
                .into_iter()
                .map(|q| Query::ConstantScore(Box::new(q))),
        );

        let mut must_not = buckets.must_not_filter;
        must_not.extend(buckets.must_not_scored);

        let minimum_should_match = self.minimum_should_match(should.len());

        BoolQuery {
            filter,
            must: buckets.must_scored,
            should,
            must_not,
            minimum_should_match,
        }
    }

    fn minimum_should_match(&self, should_count: usize) -> Option<MinimumShouldMatch> {
        if should_count == 0 {
            None
        } else if should_count <= self.options.min_should_match_threshold {
            Some(MinimumShouldMatch::Count(1))
        } else {
            Some(MinimumShouldMatch::Percent(
                self.options.min_should_match_percent,
            ))
        }
    }
}
