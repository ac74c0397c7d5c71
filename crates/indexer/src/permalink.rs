//! permalink locator 코덱과 해석기
//!
//! locator는 `(receivedTime, recordFinder)`에서 결정적으로 계산되는 문서 식별자로,
//! 백엔드 내부 id에 의존하지 않습니다. 저장하지 않고 항상 다시 계산합니다.
//!
//! 형식: `base64url(epoch 밀리초 10진 문자열)` + `.` + `recordFinder`
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use logsift_indexer::permalink::{decode, encode};
//!
//! let received = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
//! let locator = encode(received, "fw01-000042").unwrap();
//! let decoded = decode(&locator).unwrap();
//! assert_eq!(decoded.received_time(), received);
//! assert_eq!(decoded.record_finder(), "fw01-000042");
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use logsift_core::dsl::{BoolQuery, Query};
use logsift_core::error::ValidationError;
use logsift_core::metrics as m;
use logsift_core::types::{FIELD_RECEIVED_TIME, FIELD_RECORD_FINDER, LogDocument, truncate_to_millis};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::backend::SearchBackend;
use crate::bulk::generation_pattern;
use crate::error::IndexerError;

/// 타임스탬프와 판별자 사이 구분자
pub const SEPARATOR: char = '.';

/// 한 번의 해석에서 돌려받을 최대 일치 수 (중복 적재 대비)
const RESOLVE_LIMIT: usize = 100;

/// 디코딩된 locator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    received_time: DateTime<Utc>,
    record_finder: String,
}

impl Locator {
    /// locator를 생성합니다. 수집 시각은 밀리초로 절삭됩니다.
    ///
    /// # Errors
    ///
    /// `record_finder`가 비어 있거나 구분자를 포함하면 에러를 반환합니다.
    pub fn new(
        received_time: DateTime<Utc>,
        record_finder: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let record_finder = record_finder.into();
        if record_finder.is_empty() {
            return Err(malformed("record finder is empty"));
        }
        if record_finder.contains(SEPARATOR) {
            return Err(malformed(format!(
                "record finder '{record_finder}' contains '{SEPARATOR}'"
            )));
        }
        Ok(Self {
            received_time: truncate_to_millis(received_time),
            record_finder,
        })
    }

    /// 공통 스키마 문서에서 locator를 계산합니다.
    pub fn from_document(doc: &LogDocument) -> Result<Self, ValidationError> {
        Self::new(doc.received_time, doc.record_finder.as_str())
    }

    /// 검색 hit의 `_source`에서 locator를 계산합니다.
    ///
    /// `receivedTime`은 RFC 3339 문자열 또는 epoch 밀리초 숫자를 받습니다.
    /// 필드가 없거나 해석할 수 없으면 `None`입니다.
    pub fn from_source(source: &Value) -> Option<Self> {
        let received_time = match source.get(FIELD_RECEIVED_TIME)? {
            Value::String(s) => DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc),
            Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?)?,
            _ => return None,
        };
        let finder = source.get(FIELD_RECORD_FINDER)?.as_str()?;
        Self::new(received_time, finder).ok()
    }

    /// 수집 시각
    pub fn received_time(&self) -> DateTime<Utc> {
        self.received_time
    }

    /// 레코드 판별자
    pub fn record_finder(&self) -> &str {
        &self.record_finder
    }

    /// 정확 일치 조회 쿼리 (점수 계산 없음)
    pub fn to_query(&self) -> BoolQuery {
        BoolQuery {
            filter: vec![
                Query::term(FIELD_RECEIVED_TIME, self.received_time.timestamp_millis()),
                Query::term(FIELD_RECORD_FINDER, self.record_finder.as_str()),
            ],
            ..BoolQuery::default()
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.received_time.timestamp_millis().to_string();
        write!(
            f,
            "{}{SEPARATOR}{}",
            URL_SAFE_NO_PAD.encode(millis),
            self.record_finder
        )
    }
}

impl FromStr for Locator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

/// `(receivedTime, recordFinder)`를 locator 문자열로 인코딩합니다.
pub fn encode(received_time: DateTime<Utc>, record_finder: &str) -> Result<String, ValidationError> {
    Ok(Locator::new(received_time, record_finder)?.to_string())
}

/// locator 문자열을 디코딩합니다.
///
/// # Errors
///
/// 구분자가 정확히 하나가 아니거나, 타임스탬프 부분이 유효한 base64 10진수가
/// 아니거나, 판별자가 비어 있으면 `MalformedLocator`를 반환합니다.
pub fn decode(locator: &str) -> Result<Locator, ValidationError> {
    let separators = locator.matches(SEPARATOR).count();
    if separators != 1 {
        return Err(malformed(format!(
            "expected exactly one '{SEPARATOR}', found {separators}"
        )));
    }
    let Some((encoded, finder)) = locator.split_once(SEPARATOR) else {
        return Err(malformed("missing separator"));
    };

    let raw = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| malformed(format!("timestamp is not base64: {e}")))?;
    let text =
        String::from_utf8(raw).map_err(|_| malformed("timestamp is not a decimal string"))?;
    let millis: i64 = text
        .parse()
        .map_err(|_| malformed(format!("timestamp '{text}' is not a decimal integer")))?;
    // `+5`, `007` 같은 비정규 표기는 같은 시각의 다른 locator가 되므로 거부
    if millis.to_string() != text {
        return Err(malformed(format!("timestamp '{text}' is not canonical")));
    }
    let received_time = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| malformed(format!("timestamp {millis} is out of range")))?;

    Locator::new(received_time, finder)
}

fn malformed(reason: impl Into<String>) -> ValidationError {
    ValidationError::MalformedLocator(reason.into())
}

/// permalink 해석 결과 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermalinkMatch {
    /// 문서가 있는 인덱스 세대
    pub index: String,
    /// 백엔드 문서 id
    pub id: String,
}

/// locator를 문서 위치로 해석합니다.
///
/// 별칭이 아니라 `<alias>-*` 패턴 전체를 검색하므로 별칭 전환 후에도 permalink가
/// 유지됩니다.
pub struct PermalinkResolver<B: SearchBackend> {
    backend: Arc<B>,
    pattern: String,
}

impl<B: SearchBackend> PermalinkResolver<B> {
    /// 별칭의 모든 세대를 대상으로 하는 해석기를 생성합니다.
    pub fn new(backend: Arc<B>, alias: &str) -> Self {
        Self {
            backend,
            pattern: generation_pattern(alias),
        }
    }

    /// 검색 대상 인덱스 패턴
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// 문자열 locator를 디코딩한 뒤 해석합니다.
    ///
    /// 디코딩 실패는 백엔드 호출 전에 반환됩니다.
    pub async fn resolve_str(&self, locator: &str) -> Result<Vec<PermalinkMatch>, IndexerError> {
        let locator = decode(locator)?;
        self.resolve(&locator).await
    }

    /// locator와 일치하는 문서를 찾습니다. 없으면 빈 목록입니다.
    pub async fn resolve(&self, locator: &Locator) -> Result<Vec<PermalinkMatch>, IndexerError> {
        let body = json!({
            "query": locator.to_query().to_json(),
            "_source": false,
            "track_scores": false,
            "size": RESOLVE_LIMIT,
        });
        let response = self.backend.search(&self.pattern, &body).await?;

        let matches: Vec<PermalinkMatch> = response
            .hits
            .into_iter()
            .map(|hit| PermalinkMatch {
                index: hit.index,
                id: hit.id,
            })
            .collect();

        let outcome = if matches.is_empty() { "miss" } else { "hit" };
        metrics::counter!(m::SEARCH_PERMALINKS_RESOLVED_TOTAL, m::LABEL_RESULT => outcome)
            .increment(1);
        debug!(
            pattern = %self.pattern,
            locator = %locator,
            matches = matches.len(),
            "permalink resolved"
        );
        Ok(matches)
    }
}
