//! 쿼리 용어 파서 -- 자유 텍스트를 타입이 있는 용어 목록으로 분해
//!
//! # 문법
//! ```text
//! query   := token*                       (공백으로 구분, 따옴표 안 제외)
//! token   := sign? (field ':' value | '"' phrase '"' | '#' run | run)
//! sign    := '+' (must) | '-' (must_not)  (없으면 should)
//! field   := [A-Za-z_][A-Za-z0-9_.]*
//! value   := '"' text '"' | run
//! ```
//!
//! - 닫히지 않은 따옴표는 에러가 아니라 일반 텍스트로 취급합니다.
//! - 부호만 있는 토큰과 `#`만 있는 토큰은 일반 용어입니다.
//! - 빈 구문(`""`)은 무시합니다.
//!
//! 파서는 상태가 없고 백엔드와 무관합니다.

use std::fmt;

/// 용어 요구 수준
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// `+` 접두어
    Must,
    /// 접두어 없음
    #[default]
    Should,
    /// `-` 접두어
    MustNot,
}

impl Requirement {
    /// 쿼리 문법의 부호 접두어
    pub fn sign(&self) -> &'static str {
        match self {
            Self::Must => "+",
            Self::Should => "",
            Self::MustNot => "-",
        }
    }

    /// 표시용 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Must => "must",
            Self::Should => "should",
            Self::MustNot => "must_not",
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 용어 타입
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermType {
    /// 따옴표 없는 단어
    Term,
    /// 따옴표로 감싼 구문
    Phrase,
    /// `#` 접두어 태그
    Hashtag,
    /// `field:` 접두어 값. 필드명을 담습니다.
    Field(String),
}

impl TermType {
    /// 타입 이름. 필드 용어는 필드명을 반환합니다.
    pub fn name(&self) -> &str {
        match self {
            Self::Term => "term",
            Self::Phrase => "phrase",
            Self::Hashtag => "hashtag",
            Self::Field(name) => name,
        }
    }
}

/// 파싱된 쿼리 용어 하나
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryTerm {
    /// 용어 텍스트 (부호, 필드 접두어, 따옴표, `#` 제외)
    pub term: String,
    /// 용어 타입
    pub kind: TermType,
    /// 요구 수준
    pub requirement: Requirement,
}

impl QueryTerm {
    /// 새 용어를 생성합니다.
    pub fn new(term: impl Into<String>, kind: TermType, requirement: Requirement) -> Self {
        Self {
            term: term.into(),
            kind,
            requirement,
        }
    }

    /// 정규화된 쿼리 텍스트로 되돌립니다.
    ///
    /// 결과를 다시 [`parse`]하면 같은 용어가 나옵니다.
    pub fn render(&self) -> String {
        let sign = self.requirement.sign();
        match &self.kind {
            TermType::Term => format!("{sign}{}", self.term),
            TermType::Phrase => format!("{sign}\"{}\"", self.term),
            TermType::Hashtag => format!("{sign}#{}", self.term),
            TermType::Field(field) => {
                if self.term.chars().any(char::is_whitespace) {
                    format!("{sign}{field}:\"{}\"", self.term)
                } else {
                    format!("{sign}{field}:{}", self.term)
                }
            }
        }
    }
}

impl fmt::Display for QueryTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// 용어 목록을 공백 하나로 이어 쿼리 텍스트를 만듭니다.
pub fn render_terms(terms: &[QueryTerm]) -> String {
    terms
        .iter()
        .map(QueryTerm::render)
        .collect::<Vec<_>>()
        .join(" ")
}

/// 자유 텍스트 쿼리를 용어 목록으로 파싱합니다.
///
/// 실패하지 않습니다. 해석할 수 없는 입력은 일반 용어가 됩니다.
///
/// ```
/// use logsift_query::parser::{parse, Requirement, TermType};
///
/// let terms = parse(r#"+alice -"bad actor" #auth eventId:4625"#);
/// assert_eq!(terms.len(), 4);
/// assert_eq!(terms[0].requirement, Requirement::Must);
/// assert_eq!(terms[1].kind, TermType::Phrase);
/// assert_eq!(terms[3].kind, TermType::Field("eventId".to_owned()));
/// ```
pub fn parse(input: &str) -> Vec<QueryTerm> {
    let mut cursor = Cursor::new(input);
    let mut terms = Vec::new();

    while cursor.skip_whitespace() {
        if let Some(term) = cursor.next_term() {
            terms.push(term);
        }
    }

    terms
}

/// 문자 단위 입력 커서
struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, idx: usize) -> Option<char> {
        self.chars.get(idx).copied()
    }

    fn at_boundary(&self, idx: usize) -> bool {
        self.peek_at(idx).is_none_or(char::is_whitespace)
    }

    /// 공백을 건너뜁니다. 남은 입력이 있으면 true.
    fn skip_whitespace(&mut self) -> bool {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos < self.chars.len()
    }

    /// 다음 공백까지의 문자열을 읽습니다.
    fn read_run(&mut self) -> String {
        let start = self.pos;
        while !self.at_boundary(self.pos) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// 현재 위치의 따옴표 구문을 읽습니다.
    ///
    /// 닫는 따옴표가 없으면 아무것도 소비하지 않고 `None`을 반환합니다.
    fn read_quoted(&mut self) -> Option<String> {
        let open = self.pos;
        let close = (open + 1..self.chars.len()).find(|&idx| self.chars[idx] == '"')?;
        self.pos = close + 1;
        Some(self.chars[open + 1..close].iter().collect())
    }

    /// 현재 위치가 `field:value` 형식이면 필드명 끝(콜론 위치)을 반환합니다.
    fn field_prefix_end(&self) -> Option<usize> {
        let first = self.peek()?;
        if !(first.is_ascii_alphabetic() || first == '_') {
            return None;
        }
        let mut idx = self.pos + 1;
        while let Some(c) = self.peek_at(idx) {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                idx += 1;
            } else {
                break;
            }
        }
        if self.peek_at(idx) == Some(':') && !self.at_boundary(idx + 1) {
            Some(idx)
        } else {
            None
        }
    }

    /// 토큰 하나를 읽습니다. 빈 구문이면 `None`.
    fn next_term(&mut self) -> Option<QueryTerm> {
        let requirement = match self.peek() {
            Some('+') => Requirement::Must,
            Some('-') => Requirement::MustNot,
            _ => Requirement::Should,
        };
        if requirement != Requirement::Should {
            if self.at_boundary(self.pos + 1) {
                // 부호만 있는 토큰
                let sign = self.read_run();
                return Some(QueryTerm::new(sign, TermType::Term, Requirement::Should));
            }
            self.pos += 1;
        }

        if let Some(colon) = self.field_prefix_end() {
            let field: String = self.chars[self.pos..colon].iter().collect();
            self.pos = colon + 1;
            let value = if self.peek() == Some('"') {
                match self.read_quoted() {
                    Some(quoted) if quoted.is_empty() => return None,
                    Some(quoted) => quoted,
                    None => self.read_run(),
                }
            } else {
                self.read_run()
            };
            return Some(QueryTerm::new(value, TermType::Field(field), requirement));
        }

        match self.peek() {
            Some('"') => match self.read_quoted() {
                Some(phrase) if phrase.is_empty() => None,
                Some(phrase) => Some(QueryTerm::new(phrase, TermType::Phrase, requirement)),
                None => Some(QueryTerm::new(self.read_run(), TermType::Term, requirement)),
            },
            Some('#') if !self.at_boundary(self.pos + 1) => {
                self.pos += 1;
                Some(QueryTerm::new(self.read_run(), TermType::Hashtag, requirement))
            }
            _ => Some(QueryTerm::new(self.read_run(), TermType::Term, requirement)),
        }
    }
}
