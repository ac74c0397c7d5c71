//! `logsift parse` command handler

use std::io::Write;

use serde::Serialize;

use logsift_query::{QueryTerm, TermType, parse, render_terms};

use crate::cli::ParseArgs;
use crate::commands::query_text;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `parse` command.
pub fn execute(args: ParseArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let report = ParseReport::from_query(&query_text(&args.query));
    writer.render(&report)
}

/// Parsed query terms.
#[derive(Debug, Serialize)]
pub struct ParseReport {
    /// Input query text
    pub query: String,
    /// Canonical rendering of the terms
    pub normalized: String,
    /// Terms in input order
    pub terms: Vec<TermRow>,
}

/// One parsed term.
#[derive(Debug, Serialize)]
pub struct TermRow {
    pub term: String,
    /// `term`, `phrase`, `hashtag` or `field`
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub requirement: String,
}

impl ParseReport {
    fn from_query(query: &str) -> Self {
        let terms = parse(query);
        Self {
            query: query.to_owned(),
            normalized: render_terms(&terms),
            terms: terms.iter().map(TermRow::from).collect(),
        }
    }
}

impl From<&QueryTerm> for TermRow {
    fn from(term: &QueryTerm) -> Self {
        let (kind, field) = match &term.kind {
            TermType::Field(name) => ("field".to_owned(), Some(name.clone())),
            other => (other.name().to_owned(), None),
        };
        Self {
            term: term.term.clone(),
            kind,
            field,
            requirement: term.requirement.to_string(),
        }
    }
}

impl Render for ParseReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Query: {}", self.normalized.bold())?;
        if self.terms.is_empty() {
            writeln!(w, "  (no terms)")?;
            return Ok(());
        }
        writeln!(w, "{:<10} {:<12} {:<16} TERM", "REQUIRE", "KIND", "FIELD")?;
        for row in &self.terms {
            let requirement = match row.requirement.as_str() {
                "must" => row.requirement.green(),
                "must_not" => row.requirement.red(),
                _ => row.requirement.normal(),
            };
            writeln!(
                w,
                "{:<10} {:<12} {:<16} {}",
                requirement,
                row.kind,
                row.field.as_deref().unwrap_or("-"),
                row.term
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_terms_in_order() {
        let report = ParseReport::from_query(r#"+failed -"service account" user:alice #vpn"#);
        let kinds: Vec<&str> = report.terms.iter().map(|t| t.kind.as_str()).collect();
        assert_eq!(kinds, vec!["term", "phrase", "field", "hashtag"]);
        assert_eq!(report.terms[0].requirement, "must");
        assert_eq!(report.terms[1].requirement, "must_not");
        assert_eq!(report.terms[2].field.as_deref(), Some("user"));
        assert_eq!(report.terms[2].term, "alice");
    }

    #[test]
    fn text_rendering_marks_empty_query() {
        colored::control::set_override(false);
        let report = ParseReport::from_query("   ");
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("(no terms)"));
    }

    #[test]
    fn json_omits_field_for_plain_terms() {
        let report = ParseReport::from_query("alice");
        let value = serde_json::to_value(&report).unwrap();
        assert!(value["terms"][0].get("field").is_none());
        assert_eq!(value["terms"][0]["kind"], "term");
    }
}
