use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use super::blocks::{classify_lines, Block};
use super::sections;
use crate::slug;
use crate::status::Status;

static ID_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:lep|rep|rip|imp)-\d+(?:[ \t]+findings)?[ \t]*:?[ \t]*").unwrap()
});
static SUBTITLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\((.+?)\)$").unwrap());
static STATUS_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+").unwrap());

/// A parsed content file. Every field degrades to a default; parsing never fails.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub status: Status,
    /// Status line as written, e.g. "Interim (n=3)".
    pub status_text: Option<String>,
    pub date: String,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub authors: Vec<String>,
    pub summary: String,
    pub body: String,
}

impl Document {
    /// `filename` is the bare file name; `id` and `slug` come from it alone.
    pub fn parse(filename: &str, text: &str) -> Document {
        let blocks = classify_lines(text);
        let slug = filename.strip_suffix(".md").unwrap_or(filename).to_string();
        let id = slug::file_id(&slug);

        let created = field_in(&blocks, "Created");
        let date = field_in(&blocks, "Date")
            .or_else(|| created.clone())
            .unwrap_or_default();
        let status_text = field_in(&blocks, "Status");

        Document {
            id,
            title: title_in(&blocks)
                .map(|t| strip_id_prefix(&t))
                .unwrap_or_else(|| "Untitled".to_string()),
            subtitle: subtitle_in(&blocks),
            status: status_text
                .as_deref()
                .map(status_from_value)
                .unwrap_or(Status::Draft),
            status_text,
            date,
            created,
            updated: field_in(&blocks, "Updated"),
            authors: field_in(&blocks, "Authors")
                .map(|a| split_authors(&a))
                .unwrap_or_default(),
            summary: summary(text),
            body: sections::strip_preamble(text, None),
            slug,
        }
    }
}

/// Value of the first `**name**: value` line, name matched case-insensitively.
pub fn field(text: &str, name: &str) -> Option<String> {
    field_in(&classify_lines(text), name)
}

fn field_in(blocks: &[Block], name: &str) -> Option<String> {
    blocks.iter().find_map(|b| match b {
        Block::Field { key, value } if key.eq_ignore_ascii_case(name) && !value.is_empty() => {
            Some(value.clone())
        }
        _ => None,
    })
}

/// Text of the first level-1 heading, unmodified.
pub fn title(text: &str) -> Option<String> {
    title_in(&classify_lines(text))
}

fn title_in(blocks: &[Block]) -> Option<String> {
    blocks.iter().find_map(|b| match b {
        Block::Heading { level: 1, text } => Some(text.clone()),
        _ => None,
    })
}

/// "REP-002: Rigor" → "Rigor", "LEP-001 Findings: X" → "X".
pub fn strip_id_prefix(title: &str) -> String {
    let stripped = ID_PREFIX_RE.replace(title.trim(), "");
    if stripped.trim().is_empty() {
        title.trim().to_string()
    } else {
        stripped.trim().to_string()
    }
}

fn subtitle_in(blocks: &[Block]) -> Option<String> {
    blocks.iter().find_map(|b| match b {
        Block::Text(t) => SUBTITLE_RE.captures(t).map(|c| c[1].to_string()),
        _ => None,
    })
}

pub fn status(text: &str) -> Status {
    field(text, "Status")
        .as_deref()
        .map(status_from_value)
        .unwrap_or(Status::Draft)
}

fn status_from_value(value: &str) -> Status {
    STATUS_WORD_RE
        .find(value)
        .map(|m| Status::parse(m.as_str()))
        .unwrap_or(Status::Draft)
}

fn split_authors(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect()
}

/// `**Primary finding**` when present, else the first paragraph of `## Summary`.
pub fn summary(text: &str) -> String {
    field(text, "Primary finding")
        .or_else(|| sections::section(text, "Summary").and_then(|s| sections::first_paragraph(&s)))
        .map(|s| s.replace("**", ""))
        .unwrap_or_default()
}

/// Listings sort dates as text; that only orders correctly for `YYYY-MM-DD`.
pub fn date_is_sortable(date: &str) -> bool {
    let date = date.trim();
    date.is_empty() || (date.len() == 10 && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROPOSAL: &str = "# REP-002: Rigor is what you want\n\n\
        **Status**: FCP\n**Created**: 2025-01-10\n**Updated**: 2025-02-01\n\
        **Authors**: Ada, Grace ,\n\n## Summary\n\nRigorous **evidence** beats vibes.\n\n## Motivation\n\nm\n";

    #[test]
    fn document_fields() {
        let d = Document::parse("rep-002-rigor.md", PROPOSAL);
        assert_eq!(d.id, "002");
        assert_eq!(d.slug, "rep-002-rigor");
        assert_eq!(d.title, "Rigor is what you want");
        assert_eq!(d.status, Status::Fcp);
        assert_eq!(d.date, "2025-01-10");
        assert_eq!(d.updated.as_deref(), Some("2025-02-01"));
        assert_eq!(d.authors, vec!["Ada", "Grace"]);
        assert_eq!(d.summary, "Rigorous evidence beats vibes.");
        assert!(d.body.starts_with("## Summary"));
    }

    #[test]
    fn missing_status_is_draft() {
        let d = Document::parse("rep-009-x.md", "# Title only\n\nno metadata here");
        assert_eq!(d.status, Status::Draft);
        assert!(d.status_text.is_none());
        assert_eq!(status("nothing"), Status::Draft);
    }

    #[test]
    fn mixed_case_status_matches_lowercase() {
        assert_eq!(status("**status**: ImPlemented"), status("**Status**: implemented"));
        assert_eq!(status("**STATUS**: Interim (n=3)"), Status::Interim);
    }

    #[test]
    fn field_lookup() {
        assert_eq!(field(PROPOSAL, "created").as_deref(), Some("2025-01-10"));
        assert_eq!(field("**Generated:** 2025-03-01 10:00", "Generated").as_deref(), Some("2025-03-01 10:00"));
        assert!(field(PROPOSAL, "Tracking").is_none());
        assert!(field("**Date**:   ", "Date").is_none());
    }

    #[test]
    fn id_prefixes_stripped() {
        assert_eq!(strip_id_prefix("LEP-001: Ralph"), "Ralph");
        assert_eq!(strip_id_prefix("rep-002 Findings: Iteration"), "Iteration");
        assert_eq!(strip_id_prefix("Plain title"), "Plain title");
        assert_eq!(strip_id_prefix("REP-003"), "REP-003");
    }

    #[test]
    fn untitled_and_subtitle() {
        let d = Document::parse("rep-001-findings.md", "no heading\n(Interim results)\n");
        assert_eq!(d.title, "Untitled");
        assert_eq!(d.subtitle.as_deref(), Some("Interim results"));
    }

    #[test]
    fn primary_finding_wins_summary() {
        let md = "# X\n\n**Primary finding**: Iteration **helps**\n\n## Summary\n\nother";
        assert_eq!(summary(md), "Iteration helps");
    }

    #[test]
    fn non_slug_filename_keeps_slug_as_id() {
        let d = Document::parse("README.md", "");
        assert_eq!(d.id, "README");
        assert_eq!(d.title, "Untitled");
    }

    #[test]
    fn sortable_dates() {
        assert!(date_is_sortable("2024-12-01"));
        assert!(date_is_sortable(""));
        assert!(!date_is_sortable("Dec 1, 2024"));
        assert!(!date_is_sortable("2024-1-5"));
    }
}
