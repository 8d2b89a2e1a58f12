use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parser::blocks::{classify_lines, Block};

/// Document status. Anything outside this set reads as `Draft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Draft,
    Discussion,
    Fcp,
    Accepted,
    Implemented,
    Rejected,
    Postponed,
    Interim,
}

/// Listing tier derived from a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Published,
    InProgress,
    Draft,
}

pub const ALL: &[Status] = &[
    Status::Draft,
    Status::Discussion,
    Status::Fcp,
    Status::Accepted,
    Status::Implemented,
    Status::Rejected,
    Status::Postponed,
    Status::Interim,
];

impl Status {
    /// Total mapping from free text; case-insensitive, unknown → draft.
    pub fn parse(s: &str) -> Status {
        let word = s.trim().to_ascii_lowercase();
        ALL.iter()
            .copied()
            .find(|st| st.as_str() == word)
            .unwrap_or(Status::Draft)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::Discussion => "discussion",
            Status::Fcp => "fcp",
            Status::Accepted => "accepted",
            Status::Implemented => "implemented",
            Status::Rejected => "rejected",
            Status::Postponed => "postponed",
            Status::Interim => "interim",
        }
    }

    pub fn tier(self) -> Tier {
        match self {
            Status::Implemented | Status::Interim => Tier::Published,
            Status::Discussion | Status::Fcp | Status::Accepted => Tier::InProgress,
            _ => Tier::Draft,
        }
    }

    /// Rejected and postponed documents stay out of default listings.
    pub fn hidden(self) -> bool {
        matches!(self, Status::Rejected | Status::Postponed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Implemented | Status::Rejected | Status::Postponed)
    }

    /// Lifecycle: draft → discussion → fcp → accepted → implemented, with
    /// rejected/postponed reachable from any non-terminal state.
    pub fn can_transition(self, to: Status) -> bool {
        if self.is_terminal() || self == Status::Interim {
            return false;
        }
        match to {
            Status::Rejected | Status::Postponed => true,
            Status::Discussion => self == Status::Draft,
            Status::Fcp => self == Status::Discussion,
            Status::Accepted => self == Status::Fcp,
            Status::Implemented => self == Status::Accepted,
            Status::Draft | Status::Interim => false,
        }
    }

    /// Capitalized form written back into documents ("Fcp" stays as the
    /// documents spell it: "FCP").
    pub fn display_name(self) -> &'static str {
        match self {
            Status::Draft => "Draft",
            Status::Discussion => "Discussion",
            Status::Fcp => "FCP",
            Status::Accepted => "Accepted",
            Status::Implemented => "Implemented",
            Status::Rejected => "Rejected",
            Status::Postponed => "Postponed",
            Status::Interim => "Interim",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Published => "published",
            Tier::InProgress => "in-progress",
            Tier::Draft => "draft",
        }
    }
}

/// Replace the leading word of the first status field, the same line the
/// field parser reads. Returns `None` when the document has no status field.
pub fn rewrite_status(text: &str, status: Status) -> Option<String> {
    let (line_no, value) = classify_lines(text)
        .into_iter()
        .enumerate()
        .find_map(|(i, b)| match b {
            Block::Field { key, value } if key.eq_ignore_ascii_case("status") => Some((i, value)),
            _ => None,
        })?;

    let mut out = String::with_capacity(text.len() + 16);
    for (i, line) in text.split_inclusive('\n').enumerate() {
        if i == line_no {
            out.push_str(&rewrite_value(line, &value, status.display_name()));
        } else {
            out.push_str(line);
        }
    }
    Some(out)
}

fn rewrite_value(line: &str, value: &str, name: &str) -> String {
    let body = line.trim_end();
    let ending = &line[body.len()..];
    if value.is_empty() {
        return format!("{body} {name}{ending}");
    }
    // the classifier trims, so the value is the tail of the trimmed line
    let Some(head) = body.strip_suffix(value) else {
        return line.to_string();
    };
    let word = value
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(value.len());
    format!("{}{}{}{}", head, name, &value[word..], ending)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        for st in ALL {
            assert_eq!(Status::parse(&st.as_str().to_uppercase()), *st);
            assert_eq!(Status::parse(st.display_name()), *st);
        }
        assert_eq!(Status::parse("ImPlEmEnTeD"), Status::parse("implemented"));
    }

    #[test]
    fn unknown_is_draft() {
        assert_eq!(Status::parse("shipped"), Status::Draft);
        assert_eq!(Status::parse(""), Status::Draft);
    }

    #[test]
    fn tiers() {
        assert_eq!(Status::Implemented.tier(), Tier::Published);
        assert_eq!(Status::Interim.tier(), Tier::Published);
        assert_eq!(Status::Fcp.tier(), Tier::InProgress);
        assert_eq!(Status::Accepted.tier(), Tier::InProgress);
        assert_eq!(Status::Rejected.tier(), Tier::Draft);
        assert!(Tier::Published < Tier::InProgress);
    }

    #[test]
    fn lifecycle_forward_only() {
        assert!(Status::Draft.can_transition(Status::Discussion));
        assert!(Status::Discussion.can_transition(Status::Fcp));
        assert!(Status::Fcp.can_transition(Status::Accepted));
        assert!(Status::Accepted.can_transition(Status::Implemented));
        assert!(!Status::Draft.can_transition(Status::Accepted));
        assert!(!Status::Fcp.can_transition(Status::Discussion));
    }

    #[test]
    fn side_exits_from_non_terminal_only() {
        for from in [Status::Draft, Status::Discussion, Status::Fcp, Status::Accepted] {
            assert!(from.can_transition(Status::Rejected));
            assert!(from.can_transition(Status::Postponed));
        }
        assert!(!Status::Implemented.can_transition(Status::Rejected));
        assert!(!Status::Rejected.can_transition(Status::Postponed));
        assert!(!Status::Postponed.can_transition(Status::Discussion));
    }

    #[test]
    fn rewrite_replaces_first_status() {
        let md = "# REP-001: T\n\n**Status**: Draft\n**Created**: 2025-01-01\n";
        let out = rewrite_status(md, Status::Discussion).unwrap();
        assert!(out.contains("**Status**: Discussion"));
        assert!(out.contains("**Created**: 2025-01-01"));
        assert!(rewrite_status("# no status", Status::Fcp).is_none());
    }

    #[test]
    fn rewrite_handles_colon_inside_bold() {
        let md = "# REP-011: X\n\n**Status:** Draft\n";
        let out = rewrite_status(md, Status::Discussion).unwrap();
        assert_eq!(out, "# REP-011: X\n\n**Status:** Discussion\n");
        assert_eq!(crate::parser::fields::status(&out), Status::Discussion);
    }

    #[test]
    fn rewrite_skips_fenced_status_lines() {
        let md = "# X\n\n```\n**Status**: Example\n```\n\n- **Status**: FCP (vote open)\r\nrest";
        let out = rewrite_status(md, Status::Accepted).unwrap();
        assert!(out.contains("**Status**: Example\n"));
        assert!(out.contains("- **Status**: Accepted (vote open)\r\nrest"));
    }

    #[test]
    fn rewrite_fills_an_empty_status() {
        let out = rewrite_status("**Status**:\nbody\n", Status::Draft).unwrap();
        assert_eq!(out, "**Status**: Draft\nbody\n");
    }
}
