use std::sync::LazyLock;

use regex::Regex;

use super::blocks::{classify_lines, Block};

static PAREN_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*\([^()]*\)$").unwrap());

/// Text of the section headed `name`, up to the next heading of the same or
/// higher level. Nested sub-headings stay inside the returned range.
pub fn section(body: &str, name: &str) -> Option<String> {
    let lines: Vec<&str> = body.lines().collect();
    let blocks = classify_lines(body);

    let (start, level) = blocks.iter().enumerate().find_map(|(i, b)| match b {
        Block::Heading { level, text } if heading_matches(text, name) => Some((i, *level)),
        _ => None,
    })?;

    let end = blocks[start + 1..]
        .iter()
        .position(|b| b.heading_level().is_some_and(|l| l <= level))
        .map(|p| start + 1 + p)
        .unwrap_or(lines.len());

    Some(join_trimmed(&lines[start + 1..end]))
}

/// Case-insensitive heading match, ignoring a trailing "(…)" qualifier.
pub fn heading_matches(heading: &str, name: &str) -> bool {
    let heading = heading.trim();
    let name = name.trim();
    if heading.eq_ignore_ascii_case(name) {
        return true;
    }
    PAREN_SUFFIX_RE
        .captures(heading)
        .is_some_and(|caps| caps[1].eq_ignore_ascii_case(name))
}

/// First paragraph of a section, wrapped lines joined with a space.
pub fn first_paragraph(text: &str) -> Option<String> {
    let mut parts = Vec::new();
    for block in classify_lines(text) {
        match block {
            Block::Text(t) => parts.push(t),
            Block::Field { .. } if parts.is_empty() => {}
            Block::Empty if parts.is_empty() => {}
            _ => break,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Drop the metadata preamble: keep everything from the `## anchor` heading,
/// or from the first level-2 heading when no anchor is given.
pub fn strip_preamble(text: &str, anchor: Option<&str>) -> String {
    let blocks = classify_lines(text);
    let start = blocks.iter().position(|b| match (b, anchor) {
        (Block::Heading { level: 2, text }, Some(name)) => heading_matches(text, name),
        (Block::Heading { level: 2, .. }, None) => true,
        _ => false,
    });

    match start {
        Some(i) => text.lines().skip(i).collect::<Vec<_>>().join("\n"),
        None => text.to_string(),
    }
}

fn join_trimmed(lines: &[&str]) -> String {
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    match (first, last) {
        (Some(a), Some(b)) => lines[a..=b].join("\n"),
        _ => String::new(),
    }
}

// ── Tests ──
