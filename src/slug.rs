use std::sync::LazyLock;

use regex::Regex;

use crate::error::{PageError, PageResult};

static FILE_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z]+-(\d+)").unwrap());

/// Reject user-supplied identifiers that could escape their directory.
pub fn validate(slug: &str) -> PageResult<()> {
    if slug.is_empty()
        || slug.contains("..")
        || slug.contains('/')
        || slug.contains('\\')
        || slug.contains('\0')
    {
        return Err(PageError::invalid("Invalid path"));
    }
    Ok(())
}

pub fn validate_proposal(slug: &str) -> PageResult<()> {
    validate(slug)?;
    if !slug.starts_with("rep-") {
        return Err(PageError::invalid("Only REP proposals can be viewed"));
    }
    Ok(())
}

pub fn validate_finding(slug: &str) -> PageResult<()> {
    validate(slug)?;
    if !slug.starts_with("rep-") || !slug.ends_with("-findings") {
        return Err(PageError::invalid("Invalid findings path"));
    }
    Ok(())
}

pub fn validate_analysis(file: &str) -> PageResult<()> {
    validate(file)?;
    if !file.ends_with("-analysis.md") {
        return Err(PageError::invalid("Only analysis files can be viewed"));
    }
    Ok(())
}

/// Id from a file or directory name: "rep-007-x" → "007". Names without a
/// numeric prefix are their own id.
pub fn file_id(name: &str) -> String {
    FILE_ID_RE
        .captures(name)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Digits following `{category}-` at the start of `name`.
pub fn numeric_id<'a>(name: &'a str, category: &str) -> Option<&'a str> {
    let rest = name.strip_prefix(category)?.strip_prefix('-')?;
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some(&rest[..end])
    }
}

/// Zero-padding-agnostic id comparison: "7" == "007".
pub fn same_id(a: &str, b: &str) -> bool {
    a.trim_start_matches('0') == b.trim_start_matches('0')
}

/// "rep-001-iteration" → "Rep 001 Iteration".
pub fn display_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_word_start = true;
    for c in name.chars() {
        let c = if c == '-' { ' ' } else { c };
        let is_word = c.is_alphanumeric() || c == '_';
        if is_word && at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !is_word;
    }
    out
}
