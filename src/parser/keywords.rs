use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static SUCCESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)%.*success").unwrap());
static TOKENS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)~?(\d+(?:\.\d+)?)x\s*(?:more\s+|fewer\s+)?tokens").unwrap());

/// Keyword → trigger substrings (matched against lowercased text).
const VOCABULARY: &[(&str, &[&str])] = &[
    ("methodology", &["methodology", "framework"]),
    ("measurement", &["measure", "signal", "data"]),
    ("evidence", &["evidence", "empirical", "rigorous"]),
    ("iteration", &["iteration", "ralph", "multiple passes"]),
    ("single-shot", &["single-shot", "single shot", "one attempt"]),
    ("task-design", &["ceiling effect", "task difficulty", "harder tasks"]),
    ("efficiency", &["token", "cost", "resource"]),
    ("reproducibility", &["reproducib", "reliable", "consistent"]),
    ("benchmark", &["humaneval", "swe-bench", "benchmark"]),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub key: String,
    pub value: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub highlight: bool,
}

pub fn infer_keywords(text: &str) -> BTreeSet<&'static str> {
    let lower = text.to_lowercase();
    VOCABULARY
        .iter()
        .filter(|(_, triggers)| triggers.iter().any(|t| lower.contains(t)))
        .map(|(kw, _)| *kw)
        .collect()
}

/// Headline numbers. Metrics that do not match are left out entirely.
pub fn extract_metrics(text: &str) -> Vec<Metric> {
    let mut metrics = Vec::new();

    if let Some(caps) = SUCCESS_RE.captures(text) {
        metrics.push(Metric {
            key: "Success Rate".to_string(),
            value: format!("{}%", &caps[1]),
            highlight: true,
        });
    }

    if let Some(caps) = TOKENS_RE.captures(text) {
        metrics.push(Metric {
            key: "Token Cost".to_string(),
            value: format!("{}x", &caps[1]),
            highlight: false,
        });
    }

    metrics
}
