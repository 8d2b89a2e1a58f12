use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::settings::Settings;
use crate::slug::{numeric_id, same_id};

/// What a cross reference points at inside the scanned directory.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    File { suffix: &'a str },
    Dir,
}

/// Sibling documents sharing an id. Every field is advisory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Links {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub findings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rip: Option<String>,
}

/// Names in `dir`, files or directories only, sorted. A missing or
/// unreadable directory has no names.
pub async fn list_names(dir: &Path, dirs: bool) -> Vec<String> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("No listing for {}: {}", dir.display(), e);
            return names;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if is_dir != dirs {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    names.sort();
    names
}

/// First name whose `{category}-{digits}` prefix equals `id` numerically
/// and which ends with `suffix`.
pub fn match_name<'a>(names: &'a [String], category: &str, id: &str, suffix: &str) -> Option<&'a str> {
    names
        .iter()
        .find(|n| {
            n.ends_with(suffix) && numeric_id(n, category).is_some_and(|digits| same_id(digits, id))
        })
        .map(String::as_str)
}

/// Slug of the sibling document for `id`, or `None`. Re-reads `dir` on
/// every call.
pub async fn resolve(dir: &Path, category: &str, id: &str, target: Target<'_>) -> Option<String> {
    match target {
        Target::File { suffix } => {
            let names = list_names(dir, false).await;
            match_name(&names, category, id, suffix)
                .map(|n| n.strip_suffix(".md").unwrap_or(n).to_string())
        }
        Target::Dir => {
            let names = list_names(dir, true).await;
            match_name(&names, category, id, "").map(String::from)
        }
    }
}

pub async fn resolve_links(settings: &Settings, id: &str) -> Links {
    let reps = settings.reps_dir();
    let findings = settings.findings_dir();
    let experiments = settings.experiments_dir();
    let rips = settings.rips_dir();

    let (proposal, findings, experiment, rip) = tokio::join!(
        resolve(&reps, "rep", id, Target::File { suffix: ".md" }),
        resolve(&findings, "rep", id, Target::File { suffix: "-findings.md" }),
        resolve(&experiments, "rep", id, Target::Dir),
        resolve(&rips, "rip", id, Target::File { suffix: ".md" }),
    );

    Links {
        proposal,
        findings,
        experiment,
        rip,
    }
}
