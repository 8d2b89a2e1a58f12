use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{bail, Context};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{PageError, PageResult};
use crate::parser::chart::{extract_chart, ChartPoint};
use crate::parser::keywords::{extract_metrics, infer_keywords, Metric};
use crate::parser::{fields, sections, Document};
use crate::settings::Settings;
use crate::slug;
use crate::status::{self, Status, Tier};
use crate::xref::{list_names, match_name, resolve, resolve_links, Links, Target};

// ── Listing ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperKind {
    Finding,
    Proposal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Paper {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub summary: String,
    pub keywords: Vec<String>,
    pub date: String,
    pub status: Status,
    pub tier: Tier,
    pub kind: PaperKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
    pub links: Links,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub papers: Vec<Paper>,
    pub all_keywords: Vec<String>,
}

struct RawFile {
    name: String,
    text: String,
}

struct Parsed {
    doc: Document,
    keywords: Vec<String>,
    metrics: Vec<Metric>,
}

/// Findings plus active proposals, published first, newest first.
pub async fn load_listing(settings: &Settings, include_hidden: bool) -> ListingPage {
    let (findings, proposals) = tokio::join!(
        load_findings(settings, include_hidden),
        load_proposals(settings, include_hidden)
    );

    let mut papers: Vec<Paper> = findings.into_iter().chain(proposals).collect();
    sort_papers(&mut papers);

    let all_keywords = papers
        .iter()
        .flat_map(|p| p.keywords.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    info!("Listing: {} papers", papers.len());
    ListingPage {
        papers,
        all_keywords,
    }
}

/// Published before everything else; then `date` descending as plain text.
pub fn sort_papers(papers: &mut [Paper]) {
    papers.sort_by(|a, b| {
        let rank = |p: &Paper| u8::from(p.tier != Tier::Published);
        rank(a).cmp(&rank(b)).then_with(|| b.date.cmp(&a.date))
    });
}

async fn load_findings(settings: &Settings, include_hidden: bool) -> Vec<Paper> {
    let dir = settings.findings_dir();
    let names: Vec<String> = list_names(&dir, false)
        .await
        .into_iter()
        .filter(|n| n.starts_with("rep-") && n.ends_with("-findings.md"))
        .collect();

    let proposal_names = list_names(&settings.reps_dir(), false).await;
    let experiment_names = list_names(&settings.experiments_dir(), true).await;
    let files = read_batch(&dir, &names).await;

    parse_batch(files)
        .into_iter()
        .filter(|p| include_hidden || !p.doc.status.hidden())
        .map(|p| {
            let links = Links {
                proposal: match_name(&proposal_names, "rep", &p.doc.id, ".md")
                    .map(|n| n.trim_end_matches(".md").to_string()),
                findings: Some(p.doc.slug.clone()),
                experiment: match_name(&experiment_names, "rep", &p.doc.id, "").map(String::from),
                rip: None,
            };
            Paper {
                id: p.doc.id,
                slug: p.doc.slug,
                title: p.doc.title,
                subtitle: p.doc.subtitle,
                summary: p.doc.summary,
                keywords: p.keywords,
                date: p.doc.date,
                status: p.doc.status,
                // withdrawn findings only show up with include_hidden
                tier: if p.doc.status.hidden() {
                    p.doc.status.tier()
                } else {
                    Tier::Published
                },
                kind: PaperKind::Finding,
                metrics: p.metrics,
                links,
            }
        })
        .collect()
}

async fn load_proposals(settings: &Settings, include_hidden: bool) -> Vec<Paper> {
    let dir = settings.reps_dir();
    let names: Vec<String> = list_names(&dir, false)
        .await
        .into_iter()
        .filter(|n| n.starts_with("rep-") && n.ends_with(".md"))
        .collect();

    // Proposals whose findings are out are listed through the finding instead.
    let published_ids: Vec<String> = list_names(&settings.findings_dir(), false)
        .await
        .iter()
        .filter(|n| n.ends_with("-findings.md"))
        .filter_map(|n| slug::numeric_id(n, "rep").map(String::from))
        .collect();
    let experiment_names = list_names(&settings.experiments_dir(), true).await;
    let files = read_batch(&dir, &names).await;

    parse_batch(files)
        .into_iter()
        .filter(|p| !published_ids.iter().any(|id| slug::same_id(id, &p.doc.id)))
        .filter(|p| include_hidden || !p.doc.status.hidden())
        .map(|p| {
            let links = Links {
                proposal: Some(p.doc.slug.clone()),
                findings: None,
                experiment: match_name(&experiment_names, "rep", &p.doc.id, "").map(String::from),
                rip: None,
            };
            Paper {
                id: p.doc.id,
                slug: p.doc.slug,
                title: p.doc.title,
                subtitle: None,
                summary: p.doc.summary,
                keywords: p.keywords,
                date: p.doc.created.unwrap_or(p.doc.date),
                status: p.doc.status,
                tier: p.doc.status.tier(),
                kind: PaperKind::Proposal,
                metrics: Vec::new(),
                links,
            }
        })
        .collect()
}

/// Read every named file; unreadable ones are logged and left out.
async fn read_batch(dir: &Path, names: &[String]) -> Vec<RawFile> {
    let mut files = Vec::with_capacity(names.len());
    for name in names {
        match tokio::fs::read_to_string(dir.join(name)).await {
            Ok(text) => files.push(RawFile {
                name: name.clone(),
                text,
            }),
            Err(e) => warn!("Skipping {}: {}", name, e),
        }
    }
    files
}

fn parse_batch(files: Vec<RawFile>) -> Vec<Parsed> {
    files
        .par_iter()
        .map(|f| {
            let doc = Document::parse(&f.name, &f.text);
            if !fields::date_is_sortable(&doc.date) {
                warn!(
                    slug = %doc.slug,
                    date = %doc.date,
                    "Date is not YYYY-MM-DD; listing order may be off"
                );
            }
            Parsed {
                keywords: infer_keywords(&f.text).into_iter().map(String::from).collect(),
                metrics: extract_metrics(&f.text),
                doc,
            }
        })
        .collect()
}

async fn read_primary(path: &Path, reason: &str) -> PageResult<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        debug!("{}: {}", path.display(), e);
        PageError::not_found(reason)
    })
}

// ── Proposal ──

#[derive(Debug, Clone, Serialize)]
pub struct RipSection {
    pub slug: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalPage {
    pub slug: String,
    pub id: String,
    pub title: String,
    pub status: Status,
    pub created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    pub authors: Vec<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rip: Option<RipSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub findings_slug: Option<String>,
}

pub async fn load_proposal(settings: &Settings, slug: &str) -> PageResult<ProposalPage> {
    slug::validate_proposal(slug)?;

    let raw = read_primary(&settings.reps_dir().join(format!("{slug}.md")), "Proposal not found").await?;
    let doc = Document::parse(slug, &raw);
    let links = resolve_links(settings, &doc.id).await;

    let rip = match links.rip {
        Some(rip_slug) => {
            let path = settings.rips_dir().join(format!("{rip_slug}.md"));
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => Some(RipSection {
                    slug: rip_slug,
                    content: sections::strip_preamble(&text, Some("Overview")),
                }),
                Err(e) => {
                    warn!("RIP {} unreadable: {}", rip_slug, e);
                    None
                }
            }
        }
        None => None,
    };

    Ok(ProposalPage {
        slug: slug.to_string(),
        id: doc.id,
        title: doc.title,
        status: doc.status,
        created: doc.created.unwrap_or_default(),
        updated: doc.updated,
        authors: doc.authors,
        content: sections::strip_preamble(&raw, Some("Summary")),
        rip,
        experiment_slug: links.experiment,
        findings_slug: links.findings,
    })
}

// ── REP (raw) ──

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepPage {
    pub slug: String,
    pub markdown: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_slug: Option<String>,
}

pub async fn load_rep(settings: &Settings, slug: &str) -> PageResult<RepPage> {
    slug::validate_proposal(slug)?;

    let markdown = read_primary(&settings.reps_dir().join(format!("{slug}.md")), "REP not found").await?;
    let id = slug::file_id(slug);
    let experiment_slug = resolve(&settings.experiments_dir(), "rep", &id, Target::Dir).await;

    Ok(RepPage {
        slug: slug.to_string(),
        markdown,
        experiment_slug,
    })
}

// ── Findings ──

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingPage {
    pub slug: String,
    pub rep_id: String,
    pub title: String,
    pub date: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<Vec<ChartPoint>>,
}

pub async fn load_finding(settings: &Settings, slug: &str) -> PageResult<FindingPage> {
    slug::validate_finding(slug)?;

    let raw = read_primary(&settings.findings_dir().join(format!("{slug}.md")), "Findings not found").await?;
    let doc = Document::parse(slug, &raw);
    let links = resolve_links(settings, &doc.id).await;

    Ok(FindingPage {
        slug: slug.to_string(),
        rep_id: doc.id,
        title: doc.title,
        date: doc.date,
        status: doc.status,
        status_text: doc.status_text,
        content: doc.body,
        proposal_slug: links.proposal,
        experiment_slug: links.experiment,
        chart_data: extract_chart(&raw),
    })
}

// ── Experiments ──

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySummary {
    pub total: u64,
    pub passed: u64,
    pub pass_rate: f64,
    pub avg_tokens: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentResult {
    pub name: String,
    pub model: String,
    pub timestamp: String,
    pub summary: BTreeMap<String, StrategySummary>,
    pub has_analysis: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_file: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentPage {
    pub slug: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rep_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    pub results: Vec<ExperimentResult>,
}

pub async fn load_experiment(settings: &Settings, slug: &str) -> PageResult<ExperimentPage> {
    slug::validate(slug)?;

    let dir = settings.experiments_dir().join(slug);
    match tokio::fs::metadata(&dir).await {
        Ok(meta) if meta.is_dir() => {}
        _ => return Err(PageError::not_found("Experiment not found")),
    }

    let readme = tokio::fs::read_to_string(dir.join("README.md")).await.ok();
    let files = list_names(&dir, false).await;

    let mut results = Vec::new();
    for file in files.iter().filter(|f| f.starts_with("results-") && f.ends_with(".json")) {
        let text = match tokio::fs::read_to_string(dir.join(file)).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping {}/{}: {}", slug, file, e);
                continue;
            }
        };
        match parse_result(file, &text, &files) {
            Some(r) => results.push(r),
            None => warn!("Skipping {}/{}: not a result record", slug, file),
        }
    }
    results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    Ok(ExperimentPage {
        slug: slug.to_string(),
        name: slug::display_name(slug),
        rep_id: slug::numeric_id(slug, "rep").map(String::from),
        readme,
        results,
    })
}

/// One `results-*.json` record. Missing numbers read as zero; a file that is
/// not a JSON object is not a result.
fn parse_result(file: &str, text: &str, siblings: &[String]) -> Option<ExperimentResult> {
    let data: Value = serde_json::from_str(text).ok()?;
    let obj = data.as_object()?;

    let summary = obj
        .get("summary")
        .and_then(Value::as_object)
        .map(|s| {
            s.iter()
                .filter_map(|(strategy, v)| {
                    let v = v.as_object()?;
                    let num = |k: &str| v.get(k).and_then(Value::as_f64).unwrap_or(0.0);
                    Some((
                        strategy.clone(),
                        StrategySummary {
                            total: num("total") as u64,
                            passed: num("passed") as u64,
                            pass_rate: num("pass_rate"),
                            avg_tokens: num("avg_tokens"),
                        },
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    let stem = file.trim_end_matches(".json");
    let analysis = format!("{stem}-analysis.md");
    let has_analysis = siblings.iter().any(|s| *s == analysis);

    Some(ExperimentResult {
        name: stem.to_string(),
        model: obj
            .get("model")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("unknown")
            .to_string(),
        timestamp: obj
            .get("timestamp")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        summary,
        has_analysis,
        analysis_file: has_analysis.then_some(analysis),
    })
}

// ── Analysis ──

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisPage {
    pub slug: String,
    pub file: String,
    pub title: String,
    pub timestamp: String,
    pub model: String,
    pub content: String,
}

pub async fn load_analysis(settings: &Settings, slug: &str, file: &str) -> PageResult<AnalysisPage> {
    slug::validate(slug)?;
    slug::validate_analysis(file)?;

    let path = settings.experiments_dir().join(slug).join(file);
    let content = read_primary(&path, "Analysis not found").await?;

    Ok(AnalysisPage {
        slug: slug.to_string(),
        file: file.to_string(),
        title: fields::title(&content).unwrap_or_else(|| file.to_string()),
        timestamp: fields::field(&content, "Generated").unwrap_or_default(),
        model: fields::field(&content, "Verification Model").unwrap_or_default(),
        content,
    })
}

// ── Status changes ──

/// Move a proposal along its lifecycle and rewrite its status line.
pub async fn set_status(settings: &Settings, slug: &str, to: Status) -> anyhow::Result<Status> {
    slug::validate_proposal(slug)?;

    let path = settings.reps_dir().join(format!("{slug}.md"));
    let text = read_primary(&path, "Proposal not found").await?;
    let from = fields::status(&text);

    if !from.can_transition(to) {
        bail!("{} cannot move from {} to {}", slug, from, to);
    }
    let Some(updated) = status::rewrite_status(&text, to) else {
        bail!("{} has no **Status** line to update", slug);
    };

    tokio::fs::write(&path, updated)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("{}: {} -> {}", slug, from, to);
    Ok(from)
}

// ── Tests ──
