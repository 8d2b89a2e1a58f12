use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::catalog;
use crate::content::{ContentIndex, NavItem};
use crate::lab;
use crate::settings::Settings;
use crate::xref::list_names;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// A prerenderable page.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Route {
    Lab,
    Catalog,
    Proposal(String),
    Rep(String),
    Finding(String),
    Experiment(String),
    Analysis { slug: String, file: String },
    Content(String),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Lab => "/lab".to_string(),
            Route::Catalog => "/catalog".to_string(),
            Route::Proposal(s) => format!("/lab/proposals/{s}"),
            Route::Rep(s) => format!("/lab/reps/{s}"),
            Route::Finding(s) => format!("/lab/findings/{s}"),
            Route::Experiment(s) => format!("/lab/experiments/{s}"),
            Route::Analysis { slug, file } => {
                format!("/lab/experiments/{slug}/{}", file.trim_end_matches(".md"))
            }
            Route::Content(s) if s.is_empty() => "/".to_string(),
            Route::Content(s) => format!("/{s}"),
        }
    }
}

#[derive(Debug, Serialize)]
struct ContentPage<'a> {
    slug: &'a str,
    content: &'a str,
    nav: Vec<NavItem>,
}

/// Rendered (or failed) page coming back from a worker.
struct PageRow {
    route: Route,
    body: Option<String>,
    error: Option<String>,
}

pub struct BuildStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

#[derive(Debug, Serialize)]
struct Manifest {
    generated_at: String,
    site_url: String,
    pages: usize,
    errors: usize,
    routes: Vec<String>,
}

/// Every route the site can prerender. Missing directories contribute nothing.
pub async fn entries(settings: &Settings, index: &ContentIndex) -> Vec<Route> {
    let mut routes = vec![Route::Lab, Route::Catalog];

    for name in list_names(&settings.reps_dir(), false).await {
        if let Some(stem) = name.strip_suffix(".md").filter(|s| s.starts_with("rep-")) {
            routes.push(Route::Proposal(stem.to_string()));
            routes.push(Route::Rep(stem.to_string()));
        }
    }

    for name in list_names(&settings.findings_dir(), false).await {
        if let Some(stem) = name.strip_suffix(".md").filter(|s| s.starts_with("rep-") && s.ends_with("-findings")) {
            routes.push(Route::Finding(stem.to_string()));
        }
    }

    let experiments = settings.experiments_dir();
    for slug in list_names(&experiments, true).await {
        for file in list_names(&experiments.join(&slug), false).await {
            if file.ends_with("-analysis.md") {
                routes.push(Route::Analysis {
                    slug: slug.clone(),
                    file,
                });
            }
        }
        routes.push(Route::Experiment(slug));
    }

    // lab and catalog pages own their paths; a content page at the same path is dropped
    let taken: BTreeSet<String> = routes.iter().map(Route::path).collect();
    for (slug, _) in index.all() {
        let route = Route::Content(slug.to_string());
        if taken.contains(&route.path()) {
            warn!("Content page {} collides with {}, skipping", slug, route.path());
            continue;
        }
        routes.push(route);
    }
    routes.sort();
    routes
}

/// Page data for one route, as pretty JSON.
pub async fn render(settings: &Settings, index: &ContentIndex, route: &Route) -> Result<String> {
    match route {
        Route::Lab => to_json(&lab::load_listing(settings, false).await),
        Route::Catalog => to_json(&catalog::load_catalog(settings).await),
        Route::Proposal(s) => to_json(&lab::load_proposal(settings, s).await?),
        Route::Rep(s) => to_json(&lab::load_rep(settings, s).await?),
        Route::Finding(s) => to_json(&lab::load_finding(settings, s).await?),
        Route::Experiment(s) => to_json(&lab::load_experiment(settings, s).await?),
        Route::Analysis { slug, file } => to_json(&lab::load_analysis(settings, slug, file).await?),
        Route::Content(s) => to_json(&ContentPage {
            slug: s,
            content: index.get(s)?,
            nav: index.nav_items(s, &format!("/{s}")),
        }),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize page")
}

/// Render every route into `out_dir/<route>/index.json`, writing pages as
/// they arrive. Failed pages are counted and logged, never fatal.
pub async fn build(settings: Arc<Settings>, index: Arc<ContentIndex>, out_dir: &Path) -> Result<BuildStats> {
    let routes = entries(&settings, &index).await;
    let total = routes.len();
    let concurrency = settings.concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Workers render, this task writes
    let (tx, mut rx) = tokio::sync::mpsc::channel::<PageRow>(concurrency * 2);

    for route in routes {
        let settings = Arc::clone(&settings);
        let index = Arc::clone(&index);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let row = match render(&settings, &index, &route).await {
                Ok(body) => PageRow {
                    route,
                    body: Some(body),
                    error: None,
                },
                Err(e) => PageRow {
                    route,
                    body: None,
                    error: Some(e.to_string()),
                },
            };
            let _ = tx.send(row).await;
        });
    }

    // rx closes once every worker has dropped its sender
    drop(tx);

    let mut built = Vec::new();
    let mut errors = 0usize;

    while let Some(row) = rx.recv().await {
        let path = row.route.path();
        match (row.body, row.error) {
            (Some(body), _) => match write_page(out_dir, &path, &body).await {
                Ok(()) => built.push(path),
                Err(e) => {
                    warn!("Page {} failed: {:#}", path, e);
                    errors += 1;
                }
            },
            (None, err) => {
                warn!("Page {} failed: {}", path, err.unwrap_or_default());
                errors += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    built.sort();

    let lastmod = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let sitemap = sitemap_xml(&settings.site_url, &built, &lastmod)?;
    tokio::fs::write(out_dir.join("sitemap.xml"), sitemap)
        .await
        .context("Failed to write sitemap.xml")?;

    let manifest = Manifest {
        generated_at: chrono::Utc::now().to_rfc3339(),
        site_url: settings.site_url.clone(),
        pages: built.len(),
        errors,
        routes: built.clone(),
    };
    tokio::fs::write(out_dir.join("manifest.json"), to_json(&manifest)?)
        .await
        .context("Failed to write manifest.json")?;

    info!("Built {} pages ({} ok, {} errors)", total, built.len(), errors);
    Ok(BuildStats {
        total,
        ok: built.len(),
        errors,
    })
}

async fn write_page(out_dir: &Path, route_path: &str, body: &str) -> Result<()> {
    let dir = out_dir.join(route_path.trim_start_matches('/'));
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    tokio::fs::write(dir.join("index.json"), body)
        .await
        .with_context(|| format!("Failed to write page {}", route_path))?;
    Ok(())
}

/// A `<urlset>` sitemap with one `<url>` per route path.
pub fn sitemap_xml(site_url: &str, paths: &[String], lastmod: &str) -> Result<String> {
    let base = site_url.trim_end_matches('/');
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_NS));
    writer.write_event(Event::Start(urlset))?;

    for path in paths {
        writer.write_event(Event::Start(BytesStart::new("url")))?;
        write_text(&mut writer, "loc", &format!("{base}{path}"))?;
        write_text(&mut writer, "lastmod", lastmod)?;
        writer.write_event(Event::End(BytesEnd::new("url")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("urlset")))?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_text(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
