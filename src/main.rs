mod catalog;
mod content;
mod error;
mod lab;
mod parser;
mod settings;
mod site;
mod slug;
mod status;
mod xref;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::content::ContentIndex;
use crate::error::PageResult;
use crate::settings::Settings;
use crate::status::Status;

#[derive(Parser)]
#[command(name = "lab_site", about = "Lab notebook and plugin catalog indexer")]
struct Cli {
    /// Print page data as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,
    /// Settings file (default: ./lab-site.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Resolve relative content paths against this directory
    #[arg(long, global = true, env = "LAB_SITE_ROOT")]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Findings and active proposals, published first
    Lab {
        /// Include rejected and postponed proposals
        #[arg(long)]
        all: bool,
        /// Only papers tagged with this keyword
        #[arg(short, long)]
        keyword: Option<String>,
    },
    /// Proposal page (REP with its RIP and links)
    Proposal { slug: String },
    /// Raw REP markdown
    Rep { slug: String },
    /// Findings page with chart data
    Finding { slug: String },
    /// Experiment page with its result records
    Experiment { slug: String },
    /// Analysis companion of an experiment result
    Analysis { slug: String, file: String },
    /// Plugin catalog
    Catalog {
        /// Filter by category (e.g. "language")
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Raw markdown of a content page
    Content { slug: String },
    /// Navigation items for a content section
    Nav {
        section: String,
        /// Base URL for links (default: /<section>)
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Every prerenderable route
    Entries,
    /// Prerender every page's data into the output directory
    Build {
        /// Output directory (default: out_dir setting)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Move a proposal to a new status
    SetStatus {
        slug: String,
        #[arg(value_parser = parse_status)]
        status: Status,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(root) = &cli.root {
        settings = settings.rebase(root);
    }
    let json = cli.json;

    let result = match cli.command {
        Commands::Lab { all, keyword } => {
            let mut page = lab::load_listing(&settings, all).await;
            if let Some(kw) = keyword.as_deref() {
                page.papers.retain(|p| p.keywords.iter().any(|k| k == kw));
            }
            emit(json, &page, print_listing)
        }
        Commands::Proposal { slug } => {
            let page = checked(lab::load_proposal(&settings, &slug).await)?;
            emit(json, &page, |p| {
                println!("{} [{}]", p.title, p.status.display_name());
                println!("Created:  {}", p.created);
                if let Some(updated) = &p.updated {
                    println!("Updated:  {}", updated);
                }
                if !p.authors.is_empty() {
                    println!("Authors:  {}", p.authors.join(", "));
                }
                print_link("Findings", p.findings_slug.as_deref());
                print_link("Experiment", p.experiment_slug.as_deref());
                print_link("RIP", p.rip.as_ref().map(|r| r.slug.as_str()));
                println!("\n{}", p.content);
            })
        }
        Commands::Rep { slug } => {
            let page = checked(lab::load_rep(&settings, &slug).await)?;
            emit(json, &page, |p| println!("{}", p.markdown))
        }
        Commands::Finding { slug } => {
            let page = checked(lab::load_finding(&settings, &slug).await)?;
            emit(json, &page, |f| {
                println!("{} [{}]", f.title, f.status_text.as_deref().unwrap_or(f.status.display_name()));
                println!("Date:     {}", f.date);
                print_link("Proposal", f.proposal_slug.as_deref());
                print_link("Experiment", f.experiment_slug.as_deref());
                if let Some(chart) = &f.chart_data {
                    println!("\n{:<24} | {:>9} | {:>10}", "Strategy", "Pass rate", "Avg tokens");
                    println!("{}", "-".repeat(49));
                    for point in chart {
                        println!(
                            "{:<24} | {:>8.1}% | {:>10}",
                            truncate(&point.strategy, 24),
                            point.pass_rate,
                            point.tokens
                        );
                    }
                }
                println!("\n{}", f.content);
            })
        }
        Commands::Experiment { slug } => {
            let page = checked(lab::load_experiment(&settings, &slug).await)?;
            emit(json, &page, print_experiment)
        }
        Commands::Analysis { slug, file } => {
            let page = checked(lab::load_analysis(&settings, &slug, &file).await)?;
            emit(json, &page, |a| {
                println!("{}", a.title);
                println!("Generated: {}", a.timestamp);
                println!("Model:     {}", a.model);
                println!("\n{}", a.content);
            })
        }
        Commands::Catalog { category } => {
            let mut page = catalog::load_catalog(&settings).await;
            if let Some(cat) = category.as_deref() {
                page.plugins.retain(|p| p.category.eq_ignore_ascii_case(cat));
            }
            emit(json, &page, print_catalog)
        }
        Commands::Content { slug } => {
            let index = ContentIndex::load(&settings.content_root)?;
            let text = checked(index.get(&slug))?;
            if json {
                emit(json, &serde_json::json!({ "slug": slug, "content": text }), |_| {})
            } else {
                println!("{}", text);
                Ok(())
            }
        }
        Commands::Nav { section, base_url } => {
            let index = ContentIndex::load(&settings.content_root)?;
            let base_url = base_url.unwrap_or_else(|| format!("/{}", section.trim_matches('/')));
            let items = index.nav_items(&section, &base_url);
            emit(json, &items, |items| {
                for item in items {
                    println!("{:<24} {}", item.label, item.href);
                }
            })
        }
        Commands::Entries => {
            let index = ContentIndex::load(&settings.content_root)?;
            let paths: Vec<String> = site::entries(&settings, &index)
                .await
                .iter()
                .map(site::Route::path)
                .collect();
            emit(json, &paths, |paths| {
                for path in paths {
                    println!("{}", path);
                }
                println!("\n{} routes", paths.len());
            })
        }
        Commands::Build { out } => {
            let out_dir = out.unwrap_or_else(|| settings.out_dir.clone());
            tokio::fs::create_dir_all(&out_dir)
                .await
                .with_context(|| format!("Failed to create {}", out_dir.display()))?;
            let index = Arc::new(ContentIndex::load(&settings.content_root)?);
            let stats = site::build(Arc::new(settings), index, &out_dir).await?;
            println!(
                "Built {} pages ({} ok, {} errors) into {}",
                stats.total,
                stats.ok,
                stats.errors,
                out_dir.display()
            );
            Ok(())
        }
        Commands::SetStatus { slug, status } => {
            let from = lab::set_status(&settings, &slug, status).await?;
            println!("{}: {} -> {}", slug, from, status);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Page errors carry their status class to the terminal.
fn checked<T>(result: PageResult<T>) -> anyhow::Result<T> {
    result.map_err(|e| anyhow::anyhow!("{} ({})", e, e.status()))
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn parse_status(s: &str) -> Result<Status, String> {
    status::ALL
        .iter()
        .copied()
        .find(|st| st.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| {
            let names: Vec<&str> = status::ALL.iter().map(|st| st.as_str()).collect();
            format!("unknown status '{}' (expected one of: {})", s, names.join(", "))
        })
}

fn print_link(label: &str, slug: Option<&str>) {
    if let Some(slug) = slug {
        println!("{:<10}{}", format!("{}:", label), slug);
    }
}

fn print_listing(page: &lab::ListingPage) {
    if page.papers.is_empty() {
        println!("No papers found.");
        return;
    }

    println!(
        "{:>3} | {:<30} | {:<11} | {:<11} | {:<10} | {:<40} | {}",
        "#", "Slug", "Status", "Tier", "Date", "Title", "Metrics"
    );
    println!("{}", "-".repeat(129));

    for (i, p) in page.papers.iter().enumerate() {
        let metrics: Vec<String> = p.metrics.iter().map(|m| format!("{} {}", m.key, m.value)).collect();
        println!(
            "{:>3} | {:<30} | {:<11} | {:<11} | {:<10} | {:<40} | {}",
            i + 1,
            truncate(&p.slug, 30),
            p.status.display_name(),
            p.tier.as_str(),
            truncate(&p.date, 10),
            truncate(&p.title, 40),
            metrics.join(", ")
        );
    }

    println!("\n{} papers | keywords: {}", page.papers.len(), page.all_keywords.join(", "));
}

fn print_experiment(page: &lab::ExperimentPage) {
    println!("{}", page.name);
    if let Some(id) = &page.rep_id {
        println!("REP:      {}", id);
    }
    if page.results.is_empty() {
        println!("\nNo results yet.");
        return;
    }

    println!(
        "\n{:<28} | {:<16} | {:<16} | {:>7} | {:>9} | {:>10}",
        "Result", "Model", "Strategy", "Passed", "Pass rate", "Avg tokens"
    );
    println!("{}", "-".repeat(100));
    for r in &page.results {
        for (strategy, s) in &r.summary {
            println!(
                "{:<28} | {:<16} | {:<16} | {:>3}/{:<3} | {:>8.1}% | {:>10.0}",
                truncate(&r.name, 28),
                truncate(&r.model, 16),
                truncate(strategy, 16),
                s.passed,
                s.total,
                s.pass_rate * 100.0,
                s.avg_tokens
            );
        }
        if let Some(file) = &r.analysis_file {
            println!("  analysis: {}", file);
        }
    }
}

fn print_catalog(page: &catalog::CatalogPage) {
    if page.plugins.is_empty() {
        println!("No plugins found.");
        return;
    }

    println!(
        "{:<14} | {:<20} | {:<20} | {}",
        "Category", "Plugin", "Name", "Description"
    );
    println!("{}", "-".repeat(100));
    for p in &page.plugins {
        println!(
            "{:<14} | {:<20} | {:<20} | {}",
            p.category,
            truncate(&p.name, 20),
            truncate(&p.display_name, 20),
            truncate(&p.description, 50)
        );
    }

    println!("\n{} plugins | categories: {}", page.plugins.len(), page.categories.join(", "));
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
