use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("lab_site").unwrap();
    cmd.env("RUST_LOG", "warn")
        .args(["--config", "tests/fixtures/lab-site.toml", "--root", "tests/fixtures"]);
    cmd
}

fn run_json(args: &[&str]) -> Value {
    let out = cmd().arg("--json").args(args).assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).expect("valid json output")
}

#[test]
fn lab_listing_table() {
    cmd()
        .arg("lab")
        .assert()
        .success()
        .stdout(contains("rep-001-iteration-findings"))
        .stdout(contains("rep-004-abandoned").not());
}

#[test]
fn lab_listing_all_includes_hidden() {
    let page = run_json(&["lab", "--all"]);
    let slugs: Vec<&str> = page["papers"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["slug"].as_str())
        .collect();
    assert!(slugs.contains(&"rep-004-abandoned"));
    assert_eq!(page["papers"][0]["tier"], "published");
}

#[test]
fn lab_keyword_filter() {
    let page = run_json(&["lab", "--keyword", "efficiency"]);
    for paper in page["papers"].as_array().unwrap() {
        let kws = paper["keywords"].as_array().unwrap();
        assert!(kws.iter().any(|k| k == "efficiency"));
    }
}

#[test]
fn proposal_json() {
    let page = run_json(&["proposal", "rep-001-iteration"]);
    assert_eq!(page["status"], "implemented");
    assert_eq!(page["findingsSlug"], "rep-001-iteration-findings");
    assert_eq!(page["rip"]["slug"], "rip-001-iteration");
}

#[test]
fn proposal_not_found() {
    cmd()
        .args(["proposal", "rep-999-missing"])
        .assert()
        .failure()
        .stderr(contains("Proposal not found (404)"));
}

#[test]
fn traversal_is_rejected() {
    cmd()
        .args(["rep", "../../etc/passwd"])
        .assert()
        .failure()
        .stderr(contains("Invalid path (400)"));
    cmd()
        .args(["analysis", "rep-001-iteration", "../lab-site.toml"])
        .assert()
        .failure()
        .stderr(contains("(400)"));
    cmd()
        .args(["content", "../lab-site"])
        .assert()
        .failure()
        .stderr(contains("(400)"));
}

#[test]
fn finding_chart() {
    cmd()
        .args(["finding", "rep-001-iteration-findings"])
        .assert()
        .success()
        .stdout(contains("Ralph-style"))
        .stdout(contains("92.1%"));
}

#[test]
fn experiment_results() {
    let page = run_json(&["experiment", "rep-001-iteration"]);
    assert_eq!(page["results"].as_array().unwrap().len(), 2);
    assert_eq!(page["results"][0]["hasAnalysis"], true);
}

#[test]
fn catalog_by_category() {
    cmd()
        .args(["catalog", "--category", "language"])
        .assert()
        .success()
        .stdout(contains("rust-1337"))
        .stdout(contains("core-1337").not());
}

#[test]
fn content_and_nav() {
    cmd()
        .args(["content", "explore/reference/core-1337"])
        .assert()
        .success()
        .stdout(contains("Served from index.md"));
    cmd()
        .args(["nav", "explore/reference"])
        .assert()
        .success()
        .stdout(contains("/explore/reference/rust-1337/"));
}

#[test]
fn entries_list_routes() {
    cmd()
        .arg("entries")
        .assert()
        .success()
        .stdout(contains("/lab/experiments/rep-001-iteration/results-2025-01-10-analysis"));
}

#[test]
fn build_into_tempdir() {
    let out = tempfile::tempdir().unwrap();
    cmd()
        .args(["build", "--out"])
        .arg(out.path())
        .assert()
        .success()
        .stdout(contains("0 errors"));

    let sitemap = std::fs::read_to_string(out.path().join("sitemap.xml")).unwrap();
    assert!(sitemap.contains("https://lab.example/lab/proposals/rep-002-rigor"));
    assert!(out.path().join("catalog/index.json").exists());
}

#[test]
fn set_status_follows_lifecycle() {
    let tmp = tempfile::tempdir().unwrap();
    let reps = tmp.path().join("lab/reps");
    std::fs::create_dir_all(&reps).unwrap();
    std::fs::write(reps.join("rep-020-x.md"), "# REP-020: X\n\n**Status**: Draft\n").unwrap();

    let mut base = Command::cargo_bin("lab_site").unwrap();
    base.env("RUST_LOG", "warn")
        .args(["--config", "tests/fixtures/lab-site.toml", "--root"])
        .arg(tmp.path());

    base.args(["set-status", "rep-020-x", "discussion"])
        .assert()
        .success()
        .stdout(contains("draft -> discussion"));

    let text = std::fs::read_to_string(reps.join("rep-020-x.md")).unwrap();
    assert!(text.contains("**Status**: Discussion"));

    Command::cargo_bin("lab_site")
        .unwrap()
        .args(["--config", "tests/fixtures/lab-site.toml", "--root"])
        .arg(tmp.path())
        .args(["set-status", "rep-020-x", "shipped"])
        .assert()
        .failure()
        .stderr(contains("unknown status"));
}
