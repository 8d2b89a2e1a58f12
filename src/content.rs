use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PageError, PageResult};

/// Every markdown page under the content root, keyed by slug. Built once and
/// read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ContentIndex {
    pages: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub href: String,
    pub label: String,
    pub slug: String,
}

impl ContentIndex {
    /// Scan `root/**/*.md`. `a/index.md` and `a.md` both become `a`; the index
    /// file wins. Unreadable files are logged and skipped.
    pub fn load(root: &Path) -> Result<ContentIndex> {
        let pattern = format!(
            "{}/**/*.md",
            glob::Pattern::escape(&root.to_string_lossy())
        );
        let paths = glob::glob(&pattern).with_context(|| format!("Bad content root {}", root.display()))?;

        let mut index = ContentIndex::default();
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping content entry: {}", e);
                    continue;
                }
            };
            let Some((slug, is_index)) = slug_for(root, &path) else {
                continue;
            };
            match std::fs::read_to_string(&path) {
                Ok(text) => index.insert(slug, text, is_index),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        if index.is_empty() {
            warn!("No content pages under {}", root.display());
        } else {
            info!("Content index: {} pages from {}", index.len(), root.display());
        }
        Ok(index)
    }

    fn insert(&mut self, slug: String, text: String, is_index: bool) {
        if is_index || !self.pages.contains_key(&slug) {
            self.pages.insert(slug, text);
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, slug: &str) -> PageResult<&str> {
        let slug = normalize(slug)?;
        self.pages
            .get(slug)
            .map(String::as_str)
            .ok_or_else(|| PageError::not_found("Content not found"))
    }

    pub fn all(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pages.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Pages at or below `base`. An empty base is the whole index.
    pub fn tree<'a>(&'a self, base: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let base = base.trim_matches('/');
        self.all().filter(move |(slug, _)| {
            base.is_empty()
                || *slug == base
                || slug.strip_prefix(base).is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Direct children of `section`, alphabetical. `section/index.md` is the
/// section's own page and never a child.
    pub fn nav_items(&self, section: &str, base_url: &str) -> Vec<NavItem> {
        let section = section.trim_matches('/');
        let base_url = base_url.trim_end_matches('/');

        let mut items: Vec<NavItem> = Vec::new();
        for (slug, _) in self.tree(section) {
            let rest = if section.is_empty() {
                slug
            } else {
                match slug.strip_prefix(section).and_then(|r| r.strip_prefix('/')) {
                    Some(rest) => rest,
                    // the section's own page
                    None => continue,
                }
            };
            let Some(first) = rest.split('/').next().filter(|s| !s.is_empty()) else {
                continue;
            };
            if items.iter().any(|i| i.label == first) {
                continue;
            }
            items.push(NavItem {
                href: format!("{base_url}/{first}/"),
                label: first.to_string(),
                slug: if section.is_empty() {
                    first.to_string()
                } else {
                    format!("{section}/{first}")
                },
            });
        }

        items.sort_by(|a, b| a.label.cmp(&b.label));
        items
    }
}

fn normalize(slug: &str) -> PageResult<&str> {
    let slug = slug.trim_matches('/');
    if slug.split('/').any(|seg| seg == "..") || slug.contains('\\') || slug.contains('\0') {
        return Err(PageError::invalid("Invalid path"));
    }
    Ok(slug)
}

/// Slug for a content file, and whether it is a directory index.
fn slug_for(root: &Path, path: &Path) -> Option<(String, bool)> {
    let rel = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<&str> = rel.iter().map(|c| c.to_str()).collect::<Option<_>>()?;
    match parts.split_last() {
        Some((&"index", dir)) => Some((dir.join("/"), true)),
        Some(_) => Some((parts.join("/"), false)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_index() -> ContentIndex {
        ContentIndex::load(Path::new("tests/fixtures/content")).unwrap()
    }

    #[test]
    fn index_file_wins() {
        let idx = fixture_index();
        assert!(idx.get("explore/reference/core-1337").unwrap().contains("from index.md"));
        assert!(idx.get("/explore/reference/core-1337/").unwrap().contains("from index.md"));
    }

    #[test]
    fn root_and_nested_slugs() {
        let idx = fixture_index();
        assert!(idx.get("").unwrap().starts_with("# Home"));
        assert!(idx.get("explore/reference/rust-1337").is_ok());
        assert_eq!(idx.get("missing").unwrap_err().status(), 404);
    }

    #[test]
    fn traversal_is_invalid() {
        let idx = fixture_index();
        assert_eq!(idx.get("../secrets").unwrap_err().status(), 400);
        assert_eq!(idx.get("explore/../../x").unwrap_err().status(), 400);
    }

    #[test]
    fn tree_respects_segments() {
        let idx = fixture_index();
        let slugs: Vec<&str> = idx.tree("explore/reference").map(|(s, _)| s).collect();
        assert!(slugs.contains(&"explore/reference"));
        assert!(slugs.contains(&"explore/reference/core-1337"));
        assert!(!slugs.contains(&"explore/reference-old"));
        assert_eq!(idx.tree("").count(), idx.len());
    }

    #[test]
    fn nav_items_are_direct_children() {
        let idx = fixture_index();
        let nav = idx.nav_items("explore/reference", "/explore/reference/");
        let labels: Vec<&str> = nav.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["core-1337", "rust-1337"]);
        assert_eq!(nav[0].href, "/explore/reference/core-1337/");
        assert_eq!(nav[0].slug, "explore/reference/core-1337");
    }

    #[test]
    fn nav_from_disk_is_alphabetical() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        std::fs::create_dir_all(docs.join("alpha")).unwrap();
        for name in ["index.md", "zeta.md", "alpha/deep.md", "beta.md"] {
            std::fs::write(docs.join(name), "# page").unwrap();
        }

        let idx = ContentIndex::load(tmp.path()).unwrap();
        let labels: Vec<String> = idx.nav_items("docs", "/docs").into_iter().map(|n| n.label).collect();
        assert_eq!(labels, vec!["alpha", "beta", "zeta"]);
        assert!(idx.get("docs").is_ok());
    }

    #[test]
    fn missing_root_is_empty() {
        let idx = ContentIndex::load(Path::new("tests/fixtures/no-content-here")).unwrap();
        assert!(idx.is_empty());
    }
}
