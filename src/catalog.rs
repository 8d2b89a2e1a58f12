use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::settings::Settings;
use crate::slug;
use crate::xref::list_names;

const NO_DESCRIPTION: &str = "No description available";

/// Name fragments checked in order; the first hit decides.
const NAME_RULES: &[(&str, &str)] = &[
    ("rust", "language"),
    ("kotlin", "language"),
    ("jvm", "tooling"),
    ("terminal", "tooling"),
    ("eval", "testing"),
    ("visuals", "visuals"),
    ("sensei", "documentation"),
    ("experience", "frontend"),
    ("builder", "meta"),
    ("arch-guild", "meta"),
    ("core", "foundation"),
];

/// README phrases, lowercased, used when the name says nothing.
const CONTENT_RULES: &[(&[&str], &str)] = &[
    (&["image generation", "video generation"], "visuals"),
    (&["documentation", "tutorial"], "documentation"),
    (&["frontend", "animation"], "frontend"),
];

#[derive(Debug, Deserialize)]
struct Marketplace {
    #[serde(default)]
    plugins: Vec<RegistryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct RegistryEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PluginMeta {
    display_name: Option<String>,
    category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub category: String,
    pub keywords: Vec<String>,
    pub source_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage {
    pub plugins: Vec<PluginInfo>,
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
}

/// Registered plugins that have a directory under `plugins_root`, sorted by
/// category then name. A missing or broken registry yields an empty catalog.
pub async fn load_catalog(settings: &Settings) -> CatalogPage {
    let registry: HashMap<String, RegistryEntry> = match read_json::<Marketplace>(&settings.marketplace).await {
        Some(m) => m.plugins.into_iter().map(|p| (p.name.clone(), p)).collect(),
        None => HashMap::new(),
    };
    let metadata: HashMap<String, PluginMeta> = read_json(&settings.metadata).await.unwrap_or_default();

    let mut plugins = Vec::new();
    for name in list_names(&settings.plugins_root, true).await {
        let Some(entry) = registry.get(&name) else {
            continue;
        };
        let readme = tokio::fs::read_to_string(settings.plugins_root.join(&name).join("README.md"))
            .await
            .ok();
        plugins.push(plugin_info(settings, entry, metadata.get(&name), readme.as_deref()));
    }

    plugins.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));

    let categories = plugins
        .iter()
        .map(|p| p.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let keywords = plugins
        .iter()
        .flat_map(|p| p.keywords.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    info!("Catalog: {} plugins", plugins.len());
    CatalogPage {
        plugins,
        categories,
        keywords,
    }
}

fn plugin_info(
    settings: &Settings,
    entry: &RegistryEntry,
    meta: Option<&PluginMeta>,
    readme: Option<&str>,
) -> PluginInfo {
    let name = entry.name.as_str();
    let (readme_name, description) = match readme {
        Some(text) => parse_readme(text),
        None => (
            display_name(name),
            entry
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        ),
    };

    let category = entry
        .category
        .clone()
        .or_else(|| meta.and_then(|m| m.category.clone()))
        .unwrap_or_else(|| infer_category(name, readme.unwrap_or_default()).to_string());

    PluginInfo {
        name: name.to_string(),
        display_name: meta
            .and_then(|m| m.display_name.clone())
            .unwrap_or(readme_name),
        description,
        category,
        keywords: entry.keywords.clone(),
        source_url: format!("{}/{}", settings.github_base.trim_end_matches('/'), name),
    }
}

/// Display name and one-line description from a plugin README.
pub fn parse_readme(content: &str) -> (String, String) {
    let mut lines = content.lines();
    let title = lines
        .by_ref()
        .find_map(|l| l.strip_prefix("# "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let description = title
        .and_then(|_| {
            lines
                .map(str::trim)
                .find(|l| !l.is_empty() && !l.starts_with('#'))
        })
        .unwrap_or(NO_DESCRIPTION);

    (
        display_name(title.unwrap_or("Unknown")),
        description.to_string(),
    )
}

/// "rust-1337" → "Rust", "arch-guild" → "Arch Guild".
pub fn display_name(raw: &str) -> String {
    slug::display_name(raw.strip_suffix("-1337").unwrap_or(raw))
}

pub fn infer_category(name: &str, readme: &str) -> &'static str {
    if let Some((_, category)) = NAME_RULES.iter().find(|(frag, _)| name.contains(frag)) {
        return *category;
    }
    let lower = readme.to_lowercase();
    CONTENT_RULES
        .iter()
        .find(|(phrases, _)| phrases.iter().any(|p| lower.contains(p)))
        .map(|(_, category)| *category)
        .unwrap_or("other")
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Cannot parse {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture_settings() -> Settings {
        Settings::default().rebase(&PathBuf::from("tests/fixtures"))
    }

    #[test]
    fn readme_title_and_description() {
        let (name, desc) = parse_readme("# rust-1337\n\n## Install\n\nRust idioms and tooling.\n");
        assert_eq!(name, "Rust");
        assert_eq!(desc, "Rust idioms and tooling.");

        let (name, desc) = parse_readme("no title here\n");
        assert_eq!(name, "Unknown");
        assert_eq!(desc, NO_DESCRIPTION);
    }

    #[test]
    fn categories_by_name_then_content() {
        assert_eq!(infer_category("kotlin-1337", ""), "language");
        assert_eq!(infer_category("extension-builder", ""), "meta");
        assert_eq!(infer_category("core-1337", "A tutorial"), "foundation");
        assert_eq!(infer_category("pixels", "Image generation helpers"), "visuals");
        assert_eq!(infer_category("docs", "Write a TUTORIAL"), "documentation");
        assert_eq!(infer_category("misc", "nothing relevant"), "other");
    }

    #[tokio::test]
    async fn catalog_from_fixtures() {
        let page = load_catalog(&fixture_settings()).await;
        let names: Vec<&str> = page.plugins.iter().map(|p| p.name.as_str()).collect();

        // unregistered-tool has a directory but no registry entry
        assert_eq!(names, vec!["core-1337", "rust-1337", "terminal-1337"]);
        assert_eq!(page.categories, vec!["foundation", "language", "tooling"]);

        let rust = page.plugins.iter().find(|p| p.name == "rust-1337").unwrap();
        assert_eq!(rust.display_name, "Rust Toolkit");
        assert_eq!(rust.description, "Idiomatic Rust for agents.");
        assert!(rust.source_url.ends_with("/plugins/rust-1337"));

        // no README: registry description, name-derived display name
        let term = page.plugins.iter().find(|p| p.name == "terminal-1337").unwrap();
        assert_eq!(term.display_name, "Terminal");
        assert_eq!(term.description, "Shell workflows");
        assert_eq!(term.category, "tooling");

        assert!(page.keywords.contains(&"rust".to_string()));
    }

    #[tokio::test]
    async fn missing_registry_is_empty() {
        let settings = Settings {
            marketplace: PathBuf::from("tests/fixtures/nowhere.json"),
            ..fixture_settings()
        };
        assert!(load_catalog(&settings).await.plugins.is_empty());
    }
}
