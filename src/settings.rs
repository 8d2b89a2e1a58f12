use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

const DEFAULT_CONFIG: &str = "lab-site";
const ENV_PREFIX: &str = "LAB_SITE";

/// Where content lives and where builds go. Loaded from defaults, then an
/// optional `lab-site.toml`, then `LAB_SITE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub lab_root: PathBuf,
    pub plugins_root: PathBuf,
    pub marketplace: PathBuf,
    pub metadata: PathBuf,
    pub content_root: PathBuf,
    pub out_dir: PathBuf,
    pub site_url: String,
    pub github_base: String,
    pub concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            lab_root: PathBuf::from("lab-1337"),
            plugins_root: PathBuf::from("plugins"),
            marketplace: PathBuf::from(".claude-plugin/marketplace.json"),
            metadata: PathBuf::from(".claude-plugin/metadata.json"),
            content_root: PathBuf::from("experience/content"),
            out_dir: PathBuf::from("build"),
            site_url: "https://example.com".to_string(),
            github_base: "https://github.com/yzavyas/claude-1337/tree/main/plugins".to_string(),
            concurrency: 8,
        }
    }
}

impl Settings {
    pub fn load(file: Option<&Path>) -> Result<Settings> {
        let source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG).required(false),
        };
        let settings: Settings = Config::builder()
            .add_source(source)
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        Ok(settings)
    }

    /// Resolve every relative content path against `root`.
    pub fn rebase(mut self, root: &Path) -> Settings {
        for path in [
            &mut self.lab_root,
            &mut self.plugins_root,
            &mut self.marketplace,
            &mut self.metadata,
            &mut self.content_root,
            &mut self.out_dir,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
        self
    }

    pub fn reps_dir(&self) -> PathBuf {
        self.lab_root.join("reps")
    }

    pub fn findings_dir(&self) -> PathBuf {
        self.lab_root.join("findings")
    }

    pub fn rips_dir(&self) -> PathBuf {
        self.lab_root.join("rips")
    }

    pub fn experiments_dir(&self) -> PathBuf {
        self.lab_root.join("experiments")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.toml");
        std::fs::write(&path, "lab_root = \"/srv/lab\"\nconcurrency = 2\n").unwrap();

        let s = Settings::load(Some(&path)).unwrap();
        assert_eq!(s.lab_root, PathBuf::from("/srv/lab"));
        assert_eq!(s.concurrency, 2);
        assert_eq!(s.plugins_root, PathBuf::from("plugins"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/site.toml"))).is_err());
    }

    #[test]
    fn rebase_keeps_absolute_paths() {
        let s = Settings {
            lab_root: PathBuf::from("/abs/lab"),
            ..Settings::default()
        }
        .rebase(Path::new("/root"));
        assert_eq!(s.lab_root, PathBuf::from("/abs/lab"));
        assert_eq!(s.plugins_root, PathBuf::from("/root/plugins"));
        assert_eq!(s.reps_dir(), PathBuf::from("/abs/lab/reps"));
    }
}
