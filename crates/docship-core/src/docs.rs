//! Documentation project inputs: the source tree and the pipeline configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub const DEFAULT_RUNTIME_VERSION: &str = "3.11";
pub const DEFAULT_OUTPUT_DIR: &str = "site";
pub const DEFAULT_PUBLISH_IMAGE: &str = "node:slim";

/// Packages installed by default: the theme, a minifier, a revision-date
/// plugin and the two imaging libraries the theme's social cards need.
pub const DEFAULT_PLUGINS: [&str; 5] = [
    "mkdocs-material",
    "mkdocs-minify-plugin",
    "mkdocs-git-revision-date-localized-plugin",
    "pillow",
    "cairosvg",
];

/// Read-only reference to the documentation project root on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDirectory(PathBuf);

impl SourceDirectory {
    /// Wrap `path` as-is, without checking that it exists.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Resolve `path` to an absolute directory, failing if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let resolved = path.canonicalize().map_err(|e| {
            Error::InvalidInput(format!("source directory {}: {}", path.display(), e))
        })?;
        if !resolved.is_dir() {
            return Err(Error::InvalidInput(format!(
                "source {} is not a directory",
                resolved.display()
            )));
        }
        Ok(Self(resolved))
    }

    /// The project root on the host.
    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// Settings for a documentation build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Python version, selects the `python:<version>-slim` base image.
    pub runtime_version: String,
    /// Directory the generator writes into, relative to the source root.
    pub output_dir: String,
    /// Theme forced on the generator with `--theme`. Empty (the default)
    /// leaves the whole `theme:` block of `mkdocs.yml` in effect.
    pub theme: String,
    /// Packages installed in one batched step, in order.
    pub plugins: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            runtime_version: DEFAULT_RUNTIME_VERSION.to_string(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            theme: String::new(),
            plugins: DEFAULT_PLUGINS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    /// Base image for the build environment.
    pub fn build_image(&self) -> String {
        format!("python:{}-slim", self.runtime_version)
    }

    /// Reject settings that would make the build meaningless: an empty
    /// runtime version, or an output directory that is empty, the source
    /// root itself, or outside it.
    pub fn validate(&self) -> Result<()> {
        if self.runtime_version.trim().is_empty() {
            return Err(Error::InvalidInput("runtime version is empty".to_string()));
        }
        validate_output_dir(&self.output_dir)
    }

    /// Append packages, skipping ones already present.
    pub fn add_plugins<I, S>(&mut self, plugins: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for plugin in plugins {
            let plugin = plugin.into();
            if !self.plugins.contains(&plugin) {
                self.plugins.push(plugin);
            }
        }
    }
}

/// Check that `dir` names a directory below the source root (or an
/// absolute path other than `/`).
pub fn validate_output_dir(dir: &str) -> Result<()> {
    let trimmed = dir.trim().trim_end_matches('/');
    let is_root = trimmed.split('/').all(|p| p.is_empty() || p == ".");
    if is_root {
        return Err(Error::InvalidInput(format!(
            "output directory '{}' would export the whole source tree",
            dir
        )));
    }
    if trimmed.split('/').any(|p| p == "..") {
        return Err(Error::InvalidInput(format!(
            "output directory '{}' must not contain '..'",
            dir
        )));
    }
    Ok(())
}

/// Settings for the publish environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Base image for the publish environment.
    pub image: String,
    /// GitHub repository (`owner/name`) to push to. Required to publish:
    /// the copied site carries no git remote of its own.
    pub repository: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_PUBLISH_IMAGE.to_string(),
            repository: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.runtime_version, "3.11");
        assert_eq!(config.output_dir, "site");
        assert_eq!(config.theme, "");
        assert_eq!(config.plugins.len(), 5);
        assert_eq!(config.plugins[0], "mkdocs-material");
        assert_eq!(config.build_image(), "python:3.11-slim");
    }

    #[test]
    fn test_defaults_are_fresh_values() {
        let mut a = PipelineConfig::default();
        a.plugins.push("mkdocs-awesome-pages-plugin".into());
        let b = PipelineConfig::default();
        assert_eq!(b.plugins.len(), 5);
    }

    #[test]
    fn test_add_plugins_keeps_order_and_skips_duplicates() {
        let mut config = PipelineConfig::default();
        config.add_plugins(["mkdocs-awesome-pages-plugin", "pillow", "mkdocs-redirects"]);
        assert_eq!(
            &config.plugins[5..],
            &["mkdocs-awesome-pages-plugin", "mkdocs-redirects"]
        );
    }

    #[test]
    fn test_output_dir_must_be_below_source_root() {
        for dir in ["", ".", "./", " ", "/", "./.", "../site", "docs/../.."] {
            let config = PipelineConfig {
                output_dir: dir.to_string(),
                ..PipelineConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(Error::InvalidInput(_))),
                "{:?} should be rejected",
                dir
            );
        }
        for dir in ["site", "./public", "build/site", "/out"] {
            assert!(validate_output_dir(dir).is_ok(), "{:?} should be accepted", dir);
        }
    }

    #[test]
    fn test_empty_runtime_rejected() {
        let config = PipelineConfig {
            runtime_version: String::new(),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_open_rejects_missing_directory() {
        let err = SourceDirectory::open("/definitely/not/here").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_config_serializes() {
        let json = serde_json::to_string(&PipelineConfig::default()).unwrap();
        assert!(json.contains("\"runtime_version\":\"3.11\""));
    }
}
