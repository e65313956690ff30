//! Pipeline file parsing.
//!
//! ```kdl
//! runtime "3.12"
//! output "public"
//! theme "readthedocs"
//! plugins "mkdocs-material" "pillow"
//! extra-plugins "mkdocs-awesome-pages-plugin"
//! publish {
//!     image "node:20-slim"
//!     repository "owner/docs"
//! }
//! ```

use crate::{ConfigError, ConfigResult};
use docship_core::docs::validate_output_dir;
use docship_core::{PipelineConfig, PublishConfig};
use kdl::{KdlDocument, KdlNode};
use serde::Serialize;
use std::path::Path;

/// Overrides read from a pipeline file. Unset fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineFile {
    pub runtime_version: Option<String>,
    pub output_dir: Option<String>,
    pub theme: Option<String>,
    /// Replaces the default package list when present.
    pub plugins: Option<Vec<String>>,
    /// Appended after `plugins` (or the defaults).
    pub extra_plugins: Vec<String>,
    pub publish: PublishOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishOverrides {
    pub image: Option<String>,
    pub repository: Option<String>,
}

impl PipelineFile {
    /// Layer these overrides onto `config` and `publish`.
    pub fn apply(&self, config: &mut PipelineConfig, publish: &mut PublishConfig) {
        if let Some(version) = &self.runtime_version {
            config.runtime_version = version.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(theme) = &self.theme {
            config.theme = theme.clone();
        }
        if let Some(plugins) = &self.plugins {
            config.plugins = plugins.clone();
        }
        config.add_plugins(self.extra_plugins.iter().cloned());

        if let Some(image) = &self.publish.image {
            publish.image = image.clone();
        }
        if let Some(repo) = &self.publish.repository {
            publish.repository = Some(repo.clone());
        }
    }
}

/// Parse a pipeline file from KDL text.
pub fn parse_pipeline_file(kdl: &str) -> ConfigResult<PipelineFile> {
    let doc: KdlDocument = kdl.parse()?;
    let mut file = PipelineFile::default();

    for node in doc.nodes() {
        match node.name().value() {
            "runtime" => {
                let version = non_empty(node, "runtime")?;
                set_once(&mut file.runtime_version, "runtime", version)?;
            }
            "output" => {
                let dir = non_empty(node, "output")?;
                validate_output_dir(&dir).map_err(|e| ConfigError::InvalidValue {
                    field: "output".to_string(),
                    message: e.to_string(),
                })?;
                set_once(&mut file.output_dir, "output", dir)?;
            }
            "theme" => {
                // An empty theme is allowed and means "leave it to mkdocs.yml".
                let theme = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("theme".to_string()))?;
                set_once(&mut file.theme, "theme", theme)?;
            }
            "plugins" => {
                let plugins = package_list(node, "plugins")?;
                set_once(&mut file.plugins, "plugins", plugins)?;
            }
            "extra-plugins" | "extra_plugins" => {
                let extra = package_list(node, "extra-plugins")?;
                file.extra_plugins.extend(extra);
            }
            "publish" => parse_publish(node, &mut file.publish)?,
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(file)
}

/// Load a pipeline file from disk. A missing file yields `None`.
pub fn load_pipeline_file(path: &Path) -> ConfigResult<Option<PipelineFile>> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_pipeline_file(&content).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_publish(node: &KdlNode, publish: &mut PublishOverrides) -> ConfigResult<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };
    for child in children.nodes() {
        match child.name().value() {
            "image" => {
                let image = non_empty(child, "publish image")?;
                set_once(&mut publish.image, "publish image", image)?;
            }
            "repository" => {
                let repo = non_empty(child, "publish repository")?;
                if repo.split('/').filter(|p| !p.is_empty()).count() != 2 {
                    return Err(ConfigError::InvalidValue {
                        field: "publish repository".to_string(),
                        message: format!("expected owner/name, got '{}'", repo),
                    });
                }
                set_once(&mut publish.repository, "publish repository", repo)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn set_once<T>(slot: &mut Option<T>, field: &str, value: T) -> ConfigResult<()> {
    if slot.is_some() {
        return Err(ConfigError::Duplicate(field.to_string()));
    }
    *slot = Some(value);
    Ok(())
}

fn non_empty(node: &KdlNode, field: &str) -> ConfigResult<String> {
    let value =
        get_first_string_arg(node).ok_or_else(|| ConfigError::MissingField(field.to_string()))?;
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(value)
}

/// Package names given as arguments, as `package` children, or both.
fn package_list(node: &KdlNode, field: &str) -> ConfigResult<Vec<String>> {
    let mut packages = get_all_string_args(node);
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "package" {
                packages.extend(get_all_string_args(child));
            }
        }
    }
    if let Some(bad) = packages.iter().find(|p| p.trim().is_empty()) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("empty package name '{}'", bad),
        });
    }
    Ok(packages)
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}
