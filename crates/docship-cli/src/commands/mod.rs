//! CLI command implementations.

pub mod build;
pub mod plan;
pub mod publish;

use anyhow::{Context, Result};
use clap::Args;
use docship_config::load_pipeline_file;
use docship_core::environment::ExecutionBackend;
use docship_core::{Error, PipelineConfig, PublishConfig, SourceDirectory};
use docship_executor::DockerBackend;
use docship_pipeline::DocsPipeline;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Options shared by every command that builds a pipeline.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Documentation project root (contains mkdocs.yml)
    #[arg(long, global = true, env = "DOCSHIP_SOURCE", default_value = ".")]
    pub source: PathBuf,

    /// Pipeline file, resolved against --source when relative
    #[arg(long, global = true, env = "DOCSHIP_CONFIG", default_value = "docship.kdl")]
    pub config: PathBuf,

    /// Python version for the build image
    #[arg(long, global = true, env = "DOCSHIP_RUNTIME_VERSION")]
    pub runtime_version: Option<String>,

    /// Output directory written by the generator
    #[arg(long, global = true, env = "DOCSHIP_OUTPUT_DIR")]
    pub output_dir: Option<String>,

    /// Theme passed to the generator (empty to defer to mkdocs.yml)
    #[arg(long, global = true, env = "DOCSHIP_THEME")]
    pub theme: Option<String>,

    /// Additional package to install (repeatable)
    #[arg(long = "plugin", global = true)]
    pub plugins: Vec<String>,

    /// Give up after this many seconds
    #[arg(long, global = true, env = "DOCSHIP_TIMEOUT")]
    pub timeout: Option<u64>,
}

/// Effective settings after layering defaults, the pipeline file and flags.
pub struct Resolved {
    pub source: SourceDirectory,
    pub config: PipelineConfig,
    pub publish: PublishConfig,
    /// Pipeline file that was applied, if one existed.
    pub config_file: Option<PathBuf>,
}

pub fn resolve(args: &PipelineArgs) -> Result<Resolved> {
    let source = SourceDirectory::open(&args.source)?;
    let config_path = config_path(&source, &args.config);

    let mut config = PipelineConfig::default();
    let mut publish = PublishConfig::default();

    let file = load_pipeline_file(&config_path)
        .with_context(|| format!("Failed to load pipeline file: {}", config_path.display()))?;
    let config_file = match file {
        Some(file) => {
            file.apply(&mut config, &mut publish);
            Some(config_path)
        }
        None => None,
    };

    if let Some(version) = &args.runtime_version {
        config.runtime_version = version.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(theme) = &args.theme {
        config.theme = theme.clone();
    }
    config.add_plugins(args.plugins.iter().cloned());

    Ok(Resolved {
        source,
        config,
        publish,
        config_file,
    })
}

fn config_path(source: &SourceDirectory, config: &Path) -> PathBuf {
    if config.is_absolute() {
        config.to_path_buf()
    } else {
        source.path().join(config)
    }
}

/// Connect to Docker and assemble the pipeline.
pub fn pipeline(args: &PipelineArgs) -> Result<DocsPipeline> {
    let resolved = resolve(args)?;
    let backend: Arc<dyn ExecutionBackend> =
        Arc::new(DockerBackend::new().context("Failed to connect to Docker")?);

    let mut pipeline = DocsPipeline::new(backend, resolved.source);
    pipeline.config = resolved.config;
    pipeline.publish = resolved.publish;
    Ok(pipeline)
}

/// Run `fut` until it finishes, the timeout elapses, or Ctrl-C is pressed.
pub async fn bounded<T, F>(timeout: Option<u64>, fut: F) -> docship_core::Result<T>
where
    F: Future<Output = docship_core::Result<T>>,
{
    let limited = async {
        match timeout {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), fut).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(format!("gave up after {}s", secs))),
            },
            None => fut.await,
        }
    };

    let result = tokio::select! {
        result = limited => result,
        _ = tokio::signal::ctrl_c() => Err(Error::Cancelled),
    };

    if matches!(result, Err(Error::Cancelled) | Err(Error::Timeout(_))) {
        warn!("Run interrupted; environments may remain, remove them with `docship prune`");
    }
    result
}

/// Build and export, then publish when a token is present.
pub async fn run(
    args: &PipelineArgs,
    export: &Path,
    token: Option<String>,
    repository: Option<String>,
) -> Result<()> {
    build::build(args, export).await?;

    match token.filter(|t| !t.trim().is_empty()) {
        Some(token) => publish::publish(args, Some(token), repository).await,
        None => {
            info!("No GITHUB_TOKEN set, skipping publish");
            Ok(())
        }
    }
}

/// Check the pipeline file and settings, then print the effective values.
pub fn validate(args: &PipelineArgs) -> Result<()> {
    let resolved = resolve(args)?;
    resolved.config.validate()?;
    match &resolved.config_file {
        Some(path) => println!("Pipeline file is valid: {}", path.display()),
        None => println!("No pipeline file found, using defaults"),
    }
    println!("Source:   {}", resolved.source.path().display());
    println!("Image:    {}", resolved.config.build_image());
    println!("Output:   {}", resolved.config.output_dir);
    let theme = if resolved.config.theme.is_empty() {
        "(from mkdocs.yml)"
    } else {
        resolved.config.theme.as_str()
    };
    println!("Theme:    {}", theme);
    println!("Packages: {}", resolved.config.plugins.join(", "));
    println!("Publish:  {}", resolved.publish.image);
    if let Some(repo) = &resolved.publish.repository {
        println!("Repo:     {}", repo);
    }
    Ok(())
}

/// Remove labelled environments left behind by interrupted runs.
pub async fn prune() -> Result<()> {
    let backend = DockerBackend::new().context("Failed to connect to Docker")?;
    let removed = backend.prune().await?;
    println!("Removed {} environment(s)", removed);
    Ok(())
}
