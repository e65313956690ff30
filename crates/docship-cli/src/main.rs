//! docship CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::PipelineArgs;

#[derive(Parser)]
#[command(name = "docship")]
#[command(about = "Build and publish MkDocs documentation in containers", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true, env = "DOCSHIP_LOG_JSON")]
    log_json: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site and export it to the host
    Build {
        /// Host directory to export the built site to
        #[arg(long, default_value = "site")]
        export: PathBuf,
    },
    /// Build the site and publish it to GitHub Pages
    Publish {
        /// Access token used to push the pages branch
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,
        /// Repository (owner/name) to publish to, overriding the pipeline file
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repository: Option<String>,
    },
    /// Build and export, then publish when a token is available
    Run {
        /// Host directory to export the built site to
        #[arg(long, default_value = "site")]
        export: PathBuf,
        /// Access token used to push the pages branch
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,
        /// Repository (owner/name) to publish to, overriding the pipeline file
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repository: Option<String>,
    },
    /// Print the commands a build and publish would run
    Plan {
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the pipeline file and print the effective configuration
    Validate,
    /// Remove environments left behind by interrupted runs
    Prune,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Build { export } => {
            commands::build::build(&cli.pipeline, &export).await?;
        }
        Commands::Publish { token, repository } => {
            commands::publish::publish(&cli.pipeline, token, repository).await?;
        }
        Commands::Run {
            export,
            token,
            repository,
        } => {
            commands::run(&cli.pipeline, &export, token, repository).await?;
        }
        Commands::Plan { json } => {
            commands::plan::plan(&cli.pipeline, json)?;
        }
        Commands::Validate => {
            commands::validate(&cli.pipeline)?;
        }
        Commands::Prune => {
            commands::prune().await?;
        }
    }

    Ok(())
}
