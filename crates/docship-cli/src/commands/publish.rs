//! Publish command.

use anyhow::{Context, Result, bail};
use docship_core::Credential;

use super::{PipelineArgs, bounded, pipeline};

/// Build the site and publish it to GitHub Pages.
///
/// `repository` overrides the one from the pipeline file.
pub async fn publish(
    args: &PipelineArgs,
    token: Option<String>,
    repository: Option<String>,
) -> Result<()> {
    let token = match token.map(Credential::new) {
        Some(token) if !token.is_empty() => token,
        _ => bail!("A token is required to publish (pass --token or set GITHUB_TOKEN)"),
    };

    let mut pipeline = pipeline(args)?;
    if let Some(repo) = repository {
        pipeline.publish.repository = Some(repo);
    }
    if pipeline.publish.repository.is_none() {
        bail!("A repository is required (pass --repository or set GITHUB_REPOSITORY)");
    }
    println!("Publishing {}", pipeline.source().path().display());

    bounded(args.timeout, pipeline.deploy_to_github_pages(&token))
        .await
        .context("Publish failed")?;

    println!("✓ Documentation published");
    Ok(())
}
