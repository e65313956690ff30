//! Build command.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;

use super::{PipelineArgs, bounded, pipeline};

/// Build the site and export it to `export` on the host.
pub async fn build(args: &PipelineArgs, export: &Path) -> Result<()> {
    let pipeline = pipeline(args)?;
    println!("Building {}", pipeline.source().path().display());

    bounded(args.timeout, async {
        let site = pipeline.build().await?;
        let exported = site.export(export).await;
        if let Err(e) = site.release().await {
            warn!(error = %e, "Failed to release build environment");
        }
        exported
    })
    .await
    .context("Build failed")?;

    println!("✓ Site exported to {}", export.display());
    Ok(())
}
