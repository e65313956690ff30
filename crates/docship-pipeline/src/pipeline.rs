//! Documentation pipeline: build a site, optionally publish it.

use docship_core::environment::{
    DirectoryRef, DirectorySource, EnvironmentHandle, EnvironmentSpec, ExecutionBackend,
};
use docship_core::secret::SecretVar;
use docship_core::{
    Credential, Error, PipelineConfig, PublishConfig, Result, SourceDirectory, Stage,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::plan::{self, BuildPlan, PlannedStep, PublishPlan};

/// A built site living inside its build environment.
///
/// The environment stays alive until [`BuiltSite::release`] is called, so the
/// output can be exported or loaded into another environment.
pub struct BuiltSite {
    backend: Arc<dyn ExecutionBackend>,
    dir: DirectoryRef,
}

impl BuiltSite {
    /// Where the site lives inside its build environment.
    pub fn directory(&self) -> &DirectoryRef {
        &self.dir
    }

    /// Copy the site to a host directory.
    pub async fn export(&self, dest: &Path) -> Result<()> {
        self.backend.export(&self.dir, dest).await
    }

    /// Destroy the build environment.
    pub async fn release(self) -> Result<()> {
        self.backend.release(&self.dir.environment).await
    }
}

impl std::fmt::Debug for BuiltSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltSite")
            .field("backend", &self.backend.name())
            .field("dir", &self.dir)
            .finish()
    }
}

/// Builds an MkDocs project in an isolated environment and publishes it.
pub struct DocsPipeline {
    backend: Arc<dyn ExecutionBackend>,
    source: SourceDirectory,
    /// Build settings. Adjust before calling [`DocsPipeline::build`].
    pub config: PipelineConfig,
    /// Publish settings.
    pub publish: PublishConfig,
}

impl DocsPipeline {
    /// Create a pipeline for `source` with the default configuration.
    pub fn new(backend: Arc<dyn ExecutionBackend>, source: SourceDirectory) -> Self {
        Self {
            backend,
            source,
            config: PipelineConfig::default(),
            publish: PublishConfig::default(),
        }
    }

    /// The project this pipeline builds.
    pub fn source(&self) -> &SourceDirectory {
        &self.source
    }

    /// Commands [`DocsPipeline::build`] will run with the current settings.
    pub fn build_plan(&self) -> BuildPlan {
        plan::build_plan(&self.config)
    }

    /// Commands the publish half of [`DocsPipeline::deploy_to_github_pages`]
    /// will run. Fails when no valid repository is configured.
    pub fn publish_plan(&self) -> Result<PublishPlan> {
        plan::publish_plan(&self.publish)
    }

    /// Build the documentation site.
    ///
    /// On success the returned site still lives in its environment; nothing
    /// is copied out. On failure the environment is released.
    pub async fn build(&self) -> Result<BuiltSite> {
        self.config.validate()?;
        let plan = self.build_plan();

        if !self.backend.is_available().await {
            return Err(Error::EnvironmentUnavailable {
                image: plan.image,
                message: format!("{} backend is not reachable", self.backend.name()),
            });
        }

        info!(
            source = %self.source.path().display(),
            image = %plan.image,
            packages = self.config.plugins.len(),
            "Building documentation"
        );

        let spec = EnvironmentSpec::new(&plan.image, &plan.working_dir).with_mount(
            DirectorySource::Host(self.source.path().to_path_buf()),
            plan::SOURCE_PATH,
        );
        let env = self.backend.acquire(spec).await?;

        if let Err(e) = run_steps(self.backend.as_ref(), &env, &plan.steps).await {
            error!(error = %e, stage = %e.stage(), "Build failed");
            release_quietly(self.backend.as_ref(), &env).await;
            return Err(e);
        }

        info!(output = %plan.output_path, "Site built");
        Ok(BuiltSite {
            backend: self.backend.clone(),
            dir: DirectoryRef::new(env, plan.output_path),
        })
    }

    /// Build the site afresh and push it to GitHub Pages.
    ///
    /// The publish command's exit status is checked: a failing push is
    /// returned as [`Error::PublishFailed`].
    pub async fn deploy_to_github_pages(&self, token: &Credential) -> Result<()> {
        if token.is_empty() {
            return Err(Error::InvalidInput("publish token is empty".to_string()));
        }
        let plan = self.publish_plan()?;

        let site = self
            .build()
            .await
            .map_err(|e| Error::PublishBuild(Box::new(e)))?;

        info!(image = %plan.image, "Publishing documentation");

        let spec = EnvironmentSpec::new(&plan.image, &plan.working_dir)
            .with_mount(
                DirectorySource::Environment(site.directory().clone()),
                plan::SITE_PATH,
            )
            .with_secret(SecretVar::new(plan::TOKEN_VAR, token.clone()));

        let acquired = self.backend.acquire(spec).await;

        // The site has been copied (or the copy failed); either way the
        // build environment is no longer needed.
        if let Err(e) = site.release().await {
            warn!(error = %e, "Failed to release build environment");
        }

        let env = acquired.map_err(|e| Error::PublishSetupFailed(e.to_string()))?;

        let result = run_steps(self.backend.as_ref(), &env, &plan.steps).await;
        release_quietly(self.backend.as_ref(), &env).await;

        match result {
            Ok(()) => {
                info!("Documentation published");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, stage = %e.stage(), "Publish failed");
                Err(e)
            }
        }
    }
}

/// Run steps in order, stopping at the first failure.
async fn run_steps(
    backend: &dyn ExecutionBackend,
    env: &EnvironmentHandle,
    steps: &[PlannedStep],
) -> Result<()> {
    for step in steps {
        info!(step = step.name, stage = %step.stage, "Running step");
        let output = backend
            .exec(env, &step.command)
            .await
            .map_err(|e| stage_error(step.stage, e.to_string()))?;

        for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
            debug!(step = step.name, "{}", line);
        }
        for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
            debug!(step = step.name, stream = "stderr", "{}", line);
        }

        if !output.success() {
            return Err(stage_error(
                step.stage,
                format!("{} failed with {}", step.name, output.summary()),
            ));
        }
        debug!(
            step = step.name,
            duration_ms = output.duration_ms(),
            "Step completed"
        );
    }
    Ok(())
}

fn stage_error(stage: Stage, message: String) -> Error {
    match stage {
        Stage::Install => Error::InstallFailed(message),
        Stage::Build => Error::BuildFailed(message),
        Stage::PublishSetup => Error::PublishSetupFailed(message),
        Stage::Publish => Error::PublishFailed(message),
        Stage::Export => Error::ExportFailed(message),
        Stage::Environment | Stage::Other => Error::Backend(message),
    }
}

async fn release_quietly(backend: &dyn ExecutionBackend, env: &EnvironmentHandle) {
    if let Err(e) = backend.release(env).await {
        warn!(environment = %env.id, error = %e, "Failed to release environment");
    }
}
