//! Error types for docship.

use serde::Serialize;
use thiserror::Error;

/// Pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Environment,
    Install,
    Build,
    PublishSetup,
    Publish,
    Export,
    Other,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Environment => "environment",
            Stage::Install => "install",
            Stage::Build => "build",
            Stage::PublishSetup => "publish-setup",
            Stage::Publish => "publish",
            Stage::Export => "export",
            Stage::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("environment unavailable for image '{image}': {message}")]
    EnvironmentUnavailable { image: String, message: String },

    #[error("package installation failed: {0}")]
    InstallFailed(String),

    #[error("site build failed: {0}")]
    BuildFailed(String),

    #[error("failed to build site for publish: {0}")]
    PublishBuild(#[source] Box<Error>),

    #[error("publish setup failed: {0}")]
    PublishSetupFailed(String),

    #[error("publish failed: {0}")]
    PublishFailed(String),

    #[error("export failed: {0}")]
    ExportFailed(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stage that failed. A build failure wrapped by a publish attempt reports
    /// the inner build stage.
    pub fn stage(&self) -> Stage {
        match self {
            Error::EnvironmentUnavailable { .. } => Stage::Environment,
            Error::InstallFailed(_) => Stage::Install,
            Error::BuildFailed(_) => Stage::Build,
            Error::PublishBuild(inner) => inner.stage(),
            Error::PublishSetupFailed(_) => Stage::PublishSetup,
            Error::PublishFailed(_) => Stage::Publish,
            Error::ExportFailed(_) => Stage::Export,
            Error::Backend(_)
            | Error::InvalidInput(_)
            | Error::Timeout(_)
            | Error::Cancelled
            | Error::Io(_) => Stage::Other,
        }
    }

    /// True when the failure happened after the site was built, while
    /// setting up or running the publish step.
    pub fn is_publish_failure(&self) -> bool {
        matches!(self, Error::PublishSetupFailed(_) | Error::PublishFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_build_reports_inner_stage() {
        let err = Error::PublishBuild(Box::new(Error::InstallFailed("no such package".into())));
        assert_eq!(err.stage(), Stage::Install);
        assert!(!err.is_publish_failure());
        assert!(err.to_string().starts_with("failed to build site for publish"));
    }

    #[test]
    fn test_publish_failures_are_distinguishable() {
        assert!(Error::PublishFailed("exit 1".into()).is_publish_failure());
        assert!(Error::PublishSetupFailed("npm".into()).is_publish_failure());
        assert!(!Error::BuildFailed("mkdocs".into()).is_publish_failure());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::PublishSetup.to_string(), "publish-setup");
        assert_eq!(
            Error::EnvironmentUnavailable {
                image: "python:0.0-slim".into(),
                message: "manifest unknown".into(),
            }
            .stage(),
            Stage::Environment
        );
    }
}
