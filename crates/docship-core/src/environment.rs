//! Execution backend trait and environment types.
//!
//! A backend provides isolated environments (containers) in which the
//! pipeline runs commands one at a time. Directories move between the host
//! and environments by copy, never by shared mount.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::secret::SecretVar;
use crate::{ResourceId, Result};

/// Where a mounted directory comes from.
#[derive(Debug, Clone)]
pub enum DirectorySource {
    /// A directory on the host, copied in.
    Host(PathBuf),
    /// A directory inside another live environment, copied across.
    Environment(DirectoryRef),
}

/// A directory to place inside a new environment.
#[derive(Debug, Clone)]
pub struct Mount {
    pub source: DirectorySource,
    /// Absolute path inside the environment.
    pub target: String,
}

/// Specification for a new environment.
#[derive(Debug, Clone)]
pub struct EnvironmentSpec {
    /// Base image, e.g. `python:3.11-slim`.
    pub image: String,
    /// Working directory for every command.
    pub working_dir: String,
    /// Secret variables. Handed to each command, never logged.
    pub secrets: Vec<SecretVar>,
    /// Directories copied in after creation, in order.
    pub mounts: Vec<Mount>,
}

impl EnvironmentSpec {
    pub fn new(image: impl Into<String>, working_dir: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            working_dir: working_dir.into(),
            secrets: Vec::new(),
            mounts: Vec::new(),
        }
    }

    pub fn with_mount(mut self, source: DirectorySource, target: impl Into<String>) -> Self {
        self.mounts.push(Mount {
            source,
            target: target.into(),
        });
        self
    }

    pub fn with_secret(mut self, secret: SecretVar) -> Self {
        self.secrets.push(secret);
        self
    }
}

/// Handle to a live environment.
#[derive(Debug, Clone)]
pub struct EnvironmentHandle {
    /// The environment ID.
    pub id: ResourceId,
    /// Backend-specific identifier (e.g. container name).
    pub backend_id: String,
    pub image: String,
    pub working_dir: String,
    /// Secrets injected into every command run in this environment.
    pub secrets: Vec<SecretVar>,
}

/// Reference to a directory inside a live environment.
#[derive(Debug, Clone)]
pub struct DirectoryRef {
    pub environment: EnvironmentHandle,
    /// Absolute path inside the environment.
    pub path: String,
}

impl DirectoryRef {
    pub fn new(environment: EnvironmentHandle, path: impl Into<String>) -> Self {
        Self {
            environment,
            path: path.into(),
        }
    }
}

/// Outcome of a command run to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last non-empty line of stderr (or stdout), for error messages.
    pub fn summary(&self) -> String {
        let last = |s: &str| {
            s.lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string())
        };
        match last(&self.stderr).or_else(|| last(&self.stdout)) {
            Some(line) => format!("exit code {}: {}", self.exit_code, line),
            None => format!("exit code {}", self.exit_code),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Trait for execution backends.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Name of this backend.
    fn name(&self) -> &'static str;

    /// Check whether the backend can currently create environments.
    async fn is_available(&self) -> bool;

    /// Create an environment from `spec` and copy its mounts in.
    async fn acquire(&self, spec: EnvironmentSpec) -> Result<EnvironmentHandle>;

    /// Run a command in the environment's working directory to completion.
    /// A non-zero exit is reported in the output, not as an error.
    async fn exec(&self, env: &EnvironmentHandle, cmd: &[String]) -> Result<ExecOutput>;

    /// Copy a directory out of an environment to a host path.
    async fn export(&self, dir: &DirectoryRef, dest: &Path) -> Result<()>;

    /// Destroy an environment.
    async fn release(&self, env: &EnvironmentHandle) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::Credential;

    fn output(exit_code: i64, stdout: &str, stderr: &str) -> ExecOutput {
        let now = Utc::now();
        ExecOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_summary_prefers_last_stderr_line() {
        let out = output(1, "collecting\n", "ERROR: first\nERROR: No matching distribution\n\n");
        assert_eq!(out.summary(), "exit code 1: ERROR: No matching distribution");
        assert!(!out.success());
    }

    #[test]
    fn test_summary_falls_back_to_stdout_then_code() {
        assert_eq!(output(2, "oops\n", "").summary(), "exit code 2: oops");
        assert_eq!(output(3, "", "").summary(), "exit code 3");
        assert!(output(0, "", "").success());
    }

    #[test]
    fn test_spec_builder() {
        let spec = EnvironmentSpec::new("node:slim", "/site")
            .with_secret(SecretVar::new("GITHUB_TOKEN", Credential::new("t")))
            .with_mount(DirectorySource::Host(PathBuf::from("/tmp/docs")), "/src");

        assert_eq!(spec.image, "node:slim");
        assert_eq!(spec.working_dir, "/site");
        assert_eq!(spec.secrets.len(), 1);
        assert_eq!(spec.mounts[0].target, "/src");
    }
}
