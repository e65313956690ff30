//! Local Docker backend implementation.
//!
//! Each environment is a long-lived container running `sleep infinity`.
//! Commands run through docker exec; directories are copied in and out as
//! tar archives.

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, DownloadFromContainerOptions, ListContainersOptions,
    LogOutput, RemoveContainerOptions, StartContainerOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bytes::Bytes;
use chrono::Utc;
use docship_core::environment::*;
use docship_core::secret::redact_all;
use docship_core::{Error, ResourceId, Result};
use futures::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::archive;

/// Label set on every container this backend creates.
pub const ENVIRONMENT_LABEL: &str = "docship.environment";

/// Docker backend talking to the local daemon.
pub struct DockerBackend {
    docker: Docker,
}

impl DockerBackend {
    /// Connect to the local Docker daemon.
    pub fn new() -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().map_err(|e| Error::Backend(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Create with a custom Docker client.
    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }

    fn container_name(id: &ResourceId) -> String {
        format!("docship-env-{}", id)
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        info!(image = %image, "Pulling image");
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut pull_stream = self.docker.create_image(Some(options), None, None);
        while let Some(result) = pull_stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!(status = %status, "Pull progress");
                    }
                }
                Err(e) => {
                    return Err(Error::EnvironmentUnavailable {
                        image: image.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn create_and_start(&self, id: &ResourceId, spec: &EnvironmentSpec) -> Result<String> {
        let name = Self::container_name(id);

        let labels = HashMap::from([(ENVIRONMENT_LABEL.to_string(), id.to_string())]);

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            working_dir: Some(spec.working_dir.clone()),
            labels: Some(labels),
            tty: Some(false),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: name.clone(),
            platform: None,
        };

        info!(container = %name, image = %spec.image, "Creating environment");
        self.docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| Error::EnvironmentUnavailable {
                image: spec.image.clone(),
                message: format!("failed to create container: {}", e),
            })?;

        if let Err(e) = self
            .docker
            .start_container(&name, None::<StartContainerOptions<String>>)
            .await
        {
            if let Err(cleanup) = remove_container(&self.docker, &name).await {
                warn!(container = %name, error = %cleanup, "Cleanup failed");
            }
            return Err(Error::EnvironmentUnavailable {
                image: spec.image.clone(),
                message: format!("failed to start container: {}", e),
            });
        }

        Ok(name)
    }

    async fn download(&self, dir: &DirectoryRef) -> Result<Vec<u8>> {
        let options = DownloadFromContainerOptions {
            path: dir.path.clone(),
        };
        let mut stream = self
            .docker
            .download_from_container(&dir.environment.backend_id, Some(options));

        let mut archive = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                Error::Backend(format!("failed to download {}: {}", dir.path, e))
            })?;
            archive.extend_from_slice(&chunk);
        }
        Ok(archive)
    }

    async fn upload(&self, env: &EnvironmentHandle, target: &str, archive: Vec<u8>) -> Result<()> {
        let mkdir = self
            .exec(env, &["mkdir".to_string(), "-p".to_string(), target.to_string()])
            .await?;
        if !mkdir.success() {
            return Err(Error::Backend(format!(
                "failed to create {}: {}",
                target,
                mkdir.summary()
            )));
        }

        let options = UploadToContainerOptions {
            path: target.to_string(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(&env.backend_id, Some(options), Bytes::from(archive))
            .await
            .map_err(|e| Error::Backend(format!("failed to upload to {}: {}", target, e)))
    }

    async fn copy_in(&self, env: &EnvironmentHandle, mount: &Mount) -> Result<()> {
        let archive = match &mount.source {
            DirectorySource::Host(path) => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || archive::pack_dir(&path))
                    .await
                    .map_err(|e| Error::Backend(format!("archive task failed: {}", e)))??
            }
            DirectorySource::Environment(dir) => {
                let wrapped = self.download(dir).await?;
                tokio::task::spawn_blocking(move || archive::strip_top_level(&wrapped))
                    .await
                    .map_err(|e| Error::Backend(format!("archive task failed: {}", e)))??
            }
        };

        debug!(target = %mount.target, bytes = archive.len(), "Copying directory in");
        self.upload(env, &mount.target, archive).await
    }

    /// Remove every container carrying the environment label, e.g. ones left
    /// behind by a cancelled run. Returns the number removed.
    pub async fn prune(&self) -> Result<usize> {
        let mut removed = 0;
        for id in self.labelled_containers().await? {
            match remove_container(&self.docker, &id).await {
                Ok(()) => {
                    info!(container = %id, "Removed leftover environment");
                    removed += 1;
                }
                Err(e) => warn!(container = %id, error = %e, "Failed to remove environment"),
            }
        }
        Ok(removed)
    }

    /// IDs of every container carrying the environment label.
    async fn labelled_containers(&self) -> Result<Vec<String>> {
        let filters = HashMap::from([("label", vec![ENVIRONMENT_LABEL])]);
        let options = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| Error::Backend(format!("failed to list containers: {}", e)))?;
        Ok(containers.into_iter().filter_map(|c| c.id).collect())
    }
}

#[async_trait]
impl ExecutionBackend for DockerBackend {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn is_available(&self) -> bool {
        self.docker.ping().await.is_ok()
    }

    async fn acquire(&self, spec: EnvironmentSpec) -> Result<EnvironmentHandle> {
        self.pull_image(&spec.image).await?;

        let id = ResourceId::new();
        let backend_id = self.create_and_start(&id, &spec).await?;

        let handle = EnvironmentHandle {
            id,
            backend_id,
            image: spec.image.clone(),
            working_dir: spec.working_dir.clone(),
            secrets: spec.secrets.clone(),
        };

        for mount in &spec.mounts {
            if let Err(e) = self.copy_in(&handle, mount).await {
                if let Err(cleanup) = self.release(&handle).await {
                    warn!(container = %handle.backend_id, error = %cleanup, "Cleanup failed");
                }
                return Err(e);
            }
        }

        Ok(handle)
    }

    async fn exec(&self, env: &EnvironmentHandle, cmd: &[String]) -> Result<ExecOutput> {
        let secret_env: Vec<String> = env
            .secrets
            .iter()
            .map(|s| format!("{}={}", s.name, s.value.expose()))
            .collect();

        let options = CreateExecOptions {
            cmd: Some(cmd.to_vec()),
            env: Some(secret_env),
            working_dir: Some(env.working_dir.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let started_at = Utc::now();
        let exec = self
            .docker
            .create_exec(&env.backend_id, options)
            .await
            .map_err(|e| Error::Backend(format!("failed to create exec: {}", e)))?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        match self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| Error::Backend(format!("failed to start exec: {}", e)))?
        {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(chunk) = output.next().await {
                    match chunk {
                        Ok(LogOutput::StdErr { message }) => {
                            stderr.push_str(&String::from_utf8_lossy(&message))
                        }
                        Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                            stdout.push_str(&String::from_utf8_lossy(&message))
                        }
                        Ok(LogOutput::StdIn { .. }) => {}
                        Err(e) => {
                            warn!(error = %e, "Exec output stream error");
                            break;
                        }
                    }
                }
            }
            StartExecResults::Detached => {}
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| Error::Backend(format!("failed to inspect exec: {}", e)))?;

        Ok(ExecOutput {
            exit_code: inspect.exit_code.unwrap_or(-1),
            stdout: redact_all(&env.secrets, &stdout),
            stderr: redact_all(&env.secrets, &stderr),
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn export(&self, dir: &DirectoryRef, dest: &Path) -> Result<()> {
        info!(path = %dir.path, dest = %dest.display(), "Exporting directory");
        let archive = self
            .download(dir)
            .await
            .map_err(|e| Error::ExportFailed(e.to_string()))?;

        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || archive::unpack_stripped(&archive, &dest))
            .await
            .map_err(|e| Error::ExportFailed(format!("unpack task failed: {}", e)))?
            .map_err(|e| Error::ExportFailed(e.to_string()))
    }

    async fn release(&self, env: &EnvironmentHandle) -> Result<()> {
        debug!(container = %env.backend_id, "Releasing environment");
        remove_container(&self.docker, &env.backend_id).await
    }
}

/// Force-remove a container by name or ID.
async fn remove_container(docker: &Docker, container: &str) -> Result<()> {
    let options = RemoveContainerOptions {
        force: true,
        ..Default::default()
    };

    docker
        .remove_container(container, Some(options))
        .await
        .map_err(|e| Error::Backend(format!("failed to remove container: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_name_generation() {
        let id = ResourceId::new();
        let name = DockerBackend::container_name(&id);

        assert!(name.starts_with("docship-env-"));
        assert!(name.ends_with(&id.to_string()));
    }

    #[test]
    fn test_container_name_unique_per_id() {
        let name1 = DockerBackend::container_name(&ResourceId::new());
        let name2 = DockerBackend::container_name(&ResourceId::new());
        assert_ne!(name1, name2);
    }
}

/// Integration tests that require Docker to be running.
/// Run with: cargo test -- --ignored
#[cfg(test)]
mod integration_tests {
    use super::*;
    use docship_core::Credential;
    use docship_core::secret::SecretVar;
    use std::path::PathBuf;

    fn cmd(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    #[ignore]
    async fn test_backend_available() {
        let backend = DockerBackend::new().expect("Should connect to Docker daemon");
        assert_eq!(backend.name(), "docker");
        assert!(backend.is_available().await);
    }

    #[tokio::test]
    #[ignore]
    async fn test_exec_reports_exit_code() {
        let backend = DockerBackend::new().unwrap();
        let env = backend
            .acquire(EnvironmentSpec::new("alpine:latest", "/tmp"))
            .await
            .expect("Should acquire environment");

        let ok = backend.exec(&env, &cmd(&["sh", "-c", "echo hi"])).await.unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout.trim(), "hi");

        let failed = backend.exec(&env, &cmd(&["sh", "-c", "exit 42"])).await.unwrap();
        assert_eq!(failed.exit_code, 42);

        backend.release(&env).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_unknown_image_is_unavailable() {
        let backend = DockerBackend::new().unwrap();
        let err = backend
            .acquire(EnvironmentSpec::new("python:0.0.0-does-not-exist-slim", "/src"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EnvironmentUnavailable { .. }));
    }

    #[tokio::test]
    #[ignore]
    async fn test_start_failure_leaves_no_container() {
        let backend = DockerBackend::new().unwrap();
        let before = backend.labelled_containers().await.unwrap();

        // hello-world has no `sleep`, so the container is created but
        // cannot start.
        let err = backend
            .acquire(EnvironmentSpec::new("hello-world:latest", "/"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EnvironmentUnavailable { .. }));
        assert!(err.to_string().contains("failed to start container"));

        let after = backend.labelled_containers().await.unwrap();
        assert!(after.iter().all(|id| before.contains(id)));
    }

    #[tokio::test]
    #[ignore]
    async fn test_secret_is_visible_to_command_but_redacted() {
        let backend = DockerBackend::new().unwrap();
        let spec = EnvironmentSpec::new("alpine:latest", "/tmp")
            .with_secret(SecretVar::new("TOKEN", Credential::new("s3cr3t-value")));
        let env = backend.acquire(spec).await.unwrap();

        let out = backend
            .exec(&env, &cmd(&["sh", "-c", "test -n \"$TOKEN\" && echo $TOKEN"]))
            .await
            .unwrap();
        assert!(out.success());
        assert!(!out.stdout.contains("s3cr3t-value"));
        assert!(out.stdout.contains("[REDACTED]"));

        backend.release(&env).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_copy_between_environments_and_export() {
        let backend = DockerBackend::new().unwrap();

        let host = tempfile::tempdir().unwrap();
        std::fs::write(host.path().join("index.md"), "# Home\n").unwrap();

        let first = backend
            .acquire(
                EnvironmentSpec::new("alpine:latest", "/src")
                    .with_mount(DirectorySource::Host(PathBuf::from(host.path())), "/src"),
            )
            .await
            .unwrap();
        let out = backend
            .exec(&first, &cmd(&["sh", "-c", "mkdir -p out && cp index.md out/index.html"]))
            .await
            .unwrap();
        assert!(out.success());

        let built = DirectoryRef::new(first.clone(), "/src/out");
        let second = backend
            .acquire(
                EnvironmentSpec::new("alpine:latest", "/site")
                    .with_mount(DirectorySource::Environment(built.clone()), "/site"),
            )
            .await
            .unwrap();
        let ls = backend.exec(&second, &cmd(&["ls"])).await.unwrap();
        assert!(ls.stdout.contains("index.html"));

        let dest = tempfile::tempdir().unwrap();
        backend.export(&built, dest.path()).await.unwrap();
        assert!(dest.path().join("index.html").is_file());

        // The host tree was copied, not mounted.
        assert!(!host.path().join("out").exists());

        backend.release(&second).await.unwrap();
        backend.release(&first).await.unwrap();
    }
}
