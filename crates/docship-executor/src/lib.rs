//! Execution backends for docship.
//!
//! Provides:
//! - Local Docker (via the Docker Engine API)
//! - Tar helpers for moving directories in and out of environments

pub mod archive;
pub mod docker;

pub use docker::{DockerBackend, ENVIRONMENT_LABEL};
pub use docship_core::environment::{
    DirectoryRef, DirectorySource, EnvironmentHandle, EnvironmentSpec, ExecOutput,
    ExecutionBackend, Mount,
};
