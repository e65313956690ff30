//! Core domain types and traits for the docship documentation pipeline.
//!
//! This crate contains:
//! - Resource identifiers
//! - Error taxonomy and stage classification
//! - Pipeline configuration and its defaults
//! - The execution backend trait and environment handles
//! - Credential handling

pub mod docs;
pub mod environment;
pub mod error;
pub mod id;
pub mod secret;

pub use docs::{PipelineConfig, PublishConfig, SourceDirectory};
pub use error::{Error, Result, Stage};
pub use id::ResourceId;
pub use secret::Credential;
