//! KDL configuration parsing for docship.
//!
//! Reads the optional `docship.kdl` pipeline file and layers it over the
//! built-in defaults.

pub mod error;
pub mod pipeline;

pub use error::{ConfigError, ConfigResult};
pub use pipeline::{PipelineFile, PublishOverrides, load_pipeline_file, parse_pipeline_file};
