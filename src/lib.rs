pub mod types;
pub mod error;
pub mod metadata;
pub mod timeseries;
pub mod algorithm;
pub mod factory;
pub mod pipeline;
pub mod streaming;
pub mod config;

pub use types::*;
pub use error::{PipelineError, Result};
