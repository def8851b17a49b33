//! Growth-model simulator: load named series from a data file, project the
//! base series forward with their growth multipliers and extend the model
//! with scripts.

pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod script;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, toml_config::SimConfig};

pub use app::pipelines::BatchPipeline;
pub use core::{runner::PipelineRunner, session::Session};
pub use domain::model::Model;
pub use script::ScriptEngine;
pub use utils::error::{ModelSimError, Result};
