pub mod binder;
pub mod bridge;
pub mod engine;
pub mod formatter;
pub mod runner;
pub mod session;

pub use crate::domain::model::{Record, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, ScriptEvaluator, Storage};
pub use crate::utils::error::Result;
