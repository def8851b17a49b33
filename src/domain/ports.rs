use crate::domain::bindings::Bindings;
use crate::domain::model::{Record, TransformResult};
use crate::utils::error::{Result, ScriptError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When a configured script runs relative to the projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStage {
    /// Before the projection; the script may override growth or base inputs.
    BeforeRun,
    /// After the projection; the script can read `PKB`.
    #[default]
    AfterRun,
}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn run_name(&self) -> &str;
    fn data_path(&self) -> &str;
    fn script_path(&self) -> Option<&str>;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn output_stem(&self) -> &str;
    fn run_simulation(&self) -> bool;
    fn script_timeout(&self) -> Option<Duration>;
    fn script_max_steps(&self) -> u64;
    fn script_max_array_len(&self) -> usize;
    fn script_stage(&self) -> ScriptStage;
}

/// External evaluator behind the script bridge.
///
/// Receives the exported bindings and returns the environment as it stands
/// after evaluation.
pub trait ScriptEvaluator {
    fn evaluate(&self, script: &str, bindings: Bindings) -> std::result::Result<Bindings, ScriptError>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Record>>;
    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
