pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::config::toml_config::SimConfig;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::validate_required_field;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "model-sim")]
#[command(about = "Load a growth model, run the projection and extend it with scripts")]
pub struct CliConfig {
    /// Data file with one `NAME v1 v2 ...` record per line
    #[arg(short, long)]
    pub data: Option<String>,

    /// Script evaluated against the loaded model before the results are written
    #[arg(short, long)]
    pub script: Option<String>,

    /// TOML configuration file; command line flags override its values
    #[arg(short, long)]
    pub config: Option<String>,

    /// Skip the projection and only ingest (and script)
    #[arg(long)]
    pub no_run: bool,

    #[arg(long)]
    pub output_path: Option<String>,

    /// Comma separated list of table, csv, json
    #[arg(long, value_delimiter = ',')]
    pub formats: Vec<String>,

    /// Script evaluation deadline in milliseconds (0 disables it)
    #[arg(long)]
    pub script_timeout_ms: Option<u64>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[arg(long, help = "Log process CPU and memory usage")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Resolve the effective configuration: the TOML file when given, then
    /// any flags set on the command line.
    pub fn resolve(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::from_file(path)?,
            None => SimConfig::for_data(validate_required_field("--data", &self.data)?.clone()),
        };

        if let Some(data) = &self.data {
            config.input.data_path = data.clone();
        }
        if let Some(script) = &self.script {
            config.input.script_path = Some(script.clone());
        }
        if self.no_run {
            config.simulation.run = false;
        }
        if let Some(path) = &self.output_path {
            config.output.output_path = path.clone();
        }
        if !self.formats.is_empty() {
            config.output.formats = self.formats.clone();
        }
        if let Some(ms) = self.script_timeout_ms {
            config.script.timeout_ms = ms;
        }

        Ok(config)
    }
}
