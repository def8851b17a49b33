use crate::core::formatter::OutputFormat;
use crate::core::ConfigProvider;
use crate::domain::ports::ScriptStage;
use crate::script::{DEFAULT_MAX_ARRAY_LEN, DEFAULT_MAX_STEPS};
use crate::utils::error::{ModelSimError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    pub input: InputConfig,
    #[serde(default)]
    pub script: ScriptConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Run the projection after ingest.
    #[serde(default = "default_true")]
    pub run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub data_path: String,
    pub script_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Evaluation deadline in milliseconds; 0 disables it.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,
    /// Longest array `zeros` or `fill` may build.
    #[serde(default = "default_max_array_len")]
    pub max_array_len: usize,
    #[serde(default)]
    pub stage: ScriptStage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub output_path: String,
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    /// File stem; `{timestamp}` and `{name}` are substituted.
    #[serde(default = "default_filename")]
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

fn default_name() -> String {
    "model".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_steps() -> u64 {
    DEFAULT_MAX_STEPS
}

fn default_max_array_len() -> usize {
    DEFAULT_MAX_ARRAY_LEN
}

fn default_output_path() -> String {
    "./output".to_string()
}

fn default_formats() -> Vec<String> {
    vec!["table".to_string()]
}

fn default_filename() -> String {
    "results".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            run: true,
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_steps: default_max_steps(),
            max_array_len: default_max_array_len(),
            stage: ScriptStage::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            formats: default_formats(),
            filename: default_filename(),
        }
    }
}

impl SimConfig {
    /// Minimal config for a data file with everything else defaulted.
    pub fn for_data(data_path: impl Into<String>) -> Self {
        Self {
            simulation: SimulationConfig::default(),
            input: InputConfig {
                data_path: data_path.into(),
                script_path: None,
            },
            script: ScriptConfig::default(),
            output: OutputConfig::default(),
            monitoring: None,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ModelSimError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ModelSimError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replace `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ModelSimError::ConfigValidationError {
            field: "environment".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("input.data_path", &self.input.data_path)?;
        if let Some(script) = &self.input.script_path {
            validation::validate_path("input.script_path", script)?;
        }
        validation::validate_path("output.output_path", &self.output.output_path)?;
        validation::validate_non_empty_string("output.filename", &self.output.filename)?;
        validation::validate_positive_number("script.max_steps", self.script.max_steps as usize, 1)?;
        validation::validate_positive_number("script.max_array_len", self.script.max_array_len, 1)?;
        validation::validate_range("script.timeout_ms", self.script.timeout_ms, 0, 3_600_000)?;

        if self.output.formats.is_empty() {
            return Err(ModelSimError::InvalidConfigValueError {
                field: "output.formats".to_string(),
                value: String::new(),
                reason: "At least one output format is required".to_string(),
            });
        }
        self.parsed_formats()?;

        Ok(())
    }

    pub fn parsed_formats(&self) -> Result<Vec<OutputFormat>> {
        self.output.formats.iter().map(|f| f.parse()).collect()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ConfigProvider for SimConfig {
    fn run_name(&self) -> &str {
        &self.simulation.name
    }

    fn data_path(&self) -> &str {
        &self.input.data_path
    }

    fn script_path(&self) -> Option<&str> {
        self.input.script_path.as_deref()
    }

    fn output_path(&self) -> &str {
        &self.output.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.output.formats
    }

    fn output_stem(&self) -> &str {
        &self.output.filename
    }

    fn run_simulation(&self) -> bool {
        self.simulation.run
    }

    fn script_timeout(&self) -> Option<Duration> {
        match self.script.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    fn script_max_steps(&self) -> u64 {
        self.script.max_steps
    }

    fn script_max_array_len(&self) -> usize {
        self.script.max_array_len
    }

    fn script_stage(&self) -> ScriptStage {
        self.script.stage
    }
}

impl Validate for SimConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = SimConfig::from_toml_str(
            r#"
[input]
data_path = "data/model.txt"
"#,
        )
        .unwrap();

        assert_eq!(config.data_path(), "data/model.txt");
        assert!(config.run_simulation());
        assert_eq!(config.script_path(), None);
        assert_eq!(config.output_formats(), &["table".to_string()]);
        assert_eq!(config.script_timeout(), Some(Duration::from_millis(5_000)));
        assert!(!config.monitoring_enabled());
        assert_eq!(config.script_stage(), ScriptStage::AfterRun);
        assert_eq!(config.script_max_array_len(), DEFAULT_MAX_ARRAY_LEN);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = SimConfig::from_toml_str(
            r#"
[simulation]
name = "baseline"
run = false

[input]
data_path = "data/model.txt"
script_path = "scripts/share.txt"

[script]
timeout_ms = 0
max_steps = 500
max_array_len = 64
stage = "before_run"

[output]
output_path = "./out"
formats = ["table", "csv", "json"]
filename = "{name}_{timestamp}"

[monitoring]
enabled = true
"#,
        )
        .unwrap();

        assert!(!config.run_simulation());
        assert_eq!(config.script_path(), Some("scripts/share.txt"));
        assert_eq!(config.script_timeout(), None);
        assert_eq!(config.script_max_steps(), 500);
        assert_eq!(config.script_max_array_len(), 64);
        assert_eq!(config.script_stage(), ScriptStage::BeforeRun);
        assert_eq!(config.run_name(), "baseline");
        assert_eq!(
            config.parsed_formats().unwrap(),
            vec![OutputFormat::Table, OutputFormat::Csv, OutputFormat::Json]
        );
        assert!(config.monitoring_enabled());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MODEL_SIM_TEST_DATA", "/tmp/model.txt");

        let config = SimConfig::from_toml_str(
            r#"
[input]
data_path = "${MODEL_SIM_TEST_DATA}"
"#,
        )
        .unwrap();
        assert_eq!(config.input.data_path, "/tmp/model.txt");

        std::env::remove_var("MODEL_SIM_TEST_DATA");
    }

    #[test]
    fn test_invalid_format_fails_validation() {
        let mut config = SimConfig::for_data("data.txt");
        config.output.formats = vec!["xml".to_string()];
        assert!(config.validate().is_err());

        config.output.formats.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_input_section_is_an_error() {
        let err = SimConfig::from_toml_str("[output]\nformats = [\"csv\"]\n").unwrap_err();
        assert!(matches!(err, ModelSimError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[simulation]\nname = \"file-test\"\n\n[input]\ndata_path = \"d.txt\"\n")
            .unwrap();

        let config = SimConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.simulation.name, "file-test");
    }
}
