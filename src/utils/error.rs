use thiserror::Error;

/// Per-record ingestion failure. Never fatal to a batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindError {
    #[error("Unknown variable: {name}")]
    UnknownVariable { name: String },

    #[error("Invalid number format for variable {name}: '{token}'")]
    InvalidNumber { name: String, token: String },

    #[error("Period count must be set (LATA record) before binding {name}")]
    PeriodCountNotSet { name: String },

    #[error("No data for the first period of {name}")]
    MissingFirstValue { name: String },

    #[error("Period count already set to {current}; ignoring LATA record with {attempted} periods")]
    PeriodCountAlreadySet { current: usize, attempted: usize },
}

/// Simulation failure. The model is left untouched when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Period count is not set; load a LATA record first")]
    PeriodCountNotSet,

    #[error("Missing series: {name}")]
    MissingSeries { name: String },

    #[error("Series {name} has {actual} values, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Failure raised while evaluating a script. Nothing is imported when evaluation fails.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("line {line}: unexpected character '{text}'")]
    Lex { line: usize, text: String },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("line {line}: undefined variable '{name}'")]
    UndefinedVariable { line: usize, name: String },

    #[error("line {line}: unknown function '{name}'")]
    UnknownFunction { line: usize, name: String },

    #[error("line {line}: {name}() takes {expected} argument(s), got {actual}")]
    Arity {
        line: usize,
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("line {line}: type error: {message}")]
    Type { line: usize, message: String },

    #[error("line {line}: index {index} out of bounds for length {len}")]
    IndexOutOfBounds { line: usize, index: i64, len: usize },

    #[error("line {line}: array length mismatch ({left} vs {right})")]
    LengthMismatch {
        line: usize,
        left: usize,
        right: usize,
    },

    #[error("script exceeded its evaluation deadline of {limit_ms} ms")]
    Timeout { limit_ms: u64 },

    #[error("script exceeded its step budget of {limit} steps")]
    StepLimit { limit: u64 },

    #[error("line {line}: array of {len} elements exceeds the limit of {limit}")]
    ArrayTooLarge { line: usize, len: usize, limit: usize },
}

#[derive(Error, Debug)]
pub enum ModelSimError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Simulation failed: {0}")]
    Simulation(#[from] SimError),

    #[error("Script execution error: {0}")]
    Script(#[from] ScriptError),

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Configuration,
    Data,
    Simulation,
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ModelSimError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ModelSimError::IoError(_) => ErrorCategory::Io,
            ModelSimError::CsvError(_)
            | ModelSimError::SerializationError(_)
            | ModelSimError::ProcessingError { .. } => ErrorCategory::Data,
            ModelSimError::Simulation(_) => ErrorCategory::Simulation,
            ModelSimError::Script(_) => ErrorCategory::Script,
            ModelSimError::ConfigValidationError { .. }
            | ModelSimError::InvalidConfigValueError { .. }
            | ModelSimError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ModelSimError::Script(ScriptError::Timeout { .. })
            | ModelSimError::Script(ScriptError::StepLimit { .. })
            | ModelSimError::Script(ScriptError::ArrayTooLarge { .. }) => ErrorSeverity::Medium,
            ModelSimError::Script(_)
            | ModelSimError::Simulation(_)
            | ModelSimError::ProcessingError { .. }
            | ModelSimError::CsvError(_)
            | ModelSimError::SerializationError(_) => ErrorSeverity::High,
            ModelSimError::ConfigValidationError { .. }
            | ModelSimError::InvalidConfigValueError { .. }
            | ModelSimError::MissingConfigError { .. } => ErrorSeverity::High,
            ModelSimError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ModelSimError::IoError(_) => "Check that the input files exist and the output directory is writable",
            ModelSimError::Simulation(SimError::MissingSeries { .. }) => {
                "Make sure the data file provides every growth (tw*) and base series"
            }
            ModelSimError::Simulation(_) => "Load a data file starting with a LATA record before running",
            ModelSimError::Script(ScriptError::Timeout { .. })
            | ModelSimError::Script(ScriptError::StepLimit { .. }) => {
                "Check the script for non-terminating loops or raise the script timeout"
            }
            ModelSimError::Script(ScriptError::ArrayTooLarge { .. }) => {
                "Size arrays from LL or raise script.max_array_len"
            }
            ModelSimError::Script(_) => "Fix the script at the reported line and run it again",
            ModelSimError::ConfigValidationError { .. }
            | ModelSimError::InvalidConfigValueError { .. }
            | ModelSimError::MissingConfigError { .. } => "Review the configuration file or command line flags",
            ModelSimError::CsvError(_) | ModelSimError::SerializationError(_) => {
                "Try a different output format"
            }
            ModelSimError::ProcessingError { .. } => "Inspect the input data for malformed records",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ModelSimError::IoError(e) => format!("Could not access a file: {}", e),
            ModelSimError::Simulation(e) => format!("The model could not be run: {}", e),
            ModelSimError::Script(e) => format!("The script failed: {}", e),
            ModelSimError::MissingConfigError { field } => {
                format!("Required setting '{}' was not provided", field)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelSimError>;
