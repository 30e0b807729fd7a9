//! Unified error hierarchy for loadcycle
//!
//! Provides a structured error type system for template parsing, simulation
//! runs and input/output, with severity classification that maps onto the
//! tracing levels used by the rest of the crate.

use thiserror::Error;

/// Top-level error type for all loadcycle operations
#[derive(Debug, Error)]
pub enum LoadCycleError {
    /// Program template errors
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Monte Carlo simulation errors
    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding/decoding errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Import/export errors
    #[error("Import/Export error: {0}")]
    ImportExport(#[from] ImportExportError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Program template errors
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template defines no usable weeks
    #[error("Template has no weeks")]
    NoWeeks,

    /// Week position string could not be resolved
    #[error("Invalid week position: {position}")]
    InvalidPosition { position: String },

    /// Invalid field value in a week or block definition
    #[error("Invalid value in week {week} for {field}: {reason}")]
    InvalidField {
        week: u32,
        field: String,
        reason: String,
    },

    /// Block-structured template is inconsistent
    #[error("Invalid block '{block}': {reason}")]
    InvalidBlock { block: String, reason: String },

    /// Modifier condition string could not be parsed
    #[error("Invalid modifier condition: {condition}")]
    InvalidCondition { condition: String },
}

/// Monte Carlo simulation errors
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Run was cancelled by the caller
    #[error("Simulation cancelled after {completed_chunks} of {total_chunks} chunks")]
    Cancelled {
        completed_chunks: usize,
        total_chunks: usize,
    },

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter {parameter}={value}")]
    InvalidParameter { parameter: String, value: String },

    /// Week definition cannot be simulated
    #[error("Malformed week {week}: {reason}")]
    MalformedWeek { week: u32, reason: String },

    /// Worker pool failure
    #[error("Worker failure: {reason}")]
    WorkerFailure { reason: String },
}

/// Import and export errors
#[derive(Debug, Error)]
pub enum ImportExportError {
    /// Unsupported format
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Missing required data
    #[error("Missing required data: {field}")]
    MissingData { field: String },
}

/// Result type alias for loadcycle operations
pub type Result<T> = std::result::Result<T, LoadCycleError>;

impl LoadCycleError {
    /// Check if the failed operation can simply be run again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LoadCycleError::Simulation(SimulationError::Cancelled { .. })
                | LoadCycleError::Simulation(SimulationError::WorkerFailure { .. })
                | LoadCycleError::Io(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LoadCycleError::Simulation(SimulationError::Cancelled { .. }) => ErrorSeverity::Info,
            LoadCycleError::Validation(_) => ErrorSeverity::Warning,
            LoadCycleError::Template(_) => ErrorSeverity::Warning,
            LoadCycleError::Configuration(_) => ErrorSeverity::Warning,
            LoadCycleError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            LoadCycleError::Template(TemplateError::NoWeeks) => {
                "The program template does not define any weeks.".to_string()
            }
            LoadCycleError::Template(TemplateError::InvalidField { week, field, .. }) => {
                format!("Week {} of the program has an invalid {}.", week, field)
            }
            LoadCycleError::Simulation(SimulationError::Cancelled { .. }) => {
                "Suggestion run was cancelled.".to_string()
            }
            LoadCycleError::Simulation(SimulationError::MalformedWeek { week, .. }) => {
                format!(
                    "Could not simulate week {}. Please check its power, RPE and duration.",
                    week
                )
            }
            LoadCycleError::ImportExport(ImportExportError::UnsupportedFormat { format }) => {
                format!("File format '{}' is not supported.", format)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
