use serde::Serialize;
use std::fmt;

/// The outcome of one pipeline run. Every run produces exactly one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineResult {
    /// Rows were written (zero is a valid success for an empty series).
    Success { rows: u64 },
    /// The run could not start, e.g. the API key is missing.
    ConfigError { reason: String },
    /// The API could not be reached or rejected the request.
    FetchError { reason: String },
    /// The API asked us to slow down; the next scheduled run will retry.
    RateLimited { message: String },
    /// The response did not have the expected shape.
    ParseError { reason: String },
    /// The database could not be reached or the write failed.
    StorageError { reason: String },
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Success { .. })
    }

    /// Emits one log line at the severity matching the outcome.
    pub fn log(&self, symbol: &str) {
        match self {
            PipelineResult::Success { rows } => {
                tracing::info!(symbol, rows, "Upserted {} rows for {}.", rows, symbol);
            }
            PipelineResult::RateLimited { message } => {
                tracing::warn!(symbol, message = %message, "API notice: rate limited.");
            }
            PipelineResult::ConfigError { reason } => {
                tracing::error!(symbol, error = %reason, "Configuration error.");
            }
            PipelineResult::FetchError { reason } => {
                tracing::error!(symbol, error = %reason, "Fetch failed.");
            }
            PipelineResult::ParseError { reason } => {
                tracing::error!(symbol, error = %reason, "Parsing failed.");
            }
            PipelineResult::StorageError { reason } => {
                tracing::error!(symbol, error = %reason, "Storage failed.");
            }
        }
    }
}

impl fmt::Display for PipelineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineResult::Success { rows } => write!(f, "success: {} rows upserted", rows),
            PipelineResult::ConfigError { reason } => write!(f, "configuration error: {}", reason),
            PipelineResult::FetchError { reason } => write!(f, "fetch error: {}", reason),
            PipelineResult::RateLimited { message } => write!(f, "rate limited: {}", message),
            PipelineResult::ParseError { reason } => write!(f, "parse error: {}", reason),
            PipelineResult::StorageError { reason } => write!(f, "storage error: {}", reason),
        }
    }
}
