use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to build the HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

/// Reasons a fetched payload could not be turned into quote rows.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("The response body is not a JSON object.")]
    NotAnObject,

    #[error("Unexpected format: no key containing '{0}' found.")]
    MissingSeries(String),

    #[error("The time series under '{0}' is not a JSON object.")]
    MalformedSeries(String),

    #[error("The entry for '{0}' is not a JSON object.")]
    MalformedEntry(String),

    #[error("Invalid date key '{0}', expected YYYY-MM-DD.")]
    InvalidDate(String),

    #[error("Parsed row for {0} is invalid: {1}")]
    InvalidRow(String, core_types::CoreError),
}
