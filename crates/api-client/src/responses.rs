use configuration::ApiSettings;
use serde_json::Value;

/// Top-level key the provider uses for hard errors (bad symbol, bad key, ...).
pub const ERROR_MESSAGE_KEY: &str = "Error Message";
/// Top-level key carrying the load-shedding notice on the free tier.
pub const NOTE_KEY: &str = "Note";
/// Newer accounts receive the same notice under this key instead.
pub const INFORMATION_KEY: &str = "Information";

/// The result of fetching one time-series payload.
///
/// A single attempt produces `Success`, `TransientFailure`, `ApiError` or
/// `RateLimited`. The retrying fetch never returns `TransientFailure`: it
/// either retries it or gives up with `ExhaustedRetries`.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(Value),
    TransientFailure(String),
    ApiError(String),
    RateLimited(String),
    ExhaustedRetries { attempts: u32 },
}

/// Which top-level keys mark a response as an error or a rate-limit notice.
#[derive(Debug, Clone)]
pub struct ResponseMarkers {
    pub error_keys: Vec<String>,
    pub rate_limit_keys: Vec<String>,
}

impl Default for ResponseMarkers {
    fn default() -> Self {
        Self {
            error_keys: vec![ERROR_MESSAGE_KEY.to_string()],
            rate_limit_keys: vec![NOTE_KEY.to_string(), INFORMATION_KEY.to_string()],
        }
    }
}

impl From<&ApiSettings> for ResponseMarkers {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            error_keys: settings.error_keys.clone(),
            rate_limit_keys: settings.rate_limit_keys.clone(),
        }
    }
}

impl ResponseMarkers {
    /// Classifies a decoded response body.
    ///
    /// Error markers take precedence over rate-limit markers, which take
    /// precedence over everything else, so a body carrying both data and an
    /// error message is never a success.
    pub fn classify(&self, body: Value) -> FetchOutcome {
        let Some(object) = body.as_object() else {
            return FetchOutcome::TransientFailure("response body is not a JSON object".to_string());
        };

        if let Some(message) = find_marker(object, &self.error_keys) {
            return FetchOutcome::ApiError(message);
        }
        if let Some(message) = find_marker(object, &self.rate_limit_keys) {
            return FetchOutcome::RateLimited(message);
        }

        FetchOutcome::Success(body)
    }
}

fn find_marker(object: &serde_json::Map<String, Value>, keys: &[String]) -> Option<String> {
    keys.iter().find_map(|key| {
        object.get(key).map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    })
}
