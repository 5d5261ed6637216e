use crate::error::ApiError;
use async_trait::async_trait;
use configuration::ApiSettings;
use serde_json::Value;

pub mod error;
pub mod parser;
pub mod responses;
pub mod retry;

// --- Public API ---
pub use error::ParseError;
pub use parser::parse_daily;
pub use responses::{FetchOutcome, ResponseMarkers};
pub use retry::RetryPolicy;

/// What to fetch and with which credential.
#[derive(Clone)]
pub struct QuoteRequest {
    pub symbol: String,
    pub api_key: String,
}

impl std::fmt::Debug for QuoteRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteRequest")
            .field("symbol", &self.symbol)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// The abstract interface for a source of daily time-series payloads.
/// The pipeline only talks to this trait, so tests can swap in a fake.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetches one payload, retrying transient failures internally.
    /// Never returns `FetchOutcome::TransientFailure`.
    async fn fetch_daily(&self, request: &QuoteRequest) -> FetchOutcome;
}

/// A concrete `QuoteSource` for the Alpha Vantage query endpoint.
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    client: reqwest::Client,
    base_url: String,
    function: String,
    output_size: String,
    retry: RetryPolicy,
    markers: ResponseMarkers,
}

impl AlphaVantageClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            function: settings.function.clone(),
            output_size: settings.output_size.clone(),
            retry: RetryPolicy::from(settings),
            markers: ResponseMarkers::from(settings),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Issues a single request and classifies what came back.
    async fn attempt(&self, request: &QuoteRequest, attempt: u32) -> FetchOutcome {
        tracing::info!(
            url = %self.base_url,
            function = %self.function,
            symbol = %request.symbol,
            outputsize = %self.output_size,
            attempt,
            max_attempts = self.retry.max_attempts,
            "Fetching time series."
        );

        let response = match self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", self.function.as_str()),
                ("symbol", request.symbol.as_str()),
                ("apikey", request.api_key.as_str()),
                ("outputsize", self.output_size.as_str()),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            // `without_url` keeps the API key out of the message.
            Err(e) => return FetchOutcome::TransientFailure(format!("request failed: {}", e.without_url())),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchOutcome::TransientFailure(format!("unexpected HTTP status {}", status));
        }

        let body = match response.json::<Value>().await {
            Ok(body) => body,
            Err(e) => {
                return FetchOutcome::TransientFailure(format!("invalid JSON body: {}", e.without_url()));
            }
        };

        if let Some(object) = body.as_object() {
            let keys: Vec<&str> = object.keys().map(String::as_str).collect();
            tracing::info!(keys = ?keys, "API response keys.");
        }

        self.markers.classify(body)
    }
}

#[async_trait]
impl QuoteSource for AlphaVantageClient {
    async fn fetch_daily(&self, request: &QuoteRequest) -> FetchOutcome {
        for attempt in 1..=self.retry.max_attempts {
            match self.attempt(request, attempt).await {
                FetchOutcome::TransientFailure(reason) => {
                    tracing::warn!(
                        symbol = %request.symbol,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %reason,
                        "Fetch attempt failed."
                    );
                    if self.retry.should_retry(attempt) {
                        tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    }
                }
                outcome => return outcome,
            }
        }

        FetchOutcome::ExhaustedRetries { attempts: self.retry.max_attempts }
    }
}
