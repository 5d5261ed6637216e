//! One fetch → classify → parse → write unit of work.
//!
//! `Pipeline::run` never fails: every problem is reported as a
//! `PipelineResult` variant, and the steps run strictly in order so nothing
//! is written when fetching or parsing went wrong.

use api_client::{parse_daily, FetchOutcome, QuoteRequest, QuoteSource};
use configuration::{Config, ParserSettings};
use database::StoreConnector;
use std::fmt;
use std::sync::Arc;

pub mod result;

pub use result::PipelineResult;

/// Everything a run needs, resolved once at startup.
#[derive(Clone)]
pub struct PipelineConfig {
    pub api_key: Option<String>,
    /// Used for requests and for rows whose payload carries no symbol.
    pub symbol: String,
    pub parser: ParserSettings,
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            api_key: config.api.api_key.clone(),
            symbol: config.symbol.clone(),
            parser: config.parser.clone(),
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("symbol", &self.symbol)
            .field("parser", &self.parser)
            .finish()
    }
}

/// The central orchestrator for a single ingestion run.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn QuoteSource>,
    connector: Arc<dyn StoreConnector>,
}

impl Pipeline {
    /// Creates a new `Pipeline` with all its required components.
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn QuoteSource>,
        connector: Arc<dyn StoreConnector>,
    ) -> Self {
        Self { config, source, connector }
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    /// Runs the whole unit of work and logs its outcome.
    pub async fn run(&self) -> PipelineResult {
        let result = self.execute().await;
        result.log(&self.config.symbol);
        result
    }

    async fn execute(&self) -> PipelineResult {
        let api_key = match self.config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => {
                return PipelineResult::ConfigError {
                    reason: "API key missing. Set ALPHA_VANTAGE_API_KEY.".to_string(),
                };
            }
        };

        // 1. Fetch
        let request = QuoteRequest { symbol: self.config.symbol.clone(), api_key };
        let payload = match self.source.fetch_daily(&request).await {
            FetchOutcome::Success(payload) => payload,
            FetchOutcome::ApiError(message) => return PipelineResult::FetchError { reason: message },
            FetchOutcome::RateLimited(message) => return PipelineResult::RateLimited { message },
            FetchOutcome::ExhaustedRetries { attempts } => {
                return PipelineResult::FetchError {
                    reason: format!("fetch failed after {} attempts", attempts),
                };
            }
            // Sources are expected to retry these themselves.
            FetchOutcome::TransientFailure(reason) => return PipelineResult::FetchError { reason },
        };

        // 2. Parse
        let rows = match parse_daily(&payload, &self.config.symbol, &self.config.parser) {
            Ok(rows) => rows,
            Err(e) => return PipelineResult::ParseError { reason: e.to_string() },
        };
        if rows.is_empty() {
            tracing::info!(symbol = %self.config.symbol, "Time series is empty, nothing to store.");
            return PipelineResult::Success { rows: 0 };
        }

        // 3. Store
        let store = match self.connector.connect().await {
            Ok(store) => store,
            Err(e) => return PipelineResult::StorageError { reason: e.to_string() },
        };
        let written = store.upsert_quotes(&rows).await;
        store.close().await;

        match written {
            Ok(rows) => PipelineResult::Success { rows },
            Err(e) => PipelineResult::StorageError { reason: e.to_string() },
        }
    }
}
