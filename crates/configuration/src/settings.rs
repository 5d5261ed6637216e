use crate::error::ConfigError;
use chrono_tz::Tz;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the ingestion job.
///
/// Every section has defaults, so an empty file (or no file at all) yields a
/// usable configuration apart from the API key and database credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiSettings,
    /// The instrument to ingest (e.g., "GOOG").
    pub symbol: String,
    pub database: DatabaseSettings,
    pub parser: ParserSettings,
    pub schedule: ScheduleSettings,
    pub logging: LoggingSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            symbol: "GOOG".to_string(),
            database: DatabaseSettings::default(),
            parser: ParserSettings::default(),
            schedule: ScheduleSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Config {
    /// Rejects settings the pipeline cannot run with.
    ///
    /// A missing API key is deliberately not checked here: the pipeline reports
    /// it as a per-run configuration failure without touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::ValidationError("symbol must not be empty".to_string()));
        }
        if self.api.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "api.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "api.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.parser.series_key_pattern.is_empty() {
            return Err(ConfigError::ValidationError(
                "parser.series_key_pattern must not be empty".to_string(),
            ));
        }
        if self.schedule.minute > 59 {
            return Err(ConfigError::ValidationError(format!(
                "schedule.minute must be between 0 and 59, got {}",
                self.schedule.minute
            )));
        }
        self.schedule.timezone()?;
        Ok(())
    }
}

/// Settings for the quote API endpoint and the fetch retry loop.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// The access credential. `None` makes every run fail with a configuration error.
    pub api_key: Option<String>,
    pub base_url: String,
    /// The API function identifier, e.g. `TIME_SERIES_DAILY`.
    pub function: String,
    /// `compact` returns the latest ~100 points, `full` the whole history.
    pub output_size: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub retry_delay_secs: u64,
    /// Top-level keys whose presence makes a response an API error.
    pub error_keys: Vec<String>,
    /// Top-level keys whose presence makes a response a rate-limit notice.
    /// Error keys win when both are present.
    pub rate_limit_keys: Vec<String>,
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://www.alphavantage.co/query".to_string(),
            function: "TIME_SERIES_DAILY".to_string(),
            output_size: "compact".to_string(),
            timeout_secs: 20,
            max_attempts: 3,
            retry_delay_secs: 2,
            error_keys: vec!["Error Message".to_string()],
            rate_limit_keys: vec!["Note".to_string(), "Information".to_string()],
        }
    }
}

// The key must never end up in a log line.
impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("function", &self.function)
            .field("output_size", &self.output_size)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("error_keys", &self.error_keys)
            .field("rate_limit_keys", &self.rate_limit_keys)
            .finish()
    }
}

/// Coordinates of the PostgreSQL database holding the `stock_data` table.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
    pub max_connections: u32,
    /// Bounds how long opening a connection may take.
    pub acquire_timeout_secs: u64,
    /// Server-side `statement_timeout` applied to every statement.
    pub statement_timeout_secs: u64,
}

impl DatabaseSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: "postgres".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: None,
            max_connections: 2,
            acquire_timeout_secs: 10,
            statement_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("statement_timeout_secs", &self.statement_timeout_secs)
            .finish()
    }
}

/// How a time-series payload is turned into quote rows.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Substring identifying the time-series object among the top-level keys.
    /// The provider spells the key differently per granularity
    /// ("Time Series (Daily)", "Time Series (60min)", "Weekly Time Series").
    pub series_key_pattern: String,
    pub labels: FieldLabels,
    pub adjusted_close: AdjustedClose,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            series_key_pattern: "Time Series".to_string(),
            labels: FieldLabels::default(),
            adjusted_close: AdjustedClose::default(),
        }
    }
}

/// The positional labels the provider uses inside each daily entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FieldLabels {
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

impl Default for FieldLabels {
    fn default() -> Self {
        Self {
            open: "1. open".to_string(),
            high: "2. high".to_string(),
            low: "3. low".to_string(),
            close: "4. close".to_string(),
            volume: "5. volume".to_string(),
        }
    }
}

/// Where `adjusted_close` comes from.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AdjustedClose {
    /// The free daily endpoint has no adjusted figure, so the close is copied.
    #[default]
    MirrorClose,
    /// Read a genuine adjusted close from this label, falling back to the close.
    Field { label: String },
}

/// When the hourly trigger fires.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Minute past the hour.
    pub minute: u32,
    /// IANA timezone name the schedule is evaluated in.
    pub timezone: String,
}

impl ScheduleSettings {
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ConfigError::ValidationError(format!("unknown schedule.timezone '{}'", self.timezone))
        })
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            minute: 0,
            timezone: "Asia/Kolkata".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
    /// When set, logs are also written to a daily-rolling file in this directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            directory: None,
            file_prefix: "quote-ingest.log".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_free_daily_endpoint() {
        let config = Config::default();
        assert_eq!(config.symbol, "GOOG");
        assert_eq!(config.api.function, "TIME_SERIES_DAILY");
        assert_eq!(config.api.output_size, "compact");
        assert_eq!(config.api.max_attempts, 3);
        assert_eq!(config.api.timeout(), Duration::from_secs(20));
        assert_eq!(config.api.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.database.host, "postgres");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.parser.adjusted_close, AdjustedClose::MirrorClose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_unusable_values() {
        let mut config = Config::default();
        config.api.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = Config::default();
        config.symbol = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.schedule.minute = 60;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.schedule.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = Config::default();
        config.api.api_key = Some("super-secret".to_string());
        config.database.password = Some("hunter2".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
