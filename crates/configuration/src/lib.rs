use std::path::Path;

// Declare the modules that make up this crate.
#[cfg(feature = "clap")]
pub mod cli;
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
#[cfg(feature = "clap")]
pub use cli::CliOverrides;
pub use error::ConfigError;
pub use logging::{init_tracing, LogGuards};
pub use settings::{
    AdjustedClose, ApiSettings, Config, DatabaseSettings, FieldLabels, LogFormat,
    LoggingSettings, ParserSettings, ScheduleSettings,
};

/// Prefix for structured environment overrides, e.g. `INGEST__API__TIMEOUT_SECS=30`.
pub const ENV_PREFIX: &str = "INGEST";

/// Plain environment variable names that map onto a single setting. These are
/// the names operators already put in their `.env` files.
const ENV_ALIASES: &[(&str, &str)] = &[
    ("ALPHA_VANTAGE_API_KEY", "api.api_key"),
    ("SYMBOL", "symbol"),
    ("POSTGRES_USER", "database.user"),
    ("POSTGRES_PASSWORD", "database.password"),
    ("POSTGRES_DB", "database.database"),
    ("POSTGRES_HOST", "database.host"),
    ("POSTGRES_PORT", "database.port"),
];

/// Loads the application configuration.
///
/// Layers, lowest precedence first: built-in defaults, the TOML file at `path`
/// (optional), `INGEST__*` variables, then the plain aliases in `ENV_ALIASES`.
/// A `.env` file in the working directory is loaded into the environment first.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    // A missing .env is normal in containers where the variables are injected.
    let _ = dotenvy::dotenv();

    let env: config::Map<String, String> = std::env::vars().collect();
    load_config_with_env(path.as_ref(), env)
}

/// Same as [`load_config`] but reads overrides from `env` instead of the
/// process environment.
pub fn load_config_with_env(
    path: &Path,
    env: config::Map<String, String>,
) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(Some(env.clone())),
        );

    for (var, key) in ENV_ALIASES {
        builder = builder.set_override_option(*key, env.get(*var).cloned())?;
    }

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.build()?.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn missing_file() -> PathBuf {
        std::env::temp_dir().join("quote-ingest-does-not-exist.toml")
    }

    fn env(pairs: &[(&str, &str)]) -> config::Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config_with_env(&missing_file(), env(&[])).unwrap();
        assert_eq!(config.symbol, "GOOG");
        assert!(config.api.api_key.is_none());
        assert_eq!(config.database.port, 5432);
    }

    #[test]
    fn plain_aliases_override_settings() {
        let config = load_config_with_env(
            &missing_file(),
            env(&[
                ("ALPHA_VANTAGE_API_KEY", "demo"),
                ("SYMBOL", "IBM"),
                ("POSTGRES_HOST", "localhost"),
                ("POSTGRES_PORT", "6543"),
                ("POSTGRES_DB", "quotes"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api.api_key.as_deref(), Some("demo"));
        assert_eq!(config.symbol, "IBM");
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.database, "quotes");
    }

    #[test]
    fn prefixed_variables_reach_nested_sections() {
        let config = load_config_with_env(
            &missing_file(),
            env(&[("INGEST__API__MAX_ATTEMPTS", "5"), ("INGEST__SCHEDULE__MINUTE", "15")]),
        )
        .unwrap();

        assert_eq!(config.api.max_attempts, 5);
        assert_eq!(config.schedule.minute, 15);
    }

    #[test]
    fn toml_file_is_read_and_aliases_win() {
        let path = std::env::temp_dir().join(format!("quote-ingest-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
symbol = "MSFT"

[api]
retry_delay_secs = 7

[parser]
series_key_pattern = "Series"

[parser.adjusted_close]
mode = "field"
label = "5. adjusted close"

[logging]
format = "json"
"#,
        )
        .unwrap();

        let config = load_config_with_env(&path, env(&[("SYMBOL", "AAPL")])).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.symbol, "AAPL");
        assert_eq!(config.api.retry_delay_secs, 7);
        assert_eq!(config.parser.series_key_pattern, "Series");
        assert_eq!(
            config.parser.adjusted_close,
            AdjustedClose::Field { label: "5. adjusted close".to_string() }
        );
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let result = load_config_with_env(&missing_file(), env(&[("INGEST__API__MAX_ATTEMPTS", "0")]));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
