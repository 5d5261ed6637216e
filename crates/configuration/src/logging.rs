use crate::error::ConfigError;
use crate::settings::{LogFormat, LoggingSettings};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Flush guards for the non-blocking log writers.
///
/// Dropping this stops the background writers, so hold it for the lifetime
/// of the process.
#[must_use = "logs are lost once the guards are dropped"]
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `settings.level`. Console output uses the
/// configured format; the optional log file is always plain text without ANSI
/// colours and rolls over daily.
pub fn init_tracing(settings: &LoggingSettings) -> Result<LogGuards, ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| {
            ConfigError::LoggingError(format!("invalid log level '{}': {}", settings.level, e))
        })?;

    let (stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let mut guards = vec![stdout_guard];

    let console_layer = match settings.format {
        LogFormat::Compact => fmt::layer().compact().with_writer(stdout).boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(stdout).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(stdout).boxed(),
    };

    let file_layer = match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &settings.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            Some(fmt::layer().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(filter)
        .try_init()
        .map_err(|e| ConfigError::LoggingError(e.to_string()))?;

    tracing::info!(
        level = %settings.level,
        format = ?settings.format,
        file = ?settings.directory,
        "Logging initialized."
    );

    Ok(LogGuards { _guards: guards })
}
