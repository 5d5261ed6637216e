use crate::settings::Config;
use std::path::PathBuf;

/// Command-line flags shared by every subcommand that loads the configuration.
#[derive(Debug, Clone, clap::Args)]
pub struct CliOverrides {
    /// Path to the TOML configuration file. A missing file is not an error.
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    /// Ingest this symbol instead of the configured one.
    #[arg(long, global = true)]
    pub symbol: Option<String>,
}

impl CliOverrides {
    /// Applies the flags on top of an already loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(symbol) = &self.symbol {
            config.symbol = symbol.clone();
        }
    }
}
